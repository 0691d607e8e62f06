//! In-memory document store.

use crate::client::{
    ActiveStatus, DocumentStore, LockHolder, PersistReceipt, PersistRequest, StoredDocument,
    ValStatus, ValidationOutcome, VersionInfo,
};
use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Validation rule: given a document type and content, returns the list of
/// validation errors (empty when valid).
pub type Validator = Arc<dyn Fn(&str, &str) -> Vec<String> + Send + Sync>;

/// A numbered version of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredVersion {
    /// Version number, starting at 1.
    pub number: u32,
    /// Stored content.
    pub content: String,
    /// Whether the version is publishable.
    pub publishable: bool,
    /// Validation status recorded when the version was saved.
    #[serde(default)]
    pub val_status: ValStatus,
}

/// Everything the store keeps about one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Document identifier.
    pub id: u64,
    /// Document type name.
    pub doc_type: String,
    /// Current working document content.
    pub content: String,
    /// Validation status of the current working document.
    #[serde(default)]
    pub val_status: ValStatus,
    /// Active status.
    #[serde(default)]
    pub active_status: ActiveStatus,
    /// Numbered versions, oldest first.
    #[serde(default)]
    pub versions: Vec<StoredVersion>,
    /// True if the working copy changed since the last version was saved.
    #[serde(default)]
    pub cwd_differs: bool,
    /// Session holding the checkout, if any.
    #[serde(default)]
    pub locked_by: Option<String>,
}

impl DocumentRecord {
    /// Creates an unversioned record.
    pub fn new(id: u64, doc_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            doc_type: doc_type.into(),
            content: content.into(),
            val_status: ValStatus::Unvalidated,
            active_status: ActiveStatus::Active,
            versions: Vec::new(),
            cwd_differs: false,
            locked_by: None,
        }
    }

    /// Returns the most recent version.
    pub fn last_version(&self) -> Option<&StoredVersion> {
        self.versions.last()
    }

    /// Returns the most recent publishable version.
    pub fn last_publishable(&self) -> Option<&StoredVersion> {
        self.versions.iter().rev().find(|v| v.publishable)
    }

    /// Returns a version by number.
    pub fn version(&self, number: u32) -> Option<&StoredVersion> {
        self.versions.iter().find(|v| v.number == number)
    }

    /// Returns the version history summary.
    pub fn version_info(&self) -> VersionInfo {
        VersionInfo {
            last_version: self.last_version().map(|v| v.number),
            last_publishable: self.last_publishable().map(|v| v.number),
            cwd_differs: self.cwd_differs,
        }
    }

    fn working_copy(&self) -> StoredDocument {
        StoredDocument {
            id: self.id,
            doc_type: self.doc_type.clone(),
            content: self.content.clone(),
            version: None,
            publishable: false,
            val_status: self.val_status,
        }
    }

    fn numbered(&self, version: &StoredVersion) -> StoredDocument {
        StoredDocument {
            id: self.id,
            doc_type: self.doc_type.clone(),
            content: version.content.clone(),
            version: Some(version.number),
            publishable: version.publishable,
            val_status: version.val_status,
        }
    }

    fn check_not_held_by_other(&self, session: &str) -> StoreResult<()> {
        match &self.locked_by {
            Some(holder) if holder != session => Err(StoreError::locked(
                self.id,
                format!("checked out by {holder}"),
            )),
            _ => Ok(()),
        }
    }
}

/// An in-memory document store.
///
/// This store keeps all documents in memory and is suitable for:
/// - Unit and integration tests
/// - Backing the file store, which snapshots it to disk
///
/// Every persisted request and every unlock is journaled so tests can assert
/// on exactly what a job wrote, and in which order.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use docmod_store::{DocumentStore, InMemoryStore};
///
/// let store = InMemoryStore::new("batch");
/// store.insert_document(1, "Term", "<Term/>");
/// store.add_version(1, "<Term/>", true);
/// let info = store.last_versions(1).unwrap();
/// assert_eq!(info.last_publishable, Some(1));
/// ```
pub struct InMemoryStore {
    session: String,
    documents: RwLock<BTreeMap<u64, DocumentRecord>>,
    validator: Option<Validator>,
    journal: RwLock<Vec<PersistRequest>>,
    unlocks: RwLock<Vec<u64>>,
}

impl fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("session", &self.session)
            .field("documents", &self.documents.read().len())
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl InMemoryStore {
    /// Creates an empty store whose checkouts are owned by `session`.
    pub fn new(session: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            documents: RwLock::new(BTreeMap::new()),
            validator: None,
            journal: RwLock::new(Vec::new()),
            unlocks: RwLock::new(Vec::new()),
        }
    }

    /// Creates a store pre-populated with records.
    pub fn from_records(session: impl Into<String>, records: Vec<DocumentRecord>) -> Self {
        let store = Self::new(session);
        {
            let mut documents = store.documents.write();
            for record in records {
                documents.insert(record.id, record);
            }
        }
        store
    }

    /// Sets the validation rule. Without one, all content is valid.
    #[must_use]
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&str, &str) -> Vec<String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Returns the session name that owns this client's checkouts.
    pub fn session(&self) -> &str {
        &self.session
    }

    /// Inserts a complete record, replacing any existing one.
    pub fn insert_record(&self, record: DocumentRecord) {
        self.documents.write().insert(record.id, record);
    }

    /// Inserts an unversioned document, replacing any existing record.
    pub fn insert_document(&self, id: u64, doc_type: &str, content: &str) {
        self.documents
            .write()
            .insert(id, DocumentRecord::new(id, doc_type, content));
    }

    /// Appends a version with the given content and makes it the working copy.
    ///
    /// Returns the new version number, or `None` if the document is unknown.
    pub fn add_version(&self, id: u64, content: &str, publishable: bool) -> Option<u32> {
        let mut documents = self.documents.write();
        let record = documents.get_mut(&id)?;
        let number = record.last_version().map_or(1, |v| v.number + 1);
        let val_status = if publishable {
            ValStatus::Valid
        } else {
            record.val_status
        };
        record.versions.push(StoredVersion {
            number,
            content: content.to_string(),
            publishable,
            val_status,
        });
        record.content = content.to_string();
        record.val_status = val_status;
        record.cwd_differs = false;
        Some(number)
    }

    /// Replaces the working copy without creating a version.
    pub fn set_working_copy(&self, id: u64, content: &str) {
        if let Some(record) = self.documents.write().get_mut(&id) {
            record.cwd_differs = record
                .last_version()
                .map_or(true, |v| v.content != content);
            record.content = content.to_string();
        }
    }

    /// Sets the validation status of the working copy.
    pub fn set_val_status(&self, id: u64, status: ValStatus) {
        if let Some(record) = self.documents.write().get_mut(&id) {
            record.val_status = status;
        }
    }

    /// Sets the active status of a document.
    pub fn set_active_status(&self, id: u64, status: ActiveStatus) {
        if let Some(record) = self.documents.write().get_mut(&id) {
            record.active_status = status;
        }
    }

    /// Marks a document as checked out by another session.
    pub fn lock_by(&self, id: u64, session: &str) {
        if let Some(record) = self.documents.write().get_mut(&id) {
            record.locked_by = Some(session.to_string());
        }
    }

    /// Returns a copy of one record.
    pub fn record(&self, id: u64) -> Option<DocumentRecord> {
        self.documents.read().get(&id).cloned()
    }

    /// Returns copies of all records, ordered by id.
    pub fn records(&self) -> Vec<DocumentRecord> {
        self.documents.read().values().cloned().collect()
    }

    /// Returns every persist request accepted so far, in order.
    pub fn persisted(&self) -> Vec<PersistRequest> {
        self.journal.read().clone()
    }

    /// Returns the persist requests accepted for one document, in order.
    pub fn persisted_for(&self, id: u64) -> Vec<PersistRequest> {
        self.journal
            .read()
            .iter()
            .filter(|r| r.id == id)
            .cloned()
            .collect()
    }

    /// Returns the ids passed to successful `unlock` calls, in order.
    pub fn unlocked(&self) -> Vec<u64> {
        self.unlocks.read().clone()
    }

    fn check(&self, doc_type: &str, content: &str) -> Vec<String> {
        self.validator
            .as_ref()
            .map_or_else(Vec::new, |validate| validate(doc_type, content))
    }
}

impl DocumentStore for InMemoryStore {
    fn checkout(&self, id: u64, lock: bool) -> StoreResult<StoredDocument> {
        let mut documents = self.documents.write();
        let record = documents
            .get_mut(&id)
            .ok_or(StoreError::DocumentNotFound { id })?;
        if lock {
            record.check_not_held_by_other(&self.session)?;
            record.locked_by = Some(self.session.clone());
        }
        Ok(record.working_copy())
    }

    fn fetch_version(&self, id: u64, version: u32, lock: bool) -> StoreResult<StoredDocument> {
        let documents = self.documents.read();
        let record = documents
            .get(&id)
            .ok_or(StoreError::DocumentNotFound { id })?;
        if lock {
            record.check_not_held_by_other(&self.session)?;
        }
        let stored = record
            .version(version)
            .ok_or(StoreError::VersionNotFound { id, version })?;
        Ok(record.numbered(stored))
    }

    fn validate_pair(
        &self,
        doc_type: &str,
        old: &str,
        new: &str,
    ) -> StoreResult<ValidationOutcome> {
        // Content that was already invalid cannot regress.
        if !self.check(doc_type, old).is_empty() {
            return Ok(ValidationOutcome::NotApplicable);
        }
        let errors = self.check(doc_type, new);
        if errors.is_empty() {
            Ok(ValidationOutcome::StillValid)
        } else {
            Ok(ValidationOutcome::NowInvalid(errors))
        }
    }

    fn persist(&self, request: &PersistRequest) -> StoreResult<PersistReceipt> {
        let mut documents = self.documents.write();
        let record = documents
            .get_mut(&request.id)
            .ok_or(StoreError::DocumentNotFound { id: request.id })?;

        match &record.locked_by {
            Some(holder) if *holder == self.session => {}
            Some(holder) => {
                return Err(StoreError::locked(
                    request.id,
                    format!("checked out by {holder}"),
                ))
            }
            None => {
                return Err(StoreError::rejected(
                    request.id,
                    format!("not checked out by session {}", self.session),
                ))
            }
        }

        let mut warnings = Vec::new();
        let val_status = if request.validate {
            let errors = self.check(&record.doc_type, &request.content);
            if errors.is_empty() {
                ValStatus::Valid
            } else {
                warnings.extend(errors);
                ValStatus::Invalid
            }
        } else {
            ValStatus::Unvalidated
        };

        let mut receipt_version = None;
        if request.create_version {
            let mut publishable = request.publishable;
            if publishable && val_status == ValStatus::Invalid {
                publishable = false;
                warnings.push("invalid document stored as non-publishable version".to_string());
            }
            let number = record.last_version().map_or(1, |v| v.number + 1);
            record.versions.push(StoredVersion {
                number,
                content: request.content.clone(),
                publishable,
                val_status,
            });
            record.cwd_differs = false;
            receipt_version = Some(number);
        } else {
            record.cwd_differs = record
                .last_version()
                .map_or(true, |v| v.content != request.content);
        }

        record.content = request.content.clone();
        if request.validate {
            record.val_status = val_status;
        }
        if let Some(status) = request.active_status {
            record.active_status = status;
        }
        self.journal.write().push(request.clone());

        Ok(PersistReceipt {
            version: receipt_version,
            warnings,
        })
    }

    fn unlock(&self, id: u64) -> StoreResult<()> {
        let mut documents = self.documents.write();
        let record = documents
            .get_mut(&id)
            .ok_or(StoreError::DocumentNotFound { id })?;
        record.check_not_held_by_other(&self.session)?;
        record.locked_by = None;
        self.unlocks.write().push(id);
        Ok(())
    }

    fn last_versions(&self, id: u64) -> StoreResult<VersionInfo> {
        self.documents
            .read()
            .get(&id)
            .map(DocumentRecord::version_info)
            .ok_or(StoreError::DocumentNotFound { id })
    }

    fn ever_validated(&self, id: u64) -> StoreResult<bool> {
        let documents = self.documents.read();
        let record = documents
            .get(&id)
            .ok_or(StoreError::DocumentNotFound { id })?;
        Ok(record.val_status.was_validated()
            || record.versions.iter().any(|v| v.val_status.was_validated()))
    }

    fn active_status(&self, id: u64) -> StoreResult<ActiveStatus> {
        self.documents
            .read()
            .get(&id)
            .map(|r| r.active_status)
            .ok_or(StoreError::DocumentNotFound { id })
    }

    fn lock_holder(&self, id: u64) -> StoreResult<Option<LockHolder>> {
        let documents = self.documents.read();
        let record = documents
            .get(&id)
            .ok_or(StoreError::DocumentNotFound { id })?;
        Ok(record.locked_by.as_ref().map(|session| LockHolder {
            session: session.clone(),
            doc_type: record.doc_type.clone(),
        }))
    }
}
