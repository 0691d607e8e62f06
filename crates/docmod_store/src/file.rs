//! JSON file document store.
//!
//! The whole repository is one JSON file. A sidecar `<file>.lock` is held
//! with an exclusive `fs2` lock for the lifetime of the store, so only one
//! process mutates a given file at a time. Every mutation rewrites the file
//! with write-then-rename.

use crate::client::{
    ActiveStatus, DocumentStore, LockHolder, PersistReceipt, PersistRequest, StoredDocument,
    ValidationOutcome, VersionInfo,
};
use crate::error::{StoreError, StoreResult};
use crate::memory::{DocumentRecord, InMemoryStore};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Current on-disk format version.
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    format_version: u32,
    documents: Vec<DocumentRecord>,
}

/// A document store backed by a single JSON file.
///
/// # Example
///
/// ```rust,ignore
/// let store = FileStore::open(Path::new("docs.json"), "batch", true)?;
/// let info = store.last_versions(42)?;
/// ```
pub struct FileStore {
    path: PathBuf,
    inner: InMemoryStore,
    /// Held for the lifetime of the store; dropping it releases the lock.
    _lock_file: File,
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("inner", &self.inner)
            .finish()
    }
}

impl FileStore {
    /// Opens (or creates) a store file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `StoreBusy`)
    /// - The file is not a valid store file
    pub fn open(
        path: &Path,
        session: impl Into<String>,
        create_if_missing: bool,
    ) -> StoreResult<Self> {
        if !path.exists() && !create_if_missing {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("store file does not exist: {}", path.display()),
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path(path))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::StoreBusy);
        }

        let records = if path.exists() {
            let data = fs::read(path)?;
            if data.is_empty() {
                Vec::new()
            } else {
                let file: StoreFile = serde_json::from_slice(&data)?;
                file.documents
            }
        } else {
            Vec::new()
        };

        let store = Self {
            path: path.to_path_buf(),
            inner: InMemoryStore::from_records(session, records),
            _lock_file: lock_file,
        };
        if !path.exists() {
            store.save()?;
        }
        Ok(store)
    }

    /// Sets the validation rule used by this store.
    #[must_use]
    pub fn with_validator<F>(self, validator: F) -> Self
    where
        F: Fn(&str, &str) -> Vec<String> + Send + Sync + 'static,
    {
        let Self {
            path,
            inner,
            _lock_file,
        } = self;
        Self {
            path,
            inner: inner.with_validator(validator),
            _lock_file,
        }
    }

    /// Returns the store file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the underlying in-memory view.
    pub fn memory(&self) -> &InMemoryStore {
        &self.inner
    }

    /// Returns copies of all records, ordered by id.
    pub fn records(&self) -> Vec<DocumentRecord> {
        self.inner.records()
    }

    /// Inserts an unversioned document and saves the file.
    pub fn insert_document(&self, id: u64, doc_type: &str, content: &str) -> StoreResult<()> {
        self.inner.insert_document(id, doc_type, content);
        self.save()
    }

    /// Inserts a complete record and saves the file.
    pub fn insert_record(&self, record: DocumentRecord) -> StoreResult<()> {
        self.inner.insert_record(record);
        self.save()
    }

    /// Writes the current contents to disk atomically.
    pub fn save(&self) -> StoreResult<()> {
        let file = StoreFile {
            format_version: FORMAT_VERSION,
            documents: self.inner.records(),
        };
        let data = serde_json::to_vec_pretty(&file)?;

        let temp_path = self.path.with_extension("json.tmp");
        let mut temp = File::create(&temp_path)?;
        temp.write_all(&data)?;
        temp.sync_all()?;
        drop(temp);

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

impl DocumentStore for FileStore {
    fn checkout(&self, id: u64, lock: bool) -> StoreResult<StoredDocument> {
        let doc = self.inner.checkout(id, lock)?;
        if lock {
            self.save()?;
        }
        Ok(doc)
    }

    fn fetch_version(&self, id: u64, version: u32, lock: bool) -> StoreResult<StoredDocument> {
        self.inner.fetch_version(id, version, lock)
    }

    fn validate_pair(
        &self,
        doc_type: &str,
        old: &str,
        new: &str,
    ) -> StoreResult<ValidationOutcome> {
        self.inner.validate_pair(doc_type, old, new)
    }

    fn persist(&self, request: &PersistRequest) -> StoreResult<PersistReceipt> {
        let receipt = self.inner.persist(request)?;
        self.save()?;
        Ok(receipt)
    }

    fn unlock(&self, id: u64) -> StoreResult<()> {
        self.inner.unlock(id)?;
        self.save()
    }

    fn last_versions(&self, id: u64) -> StoreResult<VersionInfo> {
        self.inner.last_versions(id)
    }

    fn ever_validated(&self, id: u64) -> StoreResult<bool> {
        self.inner.ever_validated(id)
    }

    fn active_status(&self, id: u64) -> StoreResult<ActiveStatus> {
        self.inner.active_status(id)
    }

    fn lock_holder(&self, id: u64) -> StoreResult<Option<LockHolder>> {
        self.inner.lock_holder(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docs.json");

        let store = FileStore::open(&path, "job", true).unwrap();
        assert!(path.exists());
        assert!(store.records().is_empty());
    }

    #[test]
    fn open_fails_if_missing_and_no_create() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");

        assert!(matches!(
            FileStore::open(&path, "job", false),
            Err(StoreError::Io(_))
        ));
    }

    #[test]
    fn second_open_is_busy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docs.json");

        let _first = FileStore::open(&path, "job", true).unwrap();
        assert!(matches!(
            FileStore::open(&path, "job", true),
            Err(StoreError::StoreBusy)
        ));
    }

    #[test]
    fn mutations_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docs.json");

        {
            let store = FileStore::open(&path, "job", true).unwrap();
            store.insert_document(3, "Term", "<Term/>").unwrap();
            store.checkout(3, true).unwrap();
            let request = PersistRequest::new(3, "<Term>x</Term>")
                .with_version(true)
                .with_publishable(true);
            assert_eq!(store.persist(&request).unwrap().version, Some(1));
            store.unlock(3).unwrap();
        }

        let store = FileStore::open(&path, "job", false).unwrap();
        let record = store.memory().record(3).unwrap();
        assert_eq!(record.content, "<Term>x</Term>");
        assert_eq!(record.versions.len(), 1);
        assert!(record.locked_by.is_none());
        assert_eq!(store.last_versions(3).unwrap().last_publishable, Some(1));
    }

    #[test]
    fn checkout_lock_is_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docs.json");

        {
            let store = FileStore::open(&path, "alice", true).unwrap();
            store.insert_document(1, "Term", "a").unwrap();
            store.checkout(1, true).unwrap();
        }

        let store = FileStore::open(&path, "bob", false).unwrap();
        assert!(store.checkout(1, true).unwrap_err().is_lock_conflict());
        assert_eq!(
            store.lock_holder(1).unwrap().map(|h| h.session),
            Some("alice".to_string())
        );
    }
}
