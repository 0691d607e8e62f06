//! Document store trait definition and boundary types.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Validation status recorded by the store for a stored document or version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValStatus {
    /// Never validated.
    #[default]
    #[serde(rename = "U")]
    Unvalidated,
    /// Validated without errors.
    #[serde(rename = "V")]
    Valid,
    /// Validated with errors.
    #[serde(rename = "I")]
    Invalid,
}

impl ValStatus {
    /// Returns true if validation has been run at least once.
    pub fn was_validated(self) -> bool {
        !matches!(self, ValStatus::Unvalidated)
    }
}

/// Active status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ActiveStatus {
    /// Document is active.
    #[default]
    #[serde(rename = "A")]
    Active,
    /// Document is blocked.
    #[serde(rename = "I")]
    Inactive,
    /// Document is marked deleted.
    #[serde(rename = "D")]
    Deleted,
}

impl ActiveStatus {
    /// Returns the single-letter wire code.
    pub fn code(self) -> char {
        match self {
            ActiveStatus::Active => 'A',
            ActiveStatus::Inactive => 'I',
            ActiveStatus::Deleted => 'D',
        }
    }
}

impl fmt::Display for ActiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for ActiveStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(ActiveStatus::Active),
            "I" | "i" => Ok(ActiveStatus::Inactive),
            "D" | "d" => Ok(ActiveStatus::Deleted),
            other => Err(StoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// A document or document version as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Document identifier.
    pub id: u64,
    /// Document type name, used for validation.
    pub doc_type: String,
    /// Serialized document content.
    pub content: String,
    /// Version number, `None` for the current working document.
    pub version: Option<u32>,
    /// Whether this version is publishable.
    pub publishable: bool,
    /// Validation status recorded for this content.
    pub val_status: ValStatus,
}

/// Version history summary for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Number of the most recent version, if any.
    pub last_version: Option<u32>,
    /// Number of the most recent publishable version, if any.
    pub last_publishable: Option<u32>,
    /// True if the current working document differs from the last version.
    pub cwd_differs: bool,
}

impl VersionInfo {
    /// Returns true if the current working document would be lost by an
    /// overwrite: it has changed since the last version, or it was never
    /// versioned at all.
    pub fn cwd_needs_preserving(&self) -> bool {
        self.cwd_differs || self.last_version.is_none()
    }
}

/// Outcome of comparing the validity of original and transformed content.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValidationOutcome {
    /// The original was never validated (or validation is off), so no
    /// comparison was made.
    #[default]
    NotApplicable,
    /// The transformed content is still valid.
    StillValid,
    /// The transform made previously valid content invalid.
    NowInvalid(Vec<String>),
}

impl ValidationOutcome {
    /// Returns true if the transform introduced validation errors.
    pub fn is_regression(&self) -> bool {
        matches!(self, ValidationOutcome::NowInvalid(_))
    }

    /// Returns the new validation messages, if any.
    pub fn messages(&self) -> &[String] {
        match self {
            ValidationOutcome::NowInvalid(messages) => messages,
            _ => &[],
        }
    }
}

/// A request to save document content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistRequest {
    /// Document identifier.
    pub id: u64,
    /// Content to store.
    pub content: String,
    /// Create a new numbered version as well as replacing the working copy.
    pub create_version: bool,
    /// Mark the new version publishable.
    pub publishable: bool,
    /// Run validation on the stored content.
    pub validate: bool,
    /// Reason text recorded with the save.
    pub reason: String,
    /// Active status to force on the document, if any.
    pub active_status: Option<ActiveStatus>,
}

impl PersistRequest {
    /// Creates a request that replaces the working copy only.
    pub fn new(id: u64, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            create_version: false,
            publishable: false,
            validate: false,
            reason: String::new(),
            active_status: None,
        }
    }

    /// Sets whether a new version is created.
    #[must_use]
    pub fn with_version(mut self, value: bool) -> Self {
        self.create_version = value;
        self
    }

    /// Sets whether the new version is publishable.
    #[must_use]
    pub fn with_publishable(mut self, value: bool) -> Self {
        self.publishable = value;
        self
    }

    /// Sets whether the store validates the content.
    #[must_use]
    pub fn with_validation(mut self, value: bool) -> Self {
        self.validate = value;
        self
    }

    /// Sets the reason text.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Sets the forced active status.
    #[must_use]
    pub fn with_active_status(mut self, status: Option<ActiveStatus>) -> Self {
        self.active_status = status;
        self
    }
}

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersistReceipt {
    /// Number of the version created, if one was.
    pub version: Option<u32>,
    /// Non-fatal warnings raised while saving.
    pub warnings: Vec<String>,
}

/// The session currently holding a document checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
    /// Session name of the holder.
    pub session: String,
    /// Document type of the locked document.
    pub doc_type: String,
}

/// Client access to a versioned document repository.
///
/// Implementations are used by one job session at a time; the session name is
/// fixed when the store client is constructed and identifies the owner of any
/// checkout it takes.
///
/// # Invariants
///
/// - `checkout` with `lock = true` fails with [`StoreError::Locked`] if any
///   other session holds the document
/// - `persist` requires the caller's session to hold the checkout
/// - A persist with `create_version` also replaces the working copy, so the
///   working copy matches the new version afterwards
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For a JSON repository on disk
pub trait DocumentStore: Send + Sync {
    /// Returns the current working document, checking it out when `lock` is
    /// true.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`] if another session holds the document.
    fn checkout(&self, id: u64, lock: bool) -> StoreResult<StoredDocument>;

    /// Returns a numbered version of the document.
    fn fetch_version(&self, id: u64, version: u32, lock: bool) -> StoreResult<StoredDocument>;

    /// Compares the validity of `old` and `new` content of the given type.
    fn validate_pair(&self, doc_type: &str, old: &str, new: &str)
        -> StoreResult<ValidationOutcome>;

    /// Saves content for a checked-out document.
    fn persist(&self, request: &PersistRequest) -> StoreResult<PersistReceipt>;

    /// Releases this session's checkout of the document.
    fn unlock(&self, id: u64) -> StoreResult<()>;

    /// Returns the version history summary for the document.
    fn last_versions(&self, id: u64) -> StoreResult<VersionInfo>;

    /// Returns true if the document or any of its versions was ever validated.
    fn ever_validated(&self, id: u64) -> StoreResult<bool>;

    /// Returns the active status of the document.
    fn active_status(&self, id: u64) -> StoreResult<ActiveStatus>;

    /// Returns the current checkout holder, if the document is checked out.
    fn lock_holder(&self, id: u64) -> StoreResult<Option<LockHolder>>;
}
