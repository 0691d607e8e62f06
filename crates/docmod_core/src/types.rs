//! Core types for the reconciliation engine.

use crate::error::{JobError, JobResult};
use docmod_store::{PersistRequest, StoredDocument, ValStatus, ValidationOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix of the normalized document id form.
const ID_PREFIX: &str = "DOC";

/// Stable document identifier.
///
/// Displayed as `DOC` followed by ten zero-padded digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(u64);

impl DocumentId {
    /// Creates a document id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for DocumentId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ID_PREFIX}{:010}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = JobError;

    /// Parses either a bare integer or the normalized `DOC0000000042` form.
    fn from_str(s: &str) -> JobResult<Self> {
        let trimmed = s.trim();
        let digits = match trimmed.get(..ID_PREFIX.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(ID_PREFIX) => &trimmed[ID_PREFIX.len()..],
            _ => trimmed,
        };
        digits
            .parse::<u64>()
            .map(Self)
            .map_err(|_| JobError::configuration(format!("invalid document id '{s}'")))
    }
}

/// One of the three document slots a job may transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Slot {
    /// The current working document.
    CurrentWorkingDocument,
    /// The most recent numbered version.
    LastVersion,
    /// The most recent publishable version.
    LastPublishableVersion,
}

impl Slot {
    /// All slots, in loading order.
    pub const ALL: [Slot; 3] = [
        Slot::CurrentWorkingDocument,
        Slot::LastVersion,
        Slot::LastPublishableVersion,
    ];

    /// Short label used in logs.
    pub fn label(self) -> &'static str {
        match self {
            Slot::CurrentWorkingDocument => "cwd",
            Slot::LastVersion => "lastv",
            Slot::LastPublishableVersion => "lastp",
        }
    }

    /// Label used in test-mode output file names.
    pub fn file_label(self) -> &'static str {
        match self {
            Slot::LastPublishableVersion => "pub",
            other => other.label(),
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Slot::CurrentWorkingDocument => 0,
            Slot::LastVersion => 1,
            Slot::LastPublishableVersion => 2,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Original content of one slot as loaded from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Document identifier.
    pub id: DocumentId,
    /// Slot this snapshot was loaded for.
    pub slot: Slot,
    /// Original, untransformed content.
    pub content: String,
    /// Document type name.
    pub doc_type: String,
    /// Version number, `None` for the working document.
    pub version: Option<u32>,
    /// Whether the version is publishable.
    pub publishable: bool,
    /// Validation status the store recorded for the original.
    pub val_status: ValStatus,
}

impl Snapshot {
    /// Builds a snapshot from a stored document.
    pub fn from_stored(slot: Slot, doc: StoredDocument) -> Self {
        Self {
            id: DocumentId::new(doc.id),
            slot,
            content: doc.content,
            doc_type: doc.doc_type,
            version: doc.version,
            publishable: doc.publishable,
            val_status: doc.val_status,
        }
    }
}

/// A snapshot together with its transformed content and validation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformedSnapshot {
    /// The original snapshot.
    pub snapshot: Snapshot,
    /// Transformed content.
    pub transformed: String,
    /// Validation outcome of the transform.
    pub outcome: ValidationOutcome,
}

impl TransformedSnapshot {
    /// Returns true if the transform changed the content.
    pub fn changed(&self) -> bool {
        self.transformed != self.snapshot.content
    }

    /// Returns the original content.
    pub fn original(&self) -> &str {
        &self.snapshot.content
    }
}

/// The kind of save issued for a document; also the histogram key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SaveKind {
    /// Preservation of the untransformed working copy.
    #[serde(rename = "old cwd")]
    PreserveCwd,
    /// New publishable version.
    #[serde(rename = "new pub")]
    NewPublishable,
    /// New non-publishable version.
    #[serde(rename = "new ver")]
    NewVersion,
    /// New working copy without a version.
    #[serde(rename = "new cwd")]
    NewCwd,
}

impl SaveKind {
    /// Returns the display label.
    pub fn label(self) -> &'static str {
        match self {
            SaveKind::PreserveCwd => "old cwd",
            SaveKind::NewPublishable => "new pub",
            SaveKind::NewVersion => "new ver",
            SaveKind::NewCwd => "new cwd",
        }
    }
}

impl fmt::Display for SaveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A write decided by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteRequest {
    /// What kind of save this is.
    pub kind: SaveKind,
    /// Slot whose content is being written.
    pub source: Slot,
    /// Slots whose changed flag is set once the write succeeds.
    pub covers: Vec<Slot>,
    /// The request handed to the store.
    pub request: PersistRequest,
}

/// Outcome record for one processed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disposition {
    /// Document identifier.
    pub id: DocumentId,
    /// The working copy was changed.
    pub cwd_changed: bool,
    /// The last version was changed.
    pub last_version_changed: bool,
    /// The last publishable version was changed.
    pub last_publishable_changed: bool,
    /// Error that stopped processing, if any.
    pub error_message: Option<String>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl Disposition {
    /// Creates an empty disposition for a document.
    pub fn new(id: DocumentId) -> Self {
        Self {
            id,
            cwd_changed: false,
            last_version_changed: false,
            last_publishable_changed: false,
            error_message: None,
            warnings: Vec::new(),
        }
    }

    /// Creates a disposition recording a failure.
    pub fn failed(id: DocumentId, message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::new(id)
        }
    }

    /// Sets the changed flag for a slot.
    pub fn mark(&mut self, slot: Slot) {
        match slot {
            Slot::CurrentWorkingDocument => self.cwd_changed = true,
            Slot::LastVersion => self.last_version_changed = true,
            Slot::LastPublishableVersion => self.last_publishable_changed = true,
        }
    }

    /// Returns the changed flag for a slot.
    pub fn changed(&self, slot: Slot) -> bool {
        match slot {
            Slot::CurrentWorkingDocument => self.cwd_changed,
            Slot::LastVersion => self.last_version_changed,
            Slot::LastPublishableVersion => self.last_publishable_changed,
        }
    }

    /// Returns true if any slot changed.
    pub fn any_changed(&self) -> bool {
        self.cwd_changed || self.last_version_changed || self.last_publishable_changed
    }

    /// Returns the number of changed slots.
    pub fn changed_count(&self) -> u64 {
        Slot::ALL.iter().filter(|slot| self.changed(**slot)).count() as u64
    }

    /// Returns true if processing failed.
    pub fn is_error(&self) -> bool {
        self.error_message.is_some()
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |changed: bool| if changed { 'Y' } else { 'N' };
        write!(
            f,
            "{} cwd={} lastv={} lastp={}",
            self.id,
            flag(self.cwd_changed),
            flag(self.last_version_changed),
            flag(self.last_publishable_changed)
        )?;
        if let Some(error) = &self.error_message {
            write!(f, " error={error:?}")?;
        }
        if !self.warnings.is_empty() {
            write!(f, " warnings={:?}", self.warnings)?;
        }
        Ok(())
    }
}
