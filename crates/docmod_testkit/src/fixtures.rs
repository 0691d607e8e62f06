//! Document and store fixtures.
//!
//! Provides builders for documents with a given version history and
//! helpers for the store setups most tests start from.

use docmod_store::{
    ActiveStatus, DocumentRecord, FileStore, InMemoryStore, StoredVersion, ValStatus,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Session name used by fixture stores.
pub const SESSION: &str = "docmod-test";

/// Document type used unless a builder sets another.
pub const DOC_TYPE: &str = "Summary";

/// Builds a [`DocumentRecord`] from a version history.
///
/// Versions are numbered from 1 in the order added. Without an explicit
/// working copy, the working copy is the last version's content.
#[derive(Debug, Clone)]
pub struct DocBuilder {
    id: u64,
    doc_type: String,
    versions: Vec<(String, bool)>,
    working_copy: Option<String>,
    val_status: Option<ValStatus>,
    active_status: ActiveStatus,
    locked_by: Option<String>,
}

impl DocBuilder {
    /// Starts a document with no versions and an empty working copy.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            doc_type: DOC_TYPE.to_string(),
            versions: Vec::new(),
            working_copy: None,
            val_status: None,
            active_status: ActiveStatus::Active,
            locked_by: None,
        }
    }

    /// Sets the document type.
    #[must_use]
    pub fn doc_type(mut self, doc_type: &str) -> Self {
        self.doc_type = doc_type.to_string();
        self
    }

    /// Appends a version.
    #[must_use]
    pub fn version(mut self, content: &str, publishable: bool) -> Self {
        self.versions.push((content.to_string(), publishable));
        self
    }

    /// Sets a working copy that may differ from the last version.
    #[must_use]
    pub fn working_copy(mut self, content: &str) -> Self {
        self.working_copy = Some(content.to_string());
        self
    }

    /// Overrides the validation status of the working copy.
    #[must_use]
    pub fn val_status(mut self, status: ValStatus) -> Self {
        self.val_status = Some(status);
        self
    }

    /// Sets the active status.
    #[must_use]
    pub fn active_status(mut self, status: ActiveStatus) -> Self {
        self.active_status = status;
        self
    }

    /// Marks the document as checked out by another session.
    #[must_use]
    pub fn locked_by(mut self, session: &str) -> Self {
        self.locked_by = Some(session.to_string());
        self
    }

    /// Builds the record.
    ///
    /// Publishable versions are recorded as valid, others as never
    /// validated. The working copy inherits the last version's status when it
    /// matches it.
    pub fn build(self) -> DocumentRecord {
        let versions: Vec<StoredVersion> = self
            .versions
            .into_iter()
            .zip(1..)
            .map(|((content, publishable), number)| StoredVersion {
                number,
                content,
                publishable,
                val_status: if publishable {
                    ValStatus::Valid
                } else {
                    ValStatus::Unvalidated
                },
            })
            .collect();

        let last = versions.last();
        let content = self
            .working_copy
            .or_else(|| last.map(|v| v.content.clone()))
            .unwrap_or_default();
        let cwd_differs = last.is_some_and(|v| v.content != content);
        let val_status = self.val_status.unwrap_or(match last {
            Some(v) if !cwd_differs => v.val_status,
            _ => ValStatus::Unvalidated,
        });

        DocumentRecord {
            id: self.id,
            doc_type: self.doc_type,
            content,
            val_status,
            active_status: self.active_status,
            versions,
            cwd_differs,
            locked_by: self.locked_by,
        }
    }
}

/// A document whose history has moved on past its last publishable version,
/// with unversioned edits on top.
///
/// Versions 1 to 5, only version 3 publishable; the working copy differs
/// from version 5. Every slot holds distinct content containing `old`.
pub fn diverged_document(id: u64) -> DocumentRecord {
    DocBuilder::new(id)
        .version("<Summary>draft one</Summary>", false)
        .version("<Summary>draft two</Summary>", false)
        .version("<Summary>old published</Summary>", true)
        .version("<Summary>draft four</Summary>", false)
        .version("<Summary>old draft</Summary>", false)
        .working_copy("<Summary>old edits</Summary>")
        .build()
}

/// A document whose working copy, last version and last publishable version
/// are all version 3.
pub fn settled_document(id: u64) -> DocumentRecord {
    DocBuilder::new(id)
        .version("<Summary>one</Summary>", true)
        .version("<Summary>two</Summary>", false)
        .version("<Summary>three</Summary>", true)
        .build()
}

/// Creates an in-memory store owned by [`SESSION`].
pub fn memory_store(records: Vec<DocumentRecord>) -> InMemoryStore {
    InMemoryStore::from_records(SESSION, records)
}

/// Creates an in-memory store of `count` identical published documents,
/// ids starting at 1.
pub fn published_store(count: u64, content: &str) -> InMemoryStore {
    memory_store(
        (1..=count)
            .map(|id| DocBuilder::new(id).version(content, true).build())
            .collect(),
    )
}

/// Validation rule: content is valid only if it contains `marker`.
pub fn require_marker(
    marker: &'static str,
) -> impl Fn(&str, &str) -> Vec<String> + Send + Sync + 'static {
    move |_doc_type: &str, content: &str| {
        if content.contains(marker) {
            Vec::new()
        } else {
            vec![format!("missing {marker}")]
        }
    }
}

/// A file store in a temporary directory with automatic cleanup.
pub struct TempFileStore {
    dir: TempDir,
    path: PathBuf,
}

impl TempFileStore {
    /// Creates a store file holding `records`.
    pub fn with_records(records: Vec<DocumentRecord>) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("documents.json");
        let store = FileStore::open(&path, SESSION, true).expect("Failed to create store");
        for record in records {
            store.insert_record(record).expect("Failed to insert record");
        }
        Self { dir, path }
    }

    /// Returns the store file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the temporary directory, for test output.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Opens the store file as [`SESSION`].
    pub fn open(&self) -> FileStore {
        FileStore::open(&self.path, SESSION, false).expect("Failed to open store")
    }
}
