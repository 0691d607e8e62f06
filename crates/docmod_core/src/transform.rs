//! Job collaborators: the transform and the document selector.

use crate::error::JobResult;
use crate::types::{DocumentId, Snapshot};

/// Produces new content for one snapshot.
///
/// Called at most once per distinct snapshot of a document. A failure aborts
/// processing of that document only.
pub trait Transform {
    /// Returns the transformed content.
    fn apply(&self, snapshot: &Snapshot) -> JobResult<String>;
}

impl<F> Transform for F
where
    F: Fn(&Snapshot) -> JobResult<String>,
{
    fn apply(&self, snapshot: &Snapshot) -> JobResult<String> {
        self(snapshot)
    }
}

/// Supplies the ordered list of documents a job processes.
pub trait DocumentSelector {
    /// Returns the ids to process, in order. May be empty.
    fn doc_ids(&self) -> JobResult<Vec<DocumentId>>;
}

impl DocumentSelector for Vec<DocumentId> {
    fn doc_ids(&self) -> JobResult<Vec<DocumentId>> {
        Ok(self.clone())
    }
}

impl DocumentSelector for [DocumentId] {
    fn doc_ids(&self) -> JobResult<Vec<DocumentId>> {
        Ok(self.to_vec())
    }
}
