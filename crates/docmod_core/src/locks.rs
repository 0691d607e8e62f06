//! Lock pre-flight: find selected documents that are already checked out.

use crate::error::JobResult;
use crate::types::DocumentId;
use docmod_store::DocumentStore;
use serde::Serialize;
use tracing::{info, warn};

/// A document found checked out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockedDocument {
    /// Document identifier.
    pub id: DocumentId,
    /// Session holding the checkout.
    pub session: String,
    /// Document type.
    pub doc_type: String,
}

/// Result of a lock pre-flight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LockReport {
    /// Number of documents checked.
    pub total: usize,
    /// Documents currently checked out.
    pub locked: Vec<LockedDocument>,
}

impl LockReport {
    /// Number of documents free to modify.
    pub fn unlocked(&self) -> usize {
        self.total - self.locked.len()
    }

    /// Returns true if nothing is checked out.
    pub fn is_clear(&self) -> bool {
        self.locked.is_empty()
    }
}

/// Checks every id for an existing checkout, by any session.
pub fn check_locks<S: DocumentStore + ?Sized>(
    store: &S,
    ids: &[DocumentId],
) -> JobResult<LockReport> {
    let mut report = LockReport {
        total: ids.len(),
        locked: Vec::new(),
    };
    for id in ids {
        if let Some(holder) = store.lock_holder(id.as_u64())? {
            warn!(doc = %id, doc_type = %holder.doc_type, by = %holder.session, "locked");
            report.locked.push(LockedDocument {
                id: *id,
                session: holder.session,
                doc_type: holder.doc_type,
            });
        }
    }
    info!(
        total = report.total,
        locked = report.locked.len(),
        unlocked = report.unlocked(),
        "checkout summary"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmod_store::InMemoryStore;

    #[test]
    fn counts_locked_documents() {
        let store = InMemoryStore::new("job");
        for id in 1..=4 {
            store.insert_document(id, "Summary", "x");
        }
        store.lock_by(2, "alice");
        store.lock_by(4, "bob");

        let ids: Vec<DocumentId> = (1..=4).map(DocumentId::new).collect();
        let report = check_locks(&store, &ids).unwrap();

        assert_eq!(report.total, 4);
        assert_eq!(report.unlocked(), 2);
        assert_eq!(report.locked[0].id, DocumentId::new(2));
        assert_eq!(report.locked[1].session, "bob");
        assert!(!report.is_clear());
    }

    #[test]
    fn empty_selection_is_clear() {
        let store = InMemoryStore::new("job");
        let report = check_locks(&store, &[]).unwrap();
        assert!(report.is_clear());
        assert_eq!(report.total, 0);
    }

    #[test]
    fn unknown_document_is_an_error() {
        let store = InMemoryStore::new("job");
        assert!(check_locks(&store, &[DocumentId::new(1)]).is_err());
    }
}
