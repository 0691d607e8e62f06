//! Instrumented transforms and selectors.

use docmod_core::{DocumentId, DocumentSelector, JobError, JobResult, Slot, Snapshot, Transform};
use parking_lot::Mutex;

/// Replaces every occurrence of one string with another.
#[derive(Debug, Clone)]
pub struct Replace {
    from: String,
    to: String,
}

impl Replace {
    /// Creates the transform.
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl Transform for Replace {
    fn apply(&self, snapshot: &Snapshot) -> JobResult<String> {
        Ok(snapshot.content.replace(&self.from, &self.to))
    }
}

/// Leaves content unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transform for Identity {
    fn apply(&self, snapshot: &Snapshot) -> JobResult<String> {
        Ok(snapshot.content.clone())
    }
}

/// Records every call before delegating to an inner transform.
#[derive(Debug, Default)]
pub struct CountingTransform<T> {
    inner: T,
    calls: Mutex<Vec<(DocumentId, Slot)>>,
}

impl<T: Transform> CountingTransform<T> {
    /// Wraps a transform.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Returns every call so far, in order.
    pub fn calls(&self) -> Vec<(DocumentId, Slot)> {
        self.calls.lock().clone()
    }

    /// Returns the total number of calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns the slots transformed for one document, in order.
    pub fn calls_for(&self, id: DocumentId) -> Vec<Slot> {
        self.calls
            .lock()
            .iter()
            .filter(|(doc, _)| *doc == id)
            .map(|(_, slot)| *slot)
            .collect()
    }
}

impl<T: Transform> Transform for CountingTransform<T> {
    fn apply(&self, snapshot: &Snapshot) -> JobResult<String> {
        self.calls.lock().push((snapshot.id, snapshot.slot));
        self.inner.apply(snapshot)
    }
}

/// Fails for chosen documents and delegates for the rest.
#[derive(Debug)]
pub struct FailingTransform<T> {
    inner: T,
    failing: Vec<DocumentId>,
}

impl<T: Transform> FailingTransform<T> {
    /// Fails every document in `failing`.
    pub fn new(inner: T, failing: &[u64]) -> Self {
        Self {
            inner,
            failing: failing.iter().copied().map(DocumentId::new).collect(),
        }
    }
}

impl<T: Transform> Transform for FailingTransform<T> {
    fn apply(&self, snapshot: &Snapshot) -> JobResult<String> {
        if self.failing.contains(&snapshot.id) {
            return Err(JobError::transform(snapshot.id, "unparseable content"));
        }
        self.inner.apply(snapshot)
    }
}

/// A selector whose source is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSelector;

impl DocumentSelector for FailingSelector {
    fn doc_ids(&self) -> JobResult<Vec<DocumentId>> {
        Err(JobError::selection("selection query failed"))
    }
}

/// Turns raw ids into a selection.
pub fn ids(values: &[u64]) -> Vec<DocumentId> {
    values.iter().copied().map(DocumentId::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmod_store::ValStatus;

    fn snapshot(id: u64, slot: Slot, content: &str) -> Snapshot {
        Snapshot {
            id: DocumentId::new(id),
            slot,
            content: content.to_string(),
            doc_type: "Summary".to_string(),
            version: None,
            publishable: false,
            val_status: ValStatus::Unvalidated,
        }
    }

    #[test]
    fn counting_records_slots() {
        let transform = CountingTransform::new(Replace::new("a", "b"));
        let out = transform
            .apply(&snapshot(1, Slot::CurrentWorkingDocument, "aa"))
            .unwrap();
        transform
            .apply(&snapshot(2, Slot::LastVersion, "x"))
            .unwrap();

        assert_eq!(out, "bb");
        assert_eq!(transform.call_count(), 2);
        assert_eq!(
            transform.calls_for(DocumentId::new(2)),
            vec![Slot::LastVersion]
        );
    }

    #[test]
    fn failing_only_for_listed_ids() {
        let transform = FailingTransform::new(Identity, &[3]);
        assert!(transform
            .apply(&snapshot(1, Slot::CurrentWorkingDocument, "x"))
            .is_ok());
        assert!(matches!(
            transform.apply(&snapshot(3, Slot::CurrentWorkingDocument, "x")),
            Err(JobError::Transform { .. })
        ));
    }

    #[test]
    fn failing_selector() {
        assert!(matches!(
            FailingSelector.doc_ids(),
            Err(JobError::Selection(_))
        ));
    }
}
