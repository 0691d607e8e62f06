//! Store wrappers that inject failures.

use docmod_store::{
    ActiveStatus, DocumentStore, LockHolder, PersistReceipt, PersistRequest, StoreError,
    StoreResult, StoredDocument, ValidationOutcome, VersionInfo,
};
use parking_lot::Mutex;

/// Delegates to an inner store but rejects one chosen `persist` call.
///
/// Calls are counted from 1 across the whole run.
#[derive(Debug)]
pub struct FailingStore<S> {
    inner: S,
    fail_on: usize,
    persists: Mutex<usize>,
}

impl<S: DocumentStore> FailingStore<S> {
    /// Rejects the `fail_on`-th persist.
    pub fn new(inner: S, fail_on: usize) -> Self {
        Self {
            inner,
            fail_on,
            persists: Mutex::new(0),
        }
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns the number of persist calls seen, the rejected one included.
    pub fn persist_calls(&self) -> usize {
        *self.persists.lock()
    }
}

impl<S: DocumentStore> DocumentStore for FailingStore<S> {
    fn checkout(&self, id: u64, lock: bool) -> StoreResult<StoredDocument> {
        self.inner.checkout(id, lock)
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
        let call = {
            let mut persists = self.persists.lock();
            *persists += 1;
            *persists
        };
        if call == self.fail_on {
            return Err(StoreError::rejected(request.id, "disk quota exceeded"));
        }
        self.inner.persist(request)
    }

    fn unlock(&self, id: u64) -> StoreResult<()> {
        self.inner.unlock(id)
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
