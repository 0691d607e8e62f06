//! Version snapshot loader.
//!
//! Reads the version history, checks out the working document, and loads and
//! transforms each slot, aliasing slots whose content the store reports as
//! identical so each distinct snapshot is transformed once.

use crate::binding::SlotBinding;
use crate::config::JobConfig;
use crate::error::{JobError, JobResult};
use crate::transform::Transform;
use crate::types::{DocumentId, Slot, Snapshot, TransformedSnapshot};
use docmod_store::{DocumentStore, ValStatus, ValidationOutcome};
use tracing::{debug, warn};

/// An exclusive checkout taken by this run.
///
/// Released explicitly with [`Checkout::release`]. If dropped unreleased (a
/// failure path), the checkout is released on drop and any unlock error is
/// logged.
#[must_use = "a checkout must be released"]
pub struct Checkout<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    id: DocumentId,
    released: bool,
}

impl<'a, S: DocumentStore + ?Sized> Checkout<'a, S> {
    fn new(store: &'a S, id: DocumentId) -> Self {
        Self {
            store,
            id,
            released: false,
        }
    }

    /// Returns the checked-out document id.
    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// Releases the checkout.
    pub fn release(mut self) -> JobResult<()> {
        self.released = true;
        self.store.unlock(self.id.as_u64())?;
        Ok(())
    }
}

impl<S: DocumentStore + ?Sized> Drop for Checkout<'_, S> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match self.store.unlock(self.id.as_u64()) {
            Ok(()) => debug!(doc = %self.id, "released checkout after failure"),
            Err(err) => warn!(doc = %self.id, error = %err, "failed to release checkout"),
        }
    }
}

/// A loaded document and, in live mode, its checkout.
pub struct LoadedDocument<'a, S: DocumentStore + ?Sized> {
    /// Transformed slots.
    pub binding: SlotBinding,
    /// Checkout held by this run, `None` in test mode.
    pub checkout: Option<Checkout<'a, S>>,
}

/// Loads and transforms the slots of one document.
pub struct SnapshotLoader<'a, S: ?Sized, T: ?Sized> {
    store: &'a S,
    transform: &'a T,
    config: &'a JobConfig,
}

impl<'a, S, T> SnapshotLoader<'a, S, T>
where
    S: DocumentStore + ?Sized,
    T: Transform + ?Sized,
{
    /// Creates a loader.
    pub fn new(store: &'a S, transform: &'a T, config: &'a JobConfig) -> Self {
        Self {
            store,
            transform,
            config,
        }
    }

    /// Loads one document.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Locked`] if the checkout fails because another
    /// session holds the document. Any later failure releases the checkout
    /// before returning.
    pub fn load(&self, id: DocumentId) -> JobResult<LoadedDocument<'a, S>> {
        let raw = id.as_u64();
        let versions = self.store.last_versions(raw)?;
        let active_status = self.store.active_status(raw)?;

        let lock = self.config.mode.is_live();
        let doc = self
            .store
            .checkout(raw, lock)
            .map_err(|err| JobError::from_checkout(id, err))?;
        let checkout = lock.then(|| Checkout::new(self.store, id));

        let cwd = self.transform_snapshot(Snapshot::from_stored(Slot::CurrentWorkingDocument, doc))?;
        let mut binding = SlotBinding::new(id, versions, active_status, cwd);

        if self.config.include_older_versions {
            if let Some(number) = versions.last_version {
                if versions.cwd_differs {
                    let snapshot = self.fetch(id, Slot::LastVersion, number)?;
                    binding.bind_distinct(Slot::LastVersion, snapshot);
                } else {
                    binding.bind_alias(Slot::LastVersion, Slot::CurrentWorkingDocument);
                }
            }
            if let Some(number) = versions.last_publishable {
                if versions.last_version == Some(number) {
                    binding.bind_alias(Slot::LastPublishableVersion, Slot::LastVersion);
                } else {
                    let snapshot = self.fetch(id, Slot::LastPublishableVersion, number)?;
                    binding.bind_distinct(Slot::LastPublishableVersion, snapshot);
                }
            }
        }

        debug!(
            doc = %id,
            transforms = binding.distinct_count(),
            preserve = binding.pending_preservation(),
            "loaded document"
        );
        Ok(LoadedDocument { binding, checkout })
    }

    fn fetch(&self, id: DocumentId, slot: Slot, number: u32) -> JobResult<TransformedSnapshot> {
        let doc = self
            .store
            .fetch_version(id.as_u64(), number, self.config.mode.is_live())?;
        self.transform_snapshot(Snapshot::from_stored(slot, doc))
    }

    fn transform_snapshot(&self, snapshot: Snapshot) -> JobResult<TransformedSnapshot> {
        let transformed = self.transform.apply(&snapshot).map_err(|err| match err {
            JobError::Transform { .. } => err,
            other => JobError::transform(snapshot.id, other.to_string()),
        })?;
        let outcome = self.validate(&snapshot, &transformed)?;
        debug!(
            slot = %snapshot.slot,
            version = ?snapshot.version,
            changed = transformed != snapshot.content,
            regression = outcome.is_regression(),
            "transformed slot"
        );
        Ok(TransformedSnapshot {
            snapshot,
            transformed,
            outcome,
        })
    }

    fn validate(&self, snapshot: &Snapshot, transformed: &str) -> JobResult<ValidationOutcome> {
        // Only content that was valid before can regress.
        if !self.config.validate
            || snapshot.val_status != ValStatus::Valid
            || transformed == snapshot.content
        {
            return Ok(ValidationOutcome::NotApplicable);
        }
        Ok(self
            .store
            .validate_pair(&snapshot.doc_type, &snapshot.content, transformed)?)
    }
}
