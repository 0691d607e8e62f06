//! # DocMod Core
//!
//! Version reconciliation and save engine for bulk document modification.
//!
//! A job applies one transform to a batch of documents in a versioned
//! repository. For each document it considers up to three slots:
//!
//! - the current working document (always transformed)
//! - the last version
//! - the last publishable version
//!
//! and decides which new versions and working copy to save, in what order,
//! so that no unversioned edits are lost and no publishable content is
//! silently broken.
//!
//! ## Architecture
//!
//! - [`SnapshotLoader`] reads and transforms the slots of one document,
//!   aliasing slots the store reports as identical
//! - [`Reconciler`] plans the ordered writes and applies the validation halt
//!   gate
//! - [`JobRunner`] drives both over the selected ids, handles checkouts, the
//!   document cap and the error budget
//! - [`RunReport`] offers read-only views of the outcome
//!
//! ## Key Invariants
//!
//! - Each distinct slot content is transformed exactly once
//! - An unversioned working copy is preserved as a version before any other
//!   write to the document
//! - A checkout is released exactly once, and only if this run took it
//! - Documents locked by someone else are never written or unlocked

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod binding;
mod config;
mod error;
mod loader;
mod locks;
mod pairs;
mod reconcile;
mod report;
mod runner;
mod stats;
mod transform;
mod types;

pub use binding::{Regression, SlotBinding, SlotEntry};
pub use config::{JobConfig, RunMode, DEFAULT_REASON, DEFAULT_SESSION};
pub use error::{JobError, JobResult};
pub use loader::{Checkout, LoadedDocument, SnapshotLoader};
pub use locks::{check_locks, LockReport, LockedDocument};
pub use pairs::PairWriter;
pub use reconcile::{Reconciler, Reconciliation};
pub use report::{FailedDocument, Processed, ProcessedFilter, ProcessedRow, ProcessedView, RunReport};
pub use runner::{DocumentOutcome, DocumentState, JobRunner};
pub use stats::JobStats;
pub use transform::{DocumentSelector, Transform};
pub use types::{
    Disposition, DocumentId, SaveKind, Slot, Snapshot, TransformedSnapshot, WriteRequest,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
