//! # DocMod Store
//!
//! Document store client boundary for DocMod.
//!
//! This crate defines the operations the modification engine needs from a
//! versioned document repository and ships two reference stores. A store
//! knows about documents, numbered versions, validation status and
//! checkouts; it knows nothing about jobs, slots, or transforms.
//!
//! ## Design Principles
//!
//! - Every operation is a simple synchronous call
//! - A failed checkout is reported as [`StoreError::Locked`], distinct from
//!   every other failure
//! - Stores must be `Send + Sync`; mutation goes through interior locking
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and embedding
//! - [`FileStore`] - JSON snapshot on disk, guarded by an exclusive lock file
//!
//! ## Example
//!
//! ```rust
//! use docmod_store::{DocumentStore, InMemoryStore, PersistRequest};
//!
//! let store = InMemoryStore::new("batch");
//! store.insert_document(7, "Summary", "<Summary/>");
//! let doc = store.checkout(7, true).unwrap();
//! assert_eq!(doc.content, "<Summary/>");
//!
//! let request = PersistRequest::new(7, "<Summary>x</Summary>").with_version(true);
//! let receipt = store.persist(&request).unwrap();
//! assert_eq!(receipt.version, Some(1));
//! store.unlock(7).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod error;
mod file;
mod memory;

pub use client::{
    ActiveStatus, DocumentStore, LockHolder, PersistReceipt, PersistRequest, StoredDocument,
    ValStatus, ValidationOutcome, VersionInfo,
};
pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::{DocumentRecord, InMemoryStore, StoredVersion, Validator};
