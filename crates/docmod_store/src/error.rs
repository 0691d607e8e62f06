//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to a document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The document is checked out by another session.
    #[error("document {id} is locked: {message}")]
    Locked {
        /// Document identifier.
        id: u64,
        /// Description of the conflicting checkout.
        message: String,
    },

    /// No document with this identifier exists.
    #[error("document {id} not found")]
    DocumentNotFound {
        /// Document identifier.
        id: u64,
    },

    /// The requested version does not exist.
    #[error("version {version} of document {id} not found")]
    VersionNotFound {
        /// Document identifier.
        id: u64,
        /// Requested version number.
        version: u32,
    },

    /// The store refused to save the document.
    #[error("save rejected for document {id}: {message}")]
    Rejected {
        /// Document identifier.
        id: u64,
        /// Reason given by the store.
        message: String,
    },

    /// Invalid status code.
    #[error("invalid active status code '{0}'")]
    InvalidStatus(String),

    /// The store file is held by another process.
    #[error("store file is locked by another process")]
    StoreBusy,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The store file could not be encoded or decoded.
    #[error("store file format error: {0}")]
    Format(#[from] serde_json::Error),
}

impl StoreError {
    /// Creates a lock conflict error.
    pub fn locked(id: u64, message: impl Into<String>) -> Self {
        Self::Locked {
            id,
            message: message.into(),
        }
    }

    /// Creates a rejected-save error.
    pub fn rejected(id: u64, message: impl Into<String>) -> Self {
        Self::Rejected {
            id,
            message: message.into(),
        }
    }

    /// Returns true if this error is a checkout conflict.
    pub fn is_lock_conflict(&self) -> bool {
        matches!(self, StoreError::Locked { .. })
    }
}
