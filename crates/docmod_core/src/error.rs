//! Error types for modification jobs.

use crate::types::DocumentId;
use docmod_store::StoreError;
use std::io;
use thiserror::Error;

/// Result type for job operations.
pub type JobResult<T> = Result<T, JobError>;

/// Errors that can occur while running a modification job.
#[derive(Error, Debug)]
pub enum JobError {
    /// The document is checked out by someone else.
    #[error("unable to check out {id}: {message}")]
    Locked {
        /// Document identifier.
        id: DocumentId,
        /// Conflict description from the store.
        message: String,
    },

    /// A transform made previously valid content invalid.
    #[error("change to {id} introduces validation errors: {}", messages.join("; "))]
    ValidationRegression {
        /// Document identifier.
        id: DocumentId,
        /// New validation messages.
        messages: Vec<String>,
    },

    /// Store failure other than a lock conflict.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The transform failed.
    #[error("transform failed for {id}: {message}")]
    Transform {
        /// Document identifier.
        id: DocumentId,
        /// Failure description.
        message: String,
    },

    /// The document selector failed.
    #[error("document selection failed: {0}")]
    Selection(String),

    /// Invalid configuration or caller input.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Too many per-document failures.
    #[error("stopping after {errors} errors (maximum {max_errors})")]
    ErrorBudgetExhausted {
        /// Number of errors seen.
        errors: u64,
        /// Configured maximum.
        max_errors: u64,
        /// The failure that exhausted the budget.
        #[source]
        source: Box<JobError>,
    },

    /// I/O error writing job output.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl JobError {
    /// Creates a lock conflict error.
    pub fn locked(id: DocumentId, message: impl Into<String>) -> Self {
        Self::Locked {
            id,
            message: message.into(),
        }
    }

    /// Creates a transform error.
    pub fn transform(id: DocumentId, message: impl Into<String>) -> Self {
        Self::Transform {
            id,
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(detail: impl Into<String>) -> Self {
        Self::Configuration(detail.into())
    }

    /// Creates a selection error.
    pub fn selection(detail: impl Into<String>) -> Self {
        Self::Selection(detail.into())
    }

    /// Converts a checkout failure, keeping lock conflicts distinct.
    pub fn from_checkout(id: DocumentId, err: StoreError) -> Self {
        match err {
            StoreError::Locked { message, .. } => Self::locked(id, message),
            other => Self::Store(other),
        }
    }

    /// Returns true if this error is a lock conflict.
    pub fn is_lock_conflict(&self) -> bool {
        matches!(self, JobError::Locked { .. })
    }
}
