//! Job configuration.

use crate::error::{JobError, JobResult};
use docmod_store::ActiveStatus;
use std::path::{Path, PathBuf};

/// Reason recorded with every save unless the job supplies its own.
pub const DEFAULT_REASON: &str = "Batch transformation of documents";

/// Session name presented to the store unless the job supplies its own.
pub const DEFAULT_SESSION: &str = "docmod";

/// Whether a job writes to the store or to review files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Check out, persist and unlock documents.
    Live,
    /// Read without locking and write before/after pairs under `output_dir`.
    Test {
        /// Parent directory for the timestamped output directory.
        output_dir: PathBuf,
    },
}

impl RunMode {
    /// Returns true for live runs.
    pub fn is_live(&self) -> bool {
        matches!(self, RunMode::Live)
    }

    /// Returns the test output directory, if in test mode.
    pub fn output_dir(&self) -> Option<&Path> {
        match self {
            RunMode::Live => None,
            RunMode::Test { output_dir } => Some(output_dir),
        }
    }
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::Test {
            output_dir: PathBuf::from("docmod-output"),
        }
    }
}

/// Configuration for one modification job.
///
/// Built once and handed to the runner by reference; the runner never
/// mutates it.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Also transform the last version and last publishable version.
    pub include_older_versions: bool,
    /// Compare validity of original and transformed content.
    pub validate: bool,
    /// Withhold new-content writes for a document when any slot regresses.
    pub halt_on_validation_regression: bool,
    /// Stop after this many documents have been processed.
    pub max_docs: Option<u64>,
    /// Abort once more than this many documents have failed.
    pub max_errors: u64,
    /// Active status forced on every write.
    pub forced_active_status: Option<ActiveStatus>,
    /// Reason text stored with every write.
    pub reason: String,
    /// Live or test mode.
    pub mode: RunMode,
    /// Session name recorded on the job span.
    ///
    /// Lock ownership is decided by the store's own session, so callers
    /// open the store with this same name.
    pub session: String,
}

impl JobConfig {
    /// Creates a test-mode configuration writing under `output_dir`.
    pub fn test(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode: RunMode::Test {
                output_dir: output_dir.into(),
            },
            ..Self::default()
        }
    }

    /// Creates a live configuration.
    pub fn live() -> Self {
        Self {
            mode: RunMode::Live,
            ..Self::default()
        }
    }

    /// Sets whether older versions are transformed.
    #[must_use]
    pub fn include_older_versions(mut self, value: bool) -> Self {
        self.include_older_versions = value;
        self
    }

    /// Sets whether validation is compared.
    #[must_use]
    pub fn validate(mut self, value: bool) -> Self {
        self.validate = value;
        self
    }

    /// Sets whether a validation regression halts new-content writes.
    #[must_use]
    pub fn halt_on_validation_regression(mut self, value: bool) -> Self {
        self.halt_on_validation_regression = value;
        self
    }

    /// Sets the document cap.
    #[must_use]
    pub fn max_docs(mut self, value: u64) -> Self {
        self.max_docs = Some(value);
        self
    }

    /// Sets the error budget.
    #[must_use]
    pub fn max_errors(mut self, value: u64) -> Self {
        self.max_errors = value;
        self
    }

    /// Sets the active status forced on every write.
    #[must_use]
    pub fn forced_active_status(mut self, status: ActiveStatus) -> Self {
        self.forced_active_status = Some(status);
        self
    }

    /// Sets the reason text.
    #[must_use]
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Sets the session name.
    #[must_use]
    pub fn session(mut self, session: impl Into<String>) -> Self {
        self.session = session.into();
        self
    }

    /// Sets the run mode.
    #[must_use]
    pub fn mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// Returns true if a regression blocks new-content writes.
    pub fn halts_on_regression(&self) -> bool {
        self.validate && self.halt_on_validation_regression
    }

    /// Checks the configuration before a run.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Configuration`] for an empty reason or session.
    pub fn check(&self) -> JobResult<()> {
        if self.reason.trim().is_empty() {
            return Err(JobError::configuration("reason must not be empty"));
        }
        if self.session.trim().is_empty() {
            return Err(JobError::configuration("session must not be empty"));
        }
        Ok(())
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            include_older_versions: true,
            validate: true,
            halt_on_validation_regression: false,
            max_docs: None,
            max_errors: 0,
            forced_active_status: None,
            reason: DEFAULT_REASON.to_string(),
            mode: RunMode::default(),
            session: DEFAULT_SESSION.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = JobConfig::default();
        assert!(config.include_older_versions);
        assert!(config.validate);
        assert!(!config.halt_on_validation_regression);
        assert_eq!(config.max_docs, None);
        assert_eq!(config.max_errors, 0);
        assert_eq!(config.reason, DEFAULT_REASON);
        assert!(!config.mode.is_live());
        assert!(config.check().is_ok());
    }

    #[test]
    fn builder() {
        let config = JobConfig::live()
            .include_older_versions(false)
            .halt_on_validation_regression(true)
            .max_docs(10)
            .max_errors(3)
            .forced_active_status(ActiveStatus::Inactive)
            .reason("retire glossary links")
            .session("nightly");

        assert!(config.mode.is_live());
        assert!(!config.include_older_versions);
        assert!(config.halts_on_regression());
        assert_eq!(config.max_docs, Some(10));
        assert_eq!(config.max_errors, 3);
        assert_eq!(config.forced_active_status, Some(ActiveStatus::Inactive));
        assert_eq!(config.session, "nightly");
    }

    #[test]
    fn halting_requires_validation() {
        let config = JobConfig::live()
            .validate(false)
            .halt_on_validation_regression(true);
        assert!(!config.halts_on_regression());
    }

    #[test]
    fn test_mode_output_dir() {
        let config = JobConfig::test("/tmp/out");
        assert_eq!(config.mode.output_dir(), Some(Path::new("/tmp/out")));
        assert_eq!(JobConfig::live().mode.output_dir(), None);
    }

    #[test]
    fn empty_reason_rejected() {
        let config = JobConfig::live().reason("  ");
        assert!(matches!(config.check(), Err(JobError::Configuration(_))));
    }
}
