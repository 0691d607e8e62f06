//! Batch controller.
//!
//! Drives the loader and reconciler over the selected documents one at a
//! time, records a [`Disposition`] per document, and enforces the document
//! cap and the error budget.

use crate::config::{JobConfig, RunMode};
use crate::error::{JobError, JobResult};
use crate::loader::{LoadedDocument, SnapshotLoader};
use crate::pairs::PairWriter;
use crate::reconcile::Reconciler;
use crate::report::RunReport;
use crate::stats::JobStats;
use crate::transform::{DocumentSelector, Transform};
use crate::types::{Disposition, DocumentId, SaveKind};
use docmod_store::DocumentStore;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn};

/// Processing state of one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentState {
    /// Not reached yet.
    NotStarted,
    /// Reading and transforming slots.
    Loading,
    /// Planning and issuing writes.
    Reconciling,
    /// Finished; any planned writes went through.
    Saved,
    /// Checked out by someone else; skipped.
    Locked,
    /// Failed; see the disposition's error message.
    Failed,
}

impl DocumentState {
    /// Returns true for the three final states.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DocumentState::Saved | DocumentState::Locked | DocumentState::Failed
        )
    }
}

/// What happened to one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentOutcome {
    /// Flags, warnings and error for the document.
    pub disposition: Disposition,
    /// Final state.
    pub state: DocumentState,
}

/// Runs a modification job against a store.
///
/// # Example
///
/// ```rust
/// use docmod_core::{DocumentId, JobConfig, JobResult, JobRunner, Snapshot};
/// use docmod_store::InMemoryStore;
///
/// let store = InMemoryStore::new("docmod");
/// store.insert_document(1, "Term", "<Term>old</Term>");
///
/// let transform = |s: &Snapshot| -> JobResult<String> { Ok(s.content.replace("old", "new")) };
/// let config = JobConfig::live();
/// let mut runner = JobRunner::new(&store, &transform, &config);
/// let report = runner.run(&vec![DocumentId::new(1)]).unwrap();
///
/// assert_eq!(report.stats().saved, 1);
/// assert_eq!(store.record(1).unwrap().content, "<Term>new</Term>");
/// ```
pub struct JobRunner<'a, S: ?Sized, T: ?Sized> {
    store: &'a S,
    transform: &'a T,
    config: &'a JobConfig,
    stats: JobStats,
    outcomes: Vec<DocumentOutcome>,
    current: Option<(DocumentId, DocumentState)>,
}

impl<'a, S, T> JobRunner<'a, S, T>
where
    S: DocumentStore + ?Sized,
    T: Transform + ?Sized,
{
    /// Creates a runner.
    pub fn new(store: &'a S, transform: &'a T, config: &'a JobConfig) -> Self {
        Self {
            store,
            transform,
            config,
            stats: JobStats::default(),
            outcomes: Vec::new(),
            current: None,
        }
    }

    /// Returns the statistics collected so far.
    pub fn stats(&self) -> &JobStats {
        &self.stats
    }

    /// Returns a report of everything recorded so far.
    ///
    /// Still available after [`JobRunner::run`] fails with
    /// [`JobError::ErrorBudgetExhausted`].
    pub fn report(&self) -> RunReport {
        RunReport::new(self.stats.clone(), self.outcomes.clone())
    }

    /// Returns the state of a document in the current or last run.
    pub fn state_of(&self, id: DocumentId) -> DocumentState {
        if let Some((current, state)) = self.current {
            if current == id {
                return state;
            }
        }
        self.outcomes
            .iter()
            .rev()
            .find(|o| o.disposition.id == id)
            .map_or(DocumentState::NotStarted, |o| o.state)
    }

    /// Processes every selected document.
    ///
    /// Per-document failures are recorded and counted; the run only stops
    /// early at the document cap or when the error budget is exhausted. The
    /// final summary is logged either way.
    ///
    /// # Errors
    ///
    /// - [`JobError::Configuration`] if the configuration is invalid
    /// - [`JobError::Selection`] (or any selector error) if no ids could be
    ///   read; the summary is still logged and the elapsed time recorded
    /// - [`JobError::ErrorBudgetExhausted`] after more than `max_errors` failures
    pub fn run<D: DocumentSelector + ?Sized>(&mut self, selector: &D) -> JobResult<RunReport> {
        self.config.check()?;
        self.stats = JobStats::default();
        self.outcomes.clear();
        self.current = None;

        let span = info_span!("job", session = %self.config.session);
        let _guard = span.enter();
        let start = Instant::now();

        match &self.config.mode {
            RunMode::Live => info!("running in live mode, updating the store"),
            RunMode::Test { output_dir } => {
                info!(dir = %output_dir.display(), "running in test mode");
            }
        }

        let result = match selector.doc_ids() {
            Ok(ids) => {
                self.stats.selected = ids.len() as u64;
                info!("{} documents selected", ids.len());
                info!("purpose: {:?}", self.config.reason);
                if ids.is_empty() {
                    info!("nothing to do");
                    Ok(())
                } else {
                    self.process_all(&ids)
                }
            }
            Err(err) => {
                error!(error = %err, "document selection failed");
                Err(err)
            }
        };

        self.stats.elapsed = start.elapsed();
        info!("{}", self.stats);
        result.map(|()| self.report())
    }

    fn process_all(&mut self, ids: &[DocumentId]) -> JobResult<()> {
        let pairs = match self.config.mode.output_dir() {
            Some(dir) => Some(PairWriter::create(dir)?),
            None => None,
        };
        for id in ids {
            if let Some(max_docs) = self.config.max_docs {
                if self.stats.processed >= max_docs {
                    info!("stopping after processing {} documents", self.stats.processed);
                    break;
                }
            }
            self.stats.processed += 1;
            self.process_document(*id, pairs.as_ref())?;
        }
        Ok(())
    }

    /// Returns `Err` only when the error budget is exhausted.
    fn process_document(&mut self, id: DocumentId, pairs: Option<&PairWriter>) -> JobResult<()> {
        let span = info_span!("doc", id = %id);
        let _guard = span.enter();

        self.enter(id, DocumentState::Loading);
        let loader = SnapshotLoader::new(self.store, self.transform, self.config);
        let LoadedDocument { binding, checkout } = match loader.load(id) {
            Ok(loaded) => loaded,
            Err(err) if err.is_lock_conflict() => {
                warn!("{err}");
                self.stats.locked += 1;
                self.finish(Disposition::failed(id, err.to_string()), DocumentState::Locked);
                return Ok(());
            }
            Err(err) => return self.fail(id, err),
        };
        info!("Processing {binding}");

        self.enter(id, DocumentState::Reconciling);
        let plan = match Reconciler::new(self.config).reconcile(&binding, self.store) {
            Ok(plan) => plan,
            Err(err) => return self.fail(id, err),
        };
        if plan.is_halted() {
            if let Some(err) = plan.regression_error() {
                warn!("{err}");
            }
        }

        let disposition = match pairs {
            Some(writer) => {
                if let Err(err) = writer.write_document(&binding, &plan) {
                    return self.fail(id, err);
                }
                let disposition = plan.projected_disposition();
                let kinds: Vec<SaveKind> = plan.writes().iter().map(|w| w.kind).collect();
                self.stats.record_saved(&kinds, disposition.changed_count());
                disposition
            }
            None => {
                let mut disposition = Disposition::new(id);
                let mut saved = Vec::new();
                if let Err(err) = plan.apply(self.store, &mut disposition, &mut saved) {
                    // Writes that landed before the failure stay recorded.
                    self.stats.record_saved(&saved, disposition.changed_count());
                    return self.fail_with(disposition, err);
                }
                self.stats.record_saved(&saved, disposition.changed_count());
                if let Some(checkout) = checkout {
                    if let Err(err) = checkout.release() {
                        warn!(error = %err, "unlock failed");
                        disposition.warnings.push(format!("unlock failed: {err}"));
                    }
                }
                disposition
            }
        };
        debug!(%disposition, "done");
        self.finish(disposition, DocumentState::Saved);
        Ok(())
    }

    fn fail(&mut self, id: DocumentId, err: JobError) -> JobResult<()> {
        self.fail_with(Disposition::new(id), err)
    }

    fn fail_with(&mut self, mut disposition: Disposition, err: JobError) -> JobResult<()> {
        self.stats.errors += 1;
        error!(error = %err, "document {} failed", disposition.id);
        disposition.error_message = Some(err.to_string());
        self.finish(disposition, DocumentState::Failed);
        if self.stats.errors > self.config.max_errors {
            error!("stopping after {} errors", self.stats.errors);
            return Err(JobError::ErrorBudgetExhausted {
                errors: self.stats.errors,
                max_errors: self.config.max_errors,
                source: Box::new(err),
            });
        }
        Ok(())
    }

    fn enter(&mut self, id: DocumentId, state: DocumentState) {
        debug!(?state, "document {id}");
        self.current = Some((id, state));
    }

    fn finish(&mut self, disposition: Disposition, state: DocumentState) {
        debug_assert!(state.is_terminal());
        self.current = None;
        self.outcomes.push(DocumentOutcome { disposition, state });
    }
}
