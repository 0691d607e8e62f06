//! Read-only views over the outcome of a run.

use crate::error::{JobError, JobResult};
use crate::runner::{DocumentOutcome, DocumentState};
use crate::stats::JobStats;
use crate::types::{Disposition, DocumentId};
use serde::Serialize;
use std::fmt;

/// Shape of the `processed` view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ProcessedView {
    /// Only the number of matching documents.
    Count,
    /// Matching document ids.
    Ids,
    /// Matching documents with per-slot flags.
    #[default]
    Rows,
}

/// Selects documents for the `processed` view.
///
/// Only documents processed without error are considered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFilter {
    /// Include documents with at least one changed slot.
    pub changed: bool,
    /// Include documents with no changed slot.
    pub unchanged: bool,
    /// Skip this many matches (ignored by [`ProcessedView::Count`]).
    pub offset: usize,
    /// Return at most this many matches (ignored by [`ProcessedView::Count`]).
    pub limit: Option<usize>,
    /// Output shape.
    pub view: ProcessedView,
}

impl Default for ProcessedFilter {
    fn default() -> Self {
        Self {
            changed: true,
            unchanged: true,
            offset: 0,
            limit: None,
            view: ProcessedView::Rows,
        }
    }
}

impl ProcessedFilter {
    /// Only changed documents.
    pub fn changed_only() -> Self {
        Self {
            unchanged: false,
            ..Self::default()
        }
    }

    /// Only unchanged documents.
    pub fn unchanged_only() -> Self {
        Self {
            changed: false,
            ..Self::default()
        }
    }

    /// Sets the output shape.
    #[must_use]
    pub fn view(mut self, view: ProcessedView) -> Self {
        self.view = view;
        self
    }

    /// Sets the page window.
    #[must_use]
    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }
}

/// One row of the `processed` view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedRow {
    /// Document identifier.
    pub id: DocumentId,
    /// `Y` if the working copy changed, else `N`.
    pub cwd: char,
    /// `Y` if the last version changed, else `N`.
    pub lastv: char,
    /// `Y` if the last publishable version changed, `I` if it changed and
    /// the store raised warnings, else `N`.
    pub lastp: char,
    /// Warnings joined with `; `.
    pub warnings: String,
}

impl ProcessedRow {
    fn from_disposition(disposition: &Disposition) -> Self {
        let flag = |changed: bool| if changed { 'Y' } else { 'N' };
        let lastp = match (
            disposition.last_publishable_changed,
            disposition.warnings.is_empty(),
        ) {
            (true, false) => 'I',
            (changed, _) => flag(changed),
        };
        Self {
            id: disposition.id,
            cwd: flag(disposition.cwd_changed),
            lastv: flag(disposition.last_version_changed),
            lastp,
            warnings: disposition.warnings.join("; "),
        }
    }
}

impl fmt::Display for ProcessedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  {}  {}  {}", self.id, self.cwd, self.lastv, self.lastp)?;
        if !self.warnings.is_empty() {
            write!(f, "  {}", self.warnings)?;
        }
        Ok(())
    }
}

/// Result of the `processed` view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Processed {
    /// Number of matching documents.
    Count(usize),
    /// Matching ids.
    Ids(Vec<DocumentId>),
    /// Matching rows.
    Rows(Vec<ProcessedRow>),
}

/// A document that could not be processed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDocument {
    /// Document identifier.
    pub id: DocumentId,
    /// Error or conflict message.
    pub message: String,
}

/// Statistics and per-document outcomes of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    stats: JobStats,
    outcomes: Vec<DocumentOutcome>,
}

impl RunReport {
    /// Creates a report.
    pub fn new(stats: JobStats, outcomes: Vec<DocumentOutcome>) -> Self {
        Self { stats, outcomes }
    }

    /// Returns the run statistics.
    pub fn stats(&self) -> &JobStats {
        &self.stats
    }

    /// Returns every recorded outcome, in processing order.
    pub fn outcomes(&self) -> &[DocumentOutcome] {
        &self.outcomes
    }

    /// Returns the disposition recorded for a document.
    pub fn disposition(&self, id: DocumentId) -> Option<&Disposition> {
        self.outcomes
            .iter()
            .find(|o| o.disposition.id == id)
            .map(|o| &o.disposition)
    }

    /// Short text summary of the counters.
    pub fn summary(&self) -> String {
        format!(
            "           Selected docs: {}\n\
             \x20         Processed docs: {}\n\
             \x20             Docs saved: {}\n\
             \x20       Versions changed: {}\n\
             \x20  Docs locked by others: {}\n\
             \x20                 Errors: {}\n",
            self.stats.selected,
            self.stats.processed,
            self.stats.saved,
            self.stats.versions_saved,
            self.stats.locked,
            self.stats.errors,
        )
    }

    /// Documents processed without error, filtered and shaped.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Configuration`] if both `changed` and `unchanged`
    /// are false.
    pub fn processed(&self, filter: &ProcessedFilter) -> JobResult<Processed> {
        if !filter.changed && !filter.unchanged {
            return Err(JobError::configuration(
                "processed view needs changed or unchanged documents",
            ));
        }
        let matching = self
            .outcomes
            .iter()
            .map(|o| &o.disposition)
            .filter(|d| !d.is_error())
            .filter(|d| {
                if d.any_changed() {
                    filter.changed
                } else {
                    filter.unchanged
                }
            });

        if filter.view == ProcessedView::Count {
            return Ok(Processed::Count(matching.count()));
        }
        let page = matching
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX));
        Ok(match filter.view {
            ProcessedView::Ids => Processed::Ids(page.map(|d| d.id).collect()),
            _ => Processed::Rows(page.map(ProcessedRow::from_disposition).collect()),
        })
    }

    /// Documents that could not be checked out, with the conflict message.
    pub fn not_checked_out(&self) -> Vec<FailedDocument> {
        self.failed_in(DocumentState::Locked)
    }

    /// Documents whose processing failed for any reason other than a lock
    /// conflict.
    pub fn failures(&self) -> Vec<FailedDocument> {
        self.failed_in(DocumentState::Failed)
    }

    fn failed_in(&self, state: DocumentState) -> Vec<FailedDocument> {
        self.outcomes
            .iter()
            .filter(|o| o.state == state)
            .filter_map(|o| {
                o.disposition
                    .error_message
                    .as_ref()
                    .map(|message| FailedDocument {
                        id: o.disposition.id,
                        message: message.clone(),
                    })
            })
            .collect()
    }
}
