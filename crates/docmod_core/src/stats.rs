//! Job statistics.

use crate::types::SaveKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Counters for one job run.
///
/// `versions_saved` counts changed slot flags, not store calls: one write
/// that covers three aliased slots adds three.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobStats {
    /// Documents returned by the selector.
    pub selected: u64,
    /// Documents examined (including locked and failed ones).
    pub processed: u64,
    /// Documents with at least one write.
    pub saved: u64,
    /// Slots changed across all documents.
    pub versions_saved: u64,
    /// Documents checked out by someone else.
    pub locked: u64,
    /// Documents that failed.
    pub errors: u64,
    /// Number of saves per kind.
    pub histogram: BTreeMap<SaveKind, u64>,
    /// Wall time of the run.
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

impl JobStats {
    /// Records a document whose saves went through.
    pub(crate) fn record_saved(&mut self, kinds: &[SaveKind], changed_slots: u64) {
        if !kinds.is_empty() {
            self.saved += 1;
        }
        self.versions_saved += changed_slots;
        self.record_kinds(kinds);
    }

    /// Adds save kinds to the histogram.
    pub(crate) fn record_kinds(&mut self, kinds: &[SaveKind]) {
        for kind in kinds {
            *self.histogram.entry(*kind).or_insert(0) += 1;
        }
    }

    /// Returns the number of saves of one kind.
    pub fn saves_of(&self, kind: SaveKind) -> u64 {
        self.histogram.get(&kind).copied().unwrap_or(0)
    }
}

impl fmt::Display for JobStats {
    /// Multi-line run summary, ending with the per-kind histogram.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run completed.")?;
        writeln!(f, "   Docs selected    = {}", self.selected)?;
        writeln!(f, "   Docs examined    = {}", self.processed)?;
        writeln!(f, "   Docs changed     = {}", self.saved)?;
        writeln!(f, "   Versions changed = {}", self.versions_saved)?;
        writeln!(f, "   Could not lock   = {}", self.locked)?;
        writeln!(f, "   Errors           = {}", self.errors)?;
        write!(f, "   Time             = {:.3}s", self.elapsed.as_secs_f64())?;
        if !self.histogram.is_empty() {
            write!(f, "\nSpecific versions saved:")?;
            for (kind, count) in &self.histogram {
                write!(f, "\n  {kind} = {count}")?;
            }
        }
        Ok(())
    }
}
