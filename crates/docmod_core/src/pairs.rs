//! Test-mode output: before/after file pairs for review.

use crate::binding::SlotBinding;
use crate::error::JobResult;
use crate::reconcile::Reconciliation;
use crate::types::{DocumentId, SaveKind, Slot};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Writes before/after pairs into a timestamped directory.
#[derive(Debug, Clone)]
pub struct PairWriter {
    dir: PathBuf,
}

impl PairWriter {
    /// Creates `<output_dir>/YYYY-MM-DD_HH-MM-SS`.
    pub fn create(output_dir: &Path) -> JobResult<Self> {
        let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        Self::in_dir(output_dir.join(stamp))
    }

    /// Uses `dir` as is, creating it if needed.
    pub fn in_dir(dir: impl Into<PathBuf>) -> JobResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), "saving test output");
        Ok(Self { dir })
    }

    /// Returns the output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes one pair, plus the new validation errors if there are any.
    pub fn write_pair(
        &self,
        id: DocumentId,
        label: &str,
        before: &str,
        after: &str,
        errors: &[String],
    ) -> JobResult<()> {
        fs::write(self.dir.join(format!("{id}.{label}old.xml")), before)?;
        fs::write(self.dir.join(format!("{id}.{label}new.xml")), after)?;
        if !errors.is_empty() {
            let mut text = errors.join("\n");
            text.push('\n');
            fs::write(self.dir.join(format!("{id}.{label}.NEW_ERRORS.txt")), text)?;
        }
        debug!(doc = %id, label, "wrote pair");
        Ok(())
    }

    /// Writes the working-copy pair and a pair for every version the plan
    /// would save, withheld ones included.
    pub fn write_document(&self, binding: &SlotBinding, plan: &Reconciliation) -> JobResult<()> {
        let id = binding.id();
        let cwd = binding.cwd();
        self.write_pair(
            id,
            Slot::CurrentWorkingDocument.file_label(),
            cwd.original(),
            &cwd.transformed,
            cwd.outcome.messages(),
        )?;

        let versions = plan
            .writes()
            .iter()
            .chain(plan.withheld())
            .filter(|w| matches!(w.kind, SaveKind::NewPublishable | SaveKind::NewVersion));
        for write in versions {
            if let Some(snapshot) = binding.get(write.source) {
                self.write_pair(
                    id,
                    write.source.file_label(),
                    snapshot.original(),
                    &snapshot.transformed,
                    snapshot.outcome.messages(),
                )?;
            }
        }
        Ok(())
    }
}
