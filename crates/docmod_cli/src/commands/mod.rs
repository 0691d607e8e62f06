//! CLI command implementations.

pub mod check_locks;
pub mod inspect;
pub mod run;

use docmod_core::{DocumentId, DocumentSelector, JobError, JobResult};
use std::fs;
use std::path::PathBuf;

/// Document ids given on the command line or in a file.
///
/// Id files hold one id per line; blank lines and lines starting with `#` are
/// skipped.
#[derive(Debug, Clone, Default)]
pub struct IdSource {
    ids: Vec<String>,
    file: Option<PathBuf>,
}

impl IdSource {
    /// Creates a source from `--ids` values and an optional `--ids-file`.
    pub fn new(ids: Vec<String>, file: Option<PathBuf>) -> Self {
        Self { ids, file }
    }
}

impl DocumentSelector for IdSource {
    fn doc_ids(&self) -> JobResult<Vec<DocumentId>> {
        let lines = match &self.file {
            Some(path) => fs::read_to_string(path)
                .map_err(|e| JobError::selection(format!("{}: {e}", path.display())))?
                .lines()
                .map(str::to_string)
                .collect(),
            None => self.ids.clone(),
        };
        lines
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| {
                line.parse::<DocumentId>()
                    .map_err(|_| JobError::selection(format!("invalid document id '{line}'")))
            })
            .collect()
    }
}
