//! Run command implementation.

use crate::commands::IdSource;
use clap::Args;
use docmod_core::{
    FailedDocument, JobConfig, JobError, JobResult, JobRunner, JobStats, Processed,
    ProcessedFilter, RunMode, RunReport, Snapshot, Transform, DEFAULT_REASON, DEFAULT_SESSION,
};
use docmod_store::{ActiveStatus, FileStore};
use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Arguments of `docmod run`.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Path to the store file
    #[arg(short, long)]
    pub store: PathBuf,

    /// Document ids, comma separated
    #[arg(long, value_delimiter = ',', conflicts_with = "ids_file")]
    pub ids: Vec<String>,

    /// File with one document id per line
    #[arg(long)]
    pub ids_file: Option<PathBuf>,

    /// Regular expression to search for
    #[arg(short, long)]
    pub pattern: String,

    /// Replacement text; `$1` and `${name}` refer to capture groups
    #[arg(short, long)]
    pub replacement: String,

    /// Save changes to the store instead of writing review pairs
    #[arg(long)]
    pub live: bool,

    /// Directory for review pairs in test mode
    #[arg(long, default_value = "docmod-output", conflicts_with = "live")]
    pub output_dir: PathBuf,

    /// Only transform the working copy
    #[arg(long)]
    pub no_versions: bool,

    /// Skip validation of transformed content
    #[arg(long)]
    pub no_validate: bool,

    /// Withhold every new save of a document whose change breaks validation
    #[arg(long)]
    pub halt_on_invalid: bool,

    /// Stop after this many documents
    #[arg(long)]
    pub max_docs: Option<u64>,

    /// Abort once more than this many documents fail
    #[arg(long, default_value = "0")]
    pub max_errors: u64,

    /// Force this active status (A, I or D) on every save
    #[arg(long)]
    pub status: Option<String>,

    /// Reason recorded with every save
    #[arg(long, default_value = DEFAULT_REASON)]
    pub reason: String,

    /// Session name that owns the checkouts
    #[arg(long, default_value = DEFAULT_SESSION)]
    pub session: String,

    /// Content is valid only if it matches this regular expression
    #[arg(long)]
    pub require: Option<String>,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

impl RunArgs {
    /// Builds the job configuration from the flags.
    pub fn config(&self) -> JobResult<JobConfig> {
        let mode = if self.live {
            RunMode::Live
        } else {
            RunMode::Test {
                output_dir: self.output_dir.clone(),
            }
        };
        let mut config = JobConfig::default()
            .mode(mode)
            .include_older_versions(!self.no_versions)
            .validate(!self.no_validate)
            .halt_on_validation_regression(self.halt_on_invalid)
            .max_errors(self.max_errors)
            .reason(self.reason.clone())
            .session(self.session.clone());
        if let Some(max_docs) = self.max_docs {
            config = config.max_docs(max_docs);
        }
        if let Some(code) = &self.status {
            let status = code
                .parse::<ActiveStatus>()
                .map_err(|e| JobError::configuration(e.to_string()))?;
            config = config.forced_active_status(status);
        }
        config.check()?;
        Ok(config)
    }
}

/// Rewrites every match of a pattern.
#[derive(Debug, Clone)]
pub struct RegexTransform {
    pattern: Regex,
    replacement: String,
}

impl RegexTransform {
    /// Compiles the pattern.
    pub fn new(pattern: &str, replacement: impl Into<String>) -> JobResult<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| JobError::configuration(format!("invalid pattern: {e}")))?;
        Ok(Self {
            pattern,
            replacement: replacement.into(),
        })
    }
}

impl Transform for RegexTransform {
    fn apply(&self, snapshot: &Snapshot) -> JobResult<String> {
        Ok(self
            .pattern
            .replace_all(&snapshot.content, self.replacement.as_str())
            .into_owned())
    }
}

/// Validation rule for `--require`.
fn require_rule(
    pattern: &str,
) -> JobResult<impl Fn(&str, &str) -> Vec<String> + Send + Sync + 'static> {
    let required = Regex::new(pattern)
        .map_err(|e| JobError::configuration(format!("invalid required pattern: {e}")))?;
    Ok(move |_doc_type: &str, content: &str| {
        if required.is_match(content) {
            Vec::new()
        } else {
            vec![format!(
                "content does not match required pattern '{}'",
                required.as_str()
            )]
        }
    })
}

/// Run command result.
#[derive(Debug, Serialize)]
pub struct RunOutput<'a> {
    /// `live` or `test`.
    pub mode: &'static str,
    /// Run statistics.
    pub stats: &'a JobStats,
    /// Documents processed without error.
    pub processed: Processed,
    /// Documents checked out by another session.
    pub not_checked_out: Vec<FailedDocument>,
    /// Documents that failed.
    pub failures: Vec<FailedDocument>,
}

impl<'a> RunOutput<'a> {
    fn new(report: &'a RunReport, live: bool) -> JobResult<Self> {
        Ok(Self {
            mode: if live { "live" } else { "test" },
            stats: report.stats(),
            processed: report.processed(&ProcessedFilter::default())?,
            not_checked_out: report.not_checked_out(),
            failures: report.failures(),
        })
    }
}

/// Runs the run command.
pub fn run(args: &RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.config()?;
    let transform = RegexTransform::new(&args.pattern, args.replacement.as_str())?;
    info!("Opening store {:?}", args.store);
    let mut store = FileStore::open(&args.store, config.session.clone(), false)?;
    if let Some(pattern) = &args.require {
        store = store.with_validator(require_rule(pattern)?);
    }
    let selector = IdSource::new(args.ids.clone(), args.ids_file.clone());

    let mut runner = JobRunner::new(&store, &transform, &config);
    match runner.run(&selector) {
        Ok(report) => print_output(&RunOutput::new(&report, args.live)?, &args.format),
        Err(err @ JobError::ErrorBudgetExhausted { .. }) => {
            let report = runner.report();
            print_output(&RunOutput::new(&report, args.live)?, &args.format)?;
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

fn print_output(output: &RunOutput<'_>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(output)?);
    } else {
        print_text_output(output);
    }
    Ok(())
}

fn print_text_output(output: &RunOutput<'_>) {
    println!("{}", output.stats);
    println!();

    if let Processed::Rows(rows) = &output.processed {
        if !rows.is_empty() {
            println!("Processed ({} mode):", output.mode);
            println!("  {:<13}  C  V  P", "Document");
            for row in rows {
                println!("  {row}");
            }
        }
    }

    if !output.not_checked_out.is_empty() {
        println!();
        println!("Not checked out:");
        for doc in &output.not_checked_out {
            println!("  {}  {}", doc.id, doc.message);
        }
    }

    if !output.failures.is_empty() {
        println!();
        println!("Failed:");
        for doc in &output.failures {
            println!("  {}  {}", doc.id, doc.message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use docmod_core::{DocumentId, Slot};
    use docmod_store::ValStatus;
    use std::path::Path;
    use tempfile::tempdir;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: RunArgs,
    }

    fn parse(extra: &[&str]) -> RunArgs {
        let mut argv = vec![
            "docmod",
            "--store",
            "docs.json",
            "--ids",
            "1",
            "--pattern",
            "old",
            "--replacement",
            "new",
        ];
        argv.extend_from_slice(extra);
        Harness::try_parse_from(argv).unwrap().args
    }

    fn args_for(store: &Path, extra: &[&str]) -> RunArgs {
        let mut args = parse(extra);
        args.store = store.to_path_buf();
        args
    }

    fn seed(path: &Path) {
        let store = FileStore::open(path, DEFAULT_SESSION, true).unwrap();
        store.insert_document(1, "Term", "<Term>old</Term>").unwrap();
        store.insert_document(2, "Term", "<Term>old</Term>").unwrap();
        store.memory().add_version(2, "<Term>old</Term>", true);
        store.save().unwrap();
    }

    fn snapshot(content: &str) -> Snapshot {
        Snapshot {
            id: DocumentId::new(1),
            slot: Slot::CurrentWorkingDocument,
            content: content.into(),
            doc_type: "Term".into(),
            version: None,
            publishable: false,
            val_status: ValStatus::Unvalidated,
        }
    }

    #[test]
    fn defaults_are_a_test_run() {
        let config = parse(&[]).config().unwrap();
        assert!(!config.mode.is_live());
        assert_eq!(
            config.mode.output_dir(),
            Some(Path::new("docmod-output"))
        );
        assert!(config.include_older_versions);
        assert!(config.validate);
        assert_eq!(config.max_errors, 0);
        assert_eq!(config.reason, DEFAULT_REASON);
    }

    #[test]
    fn flags_map_to_config() {
        let config = parse(&[
            "--live",
            "--no-versions",
            "--no-validate",
            "--halt-on-invalid",
            "--max-docs",
            "10",
            "--max-errors",
            "3",
            "--status",
            "I",
            "--reason",
            "rename terms",
        ])
        .config()
        .unwrap();
        assert!(config.mode.is_live());
        assert!(!config.include_older_versions);
        assert!(!config.validate);
        assert!(config.halt_on_validation_regression);
        assert_eq!(config.max_docs, Some(10));
        assert_eq!(config.max_errors, 3);
        assert_eq!(config.forced_active_status, Some(ActiveStatus::Inactive));
        assert_eq!(config.reason, "rename terms");
    }

    #[test]
    fn bad_status_is_rejected() {
        assert!(matches!(
            parse(&["--status", "X"]).config(),
            Err(JobError::Configuration(_))
        ));
    }

    #[test]
    fn regex_transform_uses_groups() {
        let transform = RegexTransform::new(r"<b>(\w+)</b>", "<strong>$1</strong>").unwrap();
        let out = transform
            .apply(&snapshot("<p><b>one</b> and <b>two</b></p>"))
            .unwrap();
        assert_eq!(out, "<p><strong>one</strong> and <strong>two</strong></p>");
        assert!(RegexTransform::new("(", "x").is_err());
    }

    #[test]
    fn require_rule_reports_pattern() {
        let rule = require_rule("<Term>").unwrap();
        assert!(rule("Term", "<Term>x</Term>").is_empty());
        assert_eq!(
            rule("Term", "<Other/>"),
            vec!["content does not match required pattern '<Term>'".to_string()]
        );
    }

    #[test]
    fn live_run_updates_store_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docs.json");
        seed(&path);

        let mut args = args_for(&path, &["--live", "--format", "json"]);
        args.ids = vec!["1".into(), "2".into()];
        run(&args).unwrap();

        let store = FileStore::open(&path, DEFAULT_SESSION, false).unwrap();
        let records = store.records();
        // Unversioned working copy is kept as version 1 before being replaced.
        assert_eq!(records[0].content, "<Term>new</Term>");
        assert_eq!(records[0].versions[0].content, "<Term>old</Term>");
        assert_eq!(records[1].versions.len(), 2);
        assert_eq!(records[1].versions[1].content, "<Term>new</Term>");
        assert!(records.iter().all(|r| r.locked_by.is_none()));
    }

    #[test]
    fn test_run_leaves_store_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docs.json");
        seed(&path);
        let out = dir.path().join("out");

        let mut args = args_for(&path, &[]);
        args.output_dir = out.clone();
        run(&args).unwrap();

        let store = FileStore::open(&path, DEFAULT_SESSION, false).unwrap();
        assert_eq!(store.records()[0].content, "<Term>old</Term>");
        assert!(store.records()[0].versions.is_empty());
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 1);
    }

    #[test]
    fn halted_document_is_not_saved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docs.json");
        seed(&path);

        let mut args = args_for(&path, &["--live", "--halt-on-invalid", "--require", "old"]);
        args.ids = vec!["2".into()];
        run(&args).unwrap();

        let store = FileStore::open(&path, DEFAULT_SESSION, false).unwrap();
        let record = &store.records()[1];
        assert_eq!(record.versions.len(), 1);
        assert_eq!(record.content, "<Term>old</Term>");
    }

    #[test]
    fn missing_store_fails() {
        let dir = tempdir().unwrap();
        let args = args_for(&dir.path().join("none.json"), &["--live"]);
        assert!(run(&args).is_err());
    }
}
