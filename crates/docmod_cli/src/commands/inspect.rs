//! Inspect command implementation.

use docmod_core::DocumentId;
use docmod_store::{ActiveStatus, DocumentRecord, FileStore, ValStatus};
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store file path.
    pub path: String,
    /// Number of documents.
    pub document_count: usize,
    /// Number of stored versions across all documents.
    pub version_count: usize,
    /// Documents whose working copy was never versioned or has changed.
    pub unversioned_edits: usize,
    /// Documents currently checked out.
    pub checked_out: usize,
    /// Per-document details.
    pub documents: Vec<DocumentSummary>,
}

/// Summary of a single document.
#[derive(Debug, Serialize)]
pub struct DocumentSummary {
    /// Document identifier.
    pub id: DocumentId,
    /// Document type.
    pub doc_type: String,
    /// Active status.
    pub active_status: ActiveStatus,
    /// Validation status of the working copy.
    pub val_status: ValStatus,
    /// Number of the last version.
    pub last_version: Option<u32>,
    /// Number of the last publishable version.
    pub last_publishable: Option<u32>,
    /// True if the working copy differs from the last version.
    pub cwd_differs: bool,
    /// Session holding the checkout.
    pub locked_by: Option<String>,
}

impl From<&DocumentRecord> for DocumentSummary {
    fn from(record: &DocumentRecord) -> Self {
        let info = record.version_info();
        Self {
            id: DocumentId::new(record.id),
            doc_type: record.doc_type.clone(),
            active_status: record.active_status,
            val_status: record.val_status,
            last_version: info.last_version,
            last_publishable: info.last_publishable,
            cwd_differs: info.cwd_differs,
            locked_by: record.locked_by.clone(),
        }
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_text_output(&result);
    }
    Ok(())
}

fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {:?}", path).into());
    }
    // Read-only use; the session never takes a checkout.
    let store = FileStore::open(path, "inspect", false)?;
    let records = store.records();

    Ok(InspectResult {
        path: path.display().to_string(),
        document_count: records.len(),
        version_count: records.iter().map(|r| r.versions.len()).sum(),
        unversioned_edits: records
            .iter()
            .filter(|r| r.version_info().cwd_needs_preserving())
            .count(),
        checked_out: records.iter().filter(|r| r.locked_by.is_some()).count(),
        documents: records.iter().map(DocumentSummary::from).collect(),
    })
}

fn print_text_output(result: &InspectResult) {
    println!("DocMod Store Inspection");
    println!("=======================");
    println!("Path: {}", result.path);
    println!();
    println!("Documents:         {}", result.document_count);
    println!("Versions:          {}", result.version_count);
    println!("Unversioned edits: {}", result.unversioned_edits);
    println!("Checked out:       {}", result.checked_out);

    if !result.documents.is_empty() {
        println!();
        println!(
            "  {:<13}  {:<12}  {:>2}  {:>4}  {:>4}  {:>4}  {:<5}  Locked by",
            "Document", "Type", "St", "Val", "Last", "Pub", "Edits"
        );
        for doc in &result.documents {
            let number = |n: Option<u32>| n.map_or_else(|| "-".to_string(), |n| n.to_string());
            let val = match doc.val_status {
                ValStatus::Unvalidated => "U",
                ValStatus::Valid => "V",
                ValStatus::Invalid => "I",
            };
            println!(
                "  {:<13}  {:<12}  {:>2}  {:>4}  {:>4}  {:>4}  {:<5}  {}",
                doc.id,
                doc.doc_type,
                doc.active_status.code(),
                val,
                number(doc.last_version),
                number(doc.last_publishable),
                if doc.cwd_differs { "yes" } else { "no" },
                doc.locked_by.as_deref().unwrap_or("-"),
            );
        }
    }
}
