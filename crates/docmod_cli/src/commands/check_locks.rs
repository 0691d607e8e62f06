//! Check-locks command implementation.

use docmod_core::{check_locks, DocumentSelector, LockReport};
use docmod_store::FileStore;
use std::path::Path;

/// Runs the check-locks command.
///
/// Fails if any selected document is checked out, so scripts can gate a
/// live run on it.
pub fn run<D: DocumentSelector + ?Sized>(
    path: &Path,
    selector: &D,
    session: &str,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = FileStore::open(path, session, false)?;
    let ids = selector.doc_ids()?;
    let report = check_locks(&store, &ids)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text_output(&report);
    }

    if report.is_clear() {
        Ok(())
    } else {
        Err(format!("{} of {} documents are checked out", report.locked.len(), report.total).into())
    }
}

fn print_text_output(report: &LockReport) {
    for doc in &report.locked {
        println!("{} ({}) is checked out by {}", doc.id, doc.doc_type, doc.session);
    }
    println!("Documents checked: {}", report.total);
    println!("  Locked:   {}", report.locked.len());
    println!("  Unlocked: {}", report.unlocked());
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmod_core::DocumentId;
    use tempfile::tempdir;

    #[test]
    fn clear_and_locked_selections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docs.json");
        {
            let store = FileStore::open(&path, "seed", true).unwrap();
            store.insert_document(1, "Term", "a").unwrap();
            store.insert_document(2, "Term", "b").unwrap();
            store.memory().lock_by(2, "alice");
            store.save().unwrap();
        }

        let free = vec![DocumentId::new(1)];
        assert!(run(&path, &free, "docmod", "text").is_ok());

        let both = vec![DocumentId::new(1), DocumentId::new(2)];
        let err = run(&path, &both, "docmod", "json").unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 documents are checked out");
    }
}
