//! Property-based test generators using proptest.
//!
//! Content is drawn from a tiny alphabet so that slots frequently share
//! content, which is where the aliasing and dedup rules matter.

use crate::fixtures::DocBuilder;
use docmod_core::DocumentId;
use docmod_store::DocumentRecord;
use proptest::prelude::*;

/// Strategy for generating document ids.
pub fn document_id_strategy() -> impl Strategy<Value = DocumentId> {
    any::<u64>().prop_map(DocumentId::new)
}

/// Strategy for generating short document content.
pub fn content_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ab]{0,4}").expect("Invalid regex")
}

/// A generated version history.
#[derive(Debug, Clone)]
pub struct History {
    /// Versions, oldest first, with their publishable flag.
    pub versions: Vec<(String, bool)>,
    /// Working copy, if it was edited after the last version.
    pub working_copy: Option<String>,
}

impl History {
    /// Builds the record for this history.
    pub fn record(&self, id: u64) -> DocumentRecord {
        let mut builder = DocBuilder::new(id);
        for (content, publishable) in &self.versions {
            builder = builder.version(content, *publishable);
        }
        if let Some(content) = &self.working_copy {
            builder = builder.working_copy(content);
        }
        builder.build()
    }
}

/// Strategy for generating version histories of up to five versions.
pub fn history_strategy() -> impl Strategy<Value = History> {
    (
        prop::collection::vec((content_strategy(), any::<bool>()), 0..5),
        prop::option::of(content_strategy()),
    )
        .prop_map(|(versions, working_copy)| History {
            versions,
            working_copy,
        })
}

/// Strategy for generating a batch of histories, one per document.
pub fn batch_strategy() -> impl Strategy<Value = Vec<History>> {
    prop::collection::vec(history_strategy(), 1..6)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn history_records_are_consistent(history in history_strategy()) {
            let record = history.record(1);
            prop_assert_eq!(record.versions.len(), history.versions.len());
            let info = record.version_info();
            if let Some(last) = record.versions.last() {
                prop_assert_eq!(info.cwd_differs, last.content != record.content);
            } else {
                prop_assert!(info.cwd_needs_preserving());
            }
        }
    }
}
