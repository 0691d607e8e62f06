//! Property tests over generated version histories.

use docmod_core::{DocumentId, JobConfig, JobRunner, Slot};
use docmod_store::DocumentRecord;
use docmod_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::HashSet;

fn rewrite(content: &str) -> String {
    content.replace('a', "b")
}

fn records(histories: &[History]) -> Vec<DocumentRecord> {
    histories
        .iter()
        .zip(1..)
        .map(|(history, id)| history.record(id))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn live_run_keeps_history_consistent(histories in batch_strategy()) {
        let before = records(&histories);
        let store = memory_store(before.clone());
        let transform = CountingTransform::new(Replace::new("a", "b"));
        let config = JobConfig::live().session(SESSION);
        let selection = ids(&(1..=before.len() as u64).collect::<Vec<_>>());
        let mut runner = JobRunner::new(&store, &transform, &config);
        let report = runner.run(&selection).unwrap();

        prop_assert_eq!(report.stats().errors, 0);

        let mut seen = HashSet::new();
        for call in transform.calls() {
            prop_assert!(seen.insert(call), "slot transformed twice: {:?}", call);
        }

        for original in &before {
            let after = store.record(original.id).unwrap();
            let writes = store.persisted_for(original.id);

            // The working copy always ends up transformed.
            prop_assert_eq!(&after.content, &rewrite(&original.content));
            prop_assert!(after.locked_by.is_none());

            // Versions are only ever appended.
            prop_assert_eq!(&after.versions[..original.versions.len()], &original.versions[..]);

            if let Some(lpv) = original.last_publishable() {
                let latest = after.last_publishable().unwrap();
                prop_assert_eq!(&latest.content, &rewrite(&lpv.content));
            }

            // Unversioned edits are saved first, and only when something
            // else is saved too.
            if original.version_info().cwd_needs_preserving() && !writes.is_empty() {
                prop_assert!(writes.len() >= 2);
                prop_assert!(writes[0].create_version && !writes[0].publishable);
                prop_assert!(!writes[0].validate);
                prop_assert_eq!(&writes[0].content, &original.content);
            }

            let disposition = report.disposition(DocumentId::new(original.id)).unwrap();
            prop_assert_eq!(disposition.any_changed(), !writes.is_empty());
        }
    }

    #[test]
    fn second_run_is_a_no_op(histories in batch_strategy()) {
        let store = memory_store(records(&histories));
        let transform = Replace::new("a", "b");
        let config = JobConfig::live().session(SESSION);
        let selection = ids(&(1..=histories.len() as u64).collect::<Vec<_>>());

        JobRunner::new(&store, &transform, &config).run(&selection).unwrap();
        let written = store.persisted().len();
        let report = JobRunner::new(&store, &transform, &config).run(&selection).unwrap();

        prop_assert_eq!(store.persisted().len(), written);
        prop_assert_eq!(report.stats().saved, 0);
    }

    #[test]
    fn test_mode_leaves_store_untouched(histories in batch_strategy()) {
        let before = records(&histories);
        let store = memory_store(before.clone());
        let out = tempfile::tempdir().unwrap();
        let transform = Replace::new("a", "b");
        let config = JobConfig::test(out.path()).session(SESSION);
        let selection = ids(&(1..=before.len() as u64).collect::<Vec<_>>());

        let report = JobRunner::new(&store, &transform, &config).run(&selection).unwrap();

        prop_assert!(store.persisted().is_empty());
        prop_assert!(store.unlocked().is_empty());
        prop_assert_eq!(store.records(), before);
        prop_assert_eq!(report.stats().processed, histories.len() as u64);
    }

    #[test]
    fn working_copy_is_transformed_first(history in history_strategy()) {
        let store = memory_store(vec![history.record(1)]);
        let transform = CountingTransform::new(Identity);
        let config = JobConfig::live().session(SESSION);
        JobRunner::new(&store, &transform, &config).run(&ids(&[1])).unwrap();

        let calls = transform.calls_for(DocumentId::new(1));
        prop_assert_eq!(calls.first(), Some(&Slot::CurrentWorkingDocument));
        prop_assert!(store.persisted().is_empty());
    }
}
