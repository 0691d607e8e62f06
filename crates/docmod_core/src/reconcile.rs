//! Write planning and application.
//!
//! Planning decides, for one loaded document, which saves to issue and in
//! what order:
//!
//! 1. Preserve the untransformed working copy as a non-publishable version,
//!    when it would otherwise be lost and the document changes at all
//! 2. New publishable version from the transformed last publishable version
//! 3. New non-publishable version from the transformed last version
//! 4. New working copy, if it differs from whatever was written last
//!
//! A slot aliased to an already-written slot is never written twice. A last
//! version whose transformed content equals the previous write is credited
//! to that write instead of being saved again. A last version whose
//! transformed content is already the working copy is not saved either; this
//! keeps a second pass over a preserved document from saving the working
//! copy again as a version.
//!
//! When halting on validation regressions, steps 2-4 are withheld for a
//! document with any regressed slot. Preservation still happens.

use crate::binding::{Regression, SlotBinding};
use crate::config::JobConfig;
use crate::error::{JobError, JobResult};
use crate::types::{Disposition, DocumentId, SaveKind, Slot, WriteRequest};
use docmod_store::{DocumentStore, PersistRequest};
use tracing::{debug, info, warn};

/// The planned writes for one document.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    id: DocumentId,
    writes: Vec<WriteRequest>,
    withheld: Vec<WriteRequest>,
    regressions: Vec<Regression>,
}

impl Reconciliation {
    /// Returns the document id.
    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// Writes to issue, in order.
    pub fn writes(&self) -> &[WriteRequest] {
        &self.writes
    }

    /// Writes blocked by the validation halt gate.
    pub fn withheld(&self) -> &[WriteRequest] {
        &self.withheld
    }

    /// Regressions found in the loaded slots.
    pub fn regressions(&self) -> &[Regression] {
        &self.regressions
    }

    /// Returns true if the halt gate withheld any write.
    pub fn is_halted(&self) -> bool {
        !self.withheld.is_empty()
    }

    /// Returns true if the document needs no saves at all.
    pub fn is_noop(&self) -> bool {
        self.writes.is_empty() && self.withheld.is_empty()
    }

    /// Returns all regression messages as one error, if there are any.
    pub fn regression_error(&self) -> Option<JobError> {
        if self.regressions.is_empty() {
            return None;
        }
        Some(JobError::ValidationRegression {
            id: self.id,
            messages: self
                .regressions
                .iter()
                .flat_map(|r| r.messages.iter().cloned())
                .collect(),
        })
    }

    /// Returns the disposition this plan produces if every write succeeds.
    pub fn projected_disposition(&self) -> Disposition {
        let mut disposition = Disposition::new(self.id);
        self.record_withheld(&mut disposition);
        for write in &self.writes {
            for slot in &write.covers {
                disposition.mark(*slot);
            }
        }
        disposition
    }

    /// Issues the writes in order.
    ///
    /// Changed flags are set as each write lands, and every kind saved is
    /// pushed onto `saved`, so both stay accurate if a later write fails.
    ///
    /// # Errors
    ///
    /// Stops at the first failing write and returns its error.
    pub fn apply<S: DocumentStore + ?Sized>(
        &self,
        store: &S,
        disposition: &mut Disposition,
        saved: &mut Vec<SaveKind>,
    ) -> JobResult<()> {
        self.record_withheld(disposition);
        for write in &self.writes {
            let request = &write.request;
            info!(
                doc = %self.id,
                ver = request.create_version,
                publishable = request.publishable,
                val = request.validate,
                "save {}",
                write.kind
            );
            let receipt = store.persist(request)?;
            for warning in receipt.warnings {
                warn!(doc = %self.id, "{warning}");
                disposition.warnings.push(warning);
            }
            for slot in &write.covers {
                disposition.mark(*slot);
            }
            saved.push(write.kind);
        }
        Ok(())
    }

    fn record_withheld(&self, disposition: &mut Disposition) {
        for write in &self.withheld {
            disposition
                .warnings
                .push(format!("withheld {}: change invalidates document", write.kind));
        }
    }
}

/// Plans the writes for loaded documents.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler<'a> {
    config: &'a JobConfig,
}

impl<'a> Reconciler<'a> {
    /// Creates a reconciler.
    pub fn new(config: &'a JobConfig) -> Self {
        Self { config }
    }

    /// Plans the writes for one document.
    ///
    /// Reads the store only to decide whether non-publishable saves are
    /// validated.
    pub fn reconcile<S: DocumentStore + ?Sized>(
        &self,
        binding: &SlotBinding,
        store: &S,
    ) -> JobResult<Reconciliation> {
        let id = binding.id();
        let cwd = binding.cwd();
        let mut ever_validated = None;
        let mut candidates: Vec<WriteRequest> = Vec::new();
        let mut covered: Vec<Slot> = Vec::new();
        let mut last_written: Option<usize> = None;

        for slot in [Slot::LastPublishableVersion, Slot::LastVersion] {
            if covered.contains(&slot) {
                continue;
            }
            let Some(snapshot) = binding.get(slot) else {
                continue;
            };
            if !snapshot.changed() {
                continue;
            }
            let sharing = binding.sharing(slot);

            if let Some(index) = last_written {
                let previous = &mut candidates[index];
                if previous.request.content == snapshot.transformed {
                    debug!(doc = %id, slot = %slot, "same content as {}, not saved again", previous.kind);
                    for other in &sharing {
                        if !previous.covers.contains(other) {
                            previous.covers.push(*other);
                        }
                    }
                    previous.covers.sort();
                    covered.extend(sharing);
                    continue;
                }
            }
            // Also fires on a first pass whose working copy already holds the
            // change: the last version then stays as stored and is not flagged.
            if slot == Slot::LastVersion
                && !sharing.contains(&Slot::CurrentWorkingDocument)
                && snapshot.transformed == cwd.original()
            {
                debug!(doc = %id, "working copy already holds the changed last version");
                covered.extend(sharing);
                continue;
            }

            let request = match slot {
                Slot::LastPublishableVersion => self
                    .request(id, &snapshot.transformed)
                    .with_version(true)
                    .with_publishable(true)
                    .with_validation(true),
                _ => self
                    .request(id, &snapshot.transformed)
                    .with_version(true)
                    .with_validation(self.validate_flag(binding, store, &mut ever_validated)?),
            };
            let kind = match slot {
                Slot::LastPublishableVersion => SaveKind::NewPublishable,
                _ => SaveKind::NewVersion,
            };
            let mut covers = sharing.clone();
            if !covers.contains(&Slot::CurrentWorkingDocument) {
                covers.push(Slot::CurrentWorkingDocument);
            }
            covers.sort();

            candidates.push(WriteRequest {
                kind,
                source: slot,
                covers,
                request,
            });
            covered.extend(sharing);
            last_written = Some(candidates.len() - 1);
        }

        let baseline = match last_written {
            Some(index) => candidates[index].request.content.as_str(),
            None => cwd.original(),
        };
        if cwd.transformed != baseline {
            let request = self
                .request(id, &cwd.transformed)
                .with_validation(self.validate_flag(binding, store, &mut ever_validated)?);
            candidates.push(WriteRequest {
                kind: SaveKind::NewCwd,
                source: Slot::CurrentWorkingDocument,
                covers: vec![Slot::CurrentWorkingDocument],
                request,
            });
        }

        let regressions = binding.regressions();
        for regression in &regressions {
            let slots = regression
                .slots
                .iter()
                .map(|s| s.label())
                .collect::<Vec<_>>()
                .join(",");
            for message in &regression.messages {
                warn!(doc = %id, slots = %slots, "validation regression: {message}");
            }
        }
        let halted = self.config.halts_on_regression() && !regressions.is_empty();

        let mut writes = Vec::new();
        if binding.pending_preservation() && !candidates.is_empty() {
            let request = self
                .request(id, cwd.original())
                .with_version(true)
                .with_publishable(false)
                .with_validation(false);
            writes.push(WriteRequest {
                kind: SaveKind::PreserveCwd,
                source: Slot::CurrentWorkingDocument,
                covers: Vec::new(),
                request,
            });
        }

        let withheld = if halted {
            for write in &candidates {
                warn!(doc = %id, "{} for {id} made invalid by change not stored", write.kind);
            }
            candidates
        } else {
            writes.extend(candidates);
            Vec::new()
        };

        Ok(Reconciliation {
            id,
            writes,
            withheld,
            regressions,
        })
    }

    fn request(&self, id: DocumentId, content: &str) -> PersistRequest {
        PersistRequest::new(id.as_u64(), content)
            .with_reason(self.config.reason.clone())
            .with_active_status(self.config.forced_active_status)
    }

    fn validate_flag<S: DocumentStore + ?Sized>(
        &self,
        binding: &SlotBinding,
        store: &S,
        cache: &mut Option<bool>,
    ) -> JobResult<bool> {
        if let Some(value) = *cache {
            return Ok(value);
        }
        // Validation strips editor hints, so never validate a document for
        // the first time unless a publishable version exists.
        let value = binding.get(Slot::LastPublishableVersion).is_some()
            || store.ever_validated(binding.id().as_u64())?;
        *cache = Some(value);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Snapshot, TransformedSnapshot};
    use docmod_store::{ActiveStatus, InMemoryStore, ValStatus, ValidationOutcome, VersionInfo};

    const ID: u64 = 42;

    fn snapshot(slot: Slot, original: &str, transformed: &str) -> TransformedSnapshot {
        TransformedSnapshot {
            snapshot: Snapshot {
                id: DocumentId::new(ID),
                slot,
                content: original.into(),
                doc_type: "Summary".into(),
                version: None,
                publishable: false,
                val_status: ValStatus::Valid,
            },
            transformed: transformed.into(),
            outcome: ValidationOutcome::StillValid,
        }
    }

    fn binding(info: VersionInfo, cwd: (&str, &str)) -> SlotBinding {
        SlotBinding::new(
            DocumentId::new(ID),
            info,
            ActiveStatus::Active,
            snapshot(Slot::CurrentWorkingDocument, cwd.0, cwd.1),
        )
    }

    fn info(last: Option<u32>, lastp: Option<u32>, differs: bool) -> VersionInfo {
        VersionInfo {
            last_version: last,
            last_publishable: lastp,
            cwd_differs: differs,
        }
    }

    fn kinds(plan: &Reconciliation) -> Vec<SaveKind> {
        plan.writes().iter().map(|w| w.kind).collect()
    }

    fn store() -> InMemoryStore {
        let store = InMemoryStore::new("job");
        store.insert_document(ID, "Summary", "w");
        store
    }

    #[test]
    fn all_identical_slots_write_once() {
        let mut b = binding(info(Some(3), Some(3), false), ("a", "b"));
        b.bind_alias(Slot::LastVersion, Slot::CurrentWorkingDocument);
        b.bind_alias(Slot::LastPublishableVersion, Slot::LastVersion);

        let config = JobConfig::live();
        let plan = Reconciler::new(&config).reconcile(&b, &store()).unwrap();

        assert_eq!(kinds(&plan), vec![SaveKind::NewPublishable]);
        assert_eq!(plan.writes()[0].covers, Slot::ALL.to_vec());
        let disposition = plan.projected_disposition();
        assert!(disposition.cwd_changed);
        assert!(disposition.last_version_changed);
        assert!(disposition.last_publishable_changed);
    }

    #[test]
    fn unchanged_document_plans_nothing() {
        let b = binding(info(None, None, false), ("a", "a"));
        let config = JobConfig::live();
        let plan = Reconciler::new(&config).reconcile(&b, &store()).unwrap();

        assert!(plan.is_noop());
        assert!(b.pending_preservation());
    }

    #[test]
    fn preservation_comes_first() {
        let mut b = binding(info(Some(2), Some(1), true), ("w", "W"));
        b.bind_distinct(Slot::LastVersion, snapshot(Slot::LastVersion, "v", "V"));
        b.bind_distinct(
            Slot::LastPublishableVersion,
            snapshot(Slot::LastPublishableVersion, "p", "P"),
        );

        let config = JobConfig::live();
        let plan = Reconciler::new(&config).reconcile(&b, &store()).unwrap();

        assert_eq!(
            kinds(&plan),
            vec![
                SaveKind::PreserveCwd,
                SaveKind::NewPublishable,
                SaveKind::NewVersion,
                SaveKind::NewCwd
            ]
        );
        let preserve = &plan.writes()[0].request;
        assert_eq!(preserve.content, "w");
        assert!(preserve.create_version);
        assert!(!preserve.publishable);
        assert!(!preserve.validate);
    }

    #[test]
    fn cwd_restored_after_version_write() {
        // Only the publishable version changes; saving it replaces the
        // working copy, which must then be written back.
        let mut b = binding(info(Some(2), Some(1), false), ("v", "v"));
        b.bind_alias(Slot::LastVersion, Slot::CurrentWorkingDocument);
        b.bind_distinct(
            Slot::LastPublishableVersion,
            snapshot(Slot::LastPublishableVersion, "p", "P"),
        );

        let config = JobConfig::live();
        let plan = Reconciler::new(&config).reconcile(&b, &store()).unwrap();

        assert_eq!(kinds(&plan), vec![SaveKind::NewPublishable, SaveKind::NewCwd]);
        assert_eq!(plan.writes()[1].request.content, "v");
    }

    #[test]
    fn last_version_with_same_content_is_credited() {
        let mut b = binding(info(Some(2), Some(1), true), ("w", "X"));
        b.bind_distinct(Slot::LastVersion, snapshot(Slot::LastVersion, "v", "X"));
        b.bind_distinct(
            Slot::LastPublishableVersion,
            snapshot(Slot::LastPublishableVersion, "p", "X"),
        );

        let config = JobConfig::live();
        let plan = Reconciler::new(&config).reconcile(&b, &store()).unwrap();

        assert_eq!(kinds(&plan), vec![SaveKind::PreserveCwd, SaveKind::NewPublishable]);
        assert_eq!(plan.writes()[1].covers, Slot::ALL.to_vec());
    }

    #[test]
    fn last_version_already_in_working_copy_is_skipped() {
        // State after a pass that preserved "w" and wrote "W" as the new
        // working copy.
        let mut b = binding(info(Some(2), Some(1), true), ("W", "W"));
        b.bind_distinct(Slot::LastVersion, snapshot(Slot::LastVersion, "w", "W"));
        b.bind_distinct(
            Slot::LastPublishableVersion,
            snapshot(Slot::LastPublishableVersion, "P", "P"),
        );

        let config = JobConfig::live();
        let plan = Reconciler::new(&config).reconcile(&b, &store()).unwrap();
        assert!(plan.is_noop());
    }

    #[test]
    fn first_pass_keeps_last_version_when_working_copy_has_the_change() {
        // The working copy was edited by hand to what the transform produces
        // from the last version.
        let mut b = binding(info(Some(2), None, true), ("b", "b"));
        b.bind_distinct(Slot::LastVersion, snapshot(Slot::LastVersion, "a", "b"));

        let config = JobConfig::live();
        let plan = Reconciler::new(&config).reconcile(&b, &store()).unwrap();

        assert!(plan.is_noop());
        let disposition = plan.projected_disposition();
        assert!(!disposition.last_version_changed);
        assert!(!disposition.any_changed());
    }

    #[test]
    fn halt_withholds_new_content_but_preserves() {
        let mut cwd = snapshot(Slot::CurrentWorkingDocument, "w", "W");
        cwd.outcome = ValidationOutcome::NowInvalid(vec!["bad".into()]);
        let mut b = SlotBinding::new(
            DocumentId::new(ID),
            info(Some(1), Some(1), true),
            ActiveStatus::Active,
            cwd,
        );
        b.bind_distinct(Slot::LastVersion, snapshot(Slot::LastVersion, "v", "V"));
        b.bind_alias(Slot::LastPublishableVersion, Slot::LastVersion);

        let config = JobConfig::live().halt_on_validation_regression(true);
        let plan = Reconciler::new(&config).reconcile(&b, &store()).unwrap();

        assert_eq!(kinds(&plan), vec![SaveKind::PreserveCwd]);
        assert!(plan.is_halted());
        assert_eq!(plan.withheld().len(), 2);
        assert!(matches!(
            plan.regression_error(),
            Some(JobError::ValidationRegression { .. })
        ));

        let disposition = plan.projected_disposition();
        assert!(!disposition.any_changed());
        assert_eq!(disposition.warnings.len(), 2);
    }

    #[test]
    fn regression_without_halt_still_writes() {
        let mut cwd = snapshot(Slot::CurrentWorkingDocument, "w", "W");
        cwd.outcome = ValidationOutcome::NowInvalid(vec!["bad".into()]);
        let b = SlotBinding::new(
            DocumentId::new(ID),
            info(Some(1), None, false),
            ActiveStatus::Active,
            cwd,
        );

        let config = JobConfig::live();
        let plan = Reconciler::new(&config).reconcile(&b, &store()).unwrap();
        assert_eq!(kinds(&plan), vec![SaveKind::NewCwd]);
        assert!(!plan.is_halted());
        assert_eq!(plan.regressions().len(), 1);
    }

    #[test]
    fn ever_validated_rule() {
        let s = store();
        let b = binding(info(Some(1), None, false), ("v", "V"));
        let config = JobConfig::live();

        let plan = Reconciler::new(&config).reconcile(&b, &s).unwrap();
        assert!(!plan.writes()[0].request.validate);

        s.set_val_status(ID, ValStatus::Invalid);
        let plan = Reconciler::new(&config).reconcile(&b, &s).unwrap();
        assert!(plan.writes()[0].request.validate);
    }

    #[test]
    fn reason_and_status_on_every_write() {
        let b = binding(info(None, None, false), ("w", "W"));
        let config = JobConfig::live()
            .reason("fix links")
            .forced_active_status(ActiveStatus::Inactive);
        let plan = Reconciler::new(&config).reconcile(&b, &store()).unwrap();

        assert_eq!(kinds(&plan), vec![SaveKind::PreserveCwd, SaveKind::NewCwd]);
        for write in plan.writes() {
            assert_eq!(write.request.reason, "fix links");
            assert_eq!(write.request.active_status, Some(ActiveStatus::Inactive));
        }
    }

    #[test]
    fn apply_marks_flags_as_writes_land() {
        let s = store();
        s.checkout(ID, true).unwrap();

        let b = binding(info(None, None, false), ("w", "W"));
        let config = JobConfig::live();
        let plan = Reconciler::new(&config).reconcile(&b, &s).unwrap();

        let mut disposition = Disposition::new(DocumentId::new(ID));
        let mut saved = Vec::new();
        plan.apply(&s, &mut disposition, &mut saved).unwrap();

        assert_eq!(saved, vec![SaveKind::PreserveCwd, SaveKind::NewCwd]);
        assert!(disposition.cwd_changed);
        let record = s.record(ID).unwrap();
        assert_eq!(record.content, "W");
        assert_eq!(record.versions.len(), 1);
        assert_eq!(record.versions[0].content, "w");
    }

    #[test]
    fn apply_stops_at_first_failure() {
        let s = store();
        // Not checked out, so every persist is rejected.
        let b = binding(info(None, None, false), ("w", "W"));
        let config = JobConfig::live();
        let plan = Reconciler::new(&config).reconcile(&b, &s).unwrap();

        let mut disposition = Disposition::new(DocumentId::new(ID));
        let mut saved = Vec::new();
        assert!(plan.apply(&s, &mut disposition, &mut saved).is_err());
        assert!(saved.is_empty());
        assert!(!disposition.any_changed());
    }
}
