//! Slot binding: which snapshot each slot refers to.
//!
//! Distinct snapshots live in a small arena. Each slot either owns one of
//! them, aliases another slot, or is absent. Aliased slots resolve to the same
//! arena entry, so a transform result and its validation outcome are shared
//! rather than copied.

use crate::types::{DocumentId, Slot, TransformedSnapshot};
use docmod_store::{ActiveStatus, VersionInfo};
use std::fmt;

/// How a slot is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotEntry {
    /// The slot owns the arena entry at this index.
    Distinct(usize),
    /// The slot shares the snapshot of another slot.
    Alias(Slot),
    /// Nothing was loaded for the slot.
    Absent,
}

/// A regression found while loading, with every slot it affects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regression {
    /// Slots sharing the regressed snapshot.
    pub slots: Vec<Slot>,
    /// New validation messages.
    pub messages: Vec<String>,
}

/// The loaded and transformed state of one document.
#[derive(Debug, Clone)]
pub struct SlotBinding {
    id: DocumentId,
    versions: VersionInfo,
    active_status: ActiveStatus,
    snapshots: Vec<TransformedSnapshot>,
    entries: [SlotEntry; 3],
    pending_preservation: bool,
}

impl SlotBinding {
    /// Creates a binding from the transformed working document.
    pub fn new(
        id: DocumentId,
        versions: VersionInfo,
        active_status: ActiveStatus,
        cwd: TransformedSnapshot,
    ) -> Self {
        let mut entries = [SlotEntry::Absent; 3];
        entries[Slot::CurrentWorkingDocument.index()] = SlotEntry::Distinct(0);
        Self {
            id,
            versions,
            active_status,
            snapshots: vec![cwd],
            entries,
            pending_preservation: versions.cwd_needs_preserving(),
        }
    }

    /// Binds a slot to its own snapshot.
    pub fn bind_distinct(&mut self, slot: Slot, snapshot: TransformedSnapshot) {
        self.snapshots.push(snapshot);
        self.entries[slot.index()] = SlotEntry::Distinct(self.snapshots.len() - 1);
    }

    /// Binds a slot to whatever `target` resolves to.
    ///
    /// Aliasing an absent slot leaves `slot` absent.
    pub fn bind_alias(&mut self, slot: Slot, target: Slot) {
        self.entries[slot.index()] = if self.resolve(target).is_some() {
            SlotEntry::Alias(target)
        } else {
            SlotEntry::Absent
        };
    }

    /// Returns the document id.
    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// Returns the version history triple read before checkout.
    pub fn versions(&self) -> VersionInfo {
        self.versions
    }

    /// Returns the active status read before checkout.
    pub fn active_status(&self) -> ActiveStatus {
        self.active_status
    }

    /// Returns true if the original working copy must be preserved before
    /// the first write.
    pub fn pending_preservation(&self) -> bool {
        self.pending_preservation
    }

    /// Returns the entry for a slot.
    pub fn entry(&self, slot: Slot) -> SlotEntry {
        self.entries[slot.index()]
    }

    /// Returns true if the slot owns its snapshot.
    pub fn is_distinct(&self, slot: Slot) -> bool {
        matches!(self.entry(slot), SlotEntry::Distinct(_))
    }

    /// Returns the working document snapshot.
    pub fn cwd(&self) -> &TransformedSnapshot {
        &self.snapshots[0]
    }

    /// Returns the snapshot a slot resolves to.
    pub fn get(&self, slot: Slot) -> Option<&TransformedSnapshot> {
        self.resolve(slot).map(|index| &self.snapshots[index])
    }

    /// Returns every slot resolving to the same snapshot as `slot`,
    /// including `slot` itself.
    pub fn sharing(&self, slot: Slot) -> Vec<Slot> {
        match self.resolve(slot) {
            Some(index) => Slot::ALL
                .into_iter()
                .filter(|other| self.resolve(*other) == Some(index))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Returns the number of distinct snapshots, which is also the number of
    /// transforms applied.
    pub fn distinct_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Returns one entry per distinct snapshot that regressed.
    pub fn regressions(&self) -> Vec<Regression> {
        Slot::ALL
            .into_iter()
            .filter_map(|slot| match self.entry(slot) {
                SlotEntry::Distinct(index) => {
                    let snapshot = &self.snapshots[index];
                    snapshot.outcome.is_regression().then(|| Regression {
                        slots: self.sharing(slot),
                        messages: snapshot.outcome.messages().to_vec(),
                    })
                }
                _ => None,
            })
            .collect()
    }

    fn resolve(&self, slot: Slot) -> Option<usize> {
        let mut current = slot;
        // At most two hops: lastp -> lastv -> cwd.
        for _ in 0..Slot::ALL.len() {
            match self.entries[current.index()] {
                SlotEntry::Distinct(index) => return Some(index),
                SlotEntry::Alias(target) => current = target,
                SlotEntry::Absent => return None,
            }
        }
        None
    }
}

impl fmt::Display for SlotBinding {
    /// Formats as `DOC0000000042 (BLOCKED) [pub:3/last:5/cwd:unversioned]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        if self.active_status != ActiveStatus::Active {
            f.write_str(" (BLOCKED)")?;
        }
        f.write_str(" [")?;
        if let Some(number) = self.versions.last_publishable {
            write!(f, "pub:{number}")?;
        }
        f.write_str("/")?;
        if let Some(number) = self.versions.last_version {
            write!(f, "last:{number}")?;
        }
        match self.versions.last_version {
            Some(number) if !self.versions.cwd_differs => write!(f, "/cwd:{number}]"),
            _ => f.write_str("/cwd:unversioned]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Snapshot;
    use docmod_store::{ValStatus, ValidationOutcome};

    fn transformed(slot: Slot, version: Option<u32>, outcome: ValidationOutcome) -> TransformedSnapshot {
        TransformedSnapshot {
            snapshot: Snapshot {
                id: DocumentId::new(42),
                slot,
                content: format!("{slot}"),
                doc_type: "Summary".into(),
                version,
                publishable: slot == Slot::LastPublishableVersion,
                val_status: ValStatus::Valid,
            },
            transformed: format!("{slot}*"),
            outcome,
        }
    }

    fn versions(last: u32, lastp: u32, differs: bool) -> VersionInfo {
        VersionInfo {
            last_version: Some(last),
            last_publishable: Some(lastp),
            cwd_differs: differs,
        }
    }

    fn cwd_binding(info: VersionInfo) -> SlotBinding {
        SlotBinding::new(
            DocumentId::new(42),
            info,
            ActiveStatus::Active,
            transformed(Slot::CurrentWorkingDocument, None, ValidationOutcome::StillValid),
        )
    }

    #[test]
    fn aliases_resolve_through_chain() {
        let mut binding = cwd_binding(versions(2, 2, false));
        binding.bind_alias(Slot::LastVersion, Slot::CurrentWorkingDocument);
        binding.bind_alias(Slot::LastPublishableVersion, Slot::LastVersion);

        assert_eq!(binding.distinct_count(), 1);
        assert_eq!(
            binding.get(Slot::LastPublishableVersion),
            Some(binding.cwd())
        );
        assert_eq!(binding.sharing(Slot::LastVersion), Slot::ALL.to_vec());
        assert!(!binding.pending_preservation());
    }

    #[test]
    fn alias_of_absent_slot_is_absent() {
        let mut binding = cwd_binding(versions(2, 2, true));
        binding.bind_alias(Slot::LastPublishableVersion, Slot::LastVersion);
        assert_eq!(binding.entry(Slot::LastPublishableVersion), SlotEntry::Absent);
        assert!(binding.get(Slot::LastPublishableVersion).is_none());
        assert!(binding.sharing(Slot::LastPublishableVersion).is_empty());
    }

    #[test]
    fn distinct_slots_do_not_share() {
        let mut binding = cwd_binding(versions(3, 1, true));
        binding.bind_distinct(
            Slot::LastVersion,
            transformed(Slot::LastVersion, Some(3), ValidationOutcome::StillValid),
        );
        binding.bind_distinct(
            Slot::LastPublishableVersion,
            transformed(Slot::LastPublishableVersion, Some(1), ValidationOutcome::StillValid),
        );

        assert_eq!(binding.distinct_count(), 3);
        assert_eq!(binding.sharing(Slot::LastVersion), vec![Slot::LastVersion]);
        assert!(binding.pending_preservation());
    }

    #[test]
    fn regressions_name_all_sharing_slots() {
        let mut binding = cwd_binding(versions(3, 3, true));
        binding.bind_distinct(
            Slot::LastVersion,
            transformed(
                Slot::LastVersion,
                Some(3),
                ValidationOutcome::NowInvalid(vec!["missing title".into()]),
            ),
        );
        binding.bind_alias(Slot::LastPublishableVersion, Slot::LastVersion);

        let regressions = binding.regressions();
        assert_eq!(regressions.len(), 1);
        assert_eq!(
            regressions[0].slots,
            vec![Slot::LastVersion, Slot::LastPublishableVersion]
        );
        assert_eq!(regressions[0].messages, vec!["missing title".to_string()]);
    }

    #[test]
    fn display_format() {
        let binding = cwd_binding(versions(5, 3, true));
        assert_eq!(
            binding.to_string(),
            "DOC0000000042 [pub:3/last:5/cwd:unversioned]"
        );

        let blocked = SlotBinding::new(
            DocumentId::new(42),
            versions(5, 5, false),
            ActiveStatus::Inactive,
            binding.cwd().clone(),
        );
        assert_eq!(
            blocked.to_string(),
            "DOC0000000042 (BLOCKED) [pub:5/last:5/cwd:5]"
        );

        let fresh = SlotBinding::new(
            DocumentId::new(7),
            VersionInfo::default(),
            ActiveStatus::Active,
            binding.cwd().clone(),
        );
        assert_eq!(fresh.to_string(), "DOC0000000007 [//cwd:unversioned]");
    }
}
