/*!
 * Identity Correspondence Table
 * Weak, injective association between privileged objects and their wrappers
 *
 * The tame axis is held through `Weak` handles and the feral axis through
 * non-owning ids, so the table is never the reason a pair stays alive.
 * Entries whose wrapper has died are evicted by an amortized sweep.
 * Injectivity in both directions is a hard invariant: a duplicate
 * association signals identity confusion, a security-relevant defect.
 */

use crate::core::errors::InternalFault;
use crate::core::types::{FeralId, WrapperId};
use crate::membrane::wrapper::{TameRef, Wrapper};
use ahash::RandomState;
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// Associations between sweeps.
const SWEEP_INTERVAL: usize = 256;

/// Sweep statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    pub live_entries: usize,
    pub swept_entries: u64,
}

#[derive(Default)]
pub struct CorrespondenceTable {
    // The wrapper id is stored next to the weak handle so a dead entry can
    // still be purged from the reverse map.
    confined_by_feral: HashMap<FeralId, (WrapperId, Weak<Wrapper>), RandomState>,
    feral_by_confined: HashMap<WrapperId, FeralId, RandomState>,
    since_sweep: usize,
    swept_entries: u64,
}

impl CorrespondenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new bidirectional entry. Fails when either side already has
    /// a live twin.
    pub fn associate(&mut self, feral: FeralId, confined: &TameRef) -> Result<(), InternalFault> {
        if let Some(&(stale, ref existing)) = self.confined_by_feral.get(&feral) {
            if existing.upgrade().is_some() {
                return Err(InternalFault::DuplicateAssociation {
                    object: feral,
                    detail: "privileged object already has a confined twin".to_string(),
                });
            }
            // The old twin died; drop both halves of the stale entry before
            // the slot is reused.
            self.confined_by_feral.remove(&feral);
            self.feral_by_confined.remove(&stale);
        }
        if self.feral_by_confined.contains_key(&confined.id()) {
            return Err(InternalFault::DuplicateAssociation {
                object: feral,
                detail: "confined wrapper already has a privileged twin".to_string(),
            });
        }
        self.insert(feral, confined);
        Ok(())
    }

    /// Force-overwrite without duplication checks, used when the same
    /// privileged object must be re-wrapped. The caller is responsible for
    /// fixing the privileged side so its classification can never change.
    pub fn reassociate(&mut self, feral: FeralId, confined: &TameRef) {
        if let Some((old, _)) = self.confined_by_feral.remove(&feral) {
            self.feral_by_confined.remove(&old);
        }
        if let Some(previous) = self.feral_by_confined.remove(&confined.id()) {
            self.confined_by_feral.remove(&previous);
        }
        self.insert(feral, confined);
    }

    fn insert(&mut self, feral: FeralId, confined: &TameRef) {
        self.confined_by_feral
            .insert(feral, (confined.id(), Rc::downgrade(confined)));
        self.feral_by_confined.insert(confined.id(), feral);
        self.since_sweep += 1;
        if self.since_sweep >= SWEEP_INTERVAL {
            self.sweep();
        }
    }

    /// O(1) weak lookup of the confined twin.
    pub fn lookup_confined(&self, feral: FeralId) -> Option<TameRef> {
        self.confined_by_feral.get(&feral)?.1.upgrade()
    }

    /// O(1) lookup of the privileged twin.
    pub fn lookup_privileged(&self, confined: &Wrapper) -> Option<FeralId> {
        self.feral_by_confined.get(&confined.id()).copied()
    }

    pub fn has_confined_twin(&self, feral: FeralId) -> bool {
        self.lookup_confined(feral).is_some()
    }

    pub fn has_privileged_twin(&self, confined: &Wrapper) -> bool {
        self.feral_by_confined.contains_key(&confined.id())
    }

    /// Evict entries whose wrapper has been collected. Returns the number of
    /// pairs removed.
    pub fn sweep(&mut self) -> usize {
        let before = self.confined_by_feral.len();
        self.confined_by_feral
            .retain(|_, (_, weak)| weak.upgrade().is_some());
        let removed = before - self.confined_by_feral.len();
        // Rebuild the reverse map from the surviving forward entries.
        self.feral_by_confined.clear();
        for (feral, (confined, _)) in &self.confined_by_feral {
            self.feral_by_confined.insert(*confined, *feral);
        }
        self.since_sweep = 0;
        self.swept_entries += removed as u64;
        trace!("correspondence sweep evicted {removed} dead entries");
        removed
    }

    pub fn stats(&self) -> TableStats {
        TableStats {
            live_entries: self.feral_by_confined.len(),
            swept_entries: self.swept_entries,
        }
    }

    pub fn len(&self) -> usize {
        self.feral_by_confined.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feral_by_confined.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membrane::wrapper::{RecordShape, Shape};
    use std::collections::BTreeMap;

    fn wrapper(id: WrapperId) -> TameRef {
        Wrapper::new(
            id,
            Shape::Record(RecordShape {
                properties: BTreeMap::new(),
                has_resolver: false,
            }),
        )
    }

    #[test]
    fn test_bidirectional_lookup() {
        let mut table = CorrespondenceTable::new();
        let w = wrapper(1);
        table.associate(10, &w).unwrap();
        assert!(Rc::ptr_eq(&table.lookup_confined(10).unwrap(), &w));
        assert_eq!(table.lookup_privileged(&w), Some(10));
        assert!(table.has_confined_twin(10));
        assert!(table.has_privileged_twin(&w));
        assert!(!table.has_confined_twin(11));
    }

    #[test]
    fn test_duplicate_feral_side_rejected() {
        let mut table = CorrespondenceTable::new();
        let w1 = wrapper(1);
        let w2 = wrapper(2);
        table.associate(10, &w1).unwrap();
        let err = table.associate(10, &w2).unwrap_err();
        assert!(matches!(
            err,
            InternalFault::DuplicateAssociation { object: 10, .. }
        ));
    }

    #[test]
    fn test_duplicate_confined_side_rejected() {
        let mut table = CorrespondenceTable::new();
        let w = wrapper(1);
        table.associate(10, &w).unwrap();
        let err = table.associate(11, &w).unwrap_err();
        assert!(matches!(
            err,
            InternalFault::DuplicateAssociation { object: 11, .. }
        ));
    }

    #[test]
    fn test_reassociate_overwrites_both_axes() {
        let mut table = CorrespondenceTable::new();
        let w1 = wrapper(1);
        let w2 = wrapper(2);
        table.associate(10, &w1).unwrap();
        table.reassociate(10, &w2);
        assert!(Rc::ptr_eq(&table.lookup_confined(10).unwrap(), &w2));
        assert_eq!(table.lookup_privileged(&w2), Some(10));
        assert_eq!(table.lookup_privileged(&w1), None);
    }

    #[test]
    fn test_dead_wrapper_frees_the_slot() {
        let mut table = CorrespondenceTable::new();
        let w1 = wrapper(1);
        table.associate(10, &w1).unwrap();
        drop(w1);
        assert!(!table.has_confined_twin(10));
        // A dead twin no longer blocks a fresh association.
        let w2 = wrapper(2);
        table.associate(10, &w2).unwrap();
        assert!(Rc::ptr_eq(&table.lookup_confined(10).unwrap(), &w2));
    }

    #[test]
    fn test_replacing_a_dead_twin_purges_the_stale_reverse_entry() {
        let mut table = CorrespondenceTable::new();
        let w1 = wrapper(1);
        table.associate(10, &w1).unwrap();
        drop(w1);
        let w2 = wrapper(2);
        table.associate(10, &w2).unwrap();
        // Exactly one pair remains; the dead wrapper's reverse entry is gone.
        assert_eq!(table.len(), 1);
        assert_eq!(table.stats().live_entries, 1);
        assert_eq!(table.feral_by_confined.get(&1), None);
    }

    #[test]
    fn test_reassociate_releases_the_wrapper_from_its_old_feral_twin() {
        let mut table = CorrespondenceTable::new();
        let w = wrapper(1);
        table.associate(10, &w).unwrap();
        table.reassociate(11, &w);
        assert_eq!(table.lookup_privileged(&w), Some(11));
        assert!(table.lookup_confined(10).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_sweep_evicts_dead_entries() {
        let mut table = CorrespondenceTable::new();
        let keep = wrapper(0);
        table.associate(0, &keep).unwrap();
        for i in 1..=8 {
            let w = wrapper(i);
            table.associate(i, &w).unwrap();
            drop(w);
        }
        let removed = table.sweep();
        assert_eq!(removed, 8);
        assert_eq!(table.len(), 1);
        assert_eq!(table.stats().swept_entries, 8);
        assert!(table.has_confined_twin(0));
    }
}
