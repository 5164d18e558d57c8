//! The visible permutation: sorted position to key slot.

use std::ops::Range;

use crate::algo::RunLengths;
use crate::core::SlotId;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct PositionIndex {
    slots: Vec<SlotId>,
}

impl PositionIndex {
    /// Every slot at its own position: the source order.
    pub(crate) fn identity(len: usize) -> Self {
        Self {
            slots: (0..len).map(SlotId::new).collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline(always)]
    pub(crate) fn get(&self, position: usize) -> SlotId {
        self.slots[position]
    }

    #[cfg(test)]
    pub(crate) fn as_slice(&self) -> &[SlotId] {
        &self.slots
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [SlotId] {
        &mut self.slots
    }

    /// Smallest range of positions not holding their own slot, if any.
    pub(crate) fn changed_from_identity(&self) -> Option<Range<usize>> {
        let start = self
            .slots
            .iter()
            .enumerate()
            .position(|(i, slot)| slot.index() != i)?;
        let end = self
            .slots
            .iter()
            .enumerate()
            .rposition(|(i, slot)| slot.index() != i)
            .map_or(start, |last| last + 1);
        Some(start..end)
    }

    /// Mirrors a source splice.
    ///
    /// Entries of removed slots are dropped and the gaps closed, later slots are
    /// renumbered, and one entry per added slot is appended at the end in source
    /// order. `runs` holds the sorted runs at the front of the index (any positions
    /// past them are unsorted); it is rewritten to the runs left after the removal.
    /// Every run stays sorted because dropping entries from a sorted sequence keeps it
    /// sorted; runs that lose every entry disappear.
    ///
    /// Returns how many positions at the start and at the end of the surviving
    /// entries kept their place, not counting the appended ones.
    pub(crate) fn splice(
        &mut self,
        runs: &mut RunLengths,
        position: usize,
        removed: usize,
        added: usize,
    ) -> (usize, usize) {
        let len = self.slots.len();
        let removed_end = position + removed;
        let mut unmodified_start = len;
        let mut unmodified_end = len;

        let mut kept_runs = RunLengths::new();
        let mut valid = 0;
        let mut valid_run_end = 0;
        let mut run_end = 0;
        let mut pending_runs = runs.iter().copied();
        let mut i = 0;

        while i < len {
            let tracked = match pending_runs.next() {
                Some(run) => {
                    run_end = (run_end + run).min(len);
                    true
                }
                None => {
                    run_end = len;
                    false
                }
            };

            while i < run_end {
                let slot = self.slots[i].index();
                if slot >= removed_end {
                    self.slots[valid] = SlotId::new(slot - removed + added);
                    valid += 1;
                } else if slot >= position {
                    unmodified_start = unmodified_start.min(valid);
                    unmodified_end = len - i - 1;
                } else {
                    self.slots[valid] = self.slots[i];
                    valid += 1;
                }
                i += 1;
            }

            if tracked && valid > valid_run_end {
                kept_runs.push(valid - valid_run_end);
                valid_run_end = valid;
            }
        }
        debug_assert_eq!(valid, len - removed);

        self.slots.truncate(valid);
        self.slots
            .extend((position..position + added).map(SlotId::new));
        *runs = kept_runs;

        (unmodified_start, unmodified_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn from(slots: &[usize]) -> PositionIndex {
        PositionIndex {
            slots: slots.iter().copied().map(SlotId::new).collect(),
        }
    }

    fn indices(index: &PositionIndex) -> Vec<usize> {
        index.as_slice().iter().map(|slot| slot.index()).collect()
    }

    #[test]
    fn identity_has_no_changes() {
        assert_eq!(PositionIndex::identity(5).changed_from_identity(), None);
        assert_eq!(from(&[0, 2, 1, 3]).changed_from_identity(), Some(1..3));
        assert_eq!(from(&[1, 0]).changed_from_identity(), Some(0..2));
    }

    #[test]
    fn removal_renumbers_and_compacts_runs() {
        // Two sorted runs [3, 0, 4] and [1, 2] with slot 0 and 1 removed.
        let mut index = from(&[3, 0, 4, 1, 2]);
        let mut runs: RunLengths = smallvec![3, 2];
        let (start, end) = index.splice(&mut runs, 0, 2, 0);

        assert_eq!(indices(&index), vec![1, 2, 0]);
        assert_eq!(runs.as_slice(), &[2, 1]);
        assert_eq!(start, 1);
        assert_eq!(end, 1);
    }

    #[test]
    fn emptied_runs_vanish_and_tail_stays_untracked() {
        let mut index = from(&[1, 0, 2, 3]);
        let mut runs: RunLengths = smallvec![1, 1];
        index.splice(&mut runs, 0, 1, 0);

        assert_eq!(indices(&index), vec![0, 1, 2]);
        assert_eq!(runs.as_slice(), &[1]);
    }

    #[test]
    fn added_slots_are_appended_in_source_order() {
        let mut index = from(&[2, 0, 1]);
        let mut runs: RunLengths = smallvec![3];
        let (start, end) = index.splice(&mut runs, 1, 0, 2);

        assert_eq!(indices(&index), vec![4, 0, 3, 1, 2]);
        assert_eq!(runs.as_slice(), &[3]);
        assert_eq!((start, end), (3, 3));
    }
}
