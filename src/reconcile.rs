//! Folding source changes into keys, permutation and a paused sort.

use crate::core::{ItemsChanged, ListModel, Sorter};
use crate::engine::SortEngine;

impl<S: Sorter, C: Sorter> SortEngine<S, C> {
    /// Applies a splice of the source and returns the change of the visible list.
    ///
    /// The paused sort (or the finished order, when Idle) survives as runs of the
    /// surviving entries, so only the added items and whatever the interrupted sort
    /// had not reached are sorted again. Added items are sorted in steps when
    /// `incremental`, and right away otherwise.
    ///
    /// The returned change covers every visible position whose item changed: from the
    /// first removed entry (or the first entry a synchronous sort moved) to the last
    /// entry that did not keep its distance from the end of the list.
    pub(crate) fn splice<M>(&mut self, source: &M, change: ItemsChanged, incremental: bool) -> ItemsChanged
    where
        M: ListModel + ?Sized,
        S: Sorter<Item = M::Item>,
        C: Sorter<Item = M::Item>,
    {
        let ItemsChanged {
            position,
            removed,
            added,
        } = change;
        if change.is_empty() {
            return change;
        }

        let was_sorting = self.is_sorting();
        let mut runs = self.cancel();
        let Some(layout) = self.layout.as_mut() else {
            return change;
        };
        debug_assert!(position + removed <= layout.positions.len());

        layout.keys.splice(position, removed, added);
        let (mut start, mut end) = layout.positions.splice(&mut runs, position, removed, added);
        debug_assert_eq!(layout.keys.len(), layout.positions.len());
        let n_items = layout.positions.len();

        if added > 0 {
            self.start(Some(&runs), incremental);
            if incremental {
                // The added items sit at the end until sorted.
                end = 0;
            } else {
                if let Some(changed) = self.finish(source) {
                    start = start.min(changed.start);
                }
                // Everything after the last added item kept its distance from the end.
                if let Some(layout) = &self.layout {
                    let is_added = |i: usize| {
                        let slot = layout.positions.get(n_items - i - 1).index();
                        (position..position + added).contains(&slot)
                    };
                    if let Some(first_added) = (0..end).find(|&i| is_added(i)) {
                        end = first_added;
                    }
                }
            }
        } else if was_sorting {
            self.start(Some(&runs), incremental);
        }

        let count = n_items - start - end;
        ItemsChanged::new(start, count - added + removed, count)
    }
}
