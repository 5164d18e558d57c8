//! The incremental sort engine.
//!
//! [`SortEngine`] owns the cached keys, the visible permutation and the paused
//! [`TimSort`] state, and knows nothing about scheduling or notification. It is in one
//! of three states:
//!
//! - **Idle**: no sort state. The permutation is authoritative (or there is none, when
//!   no sorter is set and positions map straight to the source).
//! - **Sorting**: inside [`SortEngine::step`] or [`SortEngine::finish`].
//! - **Paused**: sort state is held between two steps; the permutation is valid but
//!   not yet ordered.

use std::cell::Cell;
use std::cmp::Ordering;
use std::ops::Range;
use std::time::Instant;

use crate::algo::{RunLengths, TimSort, Touched};
use crate::core::{ListModel, SlotId, Sorter};
use crate::keys::{KeyStore, SlotKey, compare_keys};
use crate::positions::PositionIndex;
use crate::section;

/// The key cache and permutation, present whenever a sorter is set.
pub(crate) struct Layout<K> {
    pub(crate) keys: KeyStore<K>,
    pub(crate) positions: PositionIndex,
}

/// What a call to [`SortEngine::step`] did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct StepOutcome {
    /// Whether any key was computed or any element moved.
    pub(crate) progressed: bool,
    /// Positions whose item changed, if any.
    pub(crate) changed: Option<Range<usize>>,
}

pub(crate) type EngineKey<S, C> = SlotKey<<S as Sorter>::Key, <C as Sorter>::Key>;

pub(crate) struct SortEngine<S: Sorter, C: Sorter> {
    sorter: Option<S>,
    section_sorter: Option<C>,
    pub(crate) layout: Option<Layout<EngineKey<S, C>>>,
    pub(crate) sort: Option<TimSort>,
    merge_cap: usize,
    /// Lowest estimate reported since the sort started.
    pending_ceiling: Cell<usize>,
}

/// Whether keys cached for `old` can be read as keys for `new`.
fn is_compatible<SO: Sorter>(old: Option<&SO>, new: Option<&SO>) -> bool {
    match (old, new) {
        (Some(old), Some(new)) => new.is_compatible(old),
        (None, None) => true,
        _ => false,
    }
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

/// Extracts the key of the source item at `index`.
///
/// A source that no longer has the item yields an empty key; the order is then
/// unspecified until the source reports its change.
#[inline]
fn extract<M, S, C>(source: &M, index: usize, sorter: Option<&S>, section: Option<&C>) -> EngineKey<S, C>
where
    M: ListModel + ?Sized,
    S: Sorter<Item = M::Item>,
    C: Sorter<Item = M::Item>,
{
    source
        .item(index)
        .map(|item| SlotKey::extract(&item, sorter, section))
        .unwrap_or_default()
}

/// Orders slots by section key, then primary key, then source position.
#[inline(always)]
fn compare_slots<S: Sorter, C: Sorter>(
    keys: &KeyStore<EngineKey<S, C>>,
    sorter: Option<&S>,
    section: Option<&C>,
    a: SlotId,
    b: SlotId,
) -> Ordering {
    let (key_a, key_b) = (keys.get(a), keys.get(b));
    compare_keys(section, key_a.section.as_ref(), key_b.section.as_ref())
        .then_with(|| compare_keys(sorter, key_a.primary.as_ref(), key_b.primary.as_ref()))
        .then_with(|| a.cmp(&b))
}

impl<S: Sorter, C: Sorter> SortEngine<S, C> {
    /// An engine with no items yet. `merge_cap` bounds merges of incremental sorts.
    pub(crate) fn new(sorter: Option<S>, section_sorter: Option<C>, merge_cap: usize) -> Self {
        Self {
            sorter,
            section_sorter,
            layout: None,
            sort: None,
            merge_cap,
            pending_ceiling: Cell::new(usize::MAX),
        }
    }

    pub(crate) fn sorter(&self) -> Option<&S> {
        self.sorter.as_ref()
    }

    pub(crate) fn section_sorter(&self) -> Option<&C> {
        self.section_sorter.as_ref()
    }

    /// Whether any sorter is set.
    pub(crate) fn should_sort(&self) -> bool {
        self.sorter.is_some() || self.section_sorter.is_some()
    }

    /// Whether keys and a permutation exist.
    pub(crate) fn is_active(&self) -> bool {
        self.layout.is_some()
    }

    /// Whether sort state is held, i.e. the engine is not Idle.
    pub(crate) fn is_sorting(&self) -> bool {
        self.sort.is_some()
    }

    /// Number of entries in the permutation.
    pub(crate) fn len(&self) -> usize {
        self.layout.as_ref().map_or(0, |layout| layout.positions.len())
    }

    /// Source position of the item shown at `position`.
    pub(crate) fn source_position(&self, position: usize) -> usize {
        match &self.layout {
            Some(layout) => layout.positions.get(position).index(),
            None => position,
        }
    }

    /// Replaces the primary sorter, keeping cached keys only if the new sorter is
    /// compatible with the old one.
    pub(crate) fn set_sorter(&mut self, sorter: Option<S>) {
        let compatible = is_compatible(self.sorter.as_ref(), sorter.as_ref());
        self.sorter = sorter;
        self.reset_keys(compatible);
    }

    /// Replaces the section sorter, see [`set_sorter`](Self::set_sorter).
    pub(crate) fn set_section_sorter(&mut self, section_sorter: Option<C>) {
        let compatible = is_compatible(self.section_sorter.as_ref(), section_sorter.as_ref());
        self.section_sorter = section_sorter;
        self.reset_keys(compatible);
    }

    fn reset_keys(&mut self, compatible: bool) {
        if let Some(layout) = &mut self.layout {
            layout.keys.reset_for_new_layout(compatible);
        }
    }

    /// Creates the permutation in source order with every key missing.
    pub(crate) fn create_items(&mut self, len: usize) {
        debug_assert!(self.layout.is_none());
        self.layout = Some(Layout {
            keys: KeyStore::missing(len),
            positions: PositionIndex::identity(len),
        });
    }

    /// Stops sorting and drops keys and permutation, going back to source order.
    ///
    /// Returns the range of positions whose item changed.
    pub(crate) fn clear_items(&mut self) -> Option<Range<usize>> {
        self.cancel();
        self.layout.take()?.positions.changed_from_identity()
    }

    /// Starts a sort over the whole permutation.
    ///
    /// `runs` are lengths of leading ranges already sorted, as returned by
    /// [`cancel`](Self::cancel) and remapped by a splice. Incremental sorts cap
    /// their merges.
    pub(crate) fn start(&mut self, runs: Option<&[usize]>, incremental: bool) {
        debug_assert!(self.sort.is_none());
        let len = self.len();
        let mut sort = match runs {
            Some(runs) => TimSort::with_runs(len, runs),
            None => TimSort::new(len),
        };
        if incremental {
            sort.set_max_merge_size(self.merge_cap);
        }
        self.sort = Some(sort);
        self.pending_ceiling.set(usize::MAX);
    }

    /// Drops the sort state, returning its pending runs.
    ///
    /// When not sorting, the whole permutation is one sorted run.
    pub(crate) fn cancel(&mut self) -> RunLengths {
        match self.sort.take() {
            Some(sort) => sort.run_lengths(),
            None => {
                let mut runs = RunLengths::new();
                runs.push(self.len());
                runs
            }
        }
    }

    /// Computes missing keys, then sorts, until `deadline` passes or the sort is done.
    ///
    /// A `None` deadline runs to completion. Every call makes some progress, however
    /// short the deadline, unless there is nothing left to do.
    pub(crate) fn step<M>(&mut self, source: &M, deadline: Option<Instant>) -> StepOutcome
    where
        M: ListModel + ?Sized,
        S: Sorter<Item = M::Item>,
        C: Sorter<Item = M::Item>,
    {
        let (Some(layout), Some(sort)) = (self.layout.as_mut(), self.sort.as_mut()) else {
            return StepOutcome::default();
        };
        let Layout { keys, positions } = layout;
        let sorter = self.sorter.as_ref();
        let section = self.section_sorter.as_ref();
        let mut progressed = false;

        if keys.has_missing() {
            while keys
                .compute_next_missing(|index| extract(source, index, sorter, section))
                .is_some()
            {
                if deadline_passed(deadline) {
                    return StepOutcome {
                        progressed: true,
                        changed: None,
                    };
                }
            }
            progressed = true;
        }

        let keys = &*keys;
        let mut compare = |a: SlotId, b: SlotId| compare_slots(keys, sorter, section, a, b);
        let mut touched = Touched::default();
        while sort.step(positions.as_mut_slice(), &mut compare, &mut touched) {
            progressed = true;
            if deadline_passed(deadline) {
                break;
            }
        }

        StepOutcome {
            progressed,
            changed: touched.range(),
        }
    }

    /// Removes the merge cap, sorts to completion and drops the sort state.
    ///
    /// Returns the range of positions whose item changed. Does nothing when Idle.
    pub(crate) fn finish<M>(&mut self, source: &M) -> Option<Range<usize>>
    where
        M: ListModel + ?Sized,
        S: Sorter<Item = M::Item>,
        C: Sorter<Item = M::Item>,
    {
        let sort = self.sort.as_mut()?;
        sort.set_max_merge_size(usize::MAX);
        let outcome = self.step(source, None);
        self.sort = None;
        outcome.changed
    }

    /// Rough number of items left to process; 0 exactly when Idle.
    ///
    /// Assumes computing keys and merging take about the same time, so it averages the
    /// item count with the missing keys, or with the unmerged part of the permutation.
    /// Never rises between two calls of [`start`](Self::start): a capped merge can
    /// shrink the run-stack measure, so the lowest value seen so far is kept.
    pub(crate) fn pending_estimate(&self) -> usize {
        let (Some(layout), Some(sort)) = (&self.layout, &self.sort) else {
            return 0;
        };
        let len = layout.positions.len();
        let estimate = if layout.keys.has_missing() {
            (len + layout.keys.n_missing()) / 2
        } else {
            (len - sort.progress().min(len)) / 2
        };
        let estimate = estimate.min(self.pending_ceiling.get());
        self.pending_ceiling.set(estimate);
        estimate.max(1)
    }

    /// The section containing `position`, or `None` without a section sorter.
    ///
    /// `position` must be in range. While Paused the permutation is scanned outward
    /// and missing keys are computed on the way; when Idle both boundaries are found
    /// by exponential and binary search.
    pub(crate) fn section<M>(&mut self, source: &M, position: usize) -> Option<(usize, usize)>
    where
        M: ListModel + ?Sized,
        S: Sorter<Item = M::Item>,
        C: Sorter<Item = M::Item>,
    {
        let section_sorter = self.section_sorter.as_ref()?;
        let Layout { keys, positions } = self.layout.as_mut()?;
        let sorter = self.sorter.as_ref();
        let len = positions.len();
        let pivot = positions.get(position);

        let same_section = |keys: &KeyStore<EngineKey<S, C>>, slot: SlotId| {
            compare_keys(
                Some(section_sorter),
                keys.get(slot).section.as_ref(),
                keys.get(pivot).section.as_ref(),
            ) == Ordering::Equal
        };

        if self.sort.is_some() {
            let init = |index| extract(source, index, sorter, Some(section_sorter));
            keys.ensure_key(pivot, init);
            Some(section::find_unsorted(len, position, |i| {
                let slot = positions.get(i);
                keys.ensure_key(slot, init);
                same_section(keys, slot)
            }))
        } else {
            Some(section::find_sorted(len, position, |i| {
                same_section(keys, positions.get(i))
            }))
        }
    }
}
