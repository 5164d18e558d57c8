//! Key storage: one cached comparison key per source item.

use std::cmp::Ordering;

use crate::bitset::RangeSet;
use crate::core::{SlotId, Sorter};

/// The cached key of one item: its section key and its primary key, each present
/// only while the corresponding sorter is set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SlotKey<P, S> {
    pub(crate) section: Option<S>,
    pub(crate) primary: Option<P>,
}

impl<P, S> Default for SlotKey<P, S> {
    fn default() -> Self {
        Self {
            section: None,
            primary: None,
        }
    }
}

impl<P, S> SlotKey<P, S> {
    /// Extracts whichever keys the given sorters need.
    pub(crate) fn extract<T, PS, SS>(item: &T, primary: Option<&PS>, section: Option<&SS>) -> Self
    where
        T: ?Sized,
        PS: Sorter<Item = T, Key = P>,
        SS: Sorter<Item = T, Key = S>,
    {
        Self {
            section: section.map(|sorter| sorter.key(item)),
            primary: primary.map(|sorter| sorter.key(item)),
        }
    }
}

/// Compares optional keys; a missing key only ever meets another missing key.
#[inline(always)]
pub(crate) fn compare_keys<SO: Sorter>(
    sorter: Option<&SO>,
    a: Option<&SO::Key>,
    b: Option<&SO::Key>,
) -> Ordering {
    match (sorter, a, b) {
        (Some(sorter), Some(a), Some(b)) => sorter.compare(a, b),
        (_, a, b) => a.is_some().cmp(&b.is_some()),
    }
}

/// Owns every key. Slot `i` belongs to source position `i`.
///
/// A slot listed in `missing` holds a default key that must not be compared.
#[derive(Debug, Default)]
pub(crate) struct KeyStore<K> {
    slots: Vec<K>,
    missing: RangeSet,
}

impl<K: Default> KeyStore<K> {
    /// A store of `len` slots, all missing.
    pub(crate) fn missing(len: usize) -> Self {
        Self {
            slots: std::iter::repeat_with(K::default).take(len).collect(),
            missing: RangeSet::with_range(0, len),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn n_missing(&self) -> usize {
        self.missing.len()
    }

    pub(crate) fn has_missing(&self) -> bool {
        !self.missing.is_empty()
    }

    pub(crate) fn is_missing(&self, slot: SlotId) -> bool {
        self.missing.contains(slot.index())
    }

    /// The key in `slot`. Comparing a missing key is a bug in the caller.
    #[inline(always)]
    pub(crate) fn get(&self, slot: SlotId) -> &K {
        debug_assert!(
            !self.is_missing(slot),
            "key for slot {} read before it was computed",
            slot.index()
        );
        &self.slots[slot.index()]
    }

    /// Computes the key of `slot` with `init` unless it is already present.
    pub(crate) fn ensure_key(&mut self, slot: SlotId, init: impl FnOnce(usize) -> K) {
        let index = slot.index();
        if !self.missing.contains(index) {
            return;
        }
        self.slots[index] = init(index);
        self.missing.remove(index);
    }

    /// Computes the lowest missing key, returning its slot, or `None` when none is missing.
    pub(crate) fn compute_next_missing(&mut self, init: impl FnOnce(usize) -> K) -> Option<SlotId> {
        let index = self.missing.pop_first()?;
        self.slots[index] = init(index);
        Some(SlotId::new(index))
    }

    /// Drops the keys in `start..start + count` and marks them missing.
    pub(crate) fn clear_range(&mut self, start: usize, count: usize) {
        for slot in &mut self.slots[start..start + count] {
            *slot = K::default();
        }
        self.missing.insert_range(start, count);
    }

    /// Prepares the store for new sorters.
    ///
    /// Compatible sorters read the existing keys as they are; otherwise every key is
    /// dropped and recomputed lazily.
    pub(crate) fn reset_for_new_layout(&mut self, compatible: bool) {
        if compatible {
            return;
        }
        let len = self.slots.len();
        self.clear_range(0, len);
    }

    /// Mirrors a source splice. Removed keys are dropped, added slots are missing.
    pub(crate) fn splice(&mut self, position: usize, removed: usize, added: usize) {
        self.slots.splice(
            position..position + removed,
            std::iter::repeat_with(K::default).take(added),
        );
        self.missing.splice(position, removed, added);
        self.missing.insert_range(position, added);
    }
}
