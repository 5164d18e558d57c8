//! Core traits and types for sortlist.
//!
//! This module defines:
//! - [`ListModel`] and [`ObservableList`]: the collections a sort model reads from.
//! - [`Sorter`]: the comparator capability, split into key extraction and key comparison.
//! - [`KeySorter`] and [`CompareSorter`]: ready-made sorters.
//! - SlotId: internal typed index into the key store.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::signal::HandlerId;

/// Index of a key slot. Slot `i` holds the key of the source item at position `i`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct SlotId(usize);

impl SlotId {
    #[inline(always)]
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline(always)]
    pub(crate) const fn index(self) -> usize {
        self.0
    }
}

/// A splice of a list: `removed` items at `position` were replaced by `added` items.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ItemsChanged {
    /// First position affected.
    pub position: usize,
    /// Number of items removed at `position`.
    pub removed: usize,
    /// Number of items added at `position`.
    pub added: usize,
}

impl ItemsChanged {
    /// Creates a change record.
    pub const fn new(position: usize, removed: usize, added: usize) -> Self {
        Self {
            position,
            removed,
            added,
        }
    }

    /// Returns `true` if the change neither removes nor adds anything.
    pub const fn is_empty(&self) -> bool {
        self.removed == 0 && self.added == 0
    }
}

/// Section boundaries in `position..position + n_items` may have moved, items did not.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SectionsChanged {
    /// First position whose section may have changed.
    pub position: usize,
    /// Number of positions affected.
    pub n_items: usize,
}

/// Read access to an ordered collection.
///
/// Items are handed out by value, so item types are expected to be cheap to clone
/// (small values, `Rc`s, handles).
///
/// # Examples
///
/// ```
/// use sortlist::ListModel;
///
/// let list = vec!["b", "a"];
/// assert_eq!(list.n_items(), 2);
/// assert_eq!(list.item(1), Some("a"));
/// assert_eq!(list.item(2), None);
/// ```
pub trait ListModel {
    /// The type of item in the list.
    type Item;

    /// Returns the number of items.
    fn n_items(&self) -> usize;

    /// Returns the item at `position`, or `None` if `position >= n_items()`.
    fn item(&self, position: usize) -> Option<Self::Item>;

    /// Returns `true` if the list has no items.
    fn is_empty(&self) -> bool {
        self.n_items() == 0
    }
}

/// A [`ListModel`] that announces its own changes.
///
/// Implementations must emit a change only after the new contents are readable, and
/// must not hold internal borrows while handlers run: handlers read the list back.
pub trait ObservableList: ListModel {
    /// Registers `handler` to run after every change to the list.
    fn connect_items_changed<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(ItemsChanged) + 'static;

    /// Removes a handler registered with [`connect_items_changed`](Self::connect_items_changed).
    fn disconnect(&self, id: HandlerId);
}

// Plain collections never change behind a shared reference, so they never emit.
impl<T: Clone> ListModel for Vec<T> {
    type Item = T;

    fn n_items(&self) -> usize {
        self.len()
    }

    fn item(&self, position: usize) -> Option<T> {
        self.get(position).cloned()
    }
}

impl<T: Clone> ObservableList for Vec<T> {
    fn connect_items_changed<F>(&self, _handler: F) -> HandlerId
    where
        F: Fn(ItemsChanged) + 'static,
    {
        HandlerId::INERT
    }

    fn disconnect(&self, _id: HandlerId) {}
}

impl<T: Clone> ListModel for VecDeque<T> {
    type Item = T;

    fn n_items(&self) -> usize {
        self.len()
    }

    fn item(&self, position: usize) -> Option<T> {
        self.get(position).cloned()
    }
}

impl<T: Clone> ObservableList for VecDeque<T> {
    fn connect_items_changed<F>(&self, _handler: F) -> HandlerId
    where
        F: Fn(ItemsChanged) + 'static,
    {
        HandlerId::INERT
    }

    fn disconnect(&self, _id: HandlerId) {}
}

/// A comparator split into key extraction and key comparison.
///
/// Keys are extracted once per item and cached by the sort model, so `key` may be
/// expensive while `compare` should be cheap. `compare` must be a total preorder.
/// Items whose keys compare equal keep their source order.
///
/// # Examples
///
/// Sorting strings case-insensitively:
///
/// ```
/// use std::cmp::Ordering;
/// use sortlist::Sorter;
///
/// struct CaseInsensitive;
///
/// impl Sorter for CaseInsensitive {
///     type Item = String;
///     type Key = String;
///
///     fn key(&self, item: &String) -> String {
///         item.to_lowercase()
///     }
///
///     fn compare(&self, a: &String, b: &String) -> Ordering {
///         a.cmp(b)
///     }
/// }
/// ```
pub trait Sorter {
    /// The items this sorter understands.
    type Item: ?Sized;

    /// The cached comparison key.
    type Key;

    /// Extracts the comparison key of `item`.
    fn key(&self, item: &Self::Item) -> Self::Key;

    /// Compares two keys extracted by this sorter.
    fn compare(&self, a: &Self::Key, b: &Self::Key) -> Ordering;

    /// Returns `true` if keys extracted by `other` are valid keys for `self`.
    ///
    /// When a model switches from `other` to `self` and this holds, cached keys are
    /// kept and only the order is recomputed. The default is `false`.
    fn is_compatible(&self, other: &Self) -> bool {
        let _ = other;
        false
    }
}

/// Direction of a [`KeySorter`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SortOrder {
    /// Smallest key first.
    #[default]
    Ascending,
    /// Largest key first.
    Descending,
}

impl SortOrder {
    /// Applies this direction to an ascending comparison result.
    #[inline(always)]
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }

    /// The opposite direction.
    pub fn reverse(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }
}

/// Sorts by an [`Ord`] key extracted from each item.
///
/// Two `KeySorter`s sharing the same extractor (one cloned or [`reversed`](Self::reversed)
/// from the other) are compatible, so flipping the order of a sorted model reuses
/// every cached key.
///
/// ```
/// use sortlist::{KeySorter, Sorter};
///
/// let by_len = KeySorter::new(|s: &String| s.len());
/// let longest_first = by_len.reversed();
///
/// assert!(longest_first.is_compatible(&by_len));
/// ```
pub struct KeySorter<T: ?Sized, K> {
    extract: Rc<dyn Fn(&T) -> K>,
    order: SortOrder,
}

impl<T: ?Sized, K> KeySorter<T, K> {
    /// Ascending sorter over the key returned by `extract`.
    pub fn new<F>(extract: F) -> Self
    where
        F: Fn(&T) -> K + 'static,
    {
        Self {
            extract: Rc::new(extract),
            order: SortOrder::Ascending,
        }
    }

    /// Descending sorter over the key returned by `extract`.
    pub fn descending<F>(extract: F) -> Self
    where
        F: Fn(&T) -> K + 'static,
    {
        Self::new(extract).with_order(SortOrder::Descending)
    }

    /// Returns this sorter with the given direction.
    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Returns a sorter with the same extractor and the opposite direction.
    pub fn reversed(&self) -> Self {
        Self {
            extract: Rc::clone(&self.extract),
            order: self.order.reverse(),
        }
    }

    /// The direction of this sorter.
    pub fn order(&self) -> SortOrder {
        self.order
    }
}

impl<T: ?Sized, K> Clone for KeySorter<T, K> {
    fn clone(&self) -> Self {
        Self {
            extract: Rc::clone(&self.extract),
            order: self.order,
        }
    }
}

impl<T: ?Sized, K> fmt::Debug for KeySorter<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySorter")
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

impl<T: ?Sized, K: Ord> Sorter for KeySorter<T, K> {
    type Item = T;
    type Key = K;

    #[inline(always)]
    fn key(&self, item: &T) -> K {
        (self.extract)(item)
    }

    #[inline(always)]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        self.order.apply(a.cmp(b))
    }

    fn is_compatible(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.extract, &other.extract)
    }
}

/// Sorts with a comparison function over the items themselves.
///
/// The cached key is a clone of the item, so any two `CompareSorter`s are compatible.
/// Useful for comparators that are not expressible as an [`Ord`] key, such as
/// comparing floats with [`f64::total_cmp`].
pub struct CompareSorter<T> {
    compare: Rc<dyn Fn(&T, &T) -> Ordering>,
}

impl<T> CompareSorter<T> {
    /// Sorter calling `compare` on (clones of) the items.
    pub fn new<F>(compare: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + 'static,
    {
        Self {
            compare: Rc::new(compare),
        }
    }
}

impl<T> Clone for CompareSorter<T> {
    fn clone(&self) -> Self {
        Self {
            compare: Rc::clone(&self.compare),
        }
    }
}

impl<T> fmt::Debug for CompareSorter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompareSorter").finish_non_exhaustive()
    }
}

impl<T: Clone> Sorter for CompareSorter<T> {
    type Item = T;
    type Key = T;

    fn key(&self, item: &T) -> T {
        item.clone()
    }

    fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.compare)(a, b)
    }

    fn is_compatible(&self, _other: &Self) -> bool {
        true
    }
}
