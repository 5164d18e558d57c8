//! # Sortlist
//!
//! `sortlist` keeps a sorted view of an observable list. The view follows every change of
//! its source, can sort in small time-boxed steps so large lists never block the caller,
//! and can group its items into sections by a secondary key.
//!
//! It is built around a resumable [**timsort**](https://en.wikipedia.org/wiki/Timsort):
//! a stable natural merge sort whose complete state lives outside the call stack, so it can
//! be paused after any step, resumed later, and even patched when the underlying list changes
//! halfway through a sort.
//!
//! ## Key Features
//!
//! - **Stable**: items comparing equal keep their source order, whatever the comparator.
//! - **Incremental**: with [`SortListModel::set_incremental`] the sort runs on a
//!   [`Scheduler`] in steps of about a millisecond, with merges capped in size, and reports
//!   every rearranged range as it goes.
//! - **Live**: splices of the source are folded into the current order without starting
//!   over. Sorted runs that survive the splice are reused, so inserting into a sorted
//!   list of a million items costs a handful of comparisons.
//! - **Cached keys**: comparison keys are extracted once per item by a [`Sorter`] and
//!   kept until the item goes away or the sorter changes incompatibly.
//! - **Sections**: [`SortListModel::get_section`] finds the run of items sharing a section
//!   key in logarithmic time once sorting is done.
//!
//! ## Usage
//!
//! ### Basic Usage
//!
//! Wrap a [`ListStore`] (or any other [`ObservableList`]) and a sorter:
//!
//! ```rust
//! use std::rc::Rc;
//! use sortlist::{KeySorter, ListModel, ListStore, SortListModel};
//!
//! let store = Rc::new(ListStore::from(vec!["banana", "apple", "cherry"]));
//! let sorted = SortListModel::new(Some(Rc::clone(&store)), Some(KeySorter::new(|s: &&'static str| *s)));
//!
//! assert_eq!(sorted.item(0), Some("apple"));
//!
//! store.append("date");
//! store.insert(0, "avocado").unwrap();
//! let items: Vec<_> = (0..sorted.n_items()).filter_map(|i| sorted.item(i)).collect();
//! assert_eq!(items, vec!["apple", "avocado", "banana", "cherry", "date"]);
//! ```
//!
//! ### Sections
//!
//! A section sorter groups items; the primary sorter orders them within each group.
//!
//! ```rust
//! use std::rc::Rc;
//! use sortlist::{IdleLoop, KeySorter, ListModel, SortConfig, SortListModel};
//!
//! let words = Rc::new(vec!["cow", "ant", "cat", "bee", "ape"]);
//! let sorted = SortListModel::with_sorters(
//!     Some(words),
//!     Some(KeySorter::new(|s: &&'static str| *s)),
//!     Some(KeySorter::new(|s: &&str| s.as_bytes()[0])),
//!     SortConfig::default(),
//!     Rc::new(IdleLoop::new()),
//! );
//!
//! // ant ape | bee | cat cow
//! assert_eq!(sorted.get_section(1), (0, 2));
//! assert_eq!(sorted.get_section(2), (2, 3));
//! assert_eq!(sorted.get_section(4), (3, 5));
//! assert_eq!(sorted.get_section(5), (5, usize::MAX));
//! ```
//!
//! ### Custom Sorters
//!
//! Implement [`Sorter`] to control key extraction and comparison, or use [`CompareSorter`]
//! with a plain comparison function.
//!
//! ```rust
//! use std::rc::Rc;
//! use sortlist::{CompareSorter, ListModel, SortListModel};
//!
//! let values = Rc::new(vec![2.5f64, -1.0, f64::NAN, 0.0]);
//! let sorted = SortListModel::new(Some(values), Some(CompareSorter::new(f64::total_cmp)));
//!
//! assert_eq!(sorted.item(0), Some(-1.0));
//! assert!(sorted.item(3).is_some_and(f64::is_nan));
//! ```
//!
//! ## Performance Characteristics
//!
//! - **Best Case**: O(N) comparisons for already sorted or reversed input.
//! - **Worst Case**: O(N log N) comparisons, as any merge sort.
//! - **Memory Overhead**: one cached key and one index per item, plus a merge buffer of at
//!   most half the list (at most the merge cap while sorting incrementally).
//!
//! Everything is single-threaded: models, stores and the [`IdleLoop`] are `!Send` and
//! communicate through callbacks on the thread that owns them.

mod algo;
mod bitset;
pub mod config;
pub mod core;
mod engine;
pub mod error;
mod keys;
pub mod model;
mod positions;
mod reconcile;
pub mod scheduler;
mod section;
mod signal;
pub mod store;

pub use crate::config::SortConfig;
pub use crate::core::{
    CompareSorter, ItemsChanged, KeySorter, ListModel, ObservableList, SectionsChanged,
    SortOrder, Sorter,
};
pub use crate::error::{Error, Result};
pub use crate::model::SortListModel;
pub use crate::scheduler::{IdleLoop, IdleTask, Scheduler, TaskId};
pub use crate::signal::HandlerId;
pub use crate::store::ListStore;

pub mod prelude {
    pub use crate::config::SortConfig;
    pub use crate::core::{CompareSorter, KeySorter, ListModel, ObservableList, Sorter};
    pub use crate::model::SortListModel;
    pub use crate::scheduler::{IdleLoop, Scheduler};
    pub use crate::store::ListStore;
}
