//! A mutable, observable list.

use std::cell::RefCell;
use std::fmt;

use tracing::trace;

use crate::core::{ItemsChanged, ListModel, ObservableList};
use crate::error::{Error, Result};
use crate::signal::{HandlerId, Signal};

/// A `Vec` behind a shared reference that notifies its handlers after every change.
///
/// This is the usual source for a [`SortListModel`](crate::model::SortListModel).
/// Handlers run after the change is applied and may read or edit the store again.
///
/// ```
/// use sortlist::{ListModel, ListStore};
///
/// let store = ListStore::from(vec![1, 2, 3]);
/// store.splice(1, 1, [7, 8]).unwrap();
/// assert_eq!(store.to_vec(), vec![1, 7, 8, 3]);
///
/// assert!(store.remove(10).is_err());
/// assert_eq!(store.n_items(), 4);
/// ```
pub struct ListStore<T> {
    items: RefCell<Vec<T>>,
    changed: Signal<ItemsChanged>,
}

impl<T> Default for ListStore<T> {
    fn default() -> Self {
        Self {
            items: RefCell::new(Vec::new()),
            changed: Signal::default(),
        }
    }
}

impl<T> From<Vec<T>> for ListStore<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            items: RefCell::new(items),
            changed: Signal::default(),
        }
    }
}

impl<T> FromIterator<T> for ListStore<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<T: fmt::Debug> fmt::Debug for ListStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListStore")
            .field("items", &self.items.borrow())
            .field("changed", &self.changed)
            .finish()
    }
}

impl<T> ListStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Replaces `removed` items at `position` with `items`.
    ///
    /// Fails without touching the list if the removed range does not fit.
    pub fn splice<I>(&self, position: usize, removed: usize, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        // Collected first: the iterator may read the store.
        let items: Vec<T> = items.into_iter().collect();
        let added = items.len();

        let dropped: Vec<T> = {
            let mut list = self.items.borrow_mut();
            let len = list.len();
            if position > len || removed > len - position {
                return Err(Error::SpliceOutOfRange {
                    position,
                    removed,
                    len,
                });
            }
            list.splice(position..position + removed, items).collect()
        };

        self.notify(ItemsChanged::new(position, removed, added));
        drop(dropped);
        Ok(())
    }

    /// Adds `item` at the end.
    pub fn append(&self, item: T) {
        let position = {
            let mut list = self.items.borrow_mut();
            list.push(item);
            list.len() - 1
        };
        self.notify(ItemsChanged::new(position, 0, 1));
    }

    /// Adds every item of `items` at the end, with a single notification.
    pub fn extend<I>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        let items: Vec<T> = items.into_iter().collect();
        let added = items.len();
        let position = {
            let mut list = self.items.borrow_mut();
            let position = list.len();
            list.extend(items);
            position
        };
        self.notify(ItemsChanged::new(position, 0, added));
    }

    /// Inserts `item` at `position`, shifting later items up.
    pub fn insert(&self, position: usize, item: T) -> Result<()> {
        let len = self.len();
        if position > len {
            return Err(Error::PositionOutOfRange { position, len });
        }
        self.splice(position, 0, [item])
    }

    /// Removes and returns the item at `position`.
    pub fn remove(&self, position: usize) -> Result<T> {
        let item = {
            let mut list = self.items.borrow_mut();
            let len = list.len();
            if position >= len {
                return Err(Error::PositionOutOfRange { position, len });
            }
            list.remove(position)
        };
        self.notify(ItemsChanged::new(position, 1, 0));
        Ok(item)
    }

    /// Removes every item.
    pub fn clear(&self) {
        let dropped = std::mem::take(&mut *self.items.borrow_mut());
        if !dropped.is_empty() {
            self.notify(ItemsChanged::new(0, dropped.len(), 0));
        }
    }

    /// Calls `f` with the current contents.
    pub fn with_items<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.items.borrow())
    }

    fn notify(&self, change: ItemsChanged) {
        if change.is_empty() {
            return;
        }
        trace!(
            position = change.position,
            removed = change.removed,
            added = change.added,
            "sortlist.store.changed"
        );
        self.changed.emit(change);
    }
}

impl<T: Clone> ListStore<T> {
    /// A copy of the current contents.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.borrow().clone()
    }
}

impl<T: Clone> ListModel for ListStore<T> {
    type Item = T;

    fn n_items(&self) -> usize {
        self.len()
    }

    fn item(&self, position: usize) -> Option<T> {
        self.items.borrow().get(position).cloned()
    }
}

impl<T: Clone> ObservableList for ListStore<T> {
    fn connect_items_changed<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(ItemsChanged) + 'static,
    {
        self.changed.connect(handler)
    }

    fn disconnect(&self, id: HandlerId) {
        self.changed.disconnect(id);
    }
}
