//! Handler lists for change notifications.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

// Ids are unique across every signal, so an object owning several signals can
// disconnect by id alone.
static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a connected handler so it can be disconnected later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    /// Id handed out by lists that never emit. Disconnecting it is a no-op.
    pub const INERT: HandlerId = HandlerId(0);

    /// A fresh id, distinct from every id handed out before.
    ///
    /// For [`ObservableList`](crate::core::ObservableList) implementations that keep
    /// their own handler lists.
    pub fn next() -> Self {
        HandlerId(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A list of handlers called with a `Copy` event.
///
/// Emission snapshots the handler list first, so handlers may connect, disconnect or
/// trigger further emissions while running.
pub(crate) struct Signal<E> {
    handlers: RefCell<Vec<(HandlerId, Rc<dyn Fn(E)>)>>,
}

impl<E> Default for Signal<E> {
    fn default() -> Self {
        Self {
            handlers: RefCell::new(Vec::new()),
        }
    }
}

impl<E> fmt::Debug for Signal<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("handlers", &self.handlers.borrow().len())
            .finish()
    }
}

impl<E: Copy> Signal<E> {
    pub(crate) fn connect<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(E) + 'static,
    {
        let id = HandlerId::next();
        self.handlers.borrow_mut().push((id, Rc::new(handler)));
        id
    }

    /// Returns `true` if a handler was removed.
    pub(crate) fn disconnect(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != before
    }

    pub(crate) fn emit(&self, event: E) {
        let snapshot: Vec<Rc<dyn Fn(E)>> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();

        for handler in snapshot {
            handler(event);
        }
    }
}
