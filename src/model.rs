//! The sorted view over an observable list.

use std::cell::RefCell;
use std::fmt;
use std::ops::{ControlFlow, Range};
use std::rc::{Rc, Weak};
use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::config::SortConfig;
use crate::core::{ItemsChanged, ListModel, ObservableList, SectionsChanged, Sorter};
use crate::engine::SortEngine;
use crate::scheduler::{IdleLoop, Scheduler, TaskId};
use crate::signal::{HandlerId, Signal};

/// A list presenting the items of another list in sorted order.
///
/// Sorting is stable: items that compare equal keep their order in the source. With
/// a section sorter set, items are grouped into sections first (ordered by the section
/// sorter) and the primary sorter orders items within each section.
///
/// The model follows its source: every change of the source is folded into the sorted
/// order and reported as one [`ItemsChanged`] covering the visible positions that
/// changed.
///
/// # Incremental sorting
///
/// By default every sort completes before the call that triggered it returns. In
/// incremental mode the sort instead runs in short steps on a [`Scheduler`], and the
/// visible order is only partially sorted until [`pending_estimate`](Self::pending_estimate)
/// drops to zero. Each step reports the positions it rearranged.
///
/// ```
/// use std::rc::Rc;
/// use sortlist::{IdleLoop, KeySorter, ListModel, ListStore, SortConfig, SortListModel};
///
/// let idle = IdleLoop::new();
/// let store = Rc::new(ListStore::from((0..10_000u32).rev().collect::<Vec<_>>()));
/// let model = SortListModel::with_config(
///     Some(Rc::clone(&store)),
///     Some(KeySorter::new(|n: &u32| *n)),
///     SortConfig::default().with_incremental(true),
///     Rc::new(idle.clone()),
/// );
///
/// assert!(model.pending_estimate() > 0);
/// idle.run_until_idle();
/// assert_eq!(model.pending_estimate(), 0);
/// assert_eq!(model.item(0), Some(0));
/// ```
pub struct SortListModel<M, S, C = S>
where
    M: ObservableList,
    S: Sorter<Item = M::Item>,
    C: Sorter<Item = M::Item>,
{
    inner: Rc<Inner<M, S, C>>,
}

struct Inner<M, S, C>
where
    M: ObservableList,
    S: Sorter<Item = M::Item>,
    C: Sorter<Item = M::Item>,
{
    state: RefCell<State<M, S, C>>,
    scheduler: Rc<dyn Scheduler>,
    items_changed: Signal<ItemsChanged>,
    sections_changed: Signal<SectionsChanged>,
    pending_changed: Signal<usize>,
}

struct State<M, S, C>
where
    M: ObservableList,
    S: Sorter<Item = M::Item>,
    C: Sorter<Item = M::Item>,
{
    source: Option<Rc<M>>,
    source_handler: HandlerId,
    n_items: usize,
    config: SortConfig,
    engine: SortEngine<S, C>,
    task: Option<TaskId>,
}

fn as_change(range: Option<Range<usize>>) -> Option<ItemsChanged> {
    range.map(|range| ItemsChanged::new(range.start, range.len(), range.len()))
}

impl<M, S> SortListModel<M, S>
where
    M: ObservableList + 'static,
    S: Sorter<Item = M::Item> + 'static,
{
    /// Sorts `model` with `sorter`, synchronously, on this thread's [`IdleLoop`].
    pub fn new(model: Option<Rc<M>>, sorter: Option<S>) -> Self {
        Self::with_config(
            model,
            sorter,
            SortConfig::default(),
            Rc::new(IdleLoop::thread_default()),
        )
    }

    /// Sorts `model` with `sorter` using the given tunables. Incremental steps run
    /// on `scheduler`.
    pub fn with_config(
        model: Option<Rc<M>>,
        sorter: Option<S>,
        config: SortConfig,
        scheduler: Rc<dyn Scheduler>,
    ) -> Self {
        Self::with_sorters(model, sorter, None, config, scheduler)
    }
}

impl<M, S, C> SortListModel<M, S, C>
where
    M: ObservableList + 'static,
    S: Sorter<Item = M::Item> + 'static,
    C: Sorter<Item = M::Item> + 'static,
{
    /// Creates a model with both a primary and a section sorter.
    pub fn with_sorters(
        model: Option<Rc<M>>,
        sorter: Option<S>,
        section_sorter: Option<C>,
        config: SortConfig,
        scheduler: Rc<dyn Scheduler>,
    ) -> Self {
        let inner = Rc::new(Inner {
            state: RefCell::new(State {
                source: None,
                source_handler: HandlerId::INERT,
                n_items: 0,
                config,
                engine: SortEngine::new(sorter, section_sorter, config.merge_cap()),
                task: None,
            }),
            scheduler,
            items_changed: Signal::default(),
            sections_changed: Signal::default(),
            pending_changed: Signal::default(),
        });
        inner.set_model(model);
        Self { inner }
    }

    /// The source list.
    pub fn model(&self) -> Option<Rc<M>> {
        self.inner.state.borrow().source.clone()
    }

    /// Replaces the source list. Reported as every old item replaced by every new one.
    pub fn set_model(&self, model: Option<Rc<M>>) {
        self.inner.set_model(model);
    }

    /// Replaces the primary sorter. `None` leaves ordering to the section sorter, or
    /// restores source order if there is none.
    pub fn set_sorter(&self, sorter: Option<S>) {
        self.inner
            .sorters_changed(false, |engine| engine.set_sorter(sorter));
    }

    /// Replaces the section sorter.
    pub fn set_section_sorter(&self, section_sorter: Option<C>) {
        self.inner
            .sorters_changed(true, |engine| engine.set_section_sorter(section_sorter));
    }

    /// Replaces both sorters at once, with a single resort.
    pub fn set_comparator(&self, sorter: Option<S>, section_sorter: Option<C>) {
        let sections_changed = section_sorter.is_some()
            || self.inner.state.borrow().engine.section_sorter().is_some();
        self.inner.sorters_changed(sections_changed, |engine| {
            engine.set_sorter(sorter);
            engine.set_section_sorter(section_sorter);
        });
    }

    /// Returns a clone of the primary sorter.
    pub fn sorter(&self) -> Option<S>
    where
        S: Clone,
    {
        self.inner.state.borrow().engine.sorter().cloned()
    }

    /// Returns a clone of the section sorter.
    pub fn section_sorter(&self) -> Option<C>
    where
        C: Clone,
    {
        self.inner.state.borrow().engine.section_sorter().cloned()
    }

    /// Switches incremental sorting on or off.
    ///
    /// Switching it off while a sort is in progress finishes that sort immediately.
    pub fn set_incremental(&self, incremental: bool) {
        let finished = {
            let mut state = self.inner.state.borrow_mut();
            if state.config.incremental == incremental {
                return;
            }
            state.config.incremental = incremental;
            debug!(incremental, "sortlist.incremental");
            if incremental || !state.engine.is_sorting() {
                return;
            }
            Some(self.inner.finish_sorting(&mut state))
        };
        if let Some(changed) = finished {
            self.inner.emit_after_finish(changed);
        }
    }

    pub fn incremental(&self) -> bool {
        self.inner.state.borrow().config.incremental
    }

    /// Completes a sort in progress right away. Does nothing when the order is final.
    pub fn finish(&self) {
        let changed = {
            let mut state = self.inner.state.borrow_mut();
            if !state.engine.is_sorting() {
                return;
            }
            self.inner.finish_sorting(&mut state)
        };
        self.inner.emit_after_finish(changed);
    }

    /// Rough number of items still to be sorted.
    ///
    /// Zero exactly when the order is final. The value is a guess meant for progress
    /// displays and is not exact, but it never goes up while the source stays
    /// unchanged; an edit or a sorter change may raise it again.
    pub fn pending_estimate(&self) -> usize {
        self.inner.state.borrow().engine.pending_estimate()
    }

    /// The section containing `position`, as a half-open range.
    ///
    /// Without a section sorter the whole list is one section. Positions past the end
    /// yield `(n_items, usize::MAX)`.
    pub fn get_section(&self, position: usize) -> (usize, usize) {
        let mut state = self.inner.state.borrow_mut();
        let n_items = state.n_items;
        if position >= n_items {
            return (n_items, usize::MAX);
        }
        let Some(source) = state.source.clone() else {
            return (0, n_items);
        };
        state
            .engine
            .section(&*source, position)
            .unwrap_or((0, n_items))
    }

    /// Registers `handler` for changes of section boundaries that moved no item.
    pub fn connect_sections_changed<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(SectionsChanged) + 'static,
    {
        self.inner.sections_changed.connect(handler)
    }

    /// Registers `handler` for changes of [`pending_estimate`](Self::pending_estimate).
    pub fn connect_pending_changed<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(usize) + 'static,
    {
        self.inner.pending_changed.connect(handler)
    }
}

impl<M, S, C> Inner<M, S, C>
where
    M: ObservableList + 'static,
    S: Sorter<Item = M::Item> + 'static,
    C: Sorter<Item = M::Item> + 'static,
{
    fn set_model(self: &Rc<Self>, model: Option<Rc<M>>) {
        let (removed, added, pending) = {
            let mut state = self.state.borrow_mut();
            let unchanged = match (&state.source, &model) {
                (Some(old), Some(new)) => Rc::ptr_eq(old, new),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                return;
            }

            let removed = state.n_items;
            self.cancel_task(&mut state);
            state.engine.clear_items();
            if let Some(old) = state.source.take() {
                old.disconnect(state.source_handler);
            }
            state.source_handler = HandlerId::INERT;
            state.n_items = 0;

            if let Some(source) = model {
                let weak = Rc::downgrade(self);
                state.source_handler = source.connect_items_changed(move |change| {
                    if let Some(inner) = weak.upgrade() {
                        inner.source_changed(change);
                    }
                });
                state.n_items = source.n_items();
                state.source = Some(source);
                if state.engine.should_sort() {
                    let n_items = state.n_items;
                    state.engine.create_items(n_items);
                    self.start_sorting(&mut state);
                }
            }

            debug!(removed, n_items = state.n_items, "sortlist.model.replaced");
            (removed, state.n_items, state.engine.pending_estimate())
        };

        if removed > 0 || added > 0 {
            self.items_changed.emit(ItemsChanged::new(0, removed, added));
        }
        self.pending_changed.emit(pending);
    }

    /// Applies a sorter change and resorts.
    fn sorters_changed(self: &Rc<Self>, sections_changed: bool, update: impl FnOnce(&mut SortEngine<S, C>)) {
        let (changed, n_items, pending) = {
            let mut state = self.state.borrow_mut();
            self.cancel_task(&mut state);
            state.engine.cancel();
            update(&mut state.engine);

            let changed = if state.engine.should_sort() && state.source.is_some() {
                if !state.engine.is_active() {
                    let n_items = state.n_items;
                    state.engine.create_items(n_items);
                }
                self.start_sorting(&mut state)
            } else {
                state.engine.clear_items()
            };

            debug!(
                sorter = state.engine.sorter().is_some(),
                section_sorter = state.engine.section_sorter().is_some(),
                n_items = state.n_items,
                "sortlist.sorter.changed"
            );
            (changed, state.n_items, state.engine.pending_estimate())
        };

        if sections_changed && n_items > 0 {
            if changed.is_some() {
                self.items_changed.emit(ItemsChanged::new(0, n_items, n_items));
            } else {
                self.sections_changed.emit(SectionsChanged {
                    position: 0,
                    n_items,
                });
            }
        } else if let Some(change) = as_change(changed) {
            self.items_changed.emit(change);
        }
        self.pending_changed.emit(pending);
    }

    /// Starts sorting from scratch: schedules steps when incremental, sorts to the end
    /// otherwise. Returns the range rearranged by a synchronous sort.
    fn start_sorting(self: &Rc<Self>, state: &mut State<M, S, C>) -> Option<Range<usize>> {
        let incremental = state.config.incremental;
        state.engine.start(None, incremental);
        if incremental {
            self.schedule(state);
            None
        } else {
            self.finish_sorting(state)
        }
    }

    /// Sorts to completion and stops stepping.
    fn finish_sorting(&self, state: &mut State<M, S, C>) -> Option<Range<usize>> {
        self.cancel_task(state);
        let source = state.source.clone()?;
        let changed = state.engine.finish(&*source);
        debug!(n_items = state.n_items, "sortlist.sort.finished");
        changed
    }

    fn emit_after_finish(&self, changed: Option<Range<usize>>) {
        if let Some(change) = as_change(changed) {
            self.items_changed.emit(change);
        }
        self.pending_changed.emit(0);
    }

    fn schedule(self: &Rc<Self>, state: &mut State<M, S, C>) {
        if state.task.is_some() {
            return;
        }
        let weak: Weak<Self> = Rc::downgrade(self);
        let id = self.scheduler.add_idle(
            "sortlist.sort",
            Box::new(move || match weak.upgrade() {
                Some(inner) => inner.sort_step(),
                None => ControlFlow::Break(()),
            }),
        );
        debug!(n_items = state.n_items, "sortlist.sort.scheduled");
        state.task = Some(id);
    }

    fn cancel_task(&self, state: &mut State<M, S, C>) {
        if let Some(id) = state.task.take() {
            self.scheduler.remove(id);
        }
    }

    /// One scheduled step.
    fn sort_step(&self) -> ControlFlow<()> {
        let (changed, pending, done) = {
            let mut state = self.state.borrow_mut();
            let Some(source) = state.source.clone() else {
                state.task = None;
                return ControlFlow::Break(());
            };
            let deadline = Instant::now().checked_add(state.config.step_budget);
            let outcome = state.engine.step(&*source, deadline);
            if outcome.progressed {
                let pending = state.engine.pending_estimate();
                trace!(
                    n_items = state.n_items,
                    pending,
                    changed = ?outcome.changed,
                    "sortlist.sort.step"
                );
                (outcome.changed, pending, false)
            } else {
                state.engine.cancel();
                state.task = None;
                debug!(n_items = state.n_items, "sortlist.sort.done");
                (None, 0, true)
            }
        };

        if let Some(change) = as_change(changed) {
            self.items_changed.emit(change);
        }
        self.pending_changed.emit(pending);

        if done {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    /// Folds a change of the source into the sorted order.
    fn source_changed(self: &Rc<Self>, change: ItemsChanged) {
        if change.is_empty() {
            return;
        }

        let (emitted, pending) = {
            let mut state = self.state.borrow_mut();
            if change.position + change.removed > state.n_items {
                warn!(
                    position = change.position,
                    removed = change.removed,
                    n_items = state.n_items,
                    "sortlist.source.out_of_range"
                );
                return;
            }

            let was_sorting = state.engine.is_sorting();
            let emitted = if state.engine.is_active() {
                self.cancel_task(&mut state);
                let source = state.source.clone();
                let incremental = state.config.incremental;
                let emitted = match source {
                    Some(source) => state.engine.splice(&*source, change, incremental),
                    None => change,
                };
                state.n_items = state.engine.len();
                if state.engine.is_sorting() {
                    self.schedule(&mut state);
                }
                emitted
            } else {
                state.n_items = state.n_items - change.removed + change.added;
                change
            };

            trace!(
                position = change.position,
                removed = change.removed,
                added = change.added,
                emitted = ?emitted,
                "sortlist.source.changed"
            );
            let pending = (was_sorting || state.engine.is_sorting()).then(|| state.engine.pending_estimate());
            (emitted, pending)
        };

        if !emitted.is_empty() {
            self.items_changed.emit(emitted);
        }
        if let Some(pending) = pending {
            self.pending_changed.emit(pending);
        }
    }
}

impl<M, S, C> Drop for Inner<M, S, C>
where
    M: ObservableList,
    S: Sorter<Item = M::Item>,
    C: Sorter<Item = M::Item>,
{
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(id) = state.task.take() {
            self.scheduler.remove(id);
        }
        if let Some(source) = state.source.take() {
            source.disconnect(state.source_handler);
        }
    }
}

impl<M, S, C> ListModel for SortListModel<M, S, C>
where
    M: ObservableList,
    S: Sorter<Item = M::Item>,
    C: Sorter<Item = M::Item>,
{
    type Item = M::Item;

    fn n_items(&self) -> usize {
        self.inner.state.borrow().n_items
    }

    fn item(&self, position: usize) -> Option<M::Item> {
        let (source, source_position) = {
            let state = self.inner.state.borrow();
            if position >= state.n_items {
                return None;
            }
            (state.source.clone()?, state.engine.source_position(position))
        };
        source.item(source_position)
    }
}

impl<M, S, C> ObservableList for SortListModel<M, S, C>
where
    M: ObservableList,
    S: Sorter<Item = M::Item>,
    C: Sorter<Item = M::Item>,
{
    fn connect_items_changed<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(ItemsChanged) + 'static,
    {
        self.inner.items_changed.connect(handler)
    }

    /// Disconnects a handler of any of the model's notifications.
    fn disconnect(&self, id: HandlerId) {
        if self.inner.items_changed.disconnect(id) {
            return;
        }
        if self.inner.sections_changed.disconnect(id) {
            return;
        }
        self.inner.pending_changed.disconnect(id);
    }
}

impl<M, S, C> fmt::Debug for SortListModel<M, S, C>
where
    M: ObservableList,
    S: Sorter<Item = M::Item>,
    C: Sorter<Item = M::Item>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("SortListModel")
            .field("n_items", &state.n_items)
            .field("incremental", &state.config.incremental)
            .field("sorting", &state.engine.is_sorting())
            .finish_non_exhaustive()
    }
}
