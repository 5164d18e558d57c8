//! Cooperative idle-task scheduling.
//!
//! Incremental sorting needs a host loop that calls back when there is nothing more
//! urgent to do. [`Scheduler`] is that contract, and [`IdleLoop`] is a small
//! single-threaded implementation that hosts without a loop of their own can drive
//! by hand.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::ControlFlow;
use std::rc::Rc;

use tracing::trace;

/// Handle of a scheduled idle task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

/// An idle task. Returning [`ControlFlow::Break`] unregisters it.
pub type IdleTask = Box<dyn FnMut() -> ControlFlow<()>>;

/// A single-threaded loop running low-priority tasks.
pub trait Scheduler {
    /// Registers `task` to be called repeatedly while the loop is idle.
    fn add_idle(&self, name: &'static str, task: IdleTask) -> TaskId;

    /// Unregisters a task. Must take effect immediately, including when called from
    /// inside the task itself: the task is not called again.
    ///
    /// Returns `false` if the task was not registered.
    fn remove(&self, id: TaskId) -> bool;
}

struct Task {
    name: &'static str,
    run: IdleTask,
}

#[derive(Default)]
struct LoopState {
    next_id: u64,
    tasks: BTreeMap<TaskId, Task>,
    running: Option<TaskId>,
    cancel_running: bool,
}

/// A manually driven idle loop.
///
/// Cloning gives another handle to the same loop. Tasks run in registration order.
///
/// ```
/// use std::cell::Cell;
/// use std::ops::ControlFlow;
/// use std::rc::Rc;
/// use sortlist::{IdleLoop, Scheduler};
///
/// let idle = IdleLoop::new();
/// let count = Rc::new(Cell::new(0));
/// let counter = Rc::clone(&count);
/// idle.add_idle("count to three", Box::new(move || {
///     counter.set(counter.get() + 1);
///     if counter.get() < 3 { ControlFlow::Continue(()) } else { ControlFlow::Break(()) }
/// }));
///
/// idle.run_until_idle();
/// assert_eq!(count.get(), 3);
/// assert!(idle.is_idle());
/// ```
#[derive(Clone, Default)]
pub struct IdleLoop {
    state: Rc<RefCell<LoopState>>,
}

thread_local! {
    static THREAD_DEFAULT: IdleLoop = IdleLoop::new();
}

impl IdleLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// The loop used by models created without an explicit scheduler on this thread.
    pub fn thread_default() -> Self {
        THREAD_DEFAULT.with(IdleLoop::clone)
    }

    /// Number of registered tasks.
    pub fn n_tasks(&self) -> usize {
        let state = self.state.borrow();
        state.tasks.len() + usize::from(state.running.is_some() && !state.cancel_running)
    }

    /// Returns `true` if no task is registered.
    pub fn is_idle(&self) -> bool {
        self.n_tasks() == 0
    }

    /// Calls every task registered at the time of the call once.
    ///
    /// Tasks added while this runs wait for the next call. Returns the number of
    /// tasks called.
    pub fn run_once(&self) -> usize {
        let ids: Vec<TaskId> = self.state.borrow().tasks.keys().copied().collect();
        let mut ran = 0;

        for id in ids {
            let task = {
                let mut state = self.state.borrow_mut();
                let task = state.tasks.remove(&id);
                if task.is_some() {
                    state.running = Some(id);
                    state.cancel_running = false;
                }
                task
            };
            // Removed by an earlier task in this pass.
            let Some(mut task) = task else {
                continue;
            };

            let flow = (task.run)();
            ran += 1;

            let finished = {
                let mut state = self.state.borrow_mut();
                state.running = None;
                let cancelled = std::mem::take(&mut state.cancel_running);
                if flow.is_continue() && !cancelled {
                    state.tasks.insert(id, task);
                    None
                } else {
                    Some(task)
                }
            };
            if let Some(task) = finished {
                trace!(task = task.name, "sortlist.idle.finished");
                // Dropped outside the borrow: captures may unregister other tasks.
                drop(task);
            }
        }

        ran
    }

    /// Runs passes until no task is left. Returns the number of passes.
    ///
    /// Never returns if some task never finishes.
    pub fn run_until_idle(&self) -> usize {
        let mut passes = 0;
        while !self.is_idle() {
            self.run_once();
            passes += 1;
        }
        passes
    }
}

impl Scheduler for IdleLoop {
    fn add_idle(&self, name: &'static str, task: IdleTask) -> TaskId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = TaskId(state.next_id);
        state.tasks.insert(id, Task { name, run: task });
        trace!(task = name, "sortlist.idle.added");
        id
    }

    fn remove(&self, id: TaskId) -> bool {
        let removed = {
            let mut state = self.state.borrow_mut();
            match state.tasks.remove(&id) {
                Some(task) => Some(task),
                None if state.running == Some(id) && !state.cancel_running => {
                    state.cancel_running = true;
                    return true;
                }
                None => return false,
            }
        };
        drop(removed);
        true
    }
}

impl fmt::Debug for IdleLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("IdleLoop")
            .field("tasks", &state.tasks.values().map(|task| task.name).collect::<Vec<_>>())
            .field("running", &state.running)
            .finish()
    }
}
