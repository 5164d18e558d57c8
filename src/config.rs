//! Tunables for incremental sorting.

use std::time::Duration;

/// Default cap on the number of elements moved by a single merge while sorting
/// incrementally.
///
/// Smaller caps mean more steps and more overhead in total, larger caps mean longer
/// individual steps. 1024 keeps a step around a millisecond for cheap comparators.
pub const DEFAULT_MAX_MERGE_SIZE: usize = 1024;

/// Default wall-clock budget for one incremental step.
pub const DEFAULT_STEP_BUDGET: Duration = Duration::from_millis(1);

/// Configuration for a [`SortListModel`](crate::model::SortListModel).
///
/// ```
/// use std::time::Duration;
/// use sortlist::SortConfig;
///
/// let config = SortConfig::default()
///     .with_incremental(true)
///     .with_step_budget(Duration::from_micros(500));
///
/// assert!(config.incremental);
/// assert_eq!(config.max_merge_size, 1024);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortConfig {
    /// Maximum merge size per step when sorting incrementally. `0` means unlimited.
    pub max_merge_size: usize,
    /// Time one scheduled step may spend before yielding back to the loop.
    pub step_budget: Duration,
    /// Whether sorting happens in idle steps instead of synchronously.
    pub incremental: bool,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            max_merge_size: DEFAULT_MAX_MERGE_SIZE,
            step_budget: DEFAULT_STEP_BUDGET,
            incremental: false,
        }
    }
}

impl SortConfig {
    /// Sets the merge cap. `0` removes the cap.
    pub fn with_max_merge_size(mut self, max_merge_size: usize) -> Self {
        self.max_merge_size = max_merge_size;
        self
    }

    /// Sets the per-step time budget.
    ///
    /// A zero budget is valid: every step then does the smallest unit of work it can.
    pub fn with_step_budget(mut self, step_budget: Duration) -> Self {
        self.step_budget = step_budget;
        self
    }

    /// Sets the initial incremental mode.
    pub fn with_incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }

    /// The merge cap as used by the sort, with `0` mapped to unlimited.
    pub(crate) fn merge_cap(&self) -> usize {
        if self.max_merge_size == 0 {
            usize::MAX
        } else {
            self.max_merge_size
        }
    }
}
