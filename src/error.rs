//! Error type for caller mistakes on mutable collections.
//!
//! Reads never fail: out-of-range positions yield `None` or a sentinel range. The only
//! errors in this crate are edits that do not fit the collection being edited.

use thiserror::Error;

/// Errors returned by [`ListStore`](crate::store::ListStore) mutations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A splice would remove items past the end of the list.
    #[error("cannot remove {removed} items at position {position} from a list of {len} items")]
    SpliceOutOfRange {
        /// Position the splice starts at.
        position: usize,
        /// Number of items the splice tried to remove.
        removed: usize,
        /// Length of the list at the time of the splice.
        len: usize,
    },

    /// A single-item access or insertion was past the end of the list.
    #[error("position {position} is out of range for a list of {len} items")]
    PositionOutOfRange {
        /// The offending position.
        position: usize,
        /// Length of the list at the time of the call.
        len: usize,
    },
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
