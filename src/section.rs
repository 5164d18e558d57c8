//! Section boundary search.
//!
//! Both searches take the number of positions, the position to start from, and a
//! predicate telling whether the item at a position shares the section of the item at
//! the start position. They return the half-open range of the section.

/// Linear scan outward from `position`. Used while the order is not final, when equal
/// sections need not be contiguous; the result is the contiguous stretch around
/// `position`.
pub(crate) fn find_unsorted(len: usize, position: usize, mut same: impl FnMut(usize) -> bool) -> (usize, usize) {
    debug_assert!(position < len);

    let mut start = position;
    while start > 0 && same(start - 1) {
        start -= 1;
    }

    let mut end = position + 1;
    while end < len && same(end) {
        end += 1;
    }

    (start, end)
}

/// Exponential probe outward from `position`, then binary search for each boundary.
///
/// Needs every section to be contiguous. Takes `O(log d)` comparisons where `d` is
/// the distance to the boundary.
pub(crate) fn find_sorted(len: usize, position: usize, mut same: impl FnMut(usize) -> bool) -> (usize, usize) {
    debug_assert!(position < len);

    // `max` is always in the section; look for a `min` that is not.
    let mut max = position;
    let mut step = 1usize;
    while max > 0 {
        let mut min = max - max.min(step);
        step = step.saturating_mul(2);
        if same(min) {
            max = min;
            continue;
        }
        while max - min > 1 {
            let mid = min + (max - min) / 2;
            if same(mid) {
                max = mid;
            } else {
                min = mid;
            }
        }
        break;
    }
    let start = max;

    // `min` is always in the section; look for a `max` that is not.
    let mut min = position;
    let mut step = 1usize;
    while min < len - 1 {
        let mut max = min + (len - 1 - min).min(step);
        step = step.saturating_mul(2);
        if same(max) {
            min = max;
            continue;
        }
        while max - min > 1 {
            let mid = min + (max - min) / 2;
            if same(mid) {
                min = mid;
            } else {
                max = mid;
            }
        }
        break;
    }

    (start, min + 1)
}
