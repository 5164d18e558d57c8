//! Sparse index set stored as sorted, disjoint, non-adjacent ranges.
//!
//! Missing keys are almost always a handful of contiguous blocks (everything after a
//! comparator change, the items of one splice), so ranges beat a dense bitmap.

use std::ops::Range;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct RangeSet {
    ranges: Vec<Range<usize>>,
}

impl RangeSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Set containing `start..start + len`.
    pub(crate) fn with_range(start: usize, len: usize) -> Self {
        let mut set = Self::new();
        set.insert_range(start, len);
        set
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of indices in the set.
    pub(crate) fn len(&self) -> usize {
        self.ranges.iter().map(|r| r.end - r.start).sum()
    }

    pub(crate) fn contains(&self, index: usize) -> bool {
        // First range ending after index.
        let i = self.ranges.partition_point(|r| r.end <= index);
        self.ranges.get(i).is_some_and(|r| r.start <= index)
    }

    /// Removes and returns the smallest index.
    pub(crate) fn pop_first(&mut self) -> Option<usize> {
        let first = self.ranges.first_mut()?;
        let index = first.start;
        first.start += 1;
        if first.start == first.end {
            self.ranges.remove(0);
        }
        Some(index)
    }

    pub(crate) fn remove(&mut self, index: usize) {
        self.remove_range(index, 1);
    }

    pub(crate) fn insert_range(&mut self, start: usize, len: usize) {
        if len == 0 {
            return;
        }
        let end = start + len;
        // Ranges touching or overlapping start..end get absorbed.
        let lo = self.ranges.partition_point(|r| r.end < start);
        let hi = self.ranges.partition_point(|r| r.start <= end);

        let mut merged = start..end;
        if lo < hi {
            merged.start = merged.start.min(self.ranges[lo].start);
            merged.end = merged.end.max(self.ranges[hi - 1].end);
        }
        self.ranges.splice(lo..hi, std::iter::once(merged));
    }

    pub(crate) fn remove_range(&mut self, start: usize, len: usize) {
        if len == 0 {
            return;
        }
        let end = start + len;
        let lo = self.ranges.partition_point(|r| r.end <= start);
        let hi = self.ranges.partition_point(|r| r.start < end);
        if lo >= hi {
            return;
        }

        let mut keep = Vec::with_capacity(2);
        let head = self.ranges[lo].start..start;
        let tail = end..self.ranges[hi - 1].end;
        if head.start < head.end {
            keep.push(head);
        }
        if tail.start < tail.end {
            keep.push(tail);
        }
        self.ranges.splice(lo..hi, keep);
    }

    /// Mirrors a list splice: indices in `position..position + removed` disappear,
    /// later indices move by `added - removed`, and the `added` new indices starting
    /// at `position` are not in the set.
    pub(crate) fn splice(&mut self, position: usize, removed: usize, added: usize) {
        self.remove_range(position, removed);

        let mut shifted = Vec::with_capacity(self.ranges.len() + 1);
        for range in self.ranges.drain(..) {
            if range.end <= position {
                shifted.push(range);
            } else if range.start >= position {
                shifted.push(range.start - removed + added..range.end - removed + added);
            } else {
                // Straddles position, which only happens when nothing was removed.
                shifted.push(range.start..position);
                shifted.push(position + added..range.end + added);
            }
        }

        // Removal can leave two ranges touching at `position`.
        for range in shifted {
            match self.ranges.last_mut() {
                Some(last) if last.end >= range.start => last.end = last.end.max(range.end),
                _ => self.ranges.push(range),
            }
        }
    }
}
