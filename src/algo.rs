//! Core sorting algorithm: a resumable, stable, natural merge sort (timsort).
//!
//! The sort operates on a slice of [`SlotId`]s and never looks at keys itself; every
//! comparison goes through the caller's comparator. All progress lives in [`TimSort`],
//! so the sort can stop after any [`TimSort::step`] and resume later:
//! - **Run detection**: ascending runs are taken as they are, strictly descending runs
//!   are reversed in place.
//! - **Binary insertion**: runs shorter than `min_run` are extended by binary insertion.
//! - **Merging**: pending runs are merged following the timsort stack invariants, with
//!   galloping to skip long stretches won by one side.
//! - **Merge cap**: a merge larger than `max_merge_size` only moves a `max_merge_size`
//!   slice of the larger run per step, leaving two valid runs behind.
//!
//! The main entry points are [`TimSort::new`], [`TimSort::with_runs`] and [`TimSort::step`].

use std::cmp::Ordering;
use std::ops::Range;

use cuneiform::cuneiform;
use smallvec::SmallVec;

use crate::core::SlotId;

/// Minimum length of a sequence worth merging. Shorter runs are extended with binary
/// insertion sort, and arrays shorter than this are sorted without any merge.
const MIN_MERGE: usize = 32;

/// Consecutive wins by one run before a merge switches to galloping.
const MIN_GALLOP: usize = 7;

/// Depth of the run stack considered by [`TimSort::progress`].
const PROGRESS_DEPTH: usize = 4;

/// Run lengths in stack order, as carried across list mutations.
pub(crate) type RunLengths = SmallVec<[usize; 16]>;

/// A sorted range `start..start + len` of the slice being sorted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Run {
    pub(crate) start: usize,
    pub(crate) len: usize,
}

impl Run {
    #[inline(always)]
    fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Smallest range covering every index moved by one or more steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Touched {
    start: usize,
    end: usize,
}

impl Default for Touched {
    fn default() -> Self {
        Self {
            start: usize::MAX,
            end: 0,
        }
    }
}

impl Touched {
    pub(crate) fn add(&mut self, start: usize, len: usize) {
        if len == 0 {
            return;
        }
        self.start = self.start.min(start);
        self.end = self.end.max(start + len);
    }

    pub(crate) fn range(&self) -> Option<Range<usize>> {
        (self.start < self.end).then_some(self.start..self.end)
    }
}

/// Returns the minimum acceptable run length for an array of length `n`.
///
/// If `n < MIN_MERGE` this is `n`. Otherwise it is a `k` in
/// `MIN_MERGE / 2..=MIN_MERGE` such that `n / k` is close to, but strictly less than,
/// a power of two, which keeps the final merges balanced.
fn compute_min_run(mut n: usize) -> usize {
    let mut r = 0;
    while n >= MIN_MERGE {
        r |= n & 1;
        n >>= 1;
    }
    n + r
}

/// State of an ongoing sort of a slice of `len` slots.
///
/// `runs` is the stack of pending runs. They are contiguous and cover
/// `0..scanned`; `scanned..len` has not been looked at yet.
#[cuneiform]
pub(crate) struct TimSort {
    len: usize,
    scanned: usize,
    min_run: usize,
    min_gallop: usize,
    max_merge_size: usize,
    runs: SmallVec<[Run; 16]>,
    tmp: Vec<SlotId>,
}

impl TimSort {
    /// Starts sorting a slice of `len` slots, merging without a size cap.
    pub(crate) fn new(len: usize) -> Self {
        Self {
            len,
            scanned: 0,
            min_run: compute_min_run(len),
            min_gallop: MIN_GALLOP,
            max_merge_size: usize::MAX,
            runs: SmallVec::new(),
            tmp: Vec::new(),
        }
    }

    /// Starts sorting a slice whose leading ranges of the given lengths are already
    /// sorted among themselves.
    pub(crate) fn with_runs(len: usize, runs: &[usize]) -> Self {
        let mut sort = Self::new(len);
        for &run in runs.iter().filter(|&&run| run > 0) {
            sort.push_run(run);
        }
        sort
    }

    /// Caps how many elements a single merge step may move. `usize::MAX` disables it.
    pub(crate) fn set_max_merge_size(&mut self, max_merge_size: usize) {
        self.max_merge_size = max_merge_size.max(1);
    }

    /// Lengths of the pending runs, bottom of the stack first.
    pub(crate) fn run_lengths(&self) -> RunLengths {
        self.runs.iter().map(|run| run.len).collect()
    }

    /// Rough measure of how much of the slice is already merged.
    ///
    /// Weighs the lengths at the bottom of the run stack. It bears no relation to how
    /// many items are in their final place and only promises to be `len` once the
    /// sort has collapsed into a single run.
    pub(crate) fn progress(&self) -> usize {
        let Some(first) = self.runs.first() else {
            return 0;
        };

        let mut last = first.len;
        let mut progress = 0;
        let mut i = 1;
        while i < PROGRESS_DEPTH + 1 && i < self.runs.len() {
            progress += (PROGRESS_DEPTH + 1 - i) * last.max(self.runs[i].len);
            last = last.min(self.runs[i].len);
            i += 1;
        }
        if i < PROGRESS_DEPTH + 1 {
            progress += (PROGRESS_DEPTH + 1 - i) * last;
        }

        progress / PROGRESS_DEPTH
    }

    fn push_run(&mut self, len: usize) {
        debug_assert!(self.scanned + len <= self.len);
        self.runs.push(Run {
            start: self.scanned,
            len,
        });
        self.scanned += len;
    }

    /// Performs one unit of work: one merge (or capped part of one), or finding the
    /// next run. Indices moved are added to `touched`.
    ///
    /// Returns `false` once the slice is sorted; nothing is done in that case.
    pub(crate) fn step<F>(&mut self, v: &mut [SlotId], compare: &mut F, touched: &mut Touched) -> bool
    where
        F: FnMut(SlotId, SlotId) -> Ordering,
    {
        debug_assert_eq!(v.len(), self.len);
        let mut is_less = |a: SlotId, b: SlotId| compare(a, b) == Ordering::Less;

        if self.merge_collapse(v, &mut is_less, touched) {
            return true;
        }

        if self.scanned == self.len {
            return self.merge_force_collapse(v, &mut is_less, touched);
        }

        let lo = self.scanned;
        let remaining = self.len - lo;
        let (mut run_len, reversed) = count_run_and_make_ascending(&mut v[lo..], &mut is_less);
        if reversed {
            touched.add(lo, run_len);
        }

        if run_len < self.min_run {
            let force = remaining.min(self.min_run);
            binary_insertion_sort(&mut v[lo..lo + force], run_len, &mut is_less);
            touched.add(lo, force);
            run_len = force;
        }

        self.push_run(run_len);
        true
    }

    /// Merges the top runs while the stack invariants are violated:
    ///
    /// 1. `runs[n - 2].len > runs[n - 1].len + runs[n].len`
    /// 2. `runs[n - 1].len > runs[n].len`
    ///
    /// checked on the top four entries, which is what keeps them valid for the whole
    /// stack.
    fn merge_collapse<F>(&mut self, v: &mut [SlotId], is_less: &mut F, touched: &mut Touched) -> bool
    where
        F: FnMut(SlotId, SlotId) -> bool,
    {
        if self.runs.len() <= 1 {
            return false;
        }

        let runs = &self.runs;
        let mut n = runs.len() - 2;
        if (n > 0 && runs[n - 1].len <= runs[n].len + runs[n + 1].len)
            || (n > 1 && runs[n - 2].len <= runs[n - 1].len + runs[n].len)
        {
            if runs[n - 1].len < runs[n + 1].len {
                n -= 1;
            }
        } else if runs[n].len > runs[n + 1].len {
            return false;
        }

        self.merge_at(n, v, is_less, touched);
        true
    }

    /// Merges the remaining runs once the whole slice has been scanned.
    fn merge_force_collapse<F>(&mut self, v: &mut [SlotId], is_less: &mut F, touched: &mut Touched) -> bool
    where
        F: FnMut(SlotId, SlotId) -> bool,
    {
        if self.runs.len() <= 1 {
            return false;
        }

        let mut n = self.runs.len() - 2;
        if n > 0 && self.runs[n - 1].len < self.runs[n + 1].len {
            n -= 1;
        }

        self.merge_at(n, v, is_less, touched);
        true
    }

    /// Merges `runs[i]` with `runs[i + 1]`, or part of them if the merge exceeds
    /// the merge cap.
    fn merge_at<F>(&mut self, i: usize, v: &mut [SlotId], is_less: &mut F, touched: &mut Touched)
    where
        F: FnMut(SlotId, SlotId) -> bool,
    {
        let first = self.runs[i];
        let second = self.runs[i + 1];
        debug_assert_eq!(first.end(), second.start);

        // Elements of the first run not greater than the head of the second are in place.
        let k = gallop_right(v[second.start], &v[first.start..first.end()], 0, is_less);
        let base1 = first.start + k;
        let len1 = first.len - k;
        if len1 == 0 {
            self.collapse_pair(i);
            return;
        }

        // Elements of the second run not less than the tail of the first are in place.
        let len2 = gallop_left(v[first.end() - 1], &v[second.start..second.end()], second.len - 1, is_less);
        if len2 == 0 {
            self.collapse_pair(i);
            return;
        }

        let cap = self.max_merge_size;
        if len1 <= len2 {
            if len1 > cap {
                // Merge only the last `cap` elements of the first run.
                let base = first.end() - cap;
                merge_lo(v, base, cap, len2, &mut self.tmp, &mut self.min_gallop, is_less);
                touched.add(base, cap + len2);
                self.runs[i].len -= cap;
                self.runs[i + 1].start -= cap;
                self.runs[i + 1].len += cap;
                return;
            }
            merge_lo(v, base1, len1, len2, &mut self.tmp, &mut self.min_gallop, is_less);
        } else {
            if len2 > cap {
                // Merge only the first `cap` elements of the second run.
                merge_hi(v, base1, len1, cap, &mut self.tmp, &mut self.min_gallop, is_less);
                touched.add(base1, len1 + cap);
                self.runs[i].len += cap;
                self.runs[i + 1].start += cap;
                self.runs[i + 1].len -= cap;
                return;
            }
            merge_hi(v, base1, len1, len2, &mut self.tmp, &mut self.min_gallop, is_less);
        }

        touched.add(base1, len1 + len2);
        self.collapse_pair(i);
    }

    fn collapse_pair(&mut self, i: usize) {
        self.runs[i].len += self.runs[i + 1].len;
        self.runs.remove(i + 1);
    }
}

/// Returns the length of the run at the start of `v` and whether it had to be
/// reversed. Descending runs must be strictly descending to keep the sort stable.
fn count_run_and_make_ascending<F>(v: &mut [SlotId], is_less: &mut F) -> (usize, bool)
where
    F: FnMut(SlotId, SlotId) -> bool,
{
    let len = v.len();
    if len < 2 {
        return (len, false);
    }

    let mut end = 2;
    if is_less(v[1], v[0]) {
        while end < len && is_less(v[end], v[end - 1]) {
            end += 1;
        }
        v[..end].reverse();
        (end, true)
    } else {
        while end < len && !is_less(v[end], v[end - 1]) {
            end += 1;
        }
        (end, false)
    }
}

/// Sorts `v` given that `v[..start]` is already sorted.
fn binary_insertion_sort<F>(v: &mut [SlotId], start: usize, is_less: &mut F)
where
    F: FnMut(SlotId, SlotId) -> bool,
{
    for i in start.max(1)..v.len() {
        let pivot = v[i];
        // Insert after every element not greater than the pivot.
        let pos = v[..i].partition_point(|&x| !is_less(pivot, x));
        v[pos..=i].rotate_right(1);
    }
}

/// Exponential search from `hint` followed by binary search.
///
/// `before` must be `true` for a prefix of `a` and `false` after it; returns the
/// length of that prefix.
fn gallop(a: &[SlotId], hint: usize, mut before: impl FnMut(SlotId) -> bool) -> usize {
    let len = a.len();
    debug_assert!(hint < len);

    let (mut lo, mut hi);
    if before(a[hint]) {
        lo = hint + 1;
        let mut ofs = 1;
        while hint + ofs < len && before(a[hint + ofs]) {
            lo = hint + ofs + 1;
            ofs = ofs * 2 + 1;
        }
        hi = (hint + ofs).min(len);
    } else {
        hi = hint;
        let mut ofs = 1;
        while ofs <= hint && !before(a[hint - ofs]) {
            hi = hint - ofs;
            ofs = ofs * 2 + 1;
        }
        lo = if ofs <= hint { hint - ofs + 1 } else { 0 };
    }

    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if before(a[mid]) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Index of the first element of `a` not less than `key` (leftmost insertion point).
fn gallop_left<F>(key: SlotId, a: &[SlotId], hint: usize, is_less: &mut F) -> usize
where
    F: FnMut(SlotId, SlotId) -> bool,
{
    gallop(a, hint, |x| is_less(x, key))
}

/// Index of the first element of `a` greater than `key` (rightmost insertion point).
fn gallop_right<F>(key: SlotId, a: &[SlotId], hint: usize, is_less: &mut F) -> usize
where
    F: FnMut(SlotId, SlotId) -> bool,
{
    gallop(a, hint, |x| !is_less(key, x))
}

/// Merges `v[base1..base1 + len1]` with the following `len2` elements, in place,
/// front to back. Needs `len1 <= len2` to keep `tmp` small.
///
/// Expects the head of the second run to be less than the head of the first, and the
/// tail of the first run to be greater than every element of the second.
fn merge_lo<F>(
    v: &mut [SlotId],
    base1: usize,
    mut len1: usize,
    mut len2: usize,
    tmp: &mut Vec<SlotId>,
    min_gallop: &mut usize,
    is_less: &mut F,
) where
    F: FnMut(SlotId, SlotId) -> bool,
{
    debug_assert!(len1 > 0 && len2 > 0);
    tmp.clear();
    tmp.extend_from_slice(&v[base1..base1 + len1]);

    let mut c1 = 0;
    let mut c2 = base1 + len1;
    let mut dest = base1;

    v[dest] = v[c2];
    dest += 1;
    c2 += 1;
    len2 -= 1;
    if len2 == 0 {
        v[dest..dest + len1].copy_from_slice(&tmp[c1..c1 + len1]);
        return;
    }
    if len1 == 1 {
        v.copy_within(c2..c2 + len2, dest);
        v[dest + len2] = tmp[c1];
        return;
    }

    let mut gallop_at = *min_gallop;
    'outer: loop {
        let mut count1 = 0;
        let mut count2 = 0;

        // One element at a time until one run starts winning consistently.
        loop {
            if is_less(v[c2], tmp[c1]) {
                v[dest] = v[c2];
                dest += 1;
                c2 += 1;
                len2 -= 1;
                count2 += 1;
                count1 = 0;
                if len2 == 0 {
                    break 'outer;
                }
            } else {
                v[dest] = tmp[c1];
                dest += 1;
                c1 += 1;
                len1 -= 1;
                count1 += 1;
                count2 = 0;
                if len1 == 1 {
                    break 'outer;
                }
            }
            if count1.max(count2) >= gallop_at {
                break;
            }
        }

        // Galloping until neither run wins by much.
        loop {
            count1 = gallop_right(v[c2], &tmp[c1..c1 + len1], 0, is_less);
            if count1 != 0 {
                v[dest..dest + count1].copy_from_slice(&tmp[c1..c1 + count1]);
                dest += count1;
                c1 += count1;
                len1 -= count1;
                if len1 <= 1 {
                    break 'outer;
                }
            }
            v[dest] = v[c2];
            dest += 1;
            c2 += 1;
            len2 -= 1;
            if len2 == 0 {
                break 'outer;
            }

            count2 = gallop_left(tmp[c1], &v[c2..c2 + len2], 0, is_less);
            if count2 != 0 {
                v.copy_within(c2..c2 + count2, dest);
                dest += count2;
                c2 += count2;
                len2 -= count2;
                if len2 == 0 {
                    break 'outer;
                }
            }
            v[dest] = tmp[c1];
            dest += 1;
            c1 += 1;
            len1 -= 1;
            if len1 == 1 {
                break 'outer;
            }

            gallop_at = gallop_at.saturating_sub(1);
            if count1 < MIN_GALLOP && count2 < MIN_GALLOP {
                break;
            }
        }
        gallop_at += 2;
    }
    *min_gallop = gallop_at.max(1);

    if len1 == 1 {
        v.copy_within(c2..c2 + len2, dest);
        v[dest + len2] = tmp[c1];
    } else if len1 > 0 {
        v[dest..dest + len1].copy_from_slice(&tmp[c1..c1 + len1]);
    }
}

/// Merges `v[base1..base1 + len1]` with the following `len2` elements, in place,
/// back to front. Needs `len2 <= len1` to keep `tmp` small.
///
/// Same expectations as [`merge_lo`].
fn merge_hi<F>(
    v: &mut [SlotId],
    base1: usize,
    mut len1: usize,
    mut len2: usize,
    tmp: &mut Vec<SlotId>,
    min_gallop: &mut usize,
    is_less: &mut F,
) where
    F: FnMut(SlotId, SlotId) -> bool,
{
    debug_assert!(len1 > 0 && len2 > 0);
    let base2 = base1 + len1;
    tmp.clear();
    tmp.extend_from_slice(&v[base2..base2 + len2]);

    // Remaining: v[base1..base1 + len1] and tmp[..len2]; output ends at base1 + len1 + len2.
    v[base1 + len1 + len2 - 1] = v[base1 + len1 - 1];
    len1 -= 1;
    if len1 == 0 {
        v[base1..base1 + len2].copy_from_slice(&tmp[..len2]);
        return;
    }
    if len2 == 1 {
        v.copy_within(base1..base1 + len1, base1 + 1);
        v[base1] = tmp[0];
        return;
    }

    let mut gallop_at = *min_gallop;
    'outer: loop {
        let mut count1 = 0;
        let mut count2 = 0;

        loop {
            let dest = base1 + len1 + len2 - 1;
            if is_less(tmp[len2 - 1], v[base1 + len1 - 1]) {
                v[dest] = v[base1 + len1 - 1];
                len1 -= 1;
                count1 += 1;
                count2 = 0;
                if len1 == 0 {
                    break 'outer;
                }
            } else {
                v[dest] = tmp[len2 - 1];
                len2 -= 1;
                count2 += 1;
                count1 = 0;
                if len2 == 1 {
                    break 'outer;
                }
            }
            if count1.max(count2) >= gallop_at {
                break;
            }
        }

        loop {
            count1 = len1 - gallop_right(tmp[len2 - 1], &v[base1..base1 + len1], len1 - 1, is_less);
            if count1 != 0 {
                let src = base1 + len1 - count1;
                v.copy_within(src..src + count1, src + len2);
                len1 -= count1;
                if len1 == 0 {
                    break 'outer;
                }
            }
            v[base1 + len1 + len2 - 1] = tmp[len2 - 1];
            len2 -= 1;
            if len2 == 1 {
                break 'outer;
            }

            count2 = len2 - gallop_left(v[base1 + len1 - 1], &tmp[..len2], len2 - 1, is_less);
            if count2 != 0 {
                let dst = base1 + len1 + len2 - count2;
                v[dst..dst + count2].copy_from_slice(&tmp[len2 - count2..len2]);
                len2 -= count2;
                if len2 <= 1 {
                    break 'outer;
                }
            }
            v[base1 + len1 + len2 - 1] = v[base1 + len1 - 1];
            len1 -= 1;
            if len1 == 0 {
                break 'outer;
            }

            gallop_at = gallop_at.saturating_sub(1);
            if count1 < MIN_GALLOP && count2 < MIN_GALLOP {
                break;
            }
        }
        gallop_at += 2;
    }
    *min_gallop = gallop_at.max(1);

    if len2 == 1 {
        v.copy_within(base1..base1 + len1, base1 + 1);
        v[base1] = tmp[0];
    } else if len2 > 0 {
        v[base1..base1 + len2].copy_from_slice(&tmp[..len2]);
    }
}
