use rand::Rng;

use crate::deadline::Deadline;
use crate::record::RecordOrder;

/// Ranges shorter than this are insertion sorted.
const INSERTION_THRESHOLD: usize = 16;

/// Introspective comparison sort with a guaranteed O(n log n) worst
/// case: quicksort with a random pivot, falling back to heap sort when
/// the recursion depth exceeds twice the log of the range length, and
/// to insertion sort on small ranges.
///
/// The deadline is consulted at every partition step, heapify step and
/// insertion step. Early termination leaves the range partially
/// ordered and returns control to the caller, which is expected to
/// check [Deadline::expired] before using the data.
pub(crate) fn sort<R, C>(data: &mut [R], comparator: &C, deadline: &mut Deadline)
where
    C: RecordOrder<R>,
{
    sort_range(data, comparator, deadline, 0, data.len())
}

/// Sort the half open index range `[lo, hi)` of `data`.
pub(crate) fn sort_range<R, C>(data: &mut [R], comparator: &C, deadline: &mut Deadline, lo: usize, hi: usize)
where
    C: RecordOrder<R>,
{
    if hi - lo < 2 {
        return;
    }
    let max_depth = 2 * (hi - lo).ilog2() as usize;
    introsort_rec(data, max_depth, comparator, lo, hi, deadline, 0);
}

fn introsort_rec<R, C>(
    data: &mut [R],
    max_depth: usize,
    comparator: &C,
    lo: usize,
    hi: usize,
    deadline: &mut Deadline,
    current_depth: usize,
) where
    C: RecordOrder<R>,
{
    if lo >= hi {
        return;
    }
    if !deadline.tick() {
        return;
    }

    if hi - lo < INSERTION_THRESHOLD {
        insertion_sort(data, comparator, lo, hi, deadline);
        return;
    }

    if current_depth >= max_depth {
        heap_sort(data, comparator, lo, hi, deadline);
        return;
    }

    let pivot = partition_random(data, comparator, lo, hi, deadline);
    if !deadline.tick() {
        return;
    }
    introsort_rec(data, max_depth, comparator, lo, pivot, deadline, current_depth + 1);
    if !deadline.tick() {
        return;
    }
    introsort_rec(data, max_depth, comparator, pivot + 1, hi, deadline, current_depth + 1);
}

/// Lomuto partition around a pivot drawn uniformly from `[lo, hi)` and
/// swapped into the last slot. Returns the pivot's final index.
fn partition_random<R, C>(data: &mut [R], comparator: &C, lo: usize, hi: usize, deadline: &mut Deadline) -> usize
where
    C: RecordOrder<R>,
{
    let pivot = rand::thread_rng().gen_range(lo..hi);
    data.swap(pivot, hi - 1);
    let mut left = lo;
    for right in lo..hi - 1 {
        if !deadline.tick() {
            return lo;
        }
        if comparator.less(&data[right], &data[hi - 1]) {
            data.swap(left, right);
            left += 1;
        }
    }
    data.swap(left, hi - 1);
    left
}

fn insertion_sort<R, C>(data: &mut [R], comparator: &C, lo: usize, hi: usize, deadline: &mut Deadline)
where
    C: RecordOrder<R>,
{
    for j in lo + 1..hi {
        let mut i = j;
        while i > lo {
            if !deadline.tick() {
                return;
            }
            if comparator.less(&data[i], &data[i - 1]) {
                data.swap(i, i - 1);
                i -= 1;
            } else {
                break;
            }
        }
    }
}

/// Max heap built in place on the range, with indices relative to `lo`
/// so the sort behaves identically under any range offset.
fn heap_sort<R, C>(data: &mut [R], comparator: &C, lo: usize, hi: usize, deadline: &mut Deadline)
where
    C: RecordOrder<R>,
{
    build_max_heap(data, comparator, lo, hi - lo, deadline);
    if !deadline.tick() {
        return;
    }
    for i in (lo + 1..hi).rev() {
        if !deadline.tick() {
            return;
        }
        data.swap(lo, i);
        heapify(data, comparator, lo, lo, i - lo, deadline);
    }
}

fn build_max_heap<R, C>(data: &mut [R], comparator: &C, lo: usize, heap_size: usize, deadline: &mut Deadline)
where
    C: RecordOrder<R>,
{
    if heap_size < 2 {
        return;
    }
    let mut i = (heap_size - 2) / 2;
    loop {
        heapify(data, comparator, lo, i + lo, heap_size, deadline);
        if !deadline.tick() {
            return;
        }
        if i == 0 {
            break;
        }
        i -= 1;
    }
}

fn left(pos: usize, lo: usize) -> usize {
    ((pos - lo) << 1) + lo + 1
}

fn right(pos: usize, lo: usize) -> usize {
    ((pos - lo) << 1) + lo + 2
}

fn heapify<R, C>(data: &mut [R], comparator: &C, lo: usize, pos: usize, heap_size: usize, deadline: &mut Deadline)
where
    C: RecordOrder<R>,
{
    let mut pos = pos;
    while pos < heap_size + lo {
        if !deadline.tick() {
            return;
        }
        let l = left(pos, lo);
        let r = right(pos, lo);
        let mut max_val_pos = pos;
        if l < heap_size + lo && comparator.less(&data[pos], &data[l]) {
            max_val_pos = l;
        }
        if r < heap_size + lo && comparator.less(&data[max_val_pos], &data[r]) {
            max_val_pos = r;
        }
        if max_val_pos != pos {
            data.swap(pos, max_val_pos);
            pos = max_val_pos;
        } else {
            break;
        }
    }
}
