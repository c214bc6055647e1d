use std::cmp::Ordering;

use crate::record::RecordOrder;

/// The head record of one merge source, keyed for the tournament heap.
///
/// The same entry type drives both merges in the engine: the in-memory
/// partition merge in the chunk sorter and the k-way file merge in the
/// driver. Each entry owns a clone of the comparator so the heap can
/// order entries without reaching for shared state.
pub(crate) struct MergeHead<R, C> {
    pub(crate) record: R,
    pub(crate) source: usize,
    pub(crate) comparator: C,
}

impl<R, C: RecordOrder<R>> Eq for MergeHead<R, C> {}

impl<R, C: RecordOrder<R>> PartialEq<Self> for MergeHead<R, C> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<R, C: RecordOrder<R>> PartialOrd<Self> for MergeHead<R, C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<R, C: RecordOrder<R>> Ord for MergeHead<R, C> {
    fn cmp(&self, other: &Self) -> Ordering {
        // comparison operators are flipped to work with BinaryHeap (Max Heap)
        if self.comparator.less(&self.record, &other.record) {
            Ordering::Greater
        } else if self.comparator.less(&other.record, &self.record) {
            Ordering::Less
        } else {
            // equal records pop in source order for deterministic dedup
            other.source.cmp(&self.source)
        }
    }
}
