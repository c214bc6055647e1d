use std::cmp::min;
use std::collections::BinaryHeap;
use std::mem;
use std::sync::mpsc;

use anyhow::anyhow;

use crate::deadline::Deadline;
use crate::introsort;
use crate::merge_head::MergeHead;
use crate::record::Record;
use crate::record::RecordOrder;
use crate::worker_pool::WorkerPool;

/// Sort one memory resident chunk, splitting it into partitions of
/// roughly `partition_size` bytes of record footprint, sorting the
/// partitions on a worker pool and re-imposing global order with a
/// tournament heap over the partition heads.
///
/// With a single partition or a single worker the chunk is sorted
/// directly. When the deadline expires mid flight the records are
/// returned partially ordered; the caller must check
/// [Deadline::expired] before writing the result anywhere.
pub(crate) fn sort_chunk<R, C>(
    data: Vec<R>,
    workers: usize,
    partition_size: usize,
    remove_duplicates: bool,
    comparator: &C,
    deadline: &mut Deadline,
) -> Result<Vec<R>, anyhow::Error>
where
    R: Record,
    C: RecordOrder<R>,
{
    if data.is_empty() {
        return Ok(data);
    }

    let offsets = partition_offsets(&data, partition_size);
    let parts = offsets.len() - 1;

    if parts == 1 || workers == 1 {
        let mut data = data;
        introsort::sort(&mut data, comparator, deadline);
        if remove_duplicates && !deadline.expired() {
            dedup_adjacent(&mut data, comparator);
        }
        return Ok(data);
    }

    let partitions = split_partitions(data, &offsets);
    let sorted = sort_partitions(partitions, min(workers, parts), comparator, deadline)?;

    if deadline.expired() {
        // abandon the merge, hand the records back as they are
        return Ok(sorted.into_iter().flatten().collect());
    }

    let mut merged = merge_partitions(sorted, comparator, deadline);
    if remove_duplicates && !deadline.expired() {
        dedup_adjacent(&mut merged, comparator);
    }
    Ok(merged)
}

/// Cut partition boundaries where the running sum of record footprints
/// reaches `partition_size`. Returns offsets `0 = o0 < o1 < .. < ok = len`.
fn partition_offsets<R: Record>(data: &[R], partition_size: usize) -> Vec<usize> {
    let mut offsets = vec![0];
    let mut accumulated = data[0].mem_size();
    for i in 1..data.len() {
        accumulated += data[i].mem_size();
        if accumulated >= partition_size {
            offsets.push(i);
            accumulated = 0;
        }
    }
    offsets.push(data.len());
    offsets
}

fn split_partitions<R>(mut data: Vec<R>, offsets: &[usize]) -> Vec<Vec<R>> {
    let parts = offsets.len() - 1;
    let mut partitions = Vec::with_capacity(parts);
    for i in (0..parts).rev() {
        partitions.push(data.split_off(offsets[i]));
    }
    partitions.reverse();
    partitions
}

/// Sort each partition in its own pool task. Every task owns its
/// partition, a comparator clone and a deadline copy, and returns the
/// sorted partition over a channel.
fn sort_partitions<R, C>(
    partitions: Vec<Vec<R>>,
    workers: usize,
    comparator: &C,
    deadline: &mut Deadline,
) -> Result<Vec<Vec<R>>, anyhow::Error>
where
    R: Record,
    C: RecordOrder<R>,
{
    let parts = partitions.len();
    let pool = WorkerPool::new(workers)?;
    let (sender, receiver) = mpsc::channel();
    for (index, mut partition) in partitions.into_iter().enumerate() {
        let sender = sender.clone();
        let task_comparator = comparator.clone();
        let mut task_deadline = deadline.clone();
        pool.submit(Box::new(move || {
            introsort::sort(&mut partition, &task_comparator, &mut task_deadline);
            let _ = sender.send((index, partition));
        }));
    }
    drop(sender);
    pool.stop_all_workers();
    pool.wait_workers()?;

    let mut sorted: Vec<Option<Vec<R>>> = (0..parts).map(|_| None).collect();
    for (index, partition) in receiver {
        sorted[index] = Some(partition);
    }
    sorted
        .into_iter()
        .map(|partition| partition.ok_or_else(|| anyhow!("worker dropped a partition")))
        .collect()
}

fn merge_partitions<R, C>(partitions: Vec<Vec<R>>, comparator: &C, deadline: &mut Deadline) -> Vec<R>
where
    R: Record,
    C: RecordOrder<R>,
{
    let total: usize = partitions.iter().map(|p| p.len()).sum();
    let mut result = Vec::with_capacity(total);
    let mut cursors: Vec<std::vec::IntoIter<R>> = partitions.into_iter().map(|p| p.into_iter()).collect();

    let mut heap = BinaryHeap::with_capacity(cursors.len());
    for (source, cursor) in cursors.iter_mut().enumerate() {
        if let Some(record) = cursor.next() {
            heap.push(
                MergeHead {
                    record,
                    source,
                    comparator: comparator.clone(),
                }
            );
        }
    }

    while let Some(head) = heap.pop() {
        if !deadline.tick() {
            result.push(head.record);
            for entry in mem::take(&mut heap) {
                result.push(entry.record);
            }
            for cursor in cursors.drain(..) {
                result.extend(cursor);
            }
            return result;
        }
        let MergeHead { record, source, comparator: head_comparator } = head;
        result.push(record);
        if let Some(next) = cursors[source].next() {
            heap.push(
                MergeHead {
                    record: next,
                    source,
                    comparator: head_comparator,
                }
            );
        }
    }
    result
}

/// Collapse runs of adjacent equal records, keeping the first of each
/// run.
fn dedup_adjacent<R, C>(data: &mut Vec<R>, comparator: &C)
where
    C: RecordOrder<R>,
{
    data.dedup_by(|current, previous| comparator.equal(previous, current));
}
