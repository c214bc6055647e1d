use std::path::PathBuf;

use crate::io_handler::IoMode;

/// In-memory partition size for the parallel chunk sort. The split
/// phase flushes at a third of the memory budget, so partitions of
/// this size leave headroom for the partition merge.
const PARTITION_SIZE: usize = 100_000_000;

/// Frozen settings for one sort invocation, derived from the builder.
#[derive(Clone)]
pub(crate) struct Config {
    tmp: PathBuf,
    workers: usize,
    max_files: usize,
    memory_budget: usize,
    block_size: usize,
    partition_size: usize,
    remove_duplicates: bool,
    io_mode: IoMode,
}

impl Config {
    pub(crate) fn new(
        tmp: PathBuf,
        workers: usize,
        max_files: usize,
        memory_budget: usize,
        block_size: usize,
        remove_duplicates: bool,
        io_mode: IoMode,
    ) -> Config {
        Config {
            tmp,
            workers,
            max_files,
            memory_budget,
            block_size,
            partition_size: PARTITION_SIZE,
            remove_duplicates,
            io_mode,
        }
    }

    pub(crate) fn tmp(&self) -> &PathBuf {
        &self.tmp
    }

    pub(crate) fn workers(&self) -> usize {
        self.workers
    }

    pub(crate) fn max_files(&self) -> usize {
        self.max_files
    }

    pub(crate) fn memory_budget(&self) -> usize {
        self.memory_budget
    }

    pub(crate) fn block_size(&self) -> usize {
        self.block_size
    }

    pub(crate) fn partition_size(&self) -> usize {
        self.partition_size
    }

    pub(crate) fn remove_duplicates(&self) -> bool {
        self.remove_duplicates
    }

    pub(crate) fn io_mode(&self) -> IoMode {
        self.io_mode
    }
}
