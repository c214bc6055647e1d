use std::cmp::max;
use std::marker::PhantomData;
use std::path::PathBuf;

use anyhow::anyhow;
use anyhow::Context;
use rlimit::getrlimit;
use rlimit::setrlimit;
use rlimit::Resource;

use crate::config::Config;
use crate::deadline::Deadline;
use crate::external_sort;
use crate::io_handler::IoMode;
use crate::record::NaturalOrder;
use crate::record::Record;
use crate::record::RecordOrder;

/// How a sort invocation ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortStatus {
    /// The output file holds the sorted records.
    Completed,
    /// The deadline expired. The output path was not touched and every
    /// temp file was removed.
    Aborted,
}

/// Sort a file of records that may be larger than available memory.
///
/// The input is read through the record codec into memory chunks,
/// each chunk is sorted in parallel and written to a temp file, and
/// the resulting runs are merged bottom up `max_files` at a time
/// until a single sorted file remains.
///
/// # Examples
/// ```no_run
/// use std::path::PathBuf;
/// use record_file_sort::line_record::LineRecord;
/// use record_file_sort::sort::Sort;
///
/// // parallel text sort
/// fn sort_lines(input: PathBuf, output: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
///     let mut sort: Sort<LineRecord> = Sort::new(input, output);
///     // set the number of CPU cores the chunk sorter will attempt to
///     // use. Zero means all available cores.
///     sort.with_workers(2);
///     // set the directory for intermediate runs. For large files it
///     // is recommended to provide a dedicated directory on the same
///     // file system as the output.
///     sort.with_tmp_dir(tmp);
///     sort.sort()?;
///     Ok(())
/// }
/// ```
pub struct Sort<R: Record, C: RecordOrder<R> = NaturalOrder> {
    input: PathBuf,
    output: PathBuf,
    tmp: PathBuf,
    workers: usize,
    max_files: usize,
    memory_budget: usize,
    block_size: usize,
    remove_duplicates: bool,
    io_mode: IoMode,
    deadline: Deadline,
    comparator: C,
    record: PhantomData<R>,
}

impl<R: Record> Sort<R, NaturalOrder> {
    /// Create a sort definition over the record kind's natural order.
    ///
    /// Defaults: the system temp directory for intermediate runs, one
    /// worker, fan-in of 1024 runs per merge pass, a 1 GB memory
    /// budget, 4 KB stream buffers, duplicates kept, plain streams and
    /// no deadline.
    pub fn new(input: PathBuf, output: PathBuf) -> Sort<R, NaturalOrder> {
        Sort::with_comparator(input, output, NaturalOrder)
    }
}

impl<R: Record, C: RecordOrder<R>> Sort<R, C> {
    /// Create a sort definition over a caller supplied order. See
    /// [crate::record::FnOrder] for wrapping a closure.
    pub fn with_comparator(input: PathBuf, output: PathBuf, comparator: C) -> Sort<R, C> {
        Sort {
            input,
            output,
            tmp: std::env::temp_dir(),
            workers: 1,
            max_files: 1024,
            memory_budget: 1_000_000_000,
            block_size: 4096,
            remove_duplicates: false,
            io_mode: IoMode::Plain,
            deadline: Deadline::unlimited(),
            comparator,
            record: PhantomData,
        }
    }

    /// Set the directory for intermediate runs. By default use
    /// std::env::temp_dir(). It is recommended for large files to
    /// create a dedicated directory on the same file system as the
    /// output target.
    pub fn with_tmp_dir(&mut self, tmp: PathBuf) {
        self.tmp = tmp;
    }

    /// Set the upper bound on sorting threads per chunk. Zero means
    /// use all available cores.
    pub fn with_workers(&mut self, workers: usize) {
        self.workers = workers;
    }

    /// Set the fan-in of each merge pass. Must be at least 2.
    pub fn with_max_files(&mut self, max_files: usize) {
        self.max_files = max_files;
    }

    /// Set the ceiling in bytes for the in-memory buffer before a
    /// chunk is sorted and flushed to a run.
    pub fn with_memory_budget(&mut self, memory_budget: usize) {
        self.memory_budget = memory_budget;
    }

    /// Set the per stream read ahead budget in bytes during a merge,
    /// which is also the stream buffer size.
    pub fn with_block_size(&mut self, block_size: usize) {
        self.block_size = block_size;
    }

    /// Collapse adjacent equal records. Equality is derived from the
    /// comparator.
    pub fn with_remove_duplicates(&mut self, remove_duplicates: bool) {
        self.remove_duplicates = remove_duplicates;
    }

    /// Set the stream framing. The mode applies to the input, to every
    /// intermediate run and to the output.
    pub fn with_io_mode(&mut self, io_mode: IoMode) {
        self.io_mode = io_mode;
    }

    /// Bound the wall clock time of the invocation. An expired
    /// deadline aborts the sort cleanly: temp files are removed, the
    /// output path is not touched and [Sort::sort] returns
    /// [SortStatus::Aborted].
    pub fn with_deadline(&mut self, deadline: Deadline) {
        self.deadline = deadline;
    }

    /// Sort the input file into the output file.
    pub fn sort(&self) -> Result<SortStatus, anyhow::Error> {
        self.validate()?;
        let config = self.create_config();
        let (current_soft, current_hard) = Self::get_rlimits()?;
        log::info!("Current rlimit NOFILE, soft: {}, hard: {}", current_soft, current_hard);
        let new_soft = max((config.max_files() + 256) as u64, current_soft);
        log::info!("Set new rlimit NOFILE, soft: {}, hard: {}", new_soft, current_hard);
        Self::set_rlimits(new_soft, current_hard)?;

        let mut deadline = self.deadline.clone();
        deadline.restart();
        let result = external_sort::run::<R, C>(&config, &self.input, &self.output, &self.comparator, &mut deadline);

        log::info!("Restore rlimit NOFILE, soft: {}, hard: {}", current_soft, current_hard);
        Self::set_rlimits(current_soft, current_hard)?;
        result
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_files < 2 {
            return Err(anyhow!("max_files must be at least 2, got: {}", self.max_files));
        }
        if self.memory_budget == 0 {
            return Err(anyhow!("memory_budget must be positive"));
        }
        if self.block_size == 0 {
            return Err(anyhow!("block_size must be positive"));
        }
        if !self.input.is_file() {
            return Err(anyhow!("input file does not exist: {}", self.input.display()));
        }
        if !self.tmp.is_dir() {
            return Err(anyhow!("tmp dir does not exist: {}", self.tmp.display()));
        }
        Ok(())
    }

    fn create_config(&self) -> Config {
        let mut workers = self.workers;
        if workers == 0 {
            workers = num_cpus::get();
        }
        Config::new(
            self.tmp.clone(),
            workers,
            self.max_files,
            self.memory_budget,
            self.block_size,
            self.remove_duplicates,
            self.io_mode,
        )
    }

    fn get_rlimits() -> Result<(u64, u64), anyhow::Error> {
        getrlimit(Resource::NOFILE).with_context(|| "getrlimit")
    }

    fn set_rlimits(soft: u64, hard: u64) -> Result<(), anyhow::Error> {
        setrlimit(Resource::NOFILE, soft, hard)
            .with_context(|| format!("set rlimit NOFILE, soft: {}, hard: {}", soft, hard))?;
        Ok(())
    }
}
