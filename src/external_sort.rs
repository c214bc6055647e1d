use std::collections::BinaryHeap;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::fs;
use std::fs::File;
use std::io::BufReader;
use std::io::BufWriter;
use std::mem;
use std::path::Path;
use std::path::PathBuf;

use anyhow::anyhow;
use anyhow::Context;
use data_encoding::HEXLOWER;

use crate::chunk_sorter;
use crate::config::Config;
use crate::deadline::Deadline;
use crate::io_handler::IoMode;
use crate::io_handler::RecordReader;
use crate::io_handler::RecordWriter;
use crate::merge_head::MergeHead;
use crate::record::Record;
use crate::record::RecordOrder;
use crate::sort::SortStatus;

/// The set of temp files currently owned by the sort. Paths enter the
/// registry when a run is created and leave it when the run is
/// consumed by a merge or becomes the final output. Whatever remains
/// on a non success exit is deleted.
pub(crate) struct TempRegistry {
    paths: HashSet<PathBuf>,
}

impl TempRegistry {
    fn new() -> TempRegistry {
        TempRegistry {
            paths: HashSet::new(),
        }
    }

    fn register(&mut self, path: PathBuf) {
        self.paths.insert(path);
    }

    fn deregister(&mut self, path: &Path) {
        self.paths.remove(path);
    }

    fn len(&self) -> usize {
        self.paths.len()
    }

    fn remove_all(&mut self) {
        for path in self.paths.drain() {
            if let Err(e) = fs::remove_file(&path) {
                log::warn!("Failed to remove temp file {}: {}", path.display(), e);
            }
        }
    }
}

/// Run one sort invocation: split the input into sorted runs, merge
/// them bottom up until one remains, move it to the output path. On
/// deadline expiry or error every registered temp file is removed.
pub(crate) fn run<R, C>(
    config: &Config,
    input: &Path,
    output: &Path,
    comparator: &C,
    deadline: &mut Deadline,
) -> Result<SortStatus, anyhow::Error>
where
    R: Record,
    C: RecordOrder<R>,
{
    let mut registry = TempRegistry::new();
    match drive::<R, C>(config, input, output, comparator, deadline, &mut registry) {
        Ok(SortStatus::Completed) => Ok(SortStatus::Completed),
        Ok(SortStatus::Aborted) => {
            log::info!("Sort aborted on expired deadline, removing {} temp files", registry.len());
            registry.remove_all();
            Ok(SortStatus::Aborted)
        }
        Err(e) => {
            registry.remove_all();
            Err(e)
        }
    }
}

fn drive<R, C>(
    config: &Config,
    input: &Path,
    output: &Path,
    comparator: &C,
    deadline: &mut Deadline,
    registry: &mut TempRegistry,
) -> Result<SortStatus, anyhow::Error>
where
    R: Record,
    C: RecordOrder<R>,
{
    let mut runs = split_input::<R, C>(config, input, comparator, deadline, registry)?;
    if deadline.expired() {
        return Ok(SortStatus::Aborted);
    }

    while runs.len() > 1 {
        runs = merge_level::<R, C>(runs, config, comparator, deadline, registry)?;
        if deadline.expired() {
            return Ok(SortStatus::Aborted);
        }
    }

    match runs.pop() {
        Some(last_run) => finalize(last_run, output, registry)?,
        None => write_empty_output(config, output)?,
    }
    Ok(SortStatus::Completed)
}

/// Read the input through the codec, flushing a sorted run to a fresh
/// temp file whenever the accumulated record footprint reaches a third
/// of the memory budget. The remaining two thirds are headroom for the
/// in-memory partition merge. Returns the run paths in creation order.
fn split_input<R, C>(
    config: &Config,
    input: &Path,
    comparator: &C,
    deadline: &mut Deadline,
    registry: &mut TempRegistry,
) -> Result<Vec<PathBuf>, anyhow::Error>
where
    R: Record,
    C: RecordOrder<R>,
{
    let input_base = input
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| anyhow!("input path has no file name: {}", input.display()))?;
    let file = File::open(input).with_context(|| format!("path: {}", input.display()))?;
    let mut reader = RecordReader::new(BufReader::with_capacity(config.block_size(), file), config.io_mode())?;

    log::info!("Start split phase for {}", input.display());
    let flush_threshold = std::cmp::max(config.memory_budget() / 3, 1);
    let mut runs: Vec<PathBuf> = Vec::new();
    let mut data: Vec<R> = Vec::new();
    let mut accumulated = 0usize;

    loop {
        if !deadline.tick() {
            return Ok(runs);
        }
        let record = match reader
            .read_record::<R>()
            .with_context(|| format!("path: {}", input.display()))?
        {
            None => break,
            Some(record) => record,
        };
        if accumulated >= flush_threshold {
            match write_run(&input_base, runs.len(), mem::take(&mut data), config, comparator, deadline, registry)? {
                Some(path) => runs.push(path),
                None => return Ok(runs),
            }
            accumulated = 0;
        }
        accumulated += record.mem_size();
        data.push(record);
    }
    if !data.is_empty() {
        if let Some(path) = write_run(&input_base, runs.len(), data, config, comparator, deadline, registry)? {
            runs.push(path);
        }
    }
    log::info!("Finish split phase, {} runs", runs.len());
    Ok(runs)
}

/// Sort one chunk and write it out as run `{input_base}-p{index}`.
/// Returns None without writing when the deadline expired during the
/// chunk sort, so a partially ordered chunk never reaches disk.
fn write_run<R, C>(
    input_base: &str,
    index: usize,
    data: Vec<R>,
    config: &Config,
    comparator: &C,
    deadline: &mut Deadline,
    registry: &mut TempRegistry,
) -> Result<Option<PathBuf>, anyhow::Error>
where
    R: Record,
    C: RecordOrder<R>,
{
    let sorted = chunk_sorter::sort_chunk(
        data,
        config.workers(),
        config.partition_size(),
        config.remove_duplicates(),
        comparator,
        deadline,
    )?;
    if deadline.expired() {
        return Ok(None);
    }

    let path = config.tmp().join(format!("{}-p{}", input_base, index));
    let file = File::create(&path).with_context(|| format!("path: {}", path.display()))?;
    registry.register(path.clone());
    let mut writer = RecordWriter::new(BufWriter::with_capacity(config.block_size(), file), config.io_mode())?;
    for record in &sorted {
        writer.write_record(record)?;
    }
    let written = writer.finish()?;
    log::debug!("Wrote run {}, {} records", path.display(), written);
    Ok(Some(path))
}

/// One bottom up merge level: partition the run list into groups of up
/// to `max_files` consecutive runs and merge each group into one run
/// of the next level.
fn merge_level<R, C>(
    runs: Vec<PathBuf>,
    config: &Config,
    comparator: &C,
    deadline: &mut Deadline,
    registry: &mut TempRegistry,
) -> Result<Vec<PathBuf>, anyhow::Error>
where
    R: Record,
    C: RecordOrder<R>,
{
    log::info!("Start merge level over {} runs", runs.len());
    let mut next_level = Vec::new();
    for group in runs.chunks(config.max_files()) {
        if deadline.expired() {
            return Ok(next_level);
        }
        let merged = merge_pass::<R, C>(group, config, comparator, deadline, registry)?;
        next_level.push(merged);
    }
    Ok(next_level)
}

/// Merge one group of runs into a fresh temp file through the
/// tournament heap, pre-fetching up to `block_size` of records from
/// each run. With duplicate removal on, a record is dropped when it
/// equals the last emitted record, which collapses duplicates across
/// run boundaries as well as within a run. Consumed runs are deleted.
fn merge_pass<R, C>(
    group: &[PathBuf],
    config: &Config,
    comparator: &C,
    deadline: &mut Deadline,
    registry: &mut TempRegistry,
) -> Result<PathBuf, anyhow::Error>
where
    R: Record,
    C: RecordOrder<R>,
{
    let prefix = format!("{}_m_", HEXLOWER.encode(&rand::random::<[u8; 8]>()));
    let tmp_file = tempfile::Builder::new()
        .prefix(&prefix)
        .tempfile_in(config.tmp())
        .with_context(|| format!("create merge output in {}", config.tmp().display()))?;
    let (file, out_path) = tmp_file.keep()?;
    registry.register(out_path.clone());
    let mut writer = RecordWriter::new(BufWriter::with_capacity(config.block_size(), file), config.io_mode())?;

    let mut sources = Vec::with_capacity(group.len());
    for path in group {
        let mut source = RunSource::<R>::open(path.clone(), config.block_size(), config.io_mode())?;
        source.refill(config.block_size())?;
        sources.push(source);
    }

    let mut heap = BinaryHeap::with_capacity(sources.len());
    for (index, source) in sources.iter_mut().enumerate() {
        if let Some(record) = source.block.pop_front() {
            heap.push(
                MergeHead {
                    record,
                    source: index,
                    comparator: comparator.clone(),
                }
            );
        }
    }

    let mut last_emitted: Option<R> = None;
    while let Some(head) = heap.pop() {
        if !deadline.tick() {
            // abandon the pass, the registry owns every file involved
            return Ok(out_path);
        }
        let MergeHead { record, source: index, comparator: head_comparator } = head;
        let emit = !config.remove_duplicates()
            || match &last_emitted {
                None => true,
                Some(previous) => !comparator.equal(previous, &record),
            };
        if emit {
            writer.write_record(&record)?;
            last_emitted = Some(record);
        }

        let source = &mut sources[index];
        if source.block.is_empty() {
            source.refill(config.block_size())?;
        }
        if let Some(next) = source.block.pop_front() {
            heap.push(
                MergeHead {
                    record: next,
                    source: index,
                    comparator: head_comparator,
                }
            );
        }
    }

    let written = writer.finish()?;
    for source in &sources {
        fs::remove_file(&source.path).with_context(|| format!("path: {}", source.path.display()))?;
        registry.deregister(&source.path);
    }
    log::info!("Merged {} runs into {}, {} records", group.len(), out_path.display(), written);
    Ok(out_path)
}

/// One open run during a merge pass, with its pre-fetched block of
/// records.
struct RunSource<R> {
    path: PathBuf,
    reader: Option<RecordReader<BufReader<File>>>,
    block: VecDeque<R>,
}

impl<R: Record> RunSource<R> {
    fn open(path: PathBuf, block_size: usize, io_mode: IoMode) -> Result<RunSource<R>, anyhow::Error> {
        let file = File::open(&path).with_context(|| format!("path: {}", path.display()))?;
        let reader = RecordReader::new(BufReader::with_capacity(block_size, file), io_mode)?;
        Ok(
            RunSource {
                path,
                reader: Some(reader),
                block: VecDeque::new(),
            }
        )
    }

    /// Read records until the cumulative footprint reaches the block
    /// size or the run ends. The stream is dropped at end of run.
    fn refill(&mut self, block_size: usize) -> Result<(), anyhow::Error> {
        let mut accumulated = 0usize;
        while accumulated < block_size {
            let record = match self.reader.as_mut() {
                None => break,
                Some(reader) => reader
                    .read_record::<R>()
                    .with_context(|| format!("path: {}", self.path.display()))?,
            };
            match record {
                None => {
                    self.reader = None;
                    break;
                }
                Some(record) => {
                    accumulated += record.mem_size();
                    self.block.push_back(record);
                }
            }
        }
        Ok(())
    }
}

/// Move the final run to the output path. Rename first; when that
/// fails, for example across file systems, replace the target by copy
/// and remove the source.
fn finalize(run: PathBuf, output: &Path, registry: &mut TempRegistry) -> Result<(), anyhow::Error> {
    match fs::rename(&run, output) {
        Ok(()) => {}
        Err(rename_error) => {
            log::info!(
                "Rename {} to {} failed ({}), copying instead",
                run.display(),
                output.display(),
                rename_error
            );
            if output.exists() {
                fs::remove_file(output).with_context(|| format!("path: {}", output.display()))?;
            }
            fs::copy(&run, output)
                .with_context(|| format!("copy {} to {}", run.display(), output.display()))?;
            fs::remove_file(&run).with_context(|| format!("path: {}", run.display()))?;
        }
    }
    registry.deregister(&run);
    Ok(())
}

/// An empty input still produces an output file, with a zero element
/// count header when the mode calls for one.
fn write_empty_output(config: &Config, output: &Path) -> Result<(), anyhow::Error> {
    let file = File::create(output).with_context(|| format!("path: {}", output.display()))?;
    let writer = RecordWriter::new(BufWriter::with_capacity(config.block_size(), file), config.io_mode())?;
    writer.finish()?;
    Ok(())
}
