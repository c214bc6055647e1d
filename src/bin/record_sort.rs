use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use simple_logger::SimpleLogger;

use record_file_sort::line_record::LineRecord;
use record_file_sort::sort::Sort;
use record_file_sort::sort::SortStatus;

/// Sort a text file of newline terminated records.
#[derive(Parser, Debug)]
#[command(name = "record-sort", version)]
struct Args {
    /// File to sort
    #[arg(short = 'i', long = "input-file")]
    input_file: PathBuf,

    /// Where to write the sorted result
    #[arg(short = 'o', long = "output-file")]
    output_file: PathBuf,

    /// Directory for intermediate runs. A fresh directory under the
    /// system temp dir when omitted
    #[arg(short = 't', long = "tmp-dir")]
    tmp_dir: Option<PathBuf>,

    /// Memory budget in bytes. Half of total RAM when omitted
    #[arg(short = 'm', long = "max-memory")]
    max_memory: Option<usize>,

    /// Number of sorting threads
    #[arg(short = 'w', long = "workers")]
    workers: Option<usize>,

    /// Remove duplicate records
    #[arg(short = 'u', long = "unique-values")]
    unique_values: bool,
}

fn main() -> Result<(), anyhow::Error> {
    SimpleLogger::new().init()?;
    let args = Args::parse();

    let tmp_dir = match args.tmp_dir.clone() {
        Some(dir) => dir,
        None => create_tmp_dir()?,
    };
    let max_memory = match args.max_memory {
        Some(bytes) => bytes,
        None => default_max_memory(),
    };
    let workers = args.workers.unwrap_or(1);
    log::info!(
        "given options: workers: {}, max-memory: {}, tmp-dir: {}",
        workers,
        max_memory,
        tmp_dir.display()
    );

    let mut sort: Sort<LineRecord> = Sort::new(args.input_file, args.output_file);
    sort.with_tmp_dir(tmp_dir);
    sort.with_workers(workers);
    sort.with_max_files(10);
    sort.with_memory_budget(max_memory);
    sort.with_block_size(4096);
    sort.with_remove_duplicates(args.unique_values);

    match sort.sort()? {
        SortStatus::Completed => {}
        SortStatus::Aborted => log::warn!("sort aborted before completion"),
    }
    Ok(())
}

fn create_tmp_dir() -> Result<PathBuf, anyhow::Error> {
    let dir = tempfile::Builder::new()
        .prefix("tmpsort_")
        .tempdir()
        .with_context(|| "create tmp dir")?;
    Ok(dir.into_path())
}

fn default_max_memory() -> usize {
    match total_memory_bytes() {
        Some(total) => (total / 2) as usize,
        None => 1_000_000_000,
    }
}

fn total_memory_bytes() -> Option<u64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    for line in meminfo.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            let kb: u64 = rest.trim().trim_end_matches("kB").trim().parse().ok()?;
            return Some(kb * 1024);
        }
    }
    None
}
