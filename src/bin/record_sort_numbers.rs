use std::fs;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use byteorder::NativeEndian;
use byteorder::WriteBytesExt;
use clap::Parser;
use simple_logger::SimpleLogger;

use record_file_sort::record::Record;
use record_file_sort::sort::Sort;
use record_file_sort::sort::SortStatus;
use record_file_sort::u64_record::U64Record;

/// Sort a text file of decimal unsigned integers numerically. The
/// input is converted to a binary sidecar file, sorted as fixed width
/// words and converted back to text.
#[derive(Parser, Debug)]
#[command(name = "record-sort-numbers", version)]
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

    /// Remove duplicate values
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

    let binary_input = binary_sidecar(&args.input_file);
    let binary_output = binary_sidecar(&args.output_file);
    transform_to_binary(&args.input_file, &binary_input)?;

    let mut sort: Sort<U64Record> = Sort::new(binary_input.clone(), binary_output.clone());
    sort.with_tmp_dir(tmp_dir);
    sort.with_workers(workers);
    sort.with_max_files(10);
    sort.with_memory_budget(max_memory);
    sort.with_block_size(4096);
    sort.with_remove_duplicates(args.unique_values);
    let status = sort.sort();
    fs::remove_file(&binary_input).with_context(|| format!("path: {}", binary_input.display()))?;

    match status? {
        SortStatus::Completed => {
            transform_from_binary(&binary_output, &args.output_file)?;
            fs::remove_file(&binary_output)
                .with_context(|| format!("path: {}", binary_output.display()))?;
        }
        SortStatus::Aborted => log::warn!("sort aborted before completion"),
    }
    Ok(())
}

fn binary_sidecar(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".binary");
    PathBuf::from(name)
}

fn transform_to_binary(input: &Path, output: &Path) -> Result<(), anyhow::Error> {
    let reader = BufReader::new(File::open(input).with_context(|| format!("path: {}", input.display()))?);
    let mut writer = BufWriter::new(File::create(output).with_context(|| format!("path: {}", output.display()))?);
    for line in reader.lines() {
        let line = line?;
        let value: u64 = line
            .trim()
            .parse()
            .with_context(|| format!("not an unsigned integer: {}", line))?;
        writer.write_u64::<NativeEndian>(value)?;
    }
    writer.flush()?;
    Ok(())
}

fn transform_from_binary(input: &Path, output: &Path) -> Result<(), anyhow::Error> {
    let mut reader = BufReader::new(File::open(input).with_context(|| format!("path: {}", input.display()))?);
    let mut writer = BufWriter::new(File::create(output).with_context(|| format!("path: {}", output.display()))?);
    while let Some(record) = U64Record::decode(&mut reader)? {
        writeln!(writer, "{}", record.value())?;
    }
    writer.flush()?;
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
