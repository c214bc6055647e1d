use std::collections::BTreeMap;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fs;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;
use std::path::PathBuf;

use anyhow::anyhow;
use anyhow::Context;
use anyhow::Error;
use benchmark_rs::benchmarks::Benchmarks;
use benchmark_rs::stopwatch::StopWatch;
use data_encoding::HEXLOWER;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use simple_logger::SimpleLogger;

use record_file_sort::line_record::LineRecord;
use record_file_sort::sort::Sort;

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Clone)]
pub struct BenchmarkConfig {
    files: BTreeMap<usize, PathBuf>,
    bench_results_dir: PathBuf,
    bench_tmp_dir: PathBuf,
    workers: usize,
    memory_budget: usize,
    max_files: usize,
    description: String,
}

impl BenchmarkConfig {
    pub fn new(
        files: BTreeMap<usize, PathBuf>,
        bench_results_dir: PathBuf,
        bench_tmp_dir: PathBuf,
        workers: usize,
        memory_budget: usize,
        max_files: usize,
        description: &str,
    ) -> BenchmarkConfig {
        BenchmarkConfig {
            files,
            bench_results_dir,
            bench_tmp_dir,
            workers,
            memory_budget,
            max_files,
            description: description.to_string(),
        }
    }

    pub fn get_input_path(&self, key: usize) -> PathBuf {
        self.files.get(&key).unwrap().clone()
    }

    pub fn bench_results_dir(&self) -> &PathBuf {
        &self.bench_results_dir
    }

    pub fn bench_tmp_dir(&self) -> &PathBuf {
        &self.bench_tmp_dir
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn memory_budget(&self) -> usize {
        self.memory_budget
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }
}

impl Display for BenchmarkConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "workers: {}, memory budget: {}, max files: {}, description: {}",
            self.workers,
            self.memory_budget,
            self.max_files,
            self.description,
        )
    }
}

fn temp_file_name(dir: &PathBuf) -> PathBuf {
    let mut result = PathBuf::from(dir);
    let name = HEXLOWER.encode(&rand::random::<[u8; 16]>());
    result.push(name);
    result
}

fn cleanup(bench_results_dir: &PathBuf) -> Result<(), anyhow::Error> {
    if bench_results_dir.exists() {
        fs::remove_dir_all(bench_results_dir.clone())
            .with_context(|| anyhow!("{}", bench_results_dir.to_string_lossy()))?;
    }
    Ok(())
}

fn setup(
    bench_input_dir: &PathBuf,
    bench_results_dir: &PathBuf,
    bench_tmp_dir: &PathBuf,
) -> Result<(), anyhow::Error> {
    cleanup(bench_results_dir)?;

    for dir in [bench_input_dir, bench_results_dir, bench_tmp_dir] {
        if !dir.exists() {
            fs::create_dir_all(dir.clone())
                .with_context(|| anyhow!("{}", dir.to_string_lossy()))?;
        }
    }
    Ok(())
}

fn create_input_files(
    line_counts: &[usize],
    base_path: &PathBuf,
) -> Result<BTreeMap<usize, PathBuf>, anyhow::Error> {
    let mut files: BTreeMap<usize, PathBuf> = BTreeMap::new();
    for count in line_counts {
        let path = base_path.join(PathBuf::from(count.to_string()));
        if !path.exists() {
            let mut lines: Vec<usize> = (0..*count).collect();
            lines.shuffle(&mut rand::thread_rng());
            let mut writer = BufWriter::new(
                File::create(&path).with_context(|| anyhow!("path: {}", path.to_string_lossy()))?,
            );
            for line in lines {
                writeln!(writer, "{:09}", line)?;
            }
        }
        files.insert(*count, path);
    }
    Ok(files)
}

fn sort(stop_watch: &mut StopWatch, config: BenchmarkConfig, work: usize) -> Result<(), anyhow::Error> {
    stop_watch.pause();
    let input_path = config.get_input_path(work);
    let output_path = temp_file_name(config.bench_results_dir());
    log::info!("Start sorting {}", input_path.to_string_lossy());
    stop_watch.resume();
    let mut record_sort: Sort<LineRecord> = Sort::new(input_path.clone(), output_path.clone());
    record_sort.with_tmp_dir(config.bench_tmp_dir().clone());
    record_sort.with_workers(config.workers());
    record_sort.with_memory_budget(config.memory_budget());
    record_sort.with_max_files(config.max_files());
    record_sort.with_block_size(8192);
    record_sort.sort()?;
    stop_watch.pause();
    log::info!("Finish sorting {}", input_path.to_string_lossy());
    fs::remove_file(output_path.clone())
        .with_context(|| anyhow!("{}", output_path.to_string_lossy()))?;
    Ok(())
}

/// In-memory parallel sort of the whole file, as a lower bound to
/// compare the external sort against.
fn baseline(stop_watch: &mut StopWatch, config: BenchmarkConfig, work: usize) -> Result<(), anyhow::Error> {
    stop_watch.pause();
    let input_path = config.get_input_path(work);
    let output_path = temp_file_name(config.bench_results_dir());
    stop_watch.resume();
    let mut lines: Vec<String> = BufReader::new(File::open(&input_path)?)
        .lines()
        .collect::<Result<_, _>>()?;
    lines.par_sort_unstable();
    let mut writer = BufWriter::new(File::create(&output_path)?);
    for line in &lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    stop_watch.pause();
    fs::remove_file(output_path.clone())
        .with_context(|| anyhow!("{}", output_path.to_string_lossy()))?;
    Ok(())
}

#[test]
fn record_file_sort_bench() -> Result<(), Error> {
    SimpleLogger::new().init().unwrap();
    log::info!("Started record_file_sort_bench.");

    let bench_input_dir = PathBuf::from("./target/benchmarks/input");
    let bench_results_dir = PathBuf::from("./target/benchmarks/results");
    let bench_tmp_dir = PathBuf::from("./target/benchmarks/results/tmp");
    setup(&bench_input_dir, &bench_results_dir, &bench_tmp_dir)?;

    let files = create_input_files(&[100_000, 1_000_000, 5_000_000], &bench_input_dir)?;

    let mut benchmarks = Benchmarks::new("record-file-sort");
    for workers in [1, 2, 4, 8] {
        benchmarks.add(
            format!("sort-{}-workers", workers).as_str(),
            sort,
            BenchmarkConfig::new(
                files.clone(),
                bench_results_dir.clone(),
                bench_tmp_dir.clone(),
                workers,
                100_000_000,
                10,
                "shuffled zero padded lines",
            ),
            files.keys().cloned().collect(),
            3,
            0,
        )?;
    }

    benchmarks.add(
        "in-memory-baseline",
        baseline,
        BenchmarkConfig::new(
            files.clone(),
            bench_results_dir.clone(),
            bench_tmp_dir.clone(),
            0,
            0,
            0,
            "rayon par_sort_unstable of the whole file",
        ),
        files.keys().cloned().collect(),
        3,
        0,
    )?;

    benchmarks.run()?;
    benchmarks.save_to_csv(PathBuf::from("./target/benchmarks/"), true, true)?;
    benchmarks.save_to_json(PathBuf::from("./target/benchmarks/"))?;

    log::info!("Finished record_file_sort_bench.");
    Ok(())
}
