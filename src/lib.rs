//! This crate implements an external sort for files that are larger than available memory.
//!
//! The input file is read as a sequence of records of a declared kind and the output file
//! holds the same records in ascending order under the record kind's natural order or a
//! caller supplied comparator, optionally with adjacent duplicates removed. Memory use is
//! bounded by a configurable budget and the in-memory sorting work is spread over a
//! configurable number of worker threads.
//!
//! Record kinds are pluggable through the [record::Record] trait, which bundles decoding,
//! encoding, memory accounting and a natural order. [line_record::LineRecord] covers text
//! files of newline terminated lines and [u64_record::U64Record] covers streams of raw
//! unsigned 64 bit integers; streams of either kind may carry an element count header, see
//! [io_handler::IoMode]. Long invocations can be bounded with a cooperative
//! [deadline::Deadline] that aborts the sort cleanly, removing all intermediate files.
//!
//! # Examples
//! ```no_run
//! use std::path::PathBuf;
//! use record_file_sort::line_record::LineRecord;
//! use record_file_sort::sort::Sort;
//!
//! // parallel record sort
//! fn sort_records(input: PathBuf, output: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
//!     let mut sort: Sort<LineRecord> = Sort::new(input, output);
//!
//!     // set the number of CPU cores the sort will attempt to use. When given a number
//!     // that exceeds the number of available cores the work will be split among the
//!     // available cores with somewhat degraded performance. Zero means all cores.
//!     sort.with_workers(2);
//!
//!     // set the directory for intermediate results. The default is the system temp dir -
//!     // std::env::temp_dir(), however, for large files it is recommended to provide a
//!     // dedicated directory for intermediate files, preferably on the same file system
//!     // as the output result.
//!     sort.with_tmp_dir(tmp);
//!
//!     sort.sort()?;
//!     Ok(())
//! }
//! ```
//!

pub(crate) mod chunk_sorter;
pub(crate) mod config;
pub(crate) mod external_sort;
pub(crate) mod introsort;
pub(crate) mod merge_head;
pub(crate) mod worker_pool;

pub mod deadline;
pub mod io_handler;
pub mod line_record;
pub mod record;
pub mod sort;
pub mod u64_record;
