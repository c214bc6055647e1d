use std::fs;

use record_file_sort::line_record::LineRecord;
use record_file_sort::sort::Sort;

mod common;

#[test]
fn test_duplicates_removed_within_single_chunk() -> Result<(), anyhow::Error> {
    common::setup();
    let input_path = common::temp_file_name("./target/results/");
    let output_path = common::temp_file_name("./target/results/");
    let tmp_path = common::temp_dir("./target/results/");
    let lines = (0..1_000u64).rev().flat_map(|value| {
        let line = common::padded(value, 9);
        [line.clone(), line]
    });
    common::write_lines(&input_path, lines)?;

    let mut sort: Sort<LineRecord> = Sort::new(input_path.clone(), output_path.clone());
    sort.with_tmp_dir(tmp_path.clone());
    sort.with_remove_duplicates(true);
    sort.sort()?;

    let lines = common::read_lines(output_path.clone())?;
    let expected: Vec<String> = (0..1_000u64).map(|value| common::padded(value, 9)).collect();
    assert_eq!(lines, expected);

    fs::remove_file(input_path)?;
    fs::remove_file(output_path)?;
    fs::remove_dir_all(tmp_path)?;
    Ok(())
}

#[test]
fn test_duplicates_removed_across_runs() -> Result<(), anyhow::Error> {
    common::setup();
    let input_path = common::temp_file_name("./target/results/");
    let output_path = common::temp_file_name("./target/results/");
    let tmp_path = common::temp_dir("./target/results/");
    // interleave three copies of every value so equal records land in
    // different runs under a tight memory budget
    let lines = (0..5_000u64)
        .rev()
        .map(|value| common::padded(value, 9))
        .cycle()
        .take(15_000);
    common::write_lines(&input_path, lines)?;

    let mut sort: Sort<LineRecord> = Sort::new(input_path.clone(), output_path.clone());
    sort.with_tmp_dir(tmp_path.clone());
    sort.with_memory_budget(48_000);
    sort.with_max_files(4);
    sort.with_remove_duplicates(true);
    sort.sort()?;

    let lines = common::read_lines(output_path.clone())?;
    let expected: Vec<String> = (0..5_000u64).map(|value| common::padded(value, 9)).collect();
    assert_eq!(lines, expected);
    assert_eq!(common::entry_count(&tmp_path)?, 0);

    fs::remove_file(input_path)?;
    fs::remove_file(output_path)?;
    fs::remove_dir(tmp_path)?;
    Ok(())
}
