use std::fs;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use byteorder::LittleEndian;
use byteorder::NativeEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;
use data_encoding::HEXLOWER;

pub fn setup() {
    let results_dir_path = PathBuf::from_str("./target/results/").unwrap();
    if !results_dir_path.exists() {
        fs::create_dir_all(&results_dir_path).unwrap_or_else(|_|
            panic!("Failed to create results directory: {:?}", results_dir_path)
        );
    }
}

#[allow(dead_code)]
pub fn temp_file_name(dir: &str) -> PathBuf {
    let mut result = PathBuf::from(dir);
    let name = HEXLOWER.encode(&rand::random::<[u8; 16]>());
    result.push(name);
    result
}

#[allow(dead_code)]
pub fn temp_dir(dir: &str) -> PathBuf {
    let path = temp_file_name(dir);
    fs::create_dir_all(&path).unwrap_or_else(|_|
        panic!("Failed to create temp directory: {:?}", path)
    );
    path
}

#[allow(dead_code)]
pub fn read_lines(path: PathBuf) -> Result<Vec<String>, anyhow::Error> {
    let reader = BufReader::new(File::open(path)?);
    let lines = reader.lines().map(|x| x.unwrap()).collect();
    Ok(lines)
}

#[allow(dead_code)]
pub fn padded(value: u64, width: usize) -> String {
    format!("{:0width$}", value, width = width)
}

#[allow(dead_code)]
pub fn write_lines(path: &PathBuf, lines: impl Iterator<Item = String>) -> Result<(), anyhow::Error> {
    let mut writer = BufWriter::new(File::create(path)?);
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}

#[allow(dead_code)]
pub fn write_descending_padded(path: &PathBuf, count: u64, width: usize) -> Result<(), anyhow::Error> {
    write_lines(path, (0..count).rev().map(|value| padded(value, width)))
}

#[allow(dead_code)]
pub fn write_u64_values(
    path: &PathBuf,
    values: impl Iterator<Item = u64>,
    header: Option<u64>,
) -> Result<(), anyhow::Error> {
    let mut writer = BufWriter::new(File::create(path)?);
    if let Some(count) = header {
        writer.write_u64::<LittleEndian>(count)?;
    }
    for value in values {
        writer.write_u64::<NativeEndian>(value)?;
    }
    writer.flush()?;
    Ok(())
}

#[allow(dead_code)]
pub fn read_u64_values(path: &PathBuf, skip_header: bool) -> Result<(Option<u64>, Vec<u64>), anyhow::Error> {
    let mut reader = BufReader::new(File::open(path)?);
    let header = if skip_header {
        Some(reader.read_u64::<LittleEndian>()?)
    } else {
        None
    };
    let mut values = Vec::new();
    loop {
        match reader.read_u64::<NativeEndian>() {
            Ok(value) => values.push(value),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok((header, values))
}

#[allow(dead_code)]
pub fn entry_count(path: &PathBuf) -> Result<usize, anyhow::Error> {
    Ok(fs::read_dir(path)?.count())
}
