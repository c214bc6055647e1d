use std::io::BufRead;
use std::io::Write;
use std::mem;

use anyhow::Context;

use crate::record::Record;

/// A UTF-8 text line. Decoding reads up to the next `\n` or end of
/// stream; encoding writes the text followed by `\n`. The terminator
/// is not part of the record, so a final line without one compares and
/// round trips like any other.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineRecord {
    line: String,
}

impl LineRecord {
    pub fn new(line: String) -> LineRecord {
        LineRecord {
            line,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.line
    }

    pub fn into_string(self) -> String {
        self.line
    }
}

impl Record for LineRecord {
    const FIXED_SIZE: bool = false;

    fn decode<S: BufRead>(reader: &mut S) -> Result<Option<LineRecord>, anyhow::Error> {
        let mut line = String::new();
        let bytes = reader.read_line(&mut line).with_context(|| "read line record")?;
        if bytes == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
        }
        Ok(Some(LineRecord::new(line)))
    }

    fn encode<W: Write>(&self, writer: &mut W) -> Result<(), anyhow::Error> {
        writer.write_all(self.line.as_bytes()).with_context(|| "write line record")?;
        writer.write_all(b"\n").with_context(|| "write line terminator")?;
        Ok(())
    }

    fn mem_size(&self) -> usize {
        // text plus terminator plus the owning struct
        self.line.len() + 1 + mem::size_of::<String>()
    }

    fn natural_less(&self, other: &LineRecord) -> bool {
        self.line < other.line
    }
}
