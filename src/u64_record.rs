use std::io::BufRead;
use std::io::Read;
use std::io::Write;
use std::mem;

use anyhow::anyhow;
use anyhow::Context;
use byteorder::NativeEndian;
use byteorder::WriteBytesExt;

use crate::record::Record;

/// A fixed width unsigned 64 bit integer stored as 8 raw bytes in host
/// endianness. End of stream at a record boundary terminates decoding;
/// a trailing partial word is a decode error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct U64Record {
    value: u64,
}

impl U64Record {
    pub fn new(value: u64) -> U64Record {
        U64Record {
            value,
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }
}

impl Record for U64Record {
    const FIXED_SIZE: bool = true;

    fn decode<S: BufRead>(reader: &mut S) -> Result<Option<U64Record>, anyhow::Error> {
        let mut buf = [0u8; 8];
        let mut filled = 0;
        while filled < buf.len() {
            let n = reader.read(&mut buf[filled..]).with_context(|| "read u64 record")?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        match filled {
            0 => Ok(None),
            8 => Ok(Some(U64Record::new(u64::from_ne_bytes(buf)))),
            n => Err(anyhow!("stream ended mid record, {} trailing bytes", n)),
        }
    }

    fn encode<W: Write>(&self, writer: &mut W) -> Result<(), anyhow::Error> {
        writer
            .write_u64::<NativeEndian>(self.value)
            .with_context(|| "write u64 record")?;
        Ok(())
    }

    fn mem_size(&self) -> usize {
        mem::size_of::<u64>()
    }

    fn natural_less(&self, other: &U64Record) -> bool {
        self.value < other.value
    }
}
