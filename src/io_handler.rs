use std::io::BufRead;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;

use anyhow::anyhow;
use anyhow::Context;
use byteorder::LittleEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

use crate::record::Record;

/// How record streams are framed on disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IoMode {
    /// Records follow each other with no surrounding structure.
    #[default]
    Plain,
    /// An 8 byte little endian element count precedes the records.
    /// Readers declare end of stream after that many decodes
    /// regardless of the underlying stream state; writers reserve the
    /// count slot on open and patch it after the final record.
    CountHeader,
}

/// Decodes records of one kind from a buffered byte stream, honoring
/// the stream's [IoMode].
pub struct RecordReader<S> {
    stream: S,
    remaining: Option<u64>,
}

impl<S: BufRead> RecordReader<S> {
    pub fn new(mut stream: S, mode: IoMode) -> Result<RecordReader<S>, anyhow::Error> {
        let remaining = match mode {
            IoMode::Plain => None,
            IoMode::CountHeader => {
                let count = stream
                    .read_u64::<LittleEndian>()
                    .with_context(|| "read element count header")?;
                Some(count)
            }
        };
        Ok(
            RecordReader {
                stream,
                remaining,
            }
        )
    }

    /// Read the next record, or `Ok(None)` at end of stream. Under
    /// [IoMode::CountHeader] the element count decides where the
    /// stream ends, not the underlying reader.
    pub fn read_record<R: Record>(&mut self) -> Result<Option<R>, anyhow::Error> {
        match &mut self.remaining {
            None => R::decode(&mut self.stream),
            Some(0) => Ok(None),
            Some(remaining) => {
                match R::decode(&mut self.stream)? {
                    None => Err(anyhow!("stream ended {} records before the declared element count", remaining)),
                    Some(record) => {
                        *remaining -= 1;
                        Ok(Some(record))
                    }
                }
            }
        }
    }
}

/// Encodes records of one kind to a buffered byte stream, honoring the
/// stream's [IoMode].
pub struct RecordWriter<S: Write + Seek> {
    stream: S,
    header_pos: Option<u64>,
    written: u64,
}

impl<S: Write + Seek> RecordWriter<S> {
    pub fn new(mut stream: S, mode: IoMode) -> Result<RecordWriter<S>, anyhow::Error> {
        let header_pos = match mode {
            IoMode::Plain => None,
            IoMode::CountHeader => {
                let pos = stream.stream_position().with_context(|| "locate element count header")?;
                stream
                    .write_u64::<LittleEndian>(0)
                    .with_context(|| "reserve element count header")?;
                Some(pos)
            }
        };
        Ok(
            RecordWriter {
                stream,
                header_pos,
                written: 0,
            }
        )
    }

    pub fn write_record<R: Record>(&mut self, record: &R) -> Result<(), anyhow::Error> {
        record.encode(&mut self.stream)?;
        self.written += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Patch the element count header if one was reserved, flush and
    /// release the stream. Returns the number of records written.
    pub fn finish(mut self) -> Result<u64, anyhow::Error> {
        if let Some(pos) = self.header_pos {
            let end = self.stream.stream_position().with_context(|| "locate stream end")?;
            self.stream.seek(SeekFrom::Start(pos)).with_context(|| "seek to element count header")?;
            self.stream
                .write_u64::<LittleEndian>(self.written)
                .with_context(|| "patch element count header")?;
            self.stream.seek(SeekFrom::Start(end)).with_context(|| "restore write position")?;
        }
        self.stream.flush().with_context(|| "flush record stream")?;
        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use std::io::BufReader;
    use std::io::Seek;
    use std::io::SeekFrom;
    use std::io::Write;

    use byteorder::LittleEndian;
    use byteorder::ReadBytesExt;
    use byteorder::WriteBytesExt;

    use crate::io_handler::IoMode;
    use crate::io_handler::RecordReader;
    use crate::io_handler::RecordWriter;
    use crate::u64_record::U64Record;

    fn read_all(file: &mut std::fs::File, mode: IoMode) -> Result<Vec<u64>, anyhow::Error> {
        file.seek(SeekFrom::Start(0))?;
        let mut reader = RecordReader::new(BufReader::new(file), mode)?;
        let mut values = Vec::new();
        while let Some(record) = reader.read_record::<U64Record>()? {
            values.push(record.value());
        }
        Ok(values)
    }

    #[test]
    fn test_plain_round_trip() -> Result<(), anyhow::Error> {
        let mut file = tempfile::tempfile()?;
        let mut writer = RecordWriter::new(&mut file, IoMode::Plain)?;
        for value in [3u64, 1, 2] {
            writer.write_record(&U64Record::new(value))?;
        }
        assert_eq!(writer.finish()?, 3);
        assert_eq!(read_all(&mut file, IoMode::Plain)?, vec![3, 1, 2]);
        Ok(())
    }

    #[test]
    fn test_header_equals_written_count() -> Result<(), anyhow::Error> {
        let mut file = tempfile::tempfile()?;
        let mut writer = RecordWriter::new(&mut file, IoMode::CountHeader)?;
        for value in 0u64..17 {
            writer.write_record(&U64Record::new(value))?;
        }
        assert_eq!(writer.finish()?, 17);

        file.seek(SeekFrom::Start(0))?;
        let header = file.read_u64::<LittleEndian>()?;
        assert_eq!(header, 17);
        assert_eq!(read_all(&mut file, IoMode::CountHeader)?, (0..17).collect::<Vec<u64>>());
        Ok(())
    }

    #[test]
    fn test_header_declares_eof_before_stream_end() -> Result<(), anyhow::Error> {
        let mut file = tempfile::tempfile()?;
        let mut writer = RecordWriter::new(&mut file, IoMode::CountHeader)?;
        for value in [5u64, 6, 7] {
            writer.write_record(&U64Record::new(value))?;
        }
        writer.finish()?;
        // trailing bytes past the declared count are not records
        file.write_all(&[0xab; 32])?;
        assert_eq!(read_all(&mut file, IoMode::CountHeader)?, vec![5, 6, 7]);
        Ok(())
    }

    #[test]
    fn test_short_stream_is_an_error() -> Result<(), anyhow::Error> {
        let mut file = tempfile::tempfile()?;
        file.write_u64::<LittleEndian>(5)?;
        file.write_u64::<LittleEndian>(11)?;
        file.write_u64::<LittleEndian>(12)?;
        assert!(read_all(&mut file, IoMode::CountHeader).is_err());
        Ok(())
    }
}
