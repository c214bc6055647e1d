use std::io::BufRead;
use std::io::Write;
use std::sync::Arc;

/// A record kind that the sort can read, write, account for and compare.
///
/// The sort engine calls these operations and nothing else; it never
/// inspects record contents. A record kind decides its own on-disk
/// format through [Record::decode] and [Record::encode], while
/// [Record::mem_size] reports the approximate in-memory footprint used
/// for memory budgeting, which may differ from the encoded size.
///
/// # Examples
/// ```
/// use std::io::{BufRead, Read, Write};
/// use record_file_sort::record::Record;
///
/// #[derive(Clone)]
/// struct Pair {
///     key: u32,
///     value: u32,
/// }
///
/// impl Record for Pair {
///     const FIXED_SIZE: bool = true;
///
///     fn decode<S: BufRead>(reader: &mut S) -> Result<Option<Pair>, anyhow::Error> {
///         let mut buf = [0u8; 8];
///         let mut filled = 0;
///         while filled < buf.len() {
///             let n = reader.read(&mut buf[filled..])?;
///             if n == 0 {
///                 break;
///             }
///             filled += n;
///         }
///         match filled {
///             0 => Ok(None),
///             8 => Ok(
///                 Some(
///                     Pair {
///                         key: u32::from_ne_bytes(buf[0..4].try_into()?),
///                         value: u32::from_ne_bytes(buf[4..8].try_into()?),
///                     }
///                 )
///             ),
///             n => Err(anyhow::anyhow!("truncated pair record: {} bytes", n)),
///         }
///     }
///
///     fn encode<W: Write>(&self, writer: &mut W) -> Result<(), anyhow::Error> {
///         writer.write_all(&self.key.to_ne_bytes())?;
///         writer.write_all(&self.value.to_ne_bytes())?;
///         Ok(())
///     }
///
///     fn mem_size(&self) -> usize {
///         std::mem::size_of::<Pair>()
///     }
///
///     fn natural_less(&self, other: &Pair) -> bool {
///         self.key < other.key
///     }
/// }
/// ```
pub trait Record: Sized + Send + 'static {
    /// Whether encoded records have a known constant width. Currently
    /// informational.
    const FIXED_SIZE: bool;

    /// Read one record from the stream. `Ok(None)` means the stream
    /// ended at a record boundary; a stream that ends mid-record is a
    /// decode error.
    fn decode<S: BufRead>(reader: &mut S) -> Result<Option<Self>, anyhow::Error>;

    /// Write one record in whatever format [Record::decode] accepts.
    fn encode<W: Write>(&self, writer: &mut W) -> Result<(), anyhow::Error>;

    /// Approximate in-memory footprint in bytes, used only for
    /// budgeting decisions.
    fn mem_size(&self) -> usize;

    /// The record kind's own total order.
    fn natural_less(&self, other: &Self) -> bool;
}

/// A total order over records of type `R`.
///
/// Every worker receives its own clone, so implementations must not
/// rely on shared mutable state. Equality is derived from the order:
/// two records are equal when neither is less than the other.
pub trait RecordOrder<R>: Clone + Send + Sync + 'static {
    fn less(&self, lhs: &R, rhs: &R) -> bool;

    fn equal(&self, lhs: &R, rhs: &R) -> bool {
        !self.less(lhs, rhs) && !self.less(rhs, lhs)
    }
}

/// The order declared by the record kind itself via
/// [Record::natural_less].
#[derive(Clone, Copy, Debug, Default)]
pub struct NaturalOrder;

impl<R: Record> RecordOrder<R> for NaturalOrder {
    fn less(&self, lhs: &R, rhs: &R) -> bool {
        lhs.natural_less(rhs)
    }
}

/// A caller supplied comparison closure.
///
/// # Examples
/// ```
/// use record_file_sort::record::FnOrder;
/// use record_file_sort::u64_record::U64Record;
///
/// // descending numeric order
/// let order = FnOrder::new(|lhs: &U64Record, rhs: &U64Record| rhs.value() < lhs.value());
/// ```
pub struct FnOrder<R> {
    less: Arc<dyn Fn(&R, &R) -> bool + Send + Sync>,
}

impl<R> FnOrder<R> {
    pub fn new<F>(less: F) -> FnOrder<R>
    where
        F: Fn(&R, &R) -> bool + Send + Sync + 'static,
    {
        FnOrder {
            less: Arc::new(less),
        }
    }
}

impl<R> Clone for FnOrder<R> {
    fn clone(&self) -> FnOrder<R> {
        FnOrder {
            less: self.less.clone(),
        }
    }
}

impl<R: 'static> RecordOrder<R> for FnOrder<R> {
    fn less(&self, lhs: &R, rhs: &R) -> bool {
        (self.less)(lhs, rhs)
    }
}
