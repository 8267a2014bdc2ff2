//! Column readers.
//!
//! A reader decodes one column of a segment into [`ColumnBatch`]es. It starts at row zero,
//! moves forward with `next_vector` and `skip`, and jumps to the first row of any row index
//! entry with `seek`.

use olap_error::{OlapResult, olap_bail};
use olap_hll::HllSet;
use olap_io::ReadAt;

use crate::batch::ColumnBatch;
use crate::bit_field::BitFieldReader;
use crate::field::{FieldInfo, FieldType};
use crate::index::PositionProvider;
use crate::options::ReaderOptions;
use crate::proto::{ColumnEncodingKind, ColumnHeaderMessage};
use crate::segment::SegmentStreams;
use crate::stats::ColumnStatistics;
use crate::stream::{InStream, StreamKind};
use crate::types::{Date24, DateTime64};

/// Implements the [`ColumnReader`] accessors answered by a reader's `core`.
macro_rules! delegate_core {
    () => {
        fn field(&self) -> &FieldInfo {
            self.core.field()
        }

        fn row_count(&self) -> u64 {
            self.core.row_count()
        }

        fn current_row(&self) -> u64 {
            self.core.current_row()
        }

        fn entry_statistics(&self) -> &ColumnStatistics {
            self.core.entry_statistics()
        }

        fn column_statistics(&self) -> &ColumnStatistics {
            self.core.column_statistics()
        }
    };
}

pub(crate) use delegate_core;

pub use fixed::*;
pub use hll::*;
pub use string::*;

mod fixed;
mod hll;
mod string;

/// Position values recorded for a `PRESENT` stream.
const PRESENT_POSITIONS: usize = 3;

/// Readers of different columns of one segment may run on separate threads.
pub trait ColumnReader: Send {
    fn field(&self) -> &FieldInfo;

    /// Rows in the column.
    fn row_count(&self) -> u64;

    /// The row the next `next_vector` call starts at.
    fn current_row(&self) -> u64;

    /// Decode up to `n` rows into `batch`, replacing its contents, and return how many were
    /// decoded. Fails with `EndOfStream` once every row has been read.
    fn next_vector(&mut self, batch: &mut ColumnBatch, n: usize) -> OlapResult<usize>;

    /// Move forward `n` rows without decoding them.
    fn skip(&mut self, n: u64) -> OlapResult<()>;

    /// Move to the first row of the index entry `provider` was taken from.
    fn seek(&mut self, provider: &mut PositionProvider<'_>) -> OlapResult<()>;

    /// Statistics of the entry last seeked to.
    fn entry_statistics(&self) -> &ColumnStatistics;

    /// Statistics over every row of the column.
    fn column_statistics(&self) -> &ColumnStatistics;

    /// The union of every sketch of an HLL column.
    fn aggregate_sketch(&self) -> Option<&HllSet> {
        None
    }
}

/// Create the reader for `field`, taking its streams from `streams`.
pub fn create_column_reader<R: ReadAt + Send + 'static>(
    field: &FieldInfo,
    column: &ColumnHeaderMessage,
    streams: &mut SegmentStreams<R>,
    options: &ReaderOptions,
) -> OlapResult<Box<dyn ColumnReader>> {
    if column.unique_id != field.unique_id {
        olap_bail!(
            InitError: "column header {} does not describe column {} ({})",
            column.unique_id,
            field.name,
            field.unique_id
        );
    }
    let core = ReaderCore::new(field.clone(), column, streams, options)?;
    Ok(match field.field_type {
        FieldType::Tinyint => Box::new(FixedColumnReader::<i8, R>::new(core, streams)?),
        FieldType::Smallint => Box::new(FixedColumnReader::<i16, R>::new(core, streams)?),
        FieldType::Int => Box::new(FixedColumnReader::<i32, R>::new(core, streams)?),
        FieldType::Bigint => Box::new(FixedColumnReader::<i64, R>::new(core, streams)?),
        FieldType::Largeint => Box::new(FixedColumnReader::<i128, R>::new(core, streams)?),
        FieldType::UnsignedTinyint => Box::new(FixedColumnReader::<u8, R>::new(core, streams)?),
        FieldType::UnsignedSmallint => {
            Box::new(FixedColumnReader::<u16, R>::new(core, streams)?)
        }
        FieldType::UnsignedInt => Box::new(FixedColumnReader::<u32, R>::new(core, streams)?),
        FieldType::UnsignedBigint => Box::new(FixedColumnReader::<u64, R>::new(core, streams)?),
        FieldType::Float => Box::new(FixedColumnReader::<f32, R>::new(core, streams)?),
        FieldType::Double => Box::new(FixedColumnReader::<f64, R>::new(core, streams)?),
        FieldType::Date => Box::new(FixedColumnReader::<Date24, R>::new(core, streams)?),
        FieldType::Datetime => Box::new(FixedColumnReader::<DateTime64, R>::new(core, streams)?),
        FieldType::Decimal => Box::new(DecimalColumnReader::new(core, streams)?),
        FieldType::Char | FieldType::Varchar => match column.encoding() {
            ColumnEncodingKind::Direct => Box::new(StringDirectReader::new(core, streams)?),
            ColumnEncodingKind::Dictionary => Box::new(StringDictionaryReader::new(
                core,
                streams,
                column.dictionary_size,
            )?),
        },
        FieldType::Hll => Box::new(HllColumnReader::new(core, streams)?),
    })
}

/// State every reader shares: the row cursor, presence flags and statistics.
pub(crate) struct ReaderCore<R> {
    field: FieldInfo,
    present: Option<BitFieldReader<R>>,
    row_count: u64,
    current_row: u64,
    batch_capacity: usize,
    entry_stats: ColumnStatistics,
    column_stats: ColumnStatistics,
}

impl<R: ReadAt> ReaderCore<R> {
    fn new(
        field: FieldInfo,
        column: &ColumnHeaderMessage,
        streams: &mut SegmentStreams<R>,
        options: &ReaderOptions,
    ) -> OlapResult<Self> {
        // PRESENT is absent when the column had no nulls
        let present = if field.nullable {
            streams
                .take(field.unique_id, StreamKind::Present)
                .map(BitFieldReader::new)
        } else {
            None
        };
        let column_stats = column
            .statistics
            .as_ref()
            .map(ColumnStatistics::from_message)
            .transpose()?
            .unwrap_or_default();
        Ok(Self {
            field,
            present,
            row_count: column.row_count,
            current_row: 0,
            batch_capacity: options.batch_capacity,
            entry_stats: ColumnStatistics::default(),
            column_stats,
        })
    }

    pub(crate) fn field(&self) -> &FieldInfo {
        &self.field
    }

    pub(crate) fn row_count(&self) -> u64 {
        self.row_count
    }

    pub(crate) fn current_row(&self) -> u64 {
        self.current_row
    }

    pub(crate) fn entry_statistics(&self) -> &ColumnStatistics {
        &self.entry_stats
    }

    pub(crate) fn column_statistics(&self) -> &ColumnStatistics {
        &self.column_stats
    }

    /// Validate a `next_vector` request and claim the rows it will decode.
    pub(crate) fn begin_batch(&mut self, batch: &ColumnBatch, n: usize) -> OlapResult<usize> {
        if n > batch.capacity() || n > self.batch_capacity {
            olap_bail!(
                "requested {} rows, batch capacity is {} and reader capacity {}",
                n,
                batch.capacity(),
                self.batch_capacity
            );
        }
        let remaining = self.row_count - self.current_row;
        if remaining == 0 {
            olap_bail!(
                EndOfStream: "column {} has no rows after row {}",
                self.field.name,
                self.row_count
            );
        }
        let count = usize::try_from(remaining).map_or(n, |r| r.min(n));
        self.current_row += count as u64;
        Ok(count)
    }

    /// Whether the next row is null.
    pub(crate) fn next_is_null(&mut self) -> OlapResult<bool> {
        match &mut self.present {
            Some(present) => Ok(!present.next_bit()?),
            None => Ok(false),
        }
    }

    /// Claim `n` rows to skip and return how many of them are not null.
    pub(crate) fn skip_rows(&mut self, n: u64) -> OlapResult<u64> {
        if n > self.row_count - self.current_row {
            olap_bail!(
                EndOfStream: "cannot skip {} rows of column {} at row {} of {}",
                n,
                self.field.name,
                self.current_row,
                self.row_count
            );
        }
        self.current_row += n;
        match &mut self.present {
            Some(present) => present.skip(n),
            None => Ok(n),
        }
    }

    /// Apply the `PRESENT` positions of an entry and move to its first row. Readers then
    /// seek their own streams with the remaining positions.
    pub(crate) fn seek(&mut self, provider: &mut PositionProvider<'_>) -> OlapResult<()> {
        match &mut self.present {
            Some(present) => present.seek(provider)?,
            None if self.field.nullable => {
                for _ in 0..PRESENT_POSITIONS {
                    provider.next_position()?;
                }
            }
            None => {}
        }
        if provider.first_row() > self.row_count {
            olap_bail!(
                DecodeError: "index entry starts at row {} past the {} rows of column {}",
                provider.first_row(),
                self.row_count,
                self.field.name
            );
        }
        self.current_row = provider.first_row();
        self.entry_stats = provider.statistics().clone();
        Ok(())
    }
}

/// Read one little-endian `u32` length or dictionary code.
pub(crate) fn read_u32<R: ReadAt>(stream: &mut InStream<R>) -> OlapResult<u32> {
    let mut bytes = [0u8; 4];
    stream.read(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

/// Read one value length from `stream`, rejecting lengths no value of `field` can have.
pub(crate) fn read_value_len<R: ReadAt>(
    stream: &mut InStream<R>,
    field: &FieldInfo,
    max_len: usize,
) -> OlapResult<usize> {
    let len = read_u32(stream)? as usize;
    if len > max_len {
        olap_bail!(
            DecodeError: "{} stream of column {} holds a {} byte value, at most {} are allowed",
            stream.name().kind,
            field.name,
            len,
            max_len
        );
    }
    Ok(len)
}
