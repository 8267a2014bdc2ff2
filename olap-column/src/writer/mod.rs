//! Column writers.
//!
//! A writer is created per column of a segment with [`create_column_writer`], receives one
//! [`Datum`] per row, and is finalized once: its streams go back to the
//! [`OutStreamFactory`], its column header is appended to the segment header, and its row
//! index is persisted in the column's `ROW_INDEX` stream.

use log::debug;
use olap_error::{OlapResult, olap_bail};
use prost::Message;

use crate::bit_field::BitFieldWriter;
use crate::factory::OutStreamFactory;
use crate::field::{Datum, FieldInfo, FieldType};
use crate::index::{PositionEntryWriter, RowIndex, RowIndexBuilder};
use crate::options::WriterOptions;
use crate::proto::{ColumnEncodingKind, ColumnHeaderMessage, SegmentHeaderMessage};
use crate::stats::{ColumnStatistics, StatValue};
use crate::stream::{OutStream, StreamKind};
use crate::types::{Date24, DateTime64};

pub use fixed::*;
pub use hll::*;
pub use string::*;

mod fixed;
mod hll;
mod string;

pub trait ColumnWriter: Send {
    fn field(&self) -> &FieldInfo;

    /// Rows written so far.
    fn row_count(&self) -> u64;

    /// Append one row. Fails with `EncodeError` when the value does not fit the column.
    fn write(&mut self, datum: &Datum<'_>) -> OlapResult<()>;

    /// Close the current row index entry and open the next one at the current row.
    fn create_row_index_entry(&mut self) -> OlapResult<()>;

    /// Flush every stream of the column into `factory` and describe the column in `header`.
    ///
    /// Returns the column's row index as persisted in its `ROW_INDEX` stream.
    fn finalize(
        self: Box<Self>,
        factory: &mut OutStreamFactory,
        header: &mut SegmentHeaderMessage,
    ) -> OlapResult<RowIndex>;
}

/// Create the writer for `field`, allocating its streams from `factory`.
pub fn create_column_writer(
    field: &FieldInfo,
    factory: &mut OutStreamFactory,
    options: &WriterOptions,
) -> OlapResult<Box<dyn ColumnWriter>> {
    let field = field.clone();
    Ok(match field.field_type {
        FieldType::Tinyint => Box::new(FixedColumnWriter::<i8>::new(field, factory)?),
        FieldType::Smallint => Box::new(FixedColumnWriter::<i16>::new(field, factory)?),
        FieldType::Int => Box::new(FixedColumnWriter::<i32>::new(field, factory)?),
        FieldType::Bigint => Box::new(FixedColumnWriter::<i64>::new(field, factory)?),
        FieldType::Largeint => Box::new(FixedColumnWriter::<i128>::new(field, factory)?),
        FieldType::UnsignedTinyint => Box::new(FixedColumnWriter::<u8>::new(field, factory)?),
        FieldType::UnsignedSmallint => Box::new(FixedColumnWriter::<u16>::new(field, factory)?),
        FieldType::UnsignedInt => Box::new(FixedColumnWriter::<u32>::new(field, factory)?),
        FieldType::UnsignedBigint => Box::new(FixedColumnWriter::<u64>::new(field, factory)?),
        FieldType::Float => Box::new(FixedColumnWriter::<f32>::new(field, factory)?),
        FieldType::Double => Box::new(FixedColumnWriter::<f64>::new(field, factory)?),
        FieldType::Date => Box::new(FixedColumnWriter::<Date24>::new(field, factory)?),
        FieldType::Datetime => Box::new(FixedColumnWriter::<DateTime64>::new(field, factory)?),
        FieldType::Decimal => Box::new(DecimalColumnWriter::new(field, factory)?),
        FieldType::Char | FieldType::Varchar => {
            Box::new(StringColumnWriter::new(field, factory, options.dictionary)?)
        }
        FieldType::Hll => Box::new(HllColumnWriter::new(field, factory)?),
    })
}

/// State every writer shares: presence flags, statistics and the row index under
/// construction.
#[derive(Debug)]
pub(crate) struct WriterCore {
    field: FieldInfo,
    present: Option<BitFieldWriter>,
    row_index: OutStream,
    index: RowIndexBuilder,
    entry_stats: ColumnStatistics,
    column_stats: ColumnStatistics,
    row_count: u64,
}

impl WriterCore {
    /// Allocate the `ROW_INDEX` stream and, for nullable columns, the `PRESENT` stream, and
    /// record the present position of entry 0.
    pub(crate) fn new(field: FieldInfo, factory: &mut OutStreamFactory) -> OlapResult<Self> {
        let row_index = factory.create_stream(field.unique_id, StreamKind::RowIndex)?;
        let present = if field.nullable {
            Some(BitFieldWriter::new(
                factory.create_stream(field.unique_id, StreamKind::Present)?,
            ))
        } else {
            None
        };
        let tracks_min_max = field.field_type.is_ordered();
        let mut core = Self {
            field,
            present,
            row_index,
            index: RowIndexBuilder::new(),
            entry_stats: ColumnStatistics::new(tracks_min_max),
            column_stats: ColumnStatistics::new(tracks_min_max),
            row_count: 0,
        };
        core.record_present_position();
        Ok(core)
    }

    pub(crate) fn field(&self) -> &FieldInfo {
        &self.field
    }

    pub(crate) fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Account for one row. Null rows of a non-nullable column are rejected.
    pub(crate) fn write_presence(&mut self, is_null: bool) -> OlapResult<()> {
        match &mut self.present {
            Some(present) => present.write(!is_null)?,
            None if is_null => {
                olap_bail!(EncodeError: "column {} is not nullable", self.field.name)
            }
            None => {}
        }
        if is_null {
            self.entry_stats.add_null();
        }
        self.row_count += 1;
        Ok(())
    }

    pub(crate) fn add_stat(&mut self, value: StatValue) {
        self.entry_stats.add(value);
    }

    /// Close the open entry and record the present position of the new one. Writers then
    /// record the positions of their own streams into [`Self::current_entry`].
    pub(crate) fn create_row_index_entry(&mut self) {
        let stats = self.entry_stats.take();
        self.column_stats.merge(&stats);
        self.index.close_entry(self.row_count, stats);
        self.record_present_position();
    }

    pub(crate) fn current_entry(&mut self) -> &mut PositionEntryWriter {
        self.index.current_mut()
    }

    fn record_present_position(&mut self) {
        if let Some(present) = &self.present {
            present.record_position(self.index.current_mut());
        }
    }

    /// Close the open entry, if it has rows, and return all entries so writers that only
    /// lay out their data at finalize can append positions.
    pub(crate) fn finish_entries(&mut self) -> OlapResult<Vec<PositionEntryWriter>> {
        if self.row_count == 0 && !self.field.nullable {
            olap_bail!(
                FinalizeError: "required column {} has no rows",
                self.field.name
            );
        }
        let stats = self.entry_stats.take();
        self.column_stats.merge(&stats);
        let builder = std::mem::take(&mut self.index);
        Ok(builder.finish(self.row_count, stats))
    }

    /// Persist presence flags and the row index, and add the column header.
    pub(crate) fn finalize(
        self,
        entries: Vec<PositionEntryWriter>,
        encoding: ColumnEncodingKind,
        dictionary_size: u32,
        factory: &mut OutStreamFactory,
        header: &mut SegmentHeaderMessage,
    ) -> OlapResult<RowIndex> {
        let Self {
            field,
            present,
            mut row_index,
            column_stats,
            row_count,
            ..
        } = self;

        if let Some(mut present) = present {
            present.flush()?;
            let mut stream = present.into_stream();
            if !column_stats.has_null() {
                debug!("column {}: no nulls, suppressing PRESENT", field.name);
                stream.suppress();
            }
            factory.adopt(stream)?;
        }

        row_index.write(&RowIndex::to_message(&entries).encode_to_vec())?;
        row_index.flush()?;
        factory.adopt(row_index)?;

        header.columns.push(ColumnHeaderMessage {
            unique_id: field.unique_id,
            encoding: encoding as i32,
            dictionary_size,
            row_count,
            statistics: Some(column_stats.to_message()),
            index_entry_count: entries.len() as u32,
        });
        debug!(
            "column {} finalized: {} rows, {} index entries, {} nulls",
            field.name,
            row_count,
            entries.len(),
            column_stats.null_count()
        );
        Ok(RowIndex::from_writer_entries(&entries))
    }
}
