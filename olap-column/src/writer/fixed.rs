use std::marker::PhantomData;

use olap_error::{OlapResult, olap_err};

use crate::factory::OutStreamFactory;
use crate::field::{Datum, FieldInfo, NativeValue};
use crate::index::RowIndex;
use crate::proto::{ColumnEncodingKind, SegmentHeaderMessage};
use crate::stats::StatValue;
use crate::stream::{OutStream, StreamKind};
use crate::writer::{ColumnWriter, WriterCore};

/// Writes values of one fixed width to `DATA`. Null rows take a zeroed slot.
#[derive(Debug)]
pub struct FixedColumnWriter<T> {
    core: WriterCore,
    data: OutStream,
    scratch: Vec<u8>,
    _type: PhantomData<T>,
}

impl<T: NativeValue> FixedColumnWriter<T> {
    pub fn new(field: FieldInfo, factory: &mut OutStreamFactory) -> OlapResult<Self> {
        let mut core = WriterCore::new(field, factory)?;
        let data = factory.create_stream(core.field().unique_id, StreamKind::Data)?;
        data.record_position(core.current_entry());
        Ok(Self {
            core,
            data,
            scratch: Vec::with_capacity(T::WIDTH),
            _type: PhantomData,
        })
    }
}

impl<T: NativeValue> ColumnWriter for FixedColumnWriter<T> {
    fn field(&self) -> &FieldInfo {
        self.core.field()
    }

    fn row_count(&self) -> u64 {
        self.core.row_count()
    }

    fn write(&mut self, datum: &Datum<'_>) -> OlapResult<()> {
        let value = if datum.is_null() {
            None
        } else {
            Some(T::from_datum(datum).ok_or_else(|| {
                olap_err!(
                    EncodeError: "column {} of type {} cannot store {:?}",
                    self.core.field().name,
                    self.core.field().field_type,
                    datum
                )
            })?)
        };
        self.core.write_presence(value.is_none())?;

        self.scratch.clear();
        match value {
            Some(value) => {
                value.write_le(&mut self.scratch);
                self.core.add_stat(value.stat_value());
            }
            None => self.scratch.resize(T::WIDTH, 0),
        }
        self.data.write(&self.scratch)
    }

    fn create_row_index_entry(&mut self) -> OlapResult<()> {
        self.core.create_row_index_entry();
        self.data.record_position(self.core.current_entry());
        Ok(())
    }

    fn finalize(
        self: Box<Self>,
        factory: &mut OutStreamFactory,
        header: &mut SegmentHeaderMessage,
    ) -> OlapResult<RowIndex> {
        let Self { mut core, mut data, .. } = *self;
        let entries = core.finish_entries()?;
        data.flush()?;
        factory.adopt(data)?;
        core.finalize(entries, ColumnEncodingKind::Direct, 0, factory, header)
    }
}

/// Writes the integer parts of decimals to `DATA` and their fractions to `SECONDARY`.
#[derive(Debug)]
pub struct DecimalColumnWriter {
    core: WriterCore,
    data: OutStream,
    secondary: OutStream,
}

impl DecimalColumnWriter {
    pub fn new(field: FieldInfo, factory: &mut OutStreamFactory) -> OlapResult<Self> {
        let mut core = WriterCore::new(field, factory)?;
        let unique_id = core.field().unique_id;
        let data = factory.create_stream(unique_id, StreamKind::Data)?;
        let secondary = factory.create_stream(unique_id, StreamKind::Secondary)?;
        let mut writer = Self {
            core,
            data,
            secondary,
        };
        writer.record_positions();
        Ok(writer)
    }

    fn record_positions(&mut self) {
        self.data.record_position(self.core.current_entry());
        self.secondary.record_position(self.core.current_entry());
    }
}

impl ColumnWriter for DecimalColumnWriter {
    fn field(&self) -> &FieldInfo {
        self.core.field()
    }

    fn row_count(&self) -> u64 {
        self.core.row_count()
    }

    fn write(&mut self, datum: &Datum<'_>) -> OlapResult<()> {
        let value = match datum {
            Datum::Null => None,
            Datum::Decimal(value) => Some(*value),
            other => {
                return Err(olap_err!(
                    EncodeError: "decimal column {} cannot store {:?}",
                    self.core.field().name,
                    other
                ));
            }
        };
        self.core.write_presence(value.is_none())?;
        if let Some(value) = value {
            self.core.add_stat(StatValue::Int(value.scaled()));
        }
        let value = value.unwrap_or_default();
        self.data.write(&value.integer.to_le_bytes())?;
        self.secondary.write(&value.fraction.to_le_bytes())
    }

    fn create_row_index_entry(&mut self) -> OlapResult<()> {
        self.core.create_row_index_entry();
        self.record_positions();
        Ok(())
    }

    fn finalize(
        self: Box<Self>,
        factory: &mut OutStreamFactory,
        header: &mut SegmentHeaderMessage,
    ) -> OlapResult<RowIndex> {
        let Self {
            mut core,
            mut data,
            mut secondary,
        } = *self;
        let entries = core.finish_entries()?;
        data.flush()?;
        secondary.flush()?;
        factory.adopt(data)?;
        factory.adopt(secondary)?;
        core.finalize(entries, ColumnEncodingKind::Direct, 0, factory, header)
    }
}
