use std::marker::PhantomData;

use olap_error::OlapResult;
use olap_io::ReadAt;

use crate::batch::ColumnBatch;
use crate::field::{FieldInfo, NativeValue};
use crate::index::PositionProvider;
use crate::reader::{ColumnReader, ReaderCore, delegate_core};
use crate::segment::SegmentStreams;
use crate::stats::ColumnStatistics;
use crate::stream::{InStream, StreamKind};
use crate::types::Decimal12;

/// Reads values of one fixed width from `DATA`.
pub struct FixedColumnReader<T, R> {
    core: ReaderCore<R>,
    data: InStream<R>,
    _type: PhantomData<T>,
}

impl<T: NativeValue, R: ReadAt> FixedColumnReader<T, R> {
    pub(crate) fn new(core: ReaderCore<R>, streams: &mut SegmentStreams<R>) -> OlapResult<Self> {
        let data = streams.require(core.field().unique_id, StreamKind::Data)?;
        Ok(Self {
            core,
            data,
            _type: PhantomData,
        })
    }
}

impl<T: NativeValue, R: ReadAt + Send> ColumnReader for FixedColumnReader<T, R> {
    delegate_core!();

    fn next_vector(&mut self, batch: &mut ColumnBatch, n: usize) -> OlapResult<usize> {
        let count = self.core.begin_batch(batch, n)?;
        batch.reset(T::WIDTH);
        // null rows hold zeroed placeholders, so values are contiguous
        self.data.read(batch.fixed_slots_mut(count))?;
        let nulls = (0..count)
            .map(|_| self.core.next_is_null())
            .collect::<OlapResult<Vec<_>>>()?;
        batch.commit_fixed(nulls);
        Ok(count)
    }

    fn skip(&mut self, n: u64) -> OlapResult<()> {
        self.core.skip_rows(n)?;
        self.data.skip(n * T::WIDTH as u64)
    }

    fn seek(&mut self, provider: &mut PositionProvider<'_>) -> OlapResult<()> {
        self.core.seek(provider)?;
        self.data.seek(provider)
    }
}

/// Reads decimals, integer parts from `DATA` and fractions from `SECONDARY`.
///
/// Each batch slot is the integer part followed by the fraction, both little endian.
pub struct DecimalColumnReader<R> {
    core: ReaderCore<R>,
    data: InStream<R>,
    secondary: InStream<R>,
}

impl<R: ReadAt> DecimalColumnReader<R> {
    const INTEGER_WIDTH: usize = size_of::<i64>();

    pub(crate) fn new(core: ReaderCore<R>, streams: &mut SegmentStreams<R>) -> OlapResult<Self> {
        let unique_id = core.field().unique_id;
        Ok(Self {
            core,
            data: streams.require(unique_id, StreamKind::Data)?,
            secondary: streams.require(unique_id, StreamKind::Secondary)?,
        })
    }
}

impl<R: ReadAt + Send> ColumnReader for DecimalColumnReader<R> {
    delegate_core!();

    fn next_vector(&mut self, batch: &mut ColumnBatch, n: usize) -> OlapResult<usize> {
        let count = self.core.begin_batch(batch, n)?;
        batch.reset(Decimal12::WIDTH);
        let slots = batch.fixed_slots_mut(count);
        for slot in slots.chunks_exact_mut(Decimal12::WIDTH) {
            let (integer, fraction) = slot.split_at_mut(Self::INTEGER_WIDTH);
            self.data.read(integer)?;
            self.secondary.read(fraction)?;
        }
        let nulls = (0..count)
            .map(|_| self.core.next_is_null())
            .collect::<OlapResult<Vec<_>>>()?;
        batch.commit_fixed(nulls);
        Ok(count)
    }

    fn skip(&mut self, n: u64) -> OlapResult<()> {
        self.core.skip_rows(n)?;
        self.data.skip(n * Self::INTEGER_WIDTH as u64)?;
        self.secondary
            .skip(n * (Decimal12::WIDTH - Self::INTEGER_WIDTH) as u64)
    }

    fn seek(&mut self, provider: &mut PositionProvider<'_>) -> OlapResult<()> {
        self.core.seek(provider)?;
        self.data.seek(provider)?;
        self.secondary.seek(provider)
    }
}
