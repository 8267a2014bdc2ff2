use olap_error::{OlapResult, ResultExt};
use olap_hll::{HLL_COLUMN_DEFAULT_LEN, HllSet};
use olap_io::ReadAt;

use crate::batch::ColumnBatch;
use crate::field::FieldInfo;
use crate::index::PositionProvider;
use crate::reader::{ColumnReader, ReaderCore, delegate_core, read_value_len};
use crate::segment::SegmentStreams;
use crate::stats::ColumnStatistics;
use crate::stream::{InStream, StreamKind};

/// Reads HLL columns. Rows yield their serialized sketches; the union of the column is parsed
/// from `SECONDARY` up front.
pub struct HllColumnReader<R> {
    core: ReaderCore<R>,
    data: InStream<R>,
    length: InStream<R>,
    /// No serialized sketch is longer than a full register array.
    max_len: usize,
    aggregate: HllSet,
}

impl<R: ReadAt> HllColumnReader<R> {
    pub(crate) fn new(core: ReaderCore<R>, streams: &mut SegmentStreams<R>) -> OlapResult<Self> {
        let unique_id = core.field().unique_id;
        let mut secondary = streams.require(unique_id, StreamKind::Secondary)?;
        let aggregate = HllSet::parse(&secondary.read_to_end()?)
            .context(|| format!("aggregate sketch of column {}", core.field().name))?;
        let max_len = core.field().max_value_len().min(HLL_COLUMN_DEFAULT_LEN);
        Ok(Self {
            core,
            data: streams.require(unique_id, StreamKind::Data)?,
            length: streams.require(unique_id, StreamKind::Length)?,
            max_len,
            aggregate,
        })
    }
}

impl<R: ReadAt + Send> ColumnReader for HllColumnReader<R> {
    delegate_core!();

    fn next_vector(&mut self, batch: &mut ColumnBatch, n: usize) -> OlapResult<usize> {
        let count = self.core.begin_batch(batch, n)?;
        batch.reset(0);
        for _ in 0..count {
            if self.core.next_is_null()? {
                batch.push_null_slice();
                continue;
            }
            let len = read_value_len(&mut self.length, self.core.field(), self.max_len)?;
            batch.push_slice_with(len, |out| self.data.read(out))?;
        }
        Ok(count)
    }

    fn skip(&mut self, n: u64) -> OlapResult<()> {
        let values = self.core.skip_rows(n)?;
        let mut bytes = 0u64;
        for _ in 0..values {
            bytes += read_value_len(&mut self.length, self.core.field(), self.max_len)? as u64;
        }
        self.data.skip(bytes)
    }

    fn seek(&mut self, provider: &mut PositionProvider<'_>) -> OlapResult<()> {
        self.core.seek(provider)?;
        self.data.seek(provider)?;
        self.length.seek(provider)
    }

    fn aggregate_sketch(&self) -> Option<&HllSet> {
        Some(&self.aggregate)
    }
}
