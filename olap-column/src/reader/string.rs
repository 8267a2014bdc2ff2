use olap_error::{OlapResult, olap_bail};
use olap_io::ReadAt;

use crate::batch::ColumnBatch;
use crate::field::FieldInfo;
use crate::index::PositionProvider;
use crate::reader::{ColumnReader, ReaderCore, delegate_core, read_u32, read_value_len};
use crate::segment::SegmentStreams;
use crate::stats::ColumnStatistics;
use crate::stream::{InStream, StreamKind};

/// Reads directly encoded strings: bytes from `DATA`, one length per value from `LENGTH`.
pub struct StringDirectReader<R> {
    core: ReaderCore<R>,
    data: InStream<R>,
    length: InStream<R>,
}

impl<R: ReadAt> StringDirectReader<R> {
    pub(crate) fn new(core: ReaderCore<R>, streams: &mut SegmentStreams<R>) -> OlapResult<Self> {
        let unique_id = core.field().unique_id;
        Ok(Self {
            core,
            data: streams.require(unique_id, StreamKind::Data)?,
            length: streams.require(unique_id, StreamKind::Length)?,
        })
    }
}

impl<R: ReadAt + Send> ColumnReader for StringDirectReader<R> {
    delegate_core!();

    fn next_vector(&mut self, batch: &mut ColumnBatch, n: usize) -> OlapResult<usize> {
        let count = self.core.begin_batch(batch, n)?;
        batch.reset(0);
        for _ in 0..count {
            if self.core.next_is_null()? {
                batch.push_null_slice();
                continue;
            }
            let field = self.core.field();
            let len = read_value_len(&mut self.length, field, field.max_value_len())?;
            batch.push_slice_with(len, |out| self.data.read(out))?;
        }
        Ok(count)
    }

    fn skip(&mut self, n: u64) -> OlapResult<()> {
        let values = self.core.skip_rows(n)?;
        let mut bytes = 0u64;
        let field = self.core.field();
        for _ in 0..values {
            bytes += read_value_len(&mut self.length, field, field.max_value_len())? as u64;
        }
        self.data.skip(bytes)
    }

    fn seek(&mut self, provider: &mut PositionProvider<'_>) -> OlapResult<()> {
        self.core.seek(provider)?;
        self.data.seek(provider)?;
        self.length.seek(provider)
    }
}

/// Reads dictionary encoded strings.
///
/// The sorted dictionary is loaded from `DICTIONARY_DATA` and `LENGTH` when the reader is
/// created; `DATA` holds one code per value.
pub struct StringDictionaryReader<R> {
    core: ReaderCore<R>,
    data: InStream<R>,
    keys: Vec<u8>,
    /// Start of every key in `keys`, plus the end of the last one.
    offsets: Vec<usize>,
}

impl<R: ReadAt> StringDictionaryReader<R> {
    const CODE_WIDTH: u64 = 4;

    pub(crate) fn new(
        core: ReaderCore<R>,
        streams: &mut SegmentStreams<R>,
        dictionary_size: u32,
    ) -> OlapResult<Self> {
        let unique_id = core.field().unique_id;
        let data = streams.require(unique_id, StreamKind::Data)?;
        let mut lengths = streams.require(unique_id, StreamKind::Length)?;
        let mut dictionary = streams.require(unique_id, StreamKind::DictionaryData)?;

        let field = core.field();
        let length_bytes = lengths.range().uncompressed_length;
        if u64::from(dictionary_size) * size_of::<u32>() as u64 > length_bytes {
            olap_bail!(
                DecodeError: "dictionary of column {} claims {} keys, its LENGTH stream holds {} bytes",
                field.name,
                dictionary_size,
                length_bytes
            );
        }

        let mut offsets = Vec::with_capacity(dictionary_size as usize + 1);
        offsets.push(0);
        let mut total = 0usize;
        for _ in 0..dictionary_size {
            total += read_value_len(&mut lengths, field, field.max_value_len())?;
            offsets.push(total);
        }
        let keys = dictionary.read_to_end()?;
        if keys.len() != total {
            olap_bail!(
                DecodeError: "dictionary of column {} holds {} bytes, its key lengths add up to {}",
                field.name,
                keys.len(),
                total
            );
        }
        Ok(Self {
            core,
            data,
            keys,
            offsets,
        })
    }

    fn key(&self, code: u32) -> OlapResult<&[u8]> {
        let code = code as usize;
        match (self.offsets.get(code), self.offsets.get(code + 1)) {
            (Some(&start), Some(&end)) => Ok(&self.keys[start..end]),
            _ => olap_bail!(
                DecodeError: "code {} is outside the {} key dictionary of column {}",
                code,
                self.offsets.len() - 1,
                self.core.field().name
            ),
        }
    }
}

impl<R: ReadAt + Send> ColumnReader for StringDictionaryReader<R> {
    delegate_core!();

    fn next_vector(&mut self, batch: &mut ColumnBatch, n: usize) -> OlapResult<usize> {
        let count = self.core.begin_batch(batch, n)?;
        batch.reset(0);
        for _ in 0..count {
            if self.core.next_is_null()? {
                batch.push_null_slice();
                continue;
            }
            let code = read_u32(&mut self.data)?;
            batch.push_slice(self.key(code)?);
        }
        Ok(count)
    }

    fn skip(&mut self, n: u64) -> OlapResult<()> {
        let values = self.core.skip_rows(n)?;
        self.data.skip(values * Self::CODE_WIDTH)
    }

    fn seek(&mut self, provider: &mut PositionProvider<'_>) -> OlapResult<()> {
        self.core.seek(provider)?;
        self.data.seek(provider)
    }
}
