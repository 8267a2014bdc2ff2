//! Opening the streams of a written segment.

use log::debug;
use olap_error::{OlapResult, ResultExt, olap_bail, olap_err};
use olap_io::ReadAt;
use olap_metrics::OlapMetrics;
use rustc_hash::FxHashMap;

use crate::index::RowIndex;
use crate::pool::BufferPool;
use crate::proto::{CompressionKind, SegmentHeaderMessage};
use crate::stream::{InStream, StreamKind, StreamName, StreamRange};

/// The in-streams of one segment, keyed by column and kind.
///
/// Column readers take the streams they need out of the set; a stream that is absent was
/// suppressed by its writer.
pub struct SegmentStreams<R> {
    streams: FxHashMap<StreamName, InStream<R>>,
}

impl<R: ReadAt> SegmentStreams<R> {
    /// Open an in-stream for every directory entry of `header`.
    ///
    /// Fails with `InitError` when an entry lies outside `read_at`, names an unknown stream
    /// kind, appears twice, or when the pool's buffers are smaller than the segment's chunks.
    pub fn open(
        read_at: R,
        header: &SegmentHeaderMessage,
        pool: BufferPool,
        metrics: &OlapMetrics,
    ) -> OlapResult<Self> {
        let Ok(compression) = CompressionKind::try_from(header.compression) else {
            olap_bail!(InitError: "unknown segment compression {}", header.compression);
        };
        if pool.buffer_size() < header.stream_buffer_size as usize {
            olap_bail!(
                InitError: "read buffers of {} bytes cannot hold chunks of {} bytes",
                pool.buffer_size(),
                header.stream_buffer_size
            );
        }
        let size = read_at.size()?;
        let compressor = compression.compressor();

        let mut streams = FxHashMap::default();
        for info in &header.streams {
            let Ok(kind) = StreamKind::try_from(info.kind) else {
                olap_bail!(
                    InitError: "unknown stream kind {} of column {}",
                    info.kind,
                    info.column_unique_id
                );
            };
            let name = StreamName::new(info.column_unique_id, kind);
            let end = info
                .offset
                .checked_add(info.length)
                .ok_or_else(|| olap_err!(InitError: "stream {} range overflows", name))?;
            if end > size {
                olap_bail!(
                    InitError: "stream {} ends at {} past the {} byte segment",
                    name,
                    end,
                    size
                );
            }
            let stream = InStream::new(
                name,
                read_at.clone(),
                StreamRange {
                    offset: info.offset,
                    length: info.length,
                    uncompressed_length: info.uncompressed_length,
                },
                compressor.clone(),
                pool.clone(),
                metrics.stream_metrics(kind.as_str()),
            );
            if streams.insert(name, stream).is_some() {
                olap_bail!(InitError: "stream {} is listed twice", name);
            }
        }
        debug!(
            "opened {} streams of a {} byte segment ({:?} compression)",
            streams.len(),
            size,
            compression
        );
        Ok(Self { streams })
    }

    /// Take a stream out of the set, `None` if it was suppressed or already taken.
    pub fn take(&mut self, unique_id: u32, kind: StreamKind) -> Option<InStream<R>> {
        self.streams.remove(&StreamName::new(unique_id, kind))
    }

    /// Take a stream the caller cannot do without.
    pub fn require(&mut self, unique_id: u32, kind: StreamKind) -> OlapResult<InStream<R>> {
        self.take(unique_id, kind)
            .ok_or_else(|| olap_err!(InitError: "column {} has no {} stream", unique_id, kind))
    }

    pub fn contains(&self, unique_id: u32, kind: StreamKind) -> bool {
        self.streams.contains_key(&StreamName::new(unique_id, kind))
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Read the row index of a column from its `ROW_INDEX` stream.
    pub fn read_row_index(&mut self, unique_id: u32) -> OlapResult<RowIndex> {
        let mut stream = self.require(unique_id, StreamKind::RowIndex)?;
        let bytes = stream.read_to_end()?;
        RowIndex::from_bytes(&bytes).context(|| format!("row index of column {unique_id}"))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use olap_error::OlapError;

    use super::*;
    use crate::proto::StreamInfoMessage;

    fn header(offset: u64, length: u64) -> SegmentHeaderMessage {
        SegmentHeaderMessage {
            stream_buffer_size: 64,
            streams: vec![StreamInfoMessage {
                column_unique_id: 1,
                kind: StreamKind::Data as i32,
                offset,
                length,
                uncompressed_length: length,
            }],
            ..Default::default()
        }
    }

    fn open(header: &SegmentHeaderMessage, buffer_size: usize) -> OlapResult<SegmentStreams<Bytes>> {
        SegmentStreams::open(
            Bytes::from(vec![0u8; 100]),
            header,
            BufferPool::new(buffer_size),
            &OlapMetrics::default(),
        )
    }

    #[test]
    fn streams_are_taken_once() {
        let mut streams = open(&header(10, 20), 64).unwrap();
        assert!(streams.contains(1, StreamKind::Data));
        assert!(streams.take(1, StreamKind::Present).is_none());
        assert!(streams.take(1, StreamKind::Data).is_some());
        let err = streams.require(1, StreamKind::Data).err();
        assert!(matches!(err, Some(OlapError::InitError(..))));
        assert!(streams.is_empty());
    }

    #[test]
    fn range_past_end_is_init_error() {
        let err = open(&header(90, 20), 64).err();
        assert!(matches!(err, Some(OlapError::InitError(..))));
    }

    #[test]
    fn small_pool_buffers_are_rejected() {
        assert!(open(&header(0, 10), 32).is_err());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut header = header(0, 10);
        header.streams[0].kind = 42;
        assert!(open(&header, 64).is_err());
    }
}
