use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;
use olap_error::{OlapResult, olap_bail};
use olap_io::OlapWrite;
use rustc_hash::FxHashSet;

use crate::compression::Compressor;
use crate::options::WriterOptions;
use crate::proto::{CompressionKind, SegmentHeaderMessage, StreamInfoMessage};
use crate::stream::{OutStream, StreamKind, StreamName};

/// Hands out the out-streams of a segment and writes them once every column is finalized.
///
/// Each `(column, kind)` pair can be created once. Column writers own their streams while
/// rows are written and hand them back with [`OutStreamFactory::adopt`] when they finalize;
/// the factory then owns every stream of the segment until it is dropped.
#[derive(Debug)]
pub struct OutStreamFactory {
    buffer_size: usize,
    compression: CompressionKind,
    compressor: Option<Arc<dyn Compressor>>,
    created: FxHashSet<StreamName>,
    streams: BTreeMap<StreamName, OutStream>,
}

impl OutStreamFactory {
    pub fn new(options: &WriterOptions) -> OlapResult<Self> {
        if options.stream_buffer_size == 0 || u32::try_from(options.stream_buffer_size).is_err() {
            olap_bail!(
                InitError: "stream buffer size {} must be positive and fit in u32",
                options.stream_buffer_size
            );
        }
        Ok(Self {
            buffer_size: options.stream_buffer_size,
            compression: options.compression,
            compressor: options.compression.compressor(),
            created: FxHashSet::default(),
            streams: BTreeMap::new(),
        })
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn compression(&self) -> CompressionKind {
        self.compression
    }

    pub fn create_stream(&mut self, unique_id: u32, kind: StreamKind) -> OlapResult<OutStream> {
        let name = StreamName::new(unique_id, kind);
        if !self.created.insert(name) {
            olap_bail!(InitError: "stream {} was already created", name);
        }
        OutStream::new(name, self.buffer_size, self.compressor.clone())
    }

    /// Take back a finished stream. It must be flushed and come from this factory.
    pub fn adopt(&mut self, stream: OutStream) -> OlapResult<()> {
        let name = stream.name();
        if !self.created.contains(&name) {
            olap_bail!(FinalizeError: "stream {} was not created by this factory", name);
        }
        if self.streams.contains_key(&name) {
            olap_bail!(FinalizeError: "stream {} was adopted twice", name);
        }
        self.streams.insert(name, stream);
        Ok(())
    }

    pub fn stream(&self, unique_id: u32, kind: StreamKind) -> Option<&OutStream> {
        self.streams.get(&StreamName::new(unique_id, kind))
    }

    /// Adopted streams in on-disk order.
    pub fn streams(&self) -> impl Iterator<Item = &OutStream> {
        self.streams.values()
    }

    /// Write every non-suppressed stream to `writer` and complete `header`.
    ///
    /// Each column's finalize must already have added its column header. Stream offsets are
    /// recorded relative to the start of `writer`.
    pub fn write_to<W: OlapWrite>(
        &self,
        mut writer: W,
        header: &mut SegmentHeaderMessage,
    ) -> OlapResult<()> {
        if let Some(missing) = self.created.iter().find(|n| !self.streams.contains_key(*n)) {
            olap_bail!(FinalizeError: "stream {} was never finalized", missing);
        }
        let mut row_counts = header.columns.iter().map(|c| (c.unique_id, c.row_count));
        if let Some((_, rows)) = row_counts.next() {
            if let Some((id, other)) = row_counts.find(|(_, r)| *r != rows) {
                olap_bail!(
                    FinalizeError: "column {} has {} rows, expected {}",
                    id,
                    other,
                    rows
                );
            }
            header.row_count = rows;
        }
        header.compression = self.compression as i32;
        header.stream_buffer_size = self.buffer_size as u32;

        for stream in self.streams.values() {
            let name = stream.name();
            if stream.is_suppressed() {
                debug!("stream {name} suppressed, not written");
                continue;
            }
            let offset = writer.position();
            stream.write_to(&mut writer)?;
            debug!(
                "stream {name} written at {offset}: {} bytes in {} chunks, {} uncompressed",
                stream.stream_length(),
                stream.chunk_count(),
                stream.uncompressed_length()
            );
            header.streams.push(StreamInfoMessage {
                column_unique_id: name.unique_id,
                kind: name.kind as i32,
                offset,
                length: stream.stream_length(),
                uncompressed_length: stream.uncompressed_length(),
            });
        }
        writer.flush()?;
        debug!(
            "segment header complete: {} rows, {} columns, {} streams",
            header.row_count,
            header.columns.len(),
            header.streams.len()
        );
        Ok(())
    }
}
