use std::sync::Arc;

use log::{trace, warn};
use olap_error::{OlapResult, olap_bail};
use olap_io::OlapWrite;

use crate::byte_buffer::ByteBuffer;
use crate::compression::Compressor;
use crate::index::PositionRecorder;
use crate::stream::{CHUNK_HEAD_LEN, ChunkHead, ChunkKind, StreamName};

/// The write side of a stream.
///
/// Bytes accumulate in a chunk buffer of `buffer_size` bytes. A full buffer is framed,
/// compressed when that makes it smaller, and moved to the stream's output. The output stays
/// in memory until the stream factory writes the segment.
#[derive(Debug)]
pub struct OutStream {
    name: StreamName,
    compressor: Option<Arc<dyn Compressor>>,
    current: ByteBuffer,
    output: Vec<u8>,
    chunk_count: usize,
    uncompressed_length: u64,
    suppressed: bool,
}

impl OutStream {
    pub fn new(
        name: StreamName,
        buffer_size: usize,
        compressor: Option<Arc<dyn Compressor>>,
    ) -> OlapResult<Self> {
        if buffer_size == 0 {
            olap_bail!(InitError: "stream {} needs a non-zero buffer size", name);
        }
        Ok(Self {
            name,
            compressor,
            current: ByteBuffer::with_capacity(buffer_size),
            output: Vec::new(),
            chunk_count: 0,
            uncompressed_length: 0,
            suppressed: false,
        })
    }

    pub fn name(&self) -> StreamName {
        self.name
    }

    pub fn buffer_size(&self) -> usize {
        self.current.capacity()
    }

    pub fn write(&mut self, mut bytes: &[u8]) -> OlapResult<()> {
        while !bytes.is_empty() {
            let n = self.current.put(bytes);
            bytes = &bytes[n..];
            self.uncompressed_length += n as u64;
            if self.current.is_full() {
                self.flush_chunk()?;
            }
        }
        Ok(())
    }

    #[inline]
    pub fn write_byte(&mut self, byte: u8) -> OlapResult<()> {
        self.write(&[byte])
    }

    /// Record the current position: the offset of the chunk being filled and the number of
    /// bytes already in it.
    pub fn record_position(&self, recorder: &mut impl PositionRecorder) {
        recorder.add_position(self.output.len() as u64);
        recorder.add_position(self.current.len() as u64);
    }

    /// Move the partially filled chunk, if any, to the output.
    pub fn flush(&mut self) -> OlapResult<()> {
        if !self.current.is_empty() {
            self.flush_chunk()?;
        }
        Ok(())
    }

    fn flush_chunk(&mut self) -> OlapResult<()> {
        let raw = self.current.as_slice();
        let mut compressed = Vec::new();
        if let Some(compressor) = &self.compressor {
            compressor.compress(raw, &mut compressed)?;
        }

        let (kind, payload) = if !compressed.is_empty() && compressed.len() < raw.len() {
            (ChunkKind::Compressed, compressed.as_slice())
        } else {
            if self.compressor.is_some() {
                trace!(
                    "stream {}: compressed chunk not smaller than {} raw bytes, storing raw",
                    self.name,
                    raw.len()
                );
            }
            (ChunkKind::Raw, raw)
        };

        let head = ChunkHead::for_payload(kind, payload)?;
        self.output.reserve(CHUNK_HEAD_LEN + payload.len());
        self.output.extend_from_slice(&head.to_bytes());
        self.output.extend_from_slice(payload);
        self.chunk_count += 1;
        self.current.clear();
        Ok(())
    }

    /// Mark the stream as carrying no information; suppressed streams are not persisted.
    pub fn suppress(&mut self) {
        self.suppressed = true;
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    /// Stored length in bytes, chunk heads included. Only complete after [`OutStream::flush`].
    pub fn stream_length(&self) -> u64 {
        self.output.len() as u64
    }

    pub fn uncompressed_length(&self) -> u64 {
        self.uncompressed_length
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// The stored bytes of all flushed chunks.
    pub fn output(&self) -> &[u8] {
        if self.suppressed {
            warn!("reading output of suppressed stream {}", self.name);
        }
        &self.output
    }

    /// Append the stored chunks to `writer`.
    pub fn write_to<W: OlapWrite>(&self, writer: &mut W) -> OlapResult<()> {
        if !self.current.is_empty() {
            olap_bail!(FinalizeError: "stream {} has unflushed bytes", self.name);
        }
        writer.write_all(self.output())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::Lz4Compressor;
    use crate::stream::StreamKind;

    fn stream(buffer_size: usize, compress: bool) -> OutStream {
        let compressor: Option<Arc<dyn Compressor>> = if compress {
            Some(Arc::new(Lz4Compressor))
        } else {
            None
        };
        OutStream::new(StreamName::new(0, StreamKind::Data), buffer_size, compressor).unwrap()
    }

    #[test]
    fn full_chunks_are_flushed_eagerly() {
        let mut out = stream(4, false);
        out.write(b"abcdefghij").unwrap();
        assert_eq!(out.chunk_count(), 2);

        let mut positions = Vec::new();
        out.record_position(&mut positions);
        assert_eq!(positions, vec![2 * (CHUNK_HEAD_LEN as u64 + 4), 2]);

        out.flush().unwrap();
        assert_eq!(out.chunk_count(), 3);
        assert_eq!(out.uncompressed_length(), 10);
        assert_eq!(out.stream_length(), 3 * CHUNK_HEAD_LEN as u64 + 10);
    }

    #[test]
    fn incompressible_chunks_are_stored_raw() {
        let mut out = stream(16, true);
        out.write(&[1, 9, 3, 200, 5, 77]).unwrap();
        out.flush().unwrap();
        let head = ChunkHead::parse(&out.output()[..CHUNK_HEAD_LEN]).unwrap();
        assert_eq!(head.kind, ChunkKind::Raw);
        assert_eq!(head.length, 6);
    }

    #[test]
    fn compressible_chunks_are_compressed() {
        let mut out = stream(1024, true);
        out.write(&[42u8; 1024]).unwrap();
        let head = ChunkHead::parse(&out.output()[..CHUNK_HEAD_LEN]).unwrap();
        assert_eq!(head.kind, ChunkKind::Compressed);
        assert!(head.length < 1024);
    }

    #[test]
    fn zero_buffer_size_is_init_error() {
        let err = OutStream::new(StreamName::new(0, StreamKind::Data), 0, None).unwrap_err();
        assert!(matches!(err, olap_error::OlapError::InitError(..)));
    }

    #[test]
    fn write_to_requires_flush() {
        let mut out = stream(8, false);
        out.write(b"abc").unwrap();
        let mut sink = Vec::new();
        assert!(out.write_to(&mut sink).is_err());
        out.flush().unwrap();
        out.write_to(&mut sink).unwrap();
        assert_eq!(sink.len(), CHUNK_HEAD_LEN + 3);
    }
}
