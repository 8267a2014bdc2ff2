use std::io;
use std::sync::Arc;

use log::trace;
use olap_error::{OlapResult, olap_bail};
use olap_io::ReadAt;
use olap_metrics::StreamMetrics;

use crate::byte_buffer::ByteBuffer;
use crate::compression::Compressor;
use crate::index::PositionProvider;
use crate::pool::BufferPool;
use crate::stream::{CHUNK_HEAD_LEN, ChunkHead, ChunkKind, StreamName};

/// Location of a stream within a segment, as recorded in the segment header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRange {
    pub offset: u64,
    /// Stored bytes, chunk heads included.
    pub length: u64,
    pub uncompressed_length: u64,
}

/// The read side of a stream.
///
/// Chunks are loaded lazily into a buffer borrowed from the segment's [`BufferPool`],
/// verified against their checksum and decompressed when needed.
pub struct InStream<R> {
    name: StreamName,
    read_at: R,
    range: StreamRange,
    compressor: Option<Arc<dyn Compressor>>,
    pool: BufferPool,
    metrics: StreamMetrics,
    buffer: Option<ByteBuffer>,
    /// Offset of the loaded chunk's head relative to the stream start.
    current_chunk: Option<u64>,
    /// Offset of the next chunk head relative to the stream start.
    next_chunk: u64,
}

impl<R: ReadAt> InStream<R> {
    pub fn new(
        name: StreamName,
        read_at: R,
        range: StreamRange,
        compressor: Option<Arc<dyn Compressor>>,
        pool: BufferPool,
        metrics: StreamMetrics,
    ) -> Self {
        Self {
            name,
            read_at,
            range,
            compressor,
            pool,
            metrics,
            buffer: None,
            current_chunk: None,
            next_chunk: 0,
        }
    }

    pub fn name(&self) -> StreamName {
        self.name
    }

    pub fn range(&self) -> StreamRange {
        self.range
    }

    /// Fill `out` completely, crossing chunk boundaries as needed.
    pub fn read(&mut self, mut out: &mut [u8]) -> OlapResult<()> {
        while !out.is_empty() {
            let buffer = self.readable_buffer()?;
            let n = buffer.get(out);
            out = &mut out[n..];
        }
        Ok(())
    }

    pub fn read_byte(&mut self) -> OlapResult<u8> {
        let mut byte = [0u8; 1];
        self.read(&mut byte)?;
        Ok(byte[0])
    }

    /// Read `len` bytes into a new vector.
    pub fn read_vec(&mut self, len: usize) -> OlapResult<Vec<u8>> {
        let mut out = vec![0u8; len];
        self.read(&mut out)?;
        Ok(out)
    }

    /// Read everything from the current position to the end of the stream.
    pub fn read_to_end(&mut self) -> OlapResult<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            if self.buffer.as_ref().is_none_or(|b| b.remaining() == 0)
                && self.next_chunk >= self.range.length
            {
                return Ok(out);
            }
            let buffer = self.readable_buffer()?;
            let start = buffer.position();
            out.extend_from_slice(&buffer.as_slice()[start..]);
            buffer.skip(buffer.remaining());
        }
    }

    /// Advance the cursor by `n` bytes without copying them.
    pub fn skip(&mut self, mut n: u64) -> OlapResult<()> {
        while n > 0 {
            let buffer = self.readable_buffer()?;
            let step = usize::try_from(n).unwrap_or(usize::MAX);
            n -= buffer.skip(step) as u64;
        }
        Ok(())
    }

    /// Jump to the position recorded by the writer: a chunk offset and an offset within
    /// that chunk's uncompressed bytes.
    pub fn seek(&mut self, provider: &mut PositionProvider<'_>) -> OlapResult<()> {
        let chunk = provider.next_position()?;
        let offset = provider.next_position()?;
        trace!("stream {}: seek to chunk {} offset {}", self.name, chunk, offset);

        if chunk == self.range.length && offset == 0 {
            self.release_buffer();
            self.next_chunk = chunk;
            return Ok(());
        }
        if self.current_chunk != Some(chunk) {
            self.load_chunk(chunk)?;
        }
        let Ok(offset) = usize::try_from(offset) else {
            olap_bail!(DecodeError: "position offset {} does not fit in memory", offset);
        };
        let name = self.name;
        let buffer = self.loaded_buffer_mut()?;
        if offset > buffer.len() {
            olap_bail!(
                DecodeError: "stream {}: offset {} past end of {} byte chunk",
                name,
                offset,
                buffer.len()
            );
        }
        buffer.set_position(offset);
        Ok(())
    }

    /// The current buffer with at least one unread byte, loading the next chunk if needed.
    fn readable_buffer(&mut self) -> OlapResult<&mut ByteBuffer> {
        if self.buffer.as_ref().is_none_or(|b| b.remaining() == 0) {
            self.load_chunk(self.next_chunk)?;
        }
        let name = self.name;
        let buffer = self.loaded_buffer_mut()?;
        if buffer.remaining() == 0 {
            olap_bail!(DecodeError: "stream {} contains an empty chunk", name);
        }
        Ok(buffer)
    }

    fn loaded_buffer_mut(&mut self) -> OlapResult<&mut ByteBuffer> {
        match self.buffer.as_mut() {
            Some(buffer) => Ok(buffer),
            None => olap_bail!(DecodeError: "stream {} has no chunk loaded", self.name),
        }
    }

    fn load_chunk(&mut self, chunk: u64) -> OlapResult<()> {
        let head_end = chunk + CHUNK_HEAD_LEN as u64;
        if head_end > self.range.length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "stream {}: chunk at {} lies past the stream length {}",
                    self.name, chunk, self.range.length
                ),
            )
            .into());
        }

        let start = self.range.offset + chunk;
        let head_bytes = self
            .read_at
            .read_byte_range(start..start + CHUNK_HEAD_LEN as u64)?;
        let head = ChunkHead::parse(&head_bytes)?;
        let payload_end = head_end + u64::from(head.length);
        if payload_end > self.range.length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "stream {}: chunk payload ends at {} past the stream length {}",
                    self.name, payload_end, self.range.length
                ),
            )
            .into());
        }
        let payload = self.read_at.read_byte_range(
            self.range.offset + head_end..self.range.offset + payload_end,
        )?;
        head.verify(&payload)?;

        self.current_chunk = None;
        let mut buffer = self.buffer.take().unwrap_or_else(|| self.pool.acquire());
        buffer.clear();
        match head.kind {
            ChunkKind::Raw => {
                if payload.len() > self.pool.buffer_size() {
                    olap_bail!(
                        DecodeError: "stream {}: raw chunk of {} bytes exceeds buffer size {}",
                        self.name,
                        payload.len(),
                        self.pool.buffer_size()
                    );
                }
                buffer.put(&payload);
            }
            ChunkKind::Compressed => {
                let Some(compressor) = &self.compressor else {
                    olap_bail!(
                        DecodeError: "stream {} holds a compressed chunk but the segment is uncompressed",
                        self.name
                    );
                };
                let _timer = self.metrics.decompress.time();
                compressor.decompress(&payload, buffer.as_mut_vec(), self.pool.buffer_size())?;
            }
        }

        self.metrics
            .compressed_bytes
            .add((CHUNK_HEAD_LEN + payload.len()) as i64);
        self.metrics.uncompressed_bytes.add(buffer.len() as i64);
        self.metrics.chunks_loaded.inc();
        trace!(
            "stream {}: loaded chunk at {} ({} stored, {} uncompressed bytes)",
            self.name,
            chunk,
            payload.len(),
            buffer.len()
        );

        self.buffer = Some(buffer);
        self.current_chunk = Some(chunk);
        self.next_chunk = payload_end;
        Ok(())
    }

    fn release_buffer(&mut self) {
        self.current_chunk = None;
        if let Some(buffer) = self.buffer.take() {
            self.pool.release(buffer);
        }
    }
}

impl<R> Drop for InStream<R> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.pool.release(buffer);
        }
    }
}
