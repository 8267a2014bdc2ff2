//! Chunked byte streams.
//!
//! Every stream is a sequence of chunks. A chunk holds at most `stream_buffer_size`
//! uncompressed bytes and is stored behind a [`ChunkHead`]:
//!
//! ```text
//! [u8 kind: 0 raw, 1 compressed][u32 LE payload length][u32 LE crc32 of payload][payload]
//! ```
//!
//! A position within a stream is the byte offset of a chunk head relative to the start of the
//! stream, followed by an offset into that chunk's uncompressed bytes.

use std::fmt::{Display, Formatter};

use olap_error::{OlapResult, olap_bail};

pub use in_stream::*;
pub use out_stream::*;

mod in_stream;
mod out_stream;

/// The role a stream plays for its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum StreamKind {
    /// Bit-packed presence flags of a nullable column.
    Present = 0,
    Data = 1,
    /// Value lengths of a direct string or HLL column, or dictionary entry lengths.
    Length = 2,
    DictionaryData = 3,
    /// Second fixed-width part of a value, or the union sketch of an HLL column.
    Secondary = 4,
    RowIndex = 5,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Present => "PRESENT",
            StreamKind::Data => "DATA",
            StreamKind::Length => "LENGTH",
            StreamKind::DictionaryData => "DICTIONARY_DATA",
            StreamKind::Secondary => "SECONDARY",
            StreamKind::RowIndex => "ROW_INDEX",
        }
    }

    /// Order of the stream within its column's data region.
    fn layout_rank(self) -> u8 {
        match self {
            StreamKind::RowIndex => 0,
            StreamKind::Data => 1,
            StreamKind::Secondary => 2,
            StreamKind::Present => 3,
            StreamKind::Length => 4,
            StreamKind::DictionaryData => 5,
        }
    }
}

impl Display for StreamKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a stream within a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamName {
    pub unique_id: u32,
    pub kind: StreamKind,
}

impl StreamName {
    pub fn new(unique_id: u32, kind: StreamKind) -> Self {
        Self { unique_id, kind }
    }

    /// Sort key of the on-disk layout: all row indexes first, then per column its data
    /// streams in the order `DATA, SECONDARY, PRESENT, LENGTH, DICTIONARY_DATA`.
    pub fn layout_key(&self) -> (bool, u32, u8) {
        (
            self.kind != StreamKind::RowIndex,
            self.unique_id,
            self.kind.layout_rank(),
        )
    }
}

impl PartialOrd for StreamName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StreamName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.layout_key().cmp(&other.layout_key())
    }
}

impl Display for StreamName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.unique_id, self.kind)
    }
}

pub const CHUNK_HEAD_LEN: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkKind {
    Raw = 0,
    Compressed = 1,
}

/// Framing of one stored chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHead {
    pub kind: ChunkKind,
    pub length: u32,
    pub checksum: u32,
}

impl ChunkHead {
    pub fn for_payload(kind: ChunkKind, payload: &[u8]) -> OlapResult<Self> {
        let Ok(length) = u32::try_from(payload.len()) else {
            olap_bail!(EncodeError: "chunk payload of {} bytes exceeds u32", payload.len());
        };
        Ok(Self {
            kind,
            length,
            checksum: crc32fast::hash(payload),
        })
    }

    pub fn to_bytes(self) -> [u8; CHUNK_HEAD_LEN] {
        let mut head = [0u8; CHUNK_HEAD_LEN];
        head[0] = self.kind as u8;
        head[1..5].copy_from_slice(&self.length.to_le_bytes());
        head[5..9].copy_from_slice(&self.checksum.to_le_bytes());
        head
    }

    pub fn parse(bytes: &[u8]) -> OlapResult<Self> {
        let Ok(head) = <[u8; CHUNK_HEAD_LEN]>::try_from(bytes) else {
            olap_bail!(DecodeError: "chunk head must be {} bytes, got {}", CHUNK_HEAD_LEN, bytes.len());
        };
        let kind = match head[0] {
            0 => ChunkKind::Raw,
            1 => ChunkKind::Compressed,
            other => olap_bail!(DecodeError: "unknown chunk kind {}", other),
        };
        Ok(Self {
            kind,
            length: u32::from_le_bytes([head[1], head[2], head[3], head[4]]),
            checksum: u32::from_le_bytes([head[5], head[6], head[7], head[8]]),
        })
    }

    pub fn verify(&self, payload: &[u8]) -> OlapResult<()> {
        let actual = crc32fast::hash(payload);
        if actual != self.checksum {
            olap_bail!(
                DecodeError: "chunk checksum mismatch: stored {:#010x}, computed {:#010x}",
                self.checksum,
                actual
            );
        }
        Ok(())
    }
}
