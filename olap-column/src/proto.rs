//! Protobuf messages persisted alongside the column streams of a segment.
//!
//! The segment header describes where every stream lives in the segment and how each column
//! was encoded. Row indexes are stored in their column's `ROW_INDEX` stream.

use serde::{Deserialize, Serialize};

use crate::stream::StreamKind;

/// Block compression applied to stream chunks.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    prost::Enumeration,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum CompressionKind {
    None = 0,
    Lz4 = 1,
}

/// How a column's values are laid out across its streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ColumnEncodingKind {
    Direct = 0,
    Dictionary = 1,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct StatisticsMessage {
    #[prost(uint64, tag = "1")]
    pub null_count: u64,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub min: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub max: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct RowIndexEntryMessage {
    #[prost(uint64, repeated, tag = "1")]
    pub positions: Vec<u64>,
    #[prost(message, optional, tag = "2")]
    pub statistics: Option<StatisticsMessage>,
    #[prost(uint64, tag = "3")]
    pub first_row: u64,
    #[prost(uint64, tag = "4")]
    pub row_count: u64,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct RowIndexMessage {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<RowIndexEntryMessage>,
}

/// Directory entry of one stream within the segment.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct StreamInfoMessage {
    #[prost(uint32, tag = "1")]
    pub column_unique_id: u32,
    #[prost(enumeration = "StreamKind", tag = "2")]
    pub kind: i32,
    /// Offset of the stream's first chunk head within the segment.
    #[prost(uint64, tag = "3")]
    pub offset: u64,
    /// Stored bytes, chunk heads included.
    #[prost(uint64, tag = "4")]
    pub length: u64,
    #[prost(uint64, tag = "5")]
    pub uncompressed_length: u64,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct ColumnHeaderMessage {
    #[prost(uint32, tag = "1")]
    pub unique_id: u32,
    #[prost(enumeration = "ColumnEncodingKind", tag = "2")]
    pub encoding: i32,
    #[prost(uint32, tag = "3")]
    pub dictionary_size: u32,
    #[prost(uint64, tag = "4")]
    pub row_count: u64,
    /// Statistics over every row of the column.
    #[prost(message, optional, tag = "5")]
    pub statistics: Option<StatisticsMessage>,
    #[prost(uint32, tag = "6")]
    pub index_entry_count: u32,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct SegmentHeaderMessage {
    #[prost(uint64, tag = "1")]
    pub row_count: u64,
    #[prost(enumeration = "CompressionKind", tag = "2")]
    pub compression: i32,
    #[prost(uint32, tag = "3")]
    pub stream_buffer_size: u32,
    #[prost(message, repeated, tag = "4")]
    pub columns: Vec<ColumnHeaderMessage>,
    #[prost(message, repeated, tag = "5")]
    pub streams: Vec<StreamInfoMessage>,
}

impl SegmentHeaderMessage {
    pub fn column(&self, unique_id: u32) -> Option<&ColumnHeaderMessage> {
        self.columns.iter().find(|c| c.unique_id == unique_id)
    }

    /// Directory entries of one column.
    pub fn column_streams(&self, unique_id: u32) -> impl Iterator<Item = &StreamInfoMessage> {
        self.streams
            .iter()
            .filter(move |s| s.column_unique_id == unique_id)
    }
}
