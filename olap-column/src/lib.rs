#![allow(clippy::cast_possible_truncation)]
//! Encode and decode the columns of an OLAP storage segment.
//!
//! A segment holds a group of rows stored column by column. Every column is split into
//! typed streams (`PRESENT`, `DATA`, `LENGTH`, `DICTIONARY_DATA`, `SECONDARY` and
//! `ROW_INDEX`), each a sequence of optionally compressed chunks of at most
//! `stream_buffer_size` uncompressed bytes.
//!
//! # Writing
//!
//! A [`ColumnWriter`] is created per column with [`create_column_writer`], sharing one
//! [`OutStreamFactory`]. Rows are written one [`Datum`] at a time, and
//! `create_row_index_entry` closes an entry of the column's row index every few rows. Once
//! every column is finalized, [`OutStreamFactory::write_to`] lays the streams out in segment
//! order and fills in the [`SegmentHeaderMessage`](proto::SegmentHeaderMessage) that
//! locates them.
//!
//! # Reading
//!
//! [`SegmentStreams::open`] opens the streams a header describes, and
//! [`create_column_reader`] builds a [`ColumnReader`] per column. Readers decode rows into a
//! [`ColumnBatch`], skip rows without decoding them, and seek to the first row of any row
//! index entry using the positions the writer recorded for it.
//!
//! ## Segment layout
//!
//! ```text
//! ┌────────────────────────────┐
//! │   ROW_INDEX streams        │  every column, by unique id
//! ├────────────────────────────┤
//! │   data streams             │  every column, by unique id, then stream kind
//! └────────────────────────────┘
//! ```
//!
//! Each stream is a run of chunks, a 9 byte head (kind, stored length, CRC32 of the stored
//! bytes) followed by the payload.

pub use batch::*;
pub use factory::*;
pub use field::*;
pub use index::*;
pub use options::*;
pub use reader::*;
pub use segment::*;
pub use stats::*;
pub use types::*;
pub use writer::*;

mod batch;
pub mod bit_field;
mod byte_buffer;
pub mod compression;
mod factory;
mod field;
mod index;
mod options;
pub mod pool;
pub mod proto;
mod reader;
mod segment;
mod stats;
pub mod stream;
mod types;
mod writer;
