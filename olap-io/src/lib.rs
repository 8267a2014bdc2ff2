//! Core traits and implementations for blocking segment IO.
//!
//! A column segment is written sequentially, one stream after another, and read back with
//! positioned reads at the offsets recorded in the segment header. This crate provides the
//! two narrow traits the column engine consumes for that, plus implementations over local
//! files and in-memory buffers.

pub use file::*;
pub use read::*;
pub use write::*;

mod file;
pub mod offset;
mod read;
mod write;
