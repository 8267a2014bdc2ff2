use std::io;
use std::ops::Range;

use crate::ReadAt;

/// An adapter that offsets all reads by a fixed amount.
///
/// Used when a segment is embedded in a larger file, e.g. behind a file header.
pub struct OffsetReadAt<R> {
    read: R,
    offset: u64,
}

impl<R> Clone for OffsetReadAt<R>
where
    R: Clone,
{
    fn clone(&self) -> Self {
        Self {
            read: self.read.clone(),
            offset: self.offset,
        }
    }
}

impl<R: ReadAt> OffsetReadAt<R> {
    pub fn new(read: R, offset: u64) -> Self {
        Self { read, offset }
    }
}

impl<R: ReadAt> ReadAt for OffsetReadAt<R> {
    fn read_byte_range(&self, range: Range<u64>) -> io::Result<bytes::Bytes> {
        self.read
            .read_byte_range(range.start + self.offset..range.end + self.offset)
    }

    fn size(&self) -> io::Result<u64> {
        let offset = self.offset;
        self.read.size().map(|len| len.saturating_sub(offset))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn reads_are_shifted() {
        let read = OffsetReadAt::new(Bytes::from_static(b"headerpayload"), 6);
        assert_eq!(read.read_byte_range(0..7).unwrap().as_ref(), b"payload");
        assert_eq!(read.size().unwrap(), 7);
    }
}
