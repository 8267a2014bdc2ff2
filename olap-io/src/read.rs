use std::io;
use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use olap_error::olap_err;

/// A trait for types that support blocking positional reads.
///
/// Readers must be cheaply cloneable: every stream of a segment holds its own handle to the
/// same underlying file.
pub trait ReadAt: Clone {
    /// Read exactly the bytes in `range`.
    ///
    /// If the reader does not have the requested number of bytes, the call fails with
    /// [`UnexpectedEof`][std::io::ErrorKind::UnexpectedEof].
    fn read_byte_range(&self, range: Range<u64>) -> io::Result<Bytes>;

    /// The number of bytes of data readable.
    fn size(&self) -> io::Result<u64>;
}

impl<T: ReadAt> ReadAt for Arc<T> {
    fn read_byte_range(&self, range: Range<u64>) -> io::Result<Bytes> {
        T::read_byte_range(self, range)
    }

    fn size(&self) -> io::Result<u64> {
        T::size(self)
    }
}

impl ReadAt for Bytes {
    fn read_byte_range(&self, range: Range<u64>) -> io::Result<Bytes> {
        let start = usize::try_from(range.start)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "start too big for usize"))?;
        let end = usize::try_from(range.end)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "end too big for usize"))?;
        if start > end || end > self.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                olap_err!("read {}..{} past end of {} byte buffer", start, end, self.len()),
            ));
        }
        Ok(self.slice(start..end))
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_read_in_bounds() {
        let data = Bytes::from_static(b"0123456789");
        assert_eq!(data.read_byte_range(2..5).unwrap().as_ref(), b"234");
        assert_eq!(data.size().unwrap(), 10);
    }

    #[test]
    fn bytes_read_past_end() {
        let data = Bytes::from_static(b"0123");
        let err = data.read_byte_range(2..9).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
