use std::io;

/// A sequential, append-only sink that knows how many bytes it has accepted.
///
/// The position is what the stream factory records as a stream's offset in the segment.
pub trait OlapWrite {
    /// Append the whole buffer.
    fn write_all(&mut self, buffer: &[u8]) -> io::Result<()>;

    /// The number of bytes written so far, i.e. the offset of the next write.
    fn position(&self) -> u64;

    /// Flush any buffered bytes to the underlying storage.
    fn flush(&mut self) -> io::Result<()>;
}

impl OlapWrite for Vec<u8> {
    fn write_all(&mut self, buffer: &[u8]) -> io::Result<()> {
        self.extend_from_slice(buffer);
        Ok(())
    }

    fn position(&self) -> u64 {
        self.len() as u64
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<W: OlapWrite + ?Sized> OlapWrite for &mut W {
    fn write_all(&mut self, buffer: &[u8]) -> io::Result<()> {
        (**self).write_all(buffer)
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}
