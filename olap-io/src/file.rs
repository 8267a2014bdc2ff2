use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::ops::{Deref, Range};
use std::path::Path;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use log::debug;

use crate::{OlapWrite, ReadAt};

/// A cheaply cloneable, read-only file supporting positioned reads.
///
/// The file descriptor is closed once the last clone is dropped.
#[derive(Debug, Clone)]
pub struct FileReadAt(Arc<File>);

impl FileReadAt {
    /// Open a file on the current file system.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let f = File::open(path)?;
        debug!("opened {} for positioned reads", path.display());
        Ok(Self(Arc::new(f)))
    }
}

impl From<File> for FileReadAt {
    fn from(value: File) -> Self {
        Self(Arc::new(value))
    }
}

// Implement deref coercion for non-mut `File` methods on `FileReadAt`.
impl Deref for FileReadAt {
    type Target = File;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ReadAt for FileReadAt {
    fn read_byte_range(&self, range: Range<u64>) -> io::Result<Bytes> {
        let len = usize::try_from(range.end.saturating_sub(range.start))
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "read too large"))?;
        let mut buffer = BytesMut::zeroed(len);
        read_exact_at(&self.0, &mut buffer, range.start)?;
        Ok(buffer.freeze())
    }

    fn size(&self) -> io::Result<u64> {
        self.0.metadata().map(|m| m.len())
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;

    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;

    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ));
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// A buffered, append-only file sink tracking its write position.
pub struct FileWriter {
    inner: BufWriter<File>,
    position: u64,
}

impl FileWriter {
    /// Create a new file, failing if it already exists.
    pub fn create_new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().write(true).create_new(true).open(path)?;
        debug!("created segment file {}", path.display());
        Ok(Self {
            inner: BufWriter::new(file),
            position: 0,
        })
    }

    /// Flush buffered bytes and sync them to disk, returning the underlying file.
    pub fn close(mut self) -> io::Result<File> {
        self.inner.flush()?;
        let file = self.inner.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(file)
    }
}

impl OlapWrite for FileWriter {
    fn write_all(&mut self, buffer: &[u8]) -> io::Result<()> {
        self.inner.write_all(buffer)?;
        self.position += buffer.len() as u64;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment");

        let mut writer = FileWriter::create_new(&path).unwrap();
        writer.write_all(b"hello ").unwrap();
        writer.write_all(b"world").unwrap();
        assert_eq!(writer.position(), 11);
        writer.close().unwrap();

        let read = FileReadAt::open(&path).unwrap();
        assert_eq!(read.size().unwrap(), 11);
        assert_eq!(read.read_byte_range(6..11).unwrap().as_ref(), b"world");
        assert!(read.read_byte_range(6..20).is_err());
    }

    #[test]
    fn create_new_refuses_existing() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(FileWriter::create_new(file.path()).is_err());
    }
}
