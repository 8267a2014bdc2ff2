/// A fixed-capacity byte buffer with a read cursor.
///
/// Writers fill it with [`ByteBuffer::put`] until [`ByteBuffer::is_full`]; readers consume it
/// with [`ByteBuffer::get`] from [`ByteBuffer::position`] up to its length.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ByteBuffer {
    data: Vec<u8>,
    capacity: usize,
    position: usize,
}

impl ByteBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            position: 0,
        }
    }

    /// Wrap `data`, reusing its allocation. The capacity is at least `capacity`.
    pub fn from_vec(mut data: Vec<u8>, capacity: usize) -> Self {
        data.clear();
        data.reserve(capacity);
        Self {
            data,
            capacity,
            position: 0,
        }
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.data.len() >= self.capacity
    }

    /// Append as much of `bytes` as fits and return how many bytes were taken.
    pub fn put(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.capacity - self.data.len());
        self.data.extend_from_slice(&bytes[..n]);
        n
    }

    /// The backing vector, for filling the buffer in one go (e.g. by a decompressor).
    pub fn as_mut_vec(&mut self) -> &mut Vec<u8> {
        self.position = 0;
        &mut self.data
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Move the read cursor; positions past the end are clamped to the end.
    pub fn set_position(&mut self, position: usize) {
        self.position = position.min(self.data.len());
    }

    /// Bytes left to read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Copy up to `out.len()` unread bytes into `out` and return how many were copied.
    pub fn get(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.remaining());
        out[..n].copy_from_slice(&self.data[self.position..self.position + n]);
        self.position += n;
        n
    }

    /// Advance the read cursor by up to `n` bytes and return how many were skipped.
    pub fn skip(&mut self, n: usize) -> usize {
        let n = n.min(self.remaining());
        self.position += n;
        n
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.position = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_stops_at_capacity() {
        let mut buffer = ByteBuffer::with_capacity(4);
        assert_eq!(buffer.put(b"abc"), 3);
        assert!(!buffer.is_full());
        assert_eq!(buffer.put(b"def"), 1);
        assert!(buffer.is_full());
        assert_eq!(buffer.as_slice(), b"abcd");
    }

    #[test]
    fn get_and_skip_advance_cursor() {
        let mut buffer = ByteBuffer::with_capacity(8);
        buffer.put(b"01234567");
        let mut out = [0u8; 3];
        assert_eq!(buffer.get(&mut out), 3);
        assert_eq!(&out, b"012");
        assert_eq!(buffer.skip(4), 4);
        assert_eq!(buffer.remaining(), 1);
        assert_eq!(buffer.get(&mut out), 1);
        assert_eq!(out[0], b'7');
        assert_eq!(buffer.skip(10), 0);
    }

    #[test]
    fn reuse_keeps_allocation() {
        let buffer = ByteBuffer::from_vec(vec![1, 2, 3], 16);
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 16);
        assert!(buffer.into_vec().capacity() >= 16);
    }
}
