use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::byte_buffer::ByteBuffer;

/// Default number of idle buffers a pool keeps.
pub const DEFAULT_POOL_RETAINED: usize = 16;

/// Read buffers shared by all in-streams of a segment.
///
/// Streams acquire a buffer whenever they load a chunk and give it back when they move to
/// another chunk or are dropped, so peak memory is bounded by the number of live streams
/// rather than the number of chunks read. Clones share the same buffers.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    buffer_size: usize,
    max_retained: usize,
    idle: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub fn new(buffer_size: usize) -> Self {
        Self::with_max_retained(buffer_size, DEFAULT_POOL_RETAINED)
    }

    pub fn with_max_retained(buffer_size: usize, max_retained: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                buffer_size,
                max_retained,
                idle: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Size of the chunks the pooled buffers are sized for.
    pub fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }

    /// Take an empty buffer, reusing an idle allocation when available.
    pub fn acquire(&self) -> ByteBuffer {
        let reused = self.inner.idle.lock().pop();
        match reused {
            Some(data) => ByteBuffer::from_vec(data, self.inner.buffer_size),
            None => ByteBuffer::with_capacity(self.inner.buffer_size),
        }
    }

    /// Return a buffer to the pool; it is dropped when the pool is already full.
    pub fn release(&self, buffer: ByteBuffer) {
        let mut idle = self.inner.idle.lock();
        if idle.len() < self.inner.max_retained {
            idle.push(buffer.into_vec());
        }
    }

    /// Number of idle buffers currently held.
    pub fn idle_count(&self) -> usize {
        self.inner.idle.lock().len()
    }
}

impl Debug for BufferPool {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("buffer_size", &self.inner.buffer_size)
            .field("max_retained", &self.inner.max_retained)
            .field("idle", &self.idle_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_buffers_are_reused() {
        let pool = BufferPool::with_max_retained(64, 1);
        let mut first = pool.acquire();
        first.put(b"hello");
        let other = pool.clone();
        other.release(first);
        assert_eq!(pool.idle_count(), 1);

        let again = pool.acquire();
        assert!(again.is_empty());
        assert_eq!(again.capacity(), 64);
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn pool_caps_idle_buffers() {
        let pool = BufferPool::with_max_retained(8, 1);
        pool.release(pool.acquire());
        pool.release(pool.acquire());
        pool.release(ByteBuffer::with_capacity(8));
        assert_eq!(pool.idle_count(), 1);
    }
}
