//! Process-wide pool of byte buffers used by the interpolation engine.
//!
//! Buffers are handed out as [`PooledBuf`] guards which return the buffer on
//! drop, so every exit path (including `?` propagation) gives it back. Buffers
//! which grew beyond [`MAX_POOLED_CAPACITY`] are dropped instead of pooled.

use bytes::BytesMut;
use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

/// Buffers with a larger capacity are released to the allocator.
pub const MAX_POOLED_CAPACITY: usize = 64 * 1024;

/// Maximum number of idle buffers kept.
pub const MAX_POOLED_BUFFERS: usize = 32;

const INITIAL_CAPACITY: usize = 512;

static POOL: Mutex<Vec<BytesMut>> = Mutex::new(Vec::new());

/// A buffer borrowed from the pool.
pub struct PooledBuf {
    buf: BytesMut,
}

/// Take a cleared buffer from the pool or allocate a new one.
pub fn get() -> PooledBuf {
    let buf = POOL
        .lock()
        .ok()
        .and_then(|mut pool| pool.pop())
        .unwrap_or_else(|| BytesMut::with_capacity(INITIAL_CAPACITY));
    PooledBuf { buf }
}

/// Number of idle buffers currently pooled.
pub fn idle() -> usize {
    POOL.lock().map(|pool| pool.len()).unwrap_or(0)
}

impl PooledBuf {
    /// Copy the contents out as a `String`.
    ///
    /// The engine only ever writes UTF-8 into pooled buffers; invalid bytes are
    /// replaced rather than trusted.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.buf).into_owned()
    }
}

impl Deref for PooledBuf {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        &self.buf
    }
}

impl DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        if self.buf.capacity() > MAX_POOLED_CAPACITY {
            return;
        }
        let mut buf = std::mem::take(&mut self.buf);
        buf.clear();
        if let Ok(mut pool) = POOL.lock() {
            if pool.len() < MAX_POOLED_BUFFERS {
                pool.push(buf);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    #[test]
    fn test_buffer_is_cleared_on_return() {
        {
            let mut buf = get();
            buf.put_slice(b"SELECT 1");
            assert_eq!(&buf[..], b"SELECT 1");
        }
        let buf = get();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_oversized_buffer_is_not_pooled() {
        let mut buf = get();
        buf.reserve(MAX_POOLED_CAPACITY * 2);
        let cap = buf.capacity();
        drop(buf);
        assert!(cap > MAX_POOLED_CAPACITY);
        let again = get();
        assert!(again.capacity() <= MAX_POOLED_CAPACITY);
    }
}
