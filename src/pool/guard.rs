//! RAII guard for pooled buffers
//!
//! Provides automatic return of buffers to the pool when dropped.

use super::BufferPool;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// RAII guard that returns the buffer to the pool on drop
pub struct PooledBuffer {
    buf: Vec<u8>,
    pool: BufferPool,
}

impl PooledBuffer {
    pub(super) fn new(buf: Vec<u8>, pool: BufferPool) -> Self {
        PooledBuffer { buf, pool }
    }
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl AsRef<[u8]> for PooledBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.buf.len())
            .finish()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        self.pool.give_back(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_deref_mut() {
        let pool = BufferPool::new();
        let mut buf = pool.rent(4);
        buf.copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(&buf[..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_guard_debug() {
        let pool = BufferPool::new();
        let buf = pool.rent(3);
        assert_eq!(format!("{:?}", buf), "PooledBuffer { len: 3 }");
    }

    #[test]
    fn test_guard_drop_in_unwind() {
        let pool = BufferPool::new();
        let cloned = pool.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _buf = cloned.rent(8);
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(pool.outstanding(), 0);
    }
}
