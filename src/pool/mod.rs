//! Shared byte-buffer pool
//!
//! Every component that needs scratch space rents it from a [`BufferPool`]
//! and receives a [`PooledBuffer`] guard. Dropping the guard hands the
//! allocation back, so buffers are returned on every exit path including
//! errors and cancellation.

mod guard;

pub use guard::PooledBuffer;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Default number of idle buffers retained for reuse
pub const DEFAULT_MAX_RETAINED: usize = 64;

/// Thread-safe, cloneable handle to a pool of byte buffers
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    idle: Mutex<Vec<Vec<u8>>>,
    outstanding: AtomicUsize,
    max_retained: usize,
}

impl BufferPool {
    /// Create a pool retaining at most [`DEFAULT_MAX_RETAINED`] idle buffers
    pub fn new() -> Self {
        Self::with_max_retained(DEFAULT_MAX_RETAINED)
    }

    /// Create a pool retaining at most `max_retained` idle buffers
    pub fn with_max_retained(max_retained: usize) -> Self {
        BufferPool {
            inner: Arc::new(PoolInner {
                idle: Mutex::new(Vec::new()),
                outstanding: AtomicUsize::new(0),
                max_retained,
            }),
        }
    }

    /// Rent a buffer of exactly `min_len` bytes
    ///
    /// Contents are unspecified; a reused buffer keeps whatever it held.
    pub fn rent(&self, min_len: usize) -> PooledBuffer {
        let reused = {
            let mut idle = self.lock_idle();
            idle.iter()
                .position(|buf| buf.capacity() >= min_len)
                .map(|index| idle.swap_remove(index))
        };

        let mut buf = reused.unwrap_or_else(|| Vec::with_capacity(min_len));
        buf.resize(min_len, 0);

        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);
        PooledBuffer::new(buf, self.clone())
    }

    /// Number of rented buffers not yet returned
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Number of idle buffers available for reuse
    pub fn idle(&self) -> usize {
        self.lock_idle().len()
    }

    pub(crate) fn give_back(&self, buf: Vec<u8>) {
        self.inner.outstanding.fetch_sub(1, Ordering::AcqRel);

        let mut idle = self.lock_idle();
        if idle.len() < self.inner.max_retained {
            idle.push(buf);
        }
    }

    fn lock_idle(&self) -> std::sync::MutexGuard<'_, Vec<Vec<u8>>> {
        // A poisoned free list is still a valid free list.
        self.inner
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("outstanding", &self.outstanding())
            .field("max_retained", &self.inner.max_retained)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rent_exact_length() {
        let pool = BufferPool::new();
        let buf = pool.rent(4096);
        assert_eq!(buf.len(), 4096);
        assert_eq!(pool.outstanding(), 1);
    }

    #[test]
    fn test_drop_returns_buffer() {
        let pool = BufferPool::new();
        {
            let _a = pool.rent(16);
            let _b = pool.rent(32);
            assert_eq!(pool.outstanding(), 2);
        }
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn test_reuses_large_enough_buffer() {
        let pool = BufferPool::new();
        drop(pool.rent(1024));
        assert_eq!(pool.idle(), 1);

        let buf = pool.rent(512);
        assert_eq!(buf.len(), 512);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_max_retained() {
        let pool = BufferPool::with_max_retained(1);
        let a = pool.rent(8);
        let b = pool.rent(8);
        drop(a);
        drop(b);
        assert_eq!(pool.idle(), 1);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_clones_share_state() {
        let pool = BufferPool::new();
        let other = pool.clone();
        let buf = other.rent(8);
        assert_eq!(pool.outstanding(), 1);
        drop(buf);
        assert_eq!(pool.outstanding(), 0);
    }
}
