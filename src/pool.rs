//! Pool of reusable per-record byte buffers.
//!
//! Entries are boxed so that storing one only moves a pointer. A buffer
//! handed out by [`BufferPool::acquire`] always has zero length; bytes a
//! previous user wrote beyond that length are never observable through
//! the `Vec` API.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

/// Capacity of freshly allocated buffers.
pub const BASE_BUFFER_CAPACITY: usize = 512;

/// Number of idle buffers the global pool keeps around.
pub const GLOBAL_POOL_SLOTS: usize = 256;

pub type PoolBuffer = Box<Vec<u8>>;

/// Lock-free bounded pool of byte buffers.
pub struct BufferPool {
    queue: ArrayQueue<PoolBuffer>,
    base_capacity: usize,
    metrics: BufferPoolMetrics,
}

/// Counters describing pool usage.
#[derive(Debug, Default)]
pub struct BufferPoolMetrics {
    /// Buffer reused from the pool.
    pub hits: AtomicU64,
    /// Pool empty, new buffer allocated.
    pub misses: AtomicU64,
    /// Buffer accepted back into the pool.
    pub returns: AtomicU64,
    /// Buffer discarded on release (too large, or pool full).
    pub drops: AtomicU64,
}

impl BufferPoolMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            returns: self.returns.load(Ordering::Relaxed),
            drops: self.drops.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`BufferPoolMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub returns: u64,
    pub drops: u64,
}

impl MetricsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            1.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl BufferPool {
    /// Create an empty pool holding at most `slots` idle buffers, each
    /// allocated with `base_capacity` bytes.
    pub fn new(slots: usize, base_capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(slots.max(1)),
            base_capacity: base_capacity.max(1),
            metrics: BufferPoolMetrics::default(),
        }
    }

    /// Process-wide pool shared by every handler.
    pub fn global() -> &'static BufferPool {
        static GLOBAL: OnceLock<BufferPool> = OnceLock::new();
        GLOBAL.get_or_init(|| BufferPool::new(GLOBAL_POOL_SLOTS, BASE_BUFFER_CAPACITY))
    }

    /// Take a zero-length buffer with positive capacity.
    #[inline]
    pub fn acquire(&self) -> PoolBuffer {
        match self.queue.pop() {
            Some(mut buf) => {
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                buf.clear();
                buf
            }
            None => {
                self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                Box::new(Vec::with_capacity(self.base_capacity))
            }
        }
    }

    /// Give a buffer back.
    ///
    /// Buffers whose capacity exceeds `max_size` are dropped so that one
    /// huge record does not pin its memory for the life of the process.
    #[inline]
    pub fn release(&self, mut buf: PoolBuffer, max_size: usize) {
        if buf.capacity() > max_size {
            self.metrics.drops.fetch_add(1, Ordering::Relaxed);
            return;
        }

        buf.clear();
        match self.queue.push(buf) {
            Ok(()) => {
                self.metrics.returns.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.metrics.drops.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Number of idle buffers.
    pub fn available(&self) -> usize {
        self.queue.len()
    }

    pub fn metrics(&self) -> &BufferPoolMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn acquire_from_empty_pool_allocates() {
        let pool = BufferPool::new(4, 512);
        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 512);
        assert_eq!(pool.metrics().snapshot().misses, 1);
    }

    #[test]
    fn released_buffer_is_reused_empty() {
        let pool = BufferPool::new(4, 64);
        let mut buf = pool.acquire();
        buf.extend_from_slice(b"secret payload");
        let ptr = buf.as_ptr();
        pool.release(buf, 2048);

        let again = pool.acquire();
        assert_eq!(again.as_ptr(), ptr);
        assert!(again.is_empty());

        let snap = pool.metrics().snapshot();
        assert_eq!(snap.hits, 1);
        assert_eq!(snap.returns, 1);
    }

    #[test]
    fn oversized_buffer_is_dropped() {
        let pool = BufferPool::new(4, 64);
        let mut buf = pool.acquire();
        buf.resize(4096, b'x');
        pool.release(buf, 2048);

        assert_eq!(pool.available(), 0);
        assert_eq!(pool.metrics().snapshot().drops, 1);
    }

    #[test]
    fn release_to_full_pool_drops() {
        let pool = BufferPool::new(1, 64);
        let a = pool.acquire();
        let b = pool.acquire();
        pool.release(a, 2048);
        pool.release(b, 2048);

        assert_eq!(pool.available(), 1);
        let snap = pool.metrics().snapshot();
        assert_eq!(snap.returns, 1);
        assert_eq!(snap.drops, 1);
        assert_eq!(snap.hit_rate(), 0.0);
    }

    #[test]
    fn concurrent_acquire_release() {
        let pool = Arc::new(BufferPool::new(8, 128));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let mut buf = pool.acquire();
                        assert!(buf.is_empty());
                        buf.push(i as u8);
                        pool.release(buf, 2048);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snap = pool.metrics().snapshot();
        assert_eq!(snap.hits + snap.misses, 8000);
        assert!(pool.available() <= 8);
    }
}
