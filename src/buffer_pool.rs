//! # Buffer Pooling
//!
//! Reusable batch buffers so that a flush does not cost an allocation.
//!
//! Every buffer in a pool shares one capacity, the batch size of the owning
//! batcher. Buffers handed out by [`BufferPool::get`] are always empty and
//! hold at least that capacity; buffers handed back through
//! [`BufferPool::put`] are cleared first, and anything too small to serve as
//! a full batch is refused.
//!
//! The pool is touched both by producers (size-triggered flushes) and by the
//! background flush loop, so it carries its own lock independent of the
//! batcher's buffer lock.
//!
//! ## Usage
//!
//! ```rust
//! use batchweave::buffer_pool::BufferPool;
//!
//! let pool: BufferPool<u32> = BufferPool::new(128, 4);
//!
//! let mut buffer = pool.get();
//! buffer.extend([1, 2, 3]);
//! pool.put(buffer);
//!
//! let reused = pool.get();
//! assert!(reused.is_empty());
//! assert!(reused.capacity() >= 128);
//! ```

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Counters describing how well the pool is absorbing allocations.
#[derive(Debug, Default)]
pub struct PoolMetrics {
  /// Buffers served from the idle list.
  hits: AtomicU64,
  /// Buffers freshly allocated because the idle list was empty.
  misses: AtomicU64,
  /// Buffers accepted back into the idle list.
  returns: AtomicU64,
  /// Buffers refused because the pool was full or the buffer too small.
  drops: AtomicU64,
}

impl PoolMetrics {
  #[inline]
  fn record_hit(&self) {
    self.hits.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  fn record_miss(&self) {
    self.misses.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  fn record_return(&self) {
    self.returns.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  fn record_drop(&self) {
    self.drops.fetch_add(1, Ordering::Relaxed);
  }

  /// Takes a point-in-time copy of the counters.
  pub fn snapshot(&self) -> PoolStats {
    PoolStats {
      hits: self.hits.load(Ordering::Relaxed),
      misses: self.misses.load(Ordering::Relaxed),
      returns: self.returns.load(Ordering::Relaxed),
      drops: self.drops.load(Ordering::Relaxed),
    }
  }
}

/// Point-in-time snapshot of [`PoolMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
  /// Buffers served from the idle list.
  pub hits: u64,
  /// Buffers allocated on demand.
  pub misses: u64,
  /// Buffers accepted back for reuse.
  pub returns: u64,
  /// Buffers refused and freed.
  pub drops: u64,
}

impl PoolStats {
  /// Share of `get` calls served without allocating, from 0.0 to 1.0.
  ///
  /// A pool that has never been asked for a buffer reports 1.0.
  pub fn hit_rate(&self) -> f64 {
    let total = self.hits + self.misses;
    if total == 0 {
      1.0
    } else {
      self.hits as f64 / total as f64
    }
  }
}

/// Thread-safe free list of `Vec<T>` buffers of one capacity.
#[derive(Debug)]
pub struct BufferPool<T> {
  /// Idle buffers, all empty.
  idle: Mutex<Vec<Vec<T>>>,
  /// Capacity every served buffer is guaranteed to have.
  buffer_capacity: usize,
  /// Upper bound on `idle.len()`.
  max_idle: usize,
  metrics: PoolMetrics,
}

impl<T> BufferPool<T> {
  /// Creates an empty pool serving buffers of `buffer_capacity` and keeping
  /// at most `max_idle` of them around between uses.
  pub fn new(buffer_capacity: usize, max_idle: usize) -> Self {
    Self {
      idle: Mutex::new(Vec::with_capacity(max_idle)),
      buffer_capacity,
      max_idle,
      metrics: PoolMetrics::default(),
    }
  }

  /// Gets an empty buffer, reusing an idle one when available.
  pub fn get(&self) -> Vec<T> {
    if let Some(buffer) = self.idle.lock().pop() {
      self.metrics.record_hit();
      return buffer;
    }
    self.metrics.record_miss();
    trace!(capacity = self.buffer_capacity, "buffer pool miss, allocating");
    Vec::with_capacity(self.buffer_capacity)
  }

  /// Hands a buffer back for reuse.
  ///
  /// The buffer is cleared (dropping any values still in it) before it is
  /// stored. Buffers smaller than the pool's capacity, or arriving while the
  /// idle list is full, are freed instead.
  pub fn put(&self, mut buffer: Vec<T>) {
    if buffer.capacity() < self.buffer_capacity {
      self.metrics.record_drop();
      return;
    }
    buffer.clear();

    let mut idle = self.idle.lock();
    if idle.len() >= self.max_idle {
      drop(idle);
      self.metrics.record_drop();
      return;
    }
    idle.push(buffer);
    drop(idle);
    self.metrics.record_return();
  }

  /// Capacity of the buffers this pool serves.
  pub fn buffer_capacity(&self) -> usize {
    self.buffer_capacity
  }

  /// Maximum number of idle buffers retained.
  pub fn max_idle(&self) -> usize {
    self.max_idle
  }

  /// Number of idle buffers currently available.
  pub fn available(&self) -> usize {
    self.idle.lock().len()
  }

  /// Pool counters.
  pub fn metrics(&self) -> &PoolMetrics {
    &self.metrics
  }
}
