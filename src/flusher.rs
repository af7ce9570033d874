//! # Flushers
//!
//! A [`Flusher`] is the consumer the batcher hands finished batches to.
//!
//! The batch is moved into [`Flusher::flush`]. What the flusher returns decides
//! who owns the buffer afterwards:
//!
//! - `Some(buffer)`: the flusher is done with it. The batcher clears it and
//!   keeps it for the next batch.
//! - `None`: the flusher kept the buffer (for example it queued the batch for
//!   a writer task). It may return it later through
//!   [`Batcher::recuperate`](crate::batcher::Batcher::recuperate).
//!
//! Flushers are called synchronously, from producer threads for size-triggered
//! flushes and from the blocking pool for timer-triggered ones, and may be
//! called concurrently with themselves. They must not call back into the
//! batcher's `close`.
//!
//! ## Example
//!
//! ```rust
//! use batchweave::flusher::{flush_fn, retain_fn, Flusher};
//! use std::sync::Mutex;
//!
//! let total = Mutex::new(0u64);
//! let summing = flush_fn(move |batch: &[u64]| {
//!   *total.lock().unwrap() += batch.iter().sum::<u64>();
//! });
//! assert!(summing.flush(vec![1, 2, 3]).is_some());
//!
//! let (tx, rx) = std::sync::mpsc::channel();
//! let queueing = retain_fn(move |batch: Vec<u64>| {
//!   let _ = tx.send(batch);
//! });
//! assert!(queueing.flush(vec![4, 5]).is_none());
//! assert_eq!(rx.recv().unwrap(), vec![4, 5]);
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Consumer of finished batches.
pub trait Flusher<T>: Send + Sync {
  /// Consumes one batch.
  ///
  /// Returns the buffer to allow the batcher to recycle it, or `None` if
  /// the flusher retains it past this call.
  fn flush(&self, batch: Vec<T>) -> Option<Vec<T>>;
}

impl<T, F> Flusher<T> for Arc<F>
where
  F: Flusher<T> + ?Sized,
{
  fn flush(&self, batch: Vec<T>) -> Option<Vec<T>> {
    (**self).flush(batch)
  }
}

impl<T, F> Flusher<T> for Box<F>
where
  F: Flusher<T> + ?Sized,
{
  fn flush(&self, batch: Vec<T>) -> Option<Vec<T>> {
    (**self).flush(batch)
  }
}

/// Flusher built from a closure over a borrowed batch. Always recycles.
pub struct FlushFn<T, F> {
  f: F,
  _phantom: PhantomData<fn(&[T])>,
}

impl<T, F> FlushFn<T, F>
where
  F: Fn(&[T]) + Send + Sync,
{
  /// Wraps `f`.
  pub fn new(f: F) -> Self {
    Self {
      f,
      _phantom: PhantomData,
    }
  }
}

impl<T, F> Flusher<T> for FlushFn<T, F>
where
  F: Fn(&[T]) + Send + Sync,
{
  fn flush(&self, batch: Vec<T>) -> Option<Vec<T>> {
    (self.f)(&batch);
    Some(batch)
  }
}

impl<T, F> fmt::Debug for FlushFn<T, F> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FlushFn").finish_non_exhaustive()
  }
}

/// Flusher built from a closure that takes ownership of the batch. Never recycles.
pub struct RetainFn<T, F> {
  f: F,
  _phantom: PhantomData<fn(Vec<T>)>,
}

impl<T, F> RetainFn<T, F>
where
  F: Fn(Vec<T>) + Send + Sync,
{
  /// Wraps `f`.
  pub fn new(f: F) -> Self {
    Self {
      f,
      _phantom: PhantomData,
    }
  }
}

impl<T, F> Flusher<T> for RetainFn<T, F>
where
  F: Fn(Vec<T>) + Send + Sync,
{
  fn flush(&self, batch: Vec<T>) -> Option<Vec<T>> {
    (self.f)(batch);
    None
  }
}

impl<T, F> fmt::Debug for RetainFn<T, F> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RetainFn").finish_non_exhaustive()
  }
}

/// Shorthand for [`FlushFn::new`].
pub fn flush_fn<T, F>(f: F) -> FlushFn<T, F>
where
  F: Fn(&[T]) + Send + Sync,
{
  FlushFn::new(f)
}

/// Shorthand for [`RetainFn::new`].
pub fn retain_fn<T, F>(f: F) -> RetainFn<T, F>
where
  F: Fn(Vec<T>) + Send + Sync,
{
  RetainFn::new(f)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;

  #[test]
  fn test_flush_fn_sees_batch_and_recycles() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let flusher = flush_fn(move |batch: &[i32]| sink.lock().unwrap().extend_from_slice(batch));

    let mut batch = Vec::with_capacity(8);
    batch.extend([1, 2, 3]);
    let returned = flusher.flush(batch).expect("flush_fn recycles");

    assert_eq!(returned, vec![1, 2, 3]);
    assert_eq!(returned.capacity(), 8);
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
  }

  #[test]
  fn test_retain_fn_keeps_batch() {
    let kept = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&kept);
    let flusher = retain_fn(move |batch: Vec<String>| sink.lock().unwrap().push(batch));

    let batch = vec!["a".to_string(), "b".to_string()];
    assert!(flusher.flush(batch.clone()).is_none());
    assert_eq!(*kept.lock().unwrap(), vec![batch]);
  }

  #[test]
  fn test_shared_flusher_through_arc() {
    let shared: Arc<dyn Flusher<u8>> = Arc::new(flush_fn(|_: &[u8]| {}));
    let clone = Arc::clone(&shared);
    assert!(clone.flush(vec![7]).is_some());
    assert!(shared.flush(vec![8]).is_some());
  }
}
