//! Buffer controller: the accumulating buffer, the size trigger and flusher invocation.
//!
//! The current buffer and the `closed` flag live behind one mutex. Everything
//! that may take time (calling the flusher, recycling buffers) happens after
//! the lock is released, on a buffer that has already been swapped out, so a
//! slow flusher never stalls producers and never sees its batch mutated.

use crate::buffer_pool::BufferPool;
use crate::config::BatcherConfig;
use crate::error::ConfigError;
use crate::flusher::Flusher;
use crate::metrics::{BatcherMetrics, BatcherStats};
use parking_lot::Mutex;
use std::fmt;
use std::mem;
use tokio::sync::Notify;
use tokio::sync::futures::Notified;
use tracing::{debug, warn};

/// What caused a batch to be flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushTrigger {
  /// The buffer reached the batch size.
  Size,
  /// The flush interval elapsed with values pending.
  Interval,
  /// The batcher was closed (or dropped) with values pending.
  Close,
}

impl FlushTrigger {
  /// Stable lowercase name, used in logs and metric labels.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Size => "size",
      Self::Interval => "interval",
      Self::Close => "close",
    }
  }
}

impl fmt::Display for FlushTrigger {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

struct State<T> {
  /// Never longer than `batch_size`.
  buffer: Vec<T>,
  closed: bool,
}

pub(crate) struct BufferController<T> {
  name: String,
  batch_size: usize,
  state: Mutex<State<T>>,
  pool: BufferPool<T>,
  flusher: Box<dyn Flusher<T>>,
  /// Signalled on every flush so the flush loop restarts its interval.
  rearm: Notify,
  metrics: BatcherMetrics,
}

impl<T> BufferController<T> {
  /// Fails if the first buffer cannot be allocated.
  pub(crate) fn new(
    name: String,
    config: &BatcherConfig,
    flusher: Box<dyn Flusher<T>>,
  ) -> Result<Self, ConfigError> {
    let mut buffer = Vec::new();
    buffer
      .try_reserve_exact(config.batch_size)
      .map_err(|_| ConfigError::BatchSizeTooLarge {
        batch_size: config.batch_size,
      })?;
    let pool = BufferPool::new(config.batch_size, config.max_idle_buffers);
    let metrics = BatcherMetrics::new(&name);
    Ok(Self {
      name,
      batch_size: config.batch_size,
      state: Mutex::new(State {
        buffer,
        closed: false,
      }),
      pool,
      flusher,
      rearm: Notify::new(),
      metrics,
    })
  }

  /// Appends `value`, flushing on the caller's thread if that fills the buffer.
  ///
  /// After close this is a silent no-op.
  pub(crate) fn put(&self, value: T) {
    let full = {
      let mut state = self.state.lock();
      if state.closed {
        drop(state);
        if self.metrics.record_dropped() {
          warn!(batcher = %self.name, "batcher is closed, dropping values put after close");
        }
        return;
      }

      state.buffer.push(value);
      self.metrics.record_accepted();
      if state.buffer.len() >= self.batch_size {
        let fresh = self.pool.get();
        Some(mem::replace(&mut state.buffer, fresh))
      } else {
        None
      }
    };

    if let Some(batch) = full {
      self.flush(batch, FlushTrigger::Size);
    }
  }

  /// Swaps out the current buffer if it holds anything.
  ///
  /// Used by the flush loop; returns `None` once closed.
  pub(crate) fn take_pending(&self) -> Option<Vec<T>> {
    let mut state = self.state.lock();
    if state.closed || state.buffer.is_empty() {
      return None;
    }
    let fresh = self.pool.get();
    Some(mem::replace(&mut state.buffer, fresh))
  }

  /// Marks the controller closed and returns the values still buffered, if any.
  ///
  /// Only the first call can return values.
  pub(crate) fn close(&self) -> Option<Vec<T>> {
    let mut state = self.state.lock();
    state.closed = true;
    let remaining = mem::take(&mut state.buffer);
    (!remaining.is_empty()).then_some(remaining)
  }

  /// Closes and flushes whatever was left, on the current thread.
  pub(crate) fn drain(&self) {
    if let Some(batch) = self.close() {
      self.flush(batch, FlushTrigger::Close);
    }
  }

  /// Hands `batch` to the flusher and recycles the buffer if allowed.
  pub(crate) fn flush(&self, batch: Vec<T>, trigger: FlushTrigger) {
    self.rearm.notify_one();

    let len = batch.len();
    debug!(batcher = %self.name, %trigger, len, "flushing batch");
    self.metrics.record_flush(trigger, len);

    match self.flusher.flush(batch) {
      Some(buffer) => {
        self.metrics.record_recycled();
        self.pool.put(buffer);
      }
      None => self.metrics.record_retained(),
    }
  }

  /// Returns a buffer the flusher kept back to the pool.
  pub(crate) fn recuperate(&self, buffer: Vec<T>) {
    self.pool.put(buffer);
  }

  /// Completes after the next flush, or immediately if one happened since the
  /// last call.
  pub(crate) fn rearmed(&self) -> Notified<'_> {
    self.rearm.notified()
  }

  pub(crate) fn name(&self) -> &str {
    &self.name
  }

  pub(crate) fn len(&self) -> usize {
    self.state.lock().buffer.len()
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.state.lock().closed
  }

  pub(crate) fn stats(&self) -> BatcherStats {
    self.metrics.snapshot()
  }

  pub(crate) fn pool(&self) -> &BufferPool<T> {
    &self.pool
  }
}
