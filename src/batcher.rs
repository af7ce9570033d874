//! # Batcher
//!
//! [`Batcher`] collects values from any number of producers and hands them to
//! a [`Flusher`] in batches, as soon as a batch is full or once the flush
//! interval has passed, whichever comes first.
//!
//! ## Lifecycle
//!
//! A batcher is **running** from [`BatcherBuilder::build`] until
//! [`Batcher::close`] is called. Closing stops the flush loop, flushes any
//! values still buffered exactly once, and waits for the loop to finish. It is
//! terminal: values put afterwards are dropped silently.
//!
//! Handles are cheap to clone; every clone feeds the same buffer. If the last
//! handle is dropped without `close`, the flush loop is cancelled and the
//! remaining values are flushed on the dropping thread.
//!
//! ## Example
//!
//! ```rust,no_run
//! use batchweave::{Batcher, flush_fn};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), batchweave::BatcherError> {
//! let batcher = Batcher::builder()
//!   .name("events")
//!   .batch_size(500)
//!   .flush_interval(Duration::from_millis(250))
//!   .flusher(flush_fn(|batch: &[String]| {
//!     println!("writing {} events", batch.len());
//!   }))
//!   .build()?;
//!
//! for i in 0..1_000 {
//!   batcher.put(format!("event-{i}"));
//! }
//!
//! batcher.close().await?;
//! # Ok(())
//! # }
//! ```

use crate::buffer_pool::PoolStats;
use crate::config::BatcherConfig;
use crate::controller::BufferController;
use crate::error::BatcherError;
use crate::flush_loop;
use crate::flusher::Flusher;
use crate::metrics::BatcherStats;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const DEFAULT_NAME: &str = "batcher";

/// Size- and time-triggered batcher. See the [module docs](self).
pub struct Batcher<T> {
  inner: Arc<Inner<T>>,
}

struct Inner<T> {
  controller: Arc<BufferController<T>>,
  config: BatcherConfig,
  shutdown: CancellationToken,
  /// Taken by the first `close`; `None` afterwards.
  worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T> Clone for Batcher<T> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<T> Batcher<T>
where
  T: Send + 'static,
{
  /// Starts configuring a batcher.
  pub fn builder() -> BatcherBuilder<T> {
    BatcherBuilder::default()
  }

  /// Builds a batcher from a flusher and a configuration, on the current tokio runtime.
  pub fn new<F>(flusher: F, config: BatcherConfig) -> Result<Self, BatcherError>
  where
    F: Flusher<T> + 'static,
  {
    Self::builder().flusher(flusher).config(config).build()
  }

  /// Closes the batcher.
  ///
  /// Stops the flush loop, flushes the values still buffered, then waits
  /// until the loop (including any timer flush in progress) has finished.
  /// Every value put before this call has been handed to the flusher once it
  /// returns.
  ///
  /// Closing twice is a bug in the caller and returns
  /// [`BatcherError::AlreadyClosed`] without doing anything.
  pub async fn close(&self) -> Result<(), BatcherError> {
    let worker = self.inner.worker.lock().take();
    let Some(worker) = worker else {
      return Err(BatcherError::AlreadyClosed);
    };

    self.inner.shutdown.cancel();

    let controller = Arc::clone(&self.inner.controller);
    let drained = tokio::task::spawn_blocking(move || controller.drain()).await;
    let stopped = worker.await;

    drained?;
    stopped?;
    debug!(batcher = %self.name(), stats = ?self.stats(), "batcher closed");
    Ok(())
  }
}

impl<T> Batcher<T> {
  /// Adds a value to the current batch.
  ///
  /// If this fills the batch, the flusher runs on the calling thread before
  /// `put` returns; other producers keep filling a fresh buffer meanwhile.
  /// Once the batcher is closed the value is dropped without error.
  #[inline]
  pub fn put(&self, value: T) {
    self.inner.controller.put(value);
  }

  /// Returns a buffer that a flusher kept (by returning `None`) for reuse.
  ///
  /// The buffer is cleared first. Buffers smaller than the batch size are
  /// simply dropped.
  pub fn recuperate(&self, buffer: Vec<T>) {
    self.inner.controller.recuperate(buffer);
  }

  /// Number of values waiting in the current batch.
  pub fn len(&self) -> usize {
    self.inner.controller.len()
  }

  /// Whether the current batch is empty.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Whether the final drain has taken the buffer.
  ///
  /// Stays `false` for a short while after `close` starts; values put in
  /// that window are still part of the final flush.
  pub fn is_closed(&self) -> bool {
    self.inner.controller.is_closed()
  }

  /// The name used in logs and metric labels.
  pub fn name(&self) -> &str {
    self.inner.controller.name()
  }

  /// The configuration this batcher was built with.
  pub fn config(&self) -> &BatcherConfig {
    &self.inner.config
  }

  /// Snapshot of this batcher's counters.
  pub fn stats(&self) -> BatcherStats {
    self.inner.controller.stats()
  }

  /// Snapshot of the buffer pool's counters.
  pub fn pool_stats(&self) -> PoolStats {
    self.inner.controller.pool().metrics().snapshot()
  }

  /// Idle buffers currently held by the pool.
  pub fn pooled_buffers(&self) -> usize {
    self.inner.controller.pool().available()
  }
}

impl<T> fmt::Debug for Batcher<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Batcher")
      .field("name", &self.name())
      .field("config", &self.inner.config)
      .field("pending", &self.len())
      .field("closed", &self.is_closed())
      .finish()
  }
}

impl<T> Drop for Inner<T> {
  fn drop(&mut self) {
    if self.worker.get_mut().take().is_none() {
      return;
    }
    warn!(
      batcher = %self.controller.name(),
      "batcher dropped without close, flushing remaining values"
    );
    self.shutdown.cancel();
    self.controller.drain();
  }
}

/// Builder for [`Batcher`].
pub struct BatcherBuilder<T> {
  flusher: Option<Box<dyn Flusher<T>>>,
  config: BatcherConfig,
  name: Option<String>,
  runtime: Option<Handle>,
}

impl<T> Default for BatcherBuilder<T> {
  fn default() -> Self {
    Self {
      flusher: None,
      config: BatcherConfig::default(),
      name: None,
      runtime: None,
    }
  }
}

impl<T> BatcherBuilder<T>
where
  T: Send + 'static,
{
  /// Sets the flusher batches are handed to. Required.
  pub fn flusher<F>(mut self, flusher: F) -> Self
  where
    F: Flusher<T> + 'static,
  {
    self.flusher = Some(Box::new(flusher));
    self
  }

  /// Replaces the whole configuration.
  pub fn config(mut self, config: BatcherConfig) -> Self {
    self.config = config;
    self
  }

  /// Sets the maximum number of values per batch.
  pub fn batch_size(mut self, size: usize) -> Self {
    self.config.batch_size = size;
    self
  }

  /// Sets the maximum time an incomplete batch waits before being flushed.
  pub fn flush_interval(mut self, interval: Duration) -> Self {
    self.config.flush_interval = interval;
    self
  }

  /// Sets how many idle buffers the pool keeps.
  pub fn max_idle_buffers(mut self, max_idle: usize) -> Self {
    self.config.max_idle_buffers = max_idle;
    self
  }

  /// Names the batcher in logs and metric labels.
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Runs the flush loop on `handle` instead of the current runtime.
  ///
  /// Lets a batcher be built from a thread that is not inside a runtime.
  pub fn runtime(mut self, handle: Handle) -> Self {
    self.runtime = Some(handle);
    self
  }

  /// Validates the settings and starts the flush loop.
  ///
  /// Nothing is spawned unless every check passes.
  pub fn build(self) -> Result<Batcher<T>, BatcherError> {
    let flusher = self.flusher.ok_or(BatcherError::MissingFlusher)?;
    self.config.validate()?;
    let runtime = match self.runtime {
      Some(handle) => handle,
      None => Handle::try_current()?,
    };
    let name = self.name.unwrap_or_else(|| DEFAULT_NAME.to_string());
    let config = self.config;

    let controller = Arc::new(BufferController::new(name, &config, flusher)?);
    let shutdown = CancellationToken::new();
    let worker = runtime.spawn(flush_loop::run(
      Arc::clone(&controller),
      config.flush_interval,
      shutdown.clone(),
    ));

    debug!(
      batcher = %controller.name(),
      batch_size = config.batch_size,
      flush_interval = ?config.flush_interval,
      "batcher started"
    );

    Ok(Batcher {
      inner: Arc::new(Inner {
        controller,
        config,
        shutdown,
        worker: Mutex::new(Some(worker)),
      }),
    })
  }
}
