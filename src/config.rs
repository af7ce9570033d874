//! Batcher configuration.
//!
//! ```toml
//! [batcher]
//! batch_size = 500
//! flush_interval = "250ms"
//! max_idle_buffers = 4
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default maximum number of values per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default maximum wait before an incomplete batch is flushed.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of idle buffers kept by the pool.
pub const DEFAULT_MAX_IDLE_BUFFERS: usize = 16;

/// Settings fixed at construction for the lifetime of a batcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatcherConfig {
  /// Maximum values per batch. A batch is flushed as soon as it holds this many.
  /// Default: 100
  pub batch_size: usize,

  /// Maximum time an incomplete batch may wait before being flushed.
  /// Default: 1s
  #[serde(with = "humantime_serde")]
  pub flush_interval: Duration,

  /// Idle buffers retained for reuse; extra recycled buffers are freed.
  /// Default: 16
  pub max_idle_buffers: usize,
}

impl Default for BatcherConfig {
  fn default() -> Self {
    Self {
      batch_size: DEFAULT_BATCH_SIZE,
      flush_interval: DEFAULT_FLUSH_INTERVAL,
      max_idle_buffers: DEFAULT_MAX_IDLE_BUFFERS,
    }
  }
}

impl BatcherConfig {
  /// Sets the batch size.
  pub fn with_batch_size(mut self, size: usize) -> Self {
    self.batch_size = size;
    self
  }

  /// Sets the flush interval.
  pub fn with_flush_interval(mut self, interval: Duration) -> Self {
    self.flush_interval = interval;
    self
  }

  /// Sets the number of idle buffers the pool keeps.
  pub fn with_max_idle_buffers(mut self, max_idle: usize) -> Self {
    self.max_idle_buffers = max_idle;
    self
  }

  /// Checks that every setting is usable.
  ///
  /// Whether a buffer of `batch_size` values can be allocated depends on the
  /// value type, so `build()` checks that separately.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.batch_size == 0 {
      return Err(ConfigError::ZeroBatchSize);
    }
    if self.flush_interval.is_zero() {
      return Err(ConfigError::ZeroFlushInterval);
    }
    Ok(())
  }
}
