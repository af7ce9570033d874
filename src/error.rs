//! # Error Handling
//!
//! Errors surfaced by the batcher. There are deliberately few of them:
//! construction can fail, and closing can fail, but putting values never does.
//!
//! ## Taxonomy
//!
//! - **Configuration errors** ([`ConfigError`], [`BatcherError::MissingFlusher`],
//!   [`BatcherError::NoRuntime`]) are reported by `build()` before any
//!   background work starts.
//! - **Lifecycle errors** ([`BatcherError::AlreadyClosed`],
//!   [`BatcherError::Join`]) are reported by `close()`.
//! - Values put after close are dropped silently and are not an error.
//! - Flusher failures belong to the flusher; the batcher never inspects or
//!   retries them.

use tokio::runtime::TryCurrentError;
use tokio::task::JoinError;

/// Invalid [`BatcherConfig`](crate::config::BatcherConfig) values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
  /// `batch_size` was zero.
  #[error("batch size must be greater than zero")]
  ZeroBatchSize,

  /// `flush_interval` was zero.
  #[error("flush interval must be greater than zero")]
  ZeroFlushInterval,

  /// A buffer of `batch_size` values cannot be allocated.
  #[error("batch size of {batch_size} values cannot be allocated")]
  BatchSizeTooLarge {
    /// The rejected batch size.
    batch_size: usize,
  },
}

/// Errors returned by [`Batcher`](crate::batcher::Batcher) construction and shutdown.
#[derive(Debug, thiserror::Error)]
pub enum BatcherError {
  /// No flusher was supplied to the builder.
  #[error("flusher must be defined")]
  MissingFlusher,

  /// The configuration failed validation.
  #[error("invalid configuration: {0}")]
  Config(#[from] ConfigError),

  /// No tokio runtime was supplied and none is running on this thread.
  #[error("no tokio runtime available to run the flush loop: {0}")]
  NoRuntime(#[from] TryCurrentError),

  /// `close` was called on a batcher that is already closed.
  #[error("batcher is already closed")]
  AlreadyClosed,

  /// The flush loop or the final flush panicked or was aborted.
  #[error("flush task failed: {0}")]
  Join(#[from] JoinError),
}

impl BatcherError {
  /// Returns `true` for errors raised while validating construction input.
  pub fn is_config(&self) -> bool {
    matches!(
      self,
      Self::MissingFlusher | Self::Config(_) | Self::NoRuntime(_)
    )
  }
}
