//! # batchweave
//!
//! Size- and time-triggered batching of values for Tokio applications.
//!
//! Producers [`put`](Batcher::put) values into a [`Batcher`] from any thread or
//! task. The batcher hands them to a [`Flusher`] in batches: as soon as a batch
//! reaches the configured size, or once the flush interval has passed since the
//! last flush, whichever comes first. Use it in front of anything that is
//! cheaper in bulk than one value at a time, such as database inserts or
//! network sends.
//!
//! ## Key Features
//!
//! - **Non-blocking producers**: a full batch is swapped out under a short lock
//!   and flushed after the lock is released, so a slow flusher never stops
//!   other producers from filling the next batch.
//! - **Dual trigger**: size-triggered flushes restart the flush interval, so a
//!   burst of full batches is not followed by a near-empty timer flush.
//! - **Buffer recycling**: flushed buffers go back to a pool. Flushers that need
//!   to keep a batch can do so and return it later with
//!   [`recuperate`](Batcher::recuperate).
//! - **Exactly-once drain**: [`close`](Batcher::close) flushes what is left and
//!   waits for the background loop, so every value put before close is
//!   delivered exactly once.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batchweave::{Batcher, flush_fn};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), batchweave::BatcherError> {
//! let batcher = Batcher::builder()
//!   .batch_size(100)
//!   .flush_interval(Duration::from_secs(1))
//!   .flusher(flush_fn(|batch: &[u64]| println!("flushing {batch:?}")))
//!   .build()?;
//!
//! batcher.put(1);
//! batcher.put(2);
//! batcher.close().await?;
//! # Ok(())
//! # }
//! ```

// Documentation enforcement - treat missing docs as errors
#![deny(missing_docs)]

/// The batcher, its builder and its lifecycle.
pub mod batcher;
/// Pool of reusable batch buffers.
pub mod buffer_pool;
/// Batcher configuration.
pub mod config;
/// Error types.
pub mod error;
/// The flusher contract and closure adapters.
pub mod flusher;
/// Per-batcher counters and `metrics` facade export.
pub mod metrics;

mod controller;
mod flush_loop;

pub use batcher::{Batcher, BatcherBuilder};
pub use buffer_pool::{BufferPool, PoolStats};
pub use config::BatcherConfig;
pub use controller::FlushTrigger;
pub use error::{BatcherError, ConfigError};
pub use flusher::{FlushFn, Flusher, RetainFn, flush_fn, retain_fn};
pub use metrics::BatcherStats;

#[cfg(test)]
mod controller_test;
