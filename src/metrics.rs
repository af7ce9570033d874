//! Batcher metrics.
//!
//! Each batcher keeps its own atomic counters, readable through
//! [`Batcher::stats`](crate::batcher::Batcher::stats), and mirrors them into the
//! [`metrics`] facade so that an installed recorder (for example a Prometheus
//! exporter) sees them too:
//!
//! - `batchweave_values_total{batcher}`: values accepted by `put`.
//! - `batchweave_dropped_total{batcher}`: values dropped because the batcher was closed.
//! - `batchweave_flushes_total{batcher, trigger}`: flushes, by what triggered them.
//! - `batchweave_flushed_values_total{batcher}`: values handed to the flusher.
//!
//! Without a recorder the facade calls are no-ops.

use crate::controller::FlushTrigger;
use metrics::{Counter, counter};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one batcher.
pub(crate) struct BatcherMetrics {
  accepted: AtomicU64,
  dropped: AtomicU64,
  size_flushes: AtomicU64,
  interval_flushes: AtomicU64,
  close_flushes: AtomicU64,
  flushed_values: AtomicU64,
  recycled: AtomicU64,
  retained: AtomicU64,
  exported: ExportedCounters,
}

/// Facade handles, registered once per batcher.
struct ExportedCounters {
  values: Counter,
  dropped: Counter,
  size_flushes: Counter,
  interval_flushes: Counter,
  close_flushes: Counter,
  flushed_values: Counter,
}

impl ExportedCounters {
  fn register(name: &str) -> Self {
    let flushes = |trigger: FlushTrigger| {
      counter!(
        "batchweave_flushes_total",
        "batcher" => name.to_string(),
        "trigger" => trigger.as_str()
      )
    };
    Self {
      values: counter!("batchweave_values_total", "batcher" => name.to_string()),
      dropped: counter!("batchweave_dropped_total", "batcher" => name.to_string()),
      size_flushes: flushes(FlushTrigger::Size),
      interval_flushes: flushes(FlushTrigger::Interval),
      close_flushes: flushes(FlushTrigger::Close),
      flushed_values: counter!("batchweave_flushed_values_total", "batcher" => name.to_string()),
    }
  }
}

impl BatcherMetrics {
  pub(crate) fn new(name: &str) -> Self {
    Self {
      accepted: AtomicU64::new(0),
      dropped: AtomicU64::new(0),
      size_flushes: AtomicU64::new(0),
      interval_flushes: AtomicU64::new(0),
      close_flushes: AtomicU64::new(0),
      flushed_values: AtomicU64::new(0),
      recycled: AtomicU64::new(0),
      retained: AtomicU64::new(0),
      exported: ExportedCounters::register(name),
    }
  }

  #[inline]
  pub(crate) fn record_accepted(&self) {
    self.accepted.fetch_add(1, Ordering::Relaxed);
    self.exported.values.increment(1);
  }

  /// Returns `true` for the first dropped value only.
  #[inline]
  pub(crate) fn record_dropped(&self) -> bool {
    self.exported.dropped.increment(1);
    self.dropped.fetch_add(1, Ordering::Relaxed) == 0
  }

  pub(crate) fn record_flush(&self, trigger: FlushTrigger, len: usize) {
    let (local, exported) = match trigger {
      FlushTrigger::Size => (&self.size_flushes, &self.exported.size_flushes),
      FlushTrigger::Interval => (&self.interval_flushes, &self.exported.interval_flushes),
      FlushTrigger::Close => (&self.close_flushes, &self.exported.close_flushes),
    };
    local.fetch_add(1, Ordering::Relaxed);
    exported.increment(1);
    self.flushed_values.fetch_add(len as u64, Ordering::Relaxed);
    self.exported.flushed_values.increment(len as u64);
  }

  #[inline]
  pub(crate) fn record_recycled(&self) {
    self.recycled.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub(crate) fn record_retained(&self) {
    self.retained.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn snapshot(&self) -> BatcherStats {
    BatcherStats {
      accepted: self.accepted.load(Ordering::Relaxed),
      dropped: self.dropped.load(Ordering::Relaxed),
      size_flushes: self.size_flushes.load(Ordering::Relaxed),
      interval_flushes: self.interval_flushes.load(Ordering::Relaxed),
      close_flushes: self.close_flushes.load(Ordering::Relaxed),
      flushed_values: self.flushed_values.load(Ordering::Relaxed),
      recycled: self.recycled.load(Ordering::Relaxed),
      retained: self.retained.load(Ordering::Relaxed),
    }
  }
}

/// Point-in-time copy of a batcher's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatcherStats {
  /// Values accepted by `put`.
  pub accepted: u64,
  /// Values dropped because the batcher was closed.
  pub dropped: u64,
  /// Flushes caused by a buffer reaching the batch size.
  pub size_flushes: u64,
  /// Flushes caused by the flush interval elapsing.
  pub interval_flushes: u64,
  /// Flushes of the remaining buffer at shutdown.
  pub close_flushes: u64,
  /// Values handed to the flusher across all flushes.
  pub flushed_values: u64,
  /// Buffers the flusher handed back for reuse.
  pub recycled: u64,
  /// Buffers the flusher kept.
  pub retained: u64,
}

impl BatcherStats {
  /// Total flushes, whatever triggered them.
  pub fn flushes(&self) -> u64 {
    self.size_flushes + self.interval_flushes + self.close_flushes
  }

  /// Values accepted but not yet handed to the flusher.
  pub fn pending(&self) -> u64 {
    self.accepted.saturating_sub(self.flushed_values)
  }
}
