//! Time-triggered flushing.
//!
//! One task per batcher sleeps until the flush interval has passed since the
//! most recent flush, then flushes whatever is pending. Size-triggered
//! flushes on producer threads push the deadline back through
//! [`BufferController::rearmed`], so a burst of full batches is not followed
//! by a near-empty timer flush.
//!
//! The flusher is synchronous, so timer flushes run on the blocking pool. The
//! loop awaits each one before sleeping again; two timer flushes never overlap.
//!
//! If the runtime shuts down before a timer flush gets a blocking thread, the
//! batch it swapped out is dropped with the task. That loss is logged with the
//! number of values, since no later drain can see them.

use crate::controller::{BufferController, FlushTrigger};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub(crate) async fn run<T>(
  controller: Arc<BufferController<T>>,
  interval: Duration,
  shutdown: CancellationToken,
) where
  T: Send + 'static,
{
  let deadline = sleep(interval);
  tokio::pin!(deadline);

  debug!(batcher = %controller.name(), ?interval, "flush loop started");

  loop {
    tokio::select! {
      biased;

      _ = shutdown.cancelled() => break,

      _ = controller.rearmed() => {
        deadline.as_mut().reset(Instant::now() + interval);
      }

      _ = &mut deadline => {
        deadline.as_mut().reset(Instant::now() + interval);

        let Some(batch) = controller.take_pending() else {
          continue;
        };
        let len = batch.len();
        let flushing = Arc::clone(&controller);
        let flushed = tokio::task::spawn_blocking(move || {
          flushing.flush(batch, FlushTrigger::Interval);
        })
        .await;
        if let Err(err) = flushed {
          match TimerFlushFailure::from_join_error(&err, len) {
            TimerFlushFailure::Panicked => {
              error!(batcher = %controller.name(), error = %err, "flusher panicked during timer flush");
            }
            TimerFlushFailure::Cancelled { lost } => {
              error!(
                batcher = %controller.name(),
                lost,
                "timer flush cancelled before running, values lost"
              );
            }
          }
        }
      }
    }
  }

  debug!(batcher = %controller.name(), "flush loop stopped");
}

/// Why a timer flush task did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerFlushFailure {
  /// The flusher was called with the batch and panicked.
  Panicked,
  /// The task was cancelled, dropping a batch of `lost` values unflushed.
  Cancelled { lost: usize },
}

impl TimerFlushFailure {
  fn from_join_error(err: &JoinError, len: usize) -> Self {
    if err.is_cancelled() {
      Self::Cancelled { lost: len }
    } else {
      Self::Panicked
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_cancelled_flush_reports_lost_values() {
    let task = tokio::spawn(std::future::pending::<()>());
    task.abort();
    let err = task.await.unwrap_err();

    assert_eq!(
      TimerFlushFailure::from_join_error(&err, 12),
      TimerFlushFailure::Cancelled { lost: 12 }
    );
  }

  #[tokio::test]
  async fn test_panicked_flush_is_not_reported_as_loss() {
    let err = tokio::task::spawn_blocking(|| -> u32 { panic!("sink unavailable") })
      .await
      .unwrap_err();

    assert_eq!(
      TimerFlushFailure::from_join_error(&err, 12),
      TimerFlushFailure::Panicked
    );
  }
}
