//! Tests for the buffer controller: size trigger, swap, close and recycling.

use crate::config::BatcherConfig;
use crate::controller::{BufferController, FlushTrigger};
use crate::error::ConfigError;
use crate::flusher::Flusher;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Recorder {
  batches: Mutex<Vec<Vec<u32>>>,
  retain: bool,
}

impl Recorder {
  fn retaining() -> Self {
    Self {
      retain: true,
      ..Default::default()
    }
  }

  fn batches(&self) -> Vec<Vec<u32>> {
    self.batches.lock().unwrap().clone()
  }
}

impl Flusher<u32> for Recorder {
  fn flush(&self, batch: Vec<u32>) -> Option<Vec<u32>> {
    self.batches.lock().unwrap().push(batch.clone());
    if self.retain { None } else { Some(batch) }
  }
}

fn controller(batch_size: usize, recorder: &Arc<Recorder>) -> BufferController<u32> {
  let config = BatcherConfig::default()
    .with_batch_size(batch_size)
    .with_max_idle_buffers(4);
  BufferController::new("test".to_string(), &config, Box::new(Arc::clone(recorder))).unwrap()
}

#[test]
fn test_put_below_batch_size_does_not_flush() {
  let recorder = Arc::new(Recorder::default());
  let controller = controller(4, &recorder);

  for i in 0..3 {
    controller.put(i);
  }

  assert_eq!(controller.len(), 3);
  assert!(recorder.batches().is_empty());
  assert_eq!(controller.stats().accepted, 3);
}

#[test]
fn test_full_buffer_flushes_in_order_and_swaps() {
  let recorder = Arc::new(Recorder::default());
  let controller = controller(4, &recorder);

  for i in 0..10 {
    controller.put(i);
    assert!(controller.len() < 4);
  }

  assert_eq!(recorder.batches(), vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]]);
  assert_eq!(controller.len(), 2);

  let stats = controller.stats();
  assert_eq!(stats.size_flushes, 2);
  assert_eq!(stats.flushed_values, 8);
  assert_eq!(stats.recycled, 2);
  assert_eq!(stats.pending(), 2);
}

#[test]
fn test_recycled_buffers_are_reused() {
  let recorder = Arc::new(Recorder::default());
  let controller = controller(2, &recorder);

  for i in 0..8 {
    controller.put(i);
  }

  // The initial buffer is allocated outside the pool. Only the first swap
  // misses; every later swap is served by a recycled buffer.
  let pool = controller.pool().metrics().snapshot();
  assert_eq!(pool.misses, 1);
  assert_eq!(pool.hits, 3);
  assert_eq!(controller.pool().available(), 1);
}

#[test]
fn test_take_pending() {
  let recorder = Arc::new(Recorder::default());
  let controller = controller(10, &recorder);

  assert!(controller.take_pending().is_none());

  controller.put(7);
  controller.put(8);
  let batch = controller.take_pending().expect("pending values");
  assert_eq!(batch, vec![7, 8]);
  assert!(batch.capacity() >= 10);
  assert_eq!(controller.len(), 0);
  assert!(controller.take_pending().is_none());
}

#[test]
fn test_close_returns_remaining_once() {
  let recorder = Arc::new(Recorder::default());
  let controller = controller(10, &recorder);

  controller.put(1);
  controller.put(2);

  assert_eq!(controller.close(), Some(vec![1, 2]));
  assert!(controller.is_closed());
  assert_eq!(controller.close(), None);
  assert!(controller.take_pending().is_none());
}

#[test]
fn test_put_after_close_is_dropped() {
  let recorder = Arc::new(Recorder::default());
  let controller = controller(1, &recorder);

  controller.put(1);
  controller.drain();
  controller.put(2);
  controller.put(3);

  assert_eq!(recorder.batches(), vec![vec![1]]);
  assert_eq!(controller.len(), 0);
  let stats = controller.stats();
  assert_eq!(stats.accepted, 1);
  assert_eq!(stats.dropped, 2);
  assert_eq!(stats.close_flushes, 0);
}

#[test]
fn test_drain_flushes_remaining_with_close_trigger() {
  let recorder = Arc::new(Recorder::default());
  let controller = controller(10, &recorder);

  controller.put(4);
  controller.put(5);
  controller.drain();
  controller.drain();

  assert_eq!(recorder.batches(), vec![vec![4, 5]]);
  assert_eq!(controller.stats().close_flushes, 1);
}

#[test]
fn test_retained_buffers_can_be_recuperated() {
  let recorder = Arc::new(Recorder::retaining());
  let controller = controller(3, &recorder);

  for i in 0..6 {
    controller.put(i);
  }
  assert_eq!(controller.stats().retained, 2);
  assert_eq!(controller.pool().available(), 0);

  for batch in recorder.batches() {
    let mut buffer = Vec::with_capacity(3);
    buffer.extend(batch);
    controller.recuperate(buffer);
  }
  assert_eq!(controller.pool().available(), 2);
}

#[test]
fn test_flush_trigger_names() {
  assert_eq!(FlushTrigger::Size.as_str(), "size");
  assert_eq!(FlushTrigger::Interval.to_string(), "interval");
  assert_eq!(FlushTrigger::Close.as_str(), "close");
}

#[tokio::test]
async fn test_flush_signals_rearm() {
  let recorder = Arc::new(Recorder::default());
  let controller = controller(1, &recorder);

  controller.put(9);

  tokio::time::timeout(Duration::from_secs(1), controller.rearmed())
    .await
    .expect("a flush re-arms the timer");
}

#[test]
fn test_unallocatable_batch_size_is_a_config_error() {
  let recorder = Arc::new(Recorder::default());
  let config = BatcherConfig::default().with_batch_size(usize::MAX / 2);
  let result = BufferController::new("test".to_string(), &config, Box::new(recorder));

  assert_eq!(
    result.err(),
    Some(ConfigError::BatchSizeTooLarge {
      batch_size: usize::MAX / 2
    })
  );
}
