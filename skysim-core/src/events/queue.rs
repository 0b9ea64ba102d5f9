//! Hand-off queues between the feed poller and the tick loop.
//!
//! Replay mode uses a bounded channel whose blocking publish propagates
//! backpressure to the producer; live and archive modes use a single-slot
//! latest-value cell where an unconsumed batch is overwritten by a newer
//! one. The consumer side carries a one-batch defer slot for the replay
//! skip-and-retry rule.

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, SendTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;

use crate::error::HandoffError;
use crate::events::FeedBatch;

/// Result of a non-blocking publish attempt. `Full` hands the batch back
/// so the caller can retry with blocking semantics.
#[derive(Debug)]
pub enum TryPublishError {
    Full(FeedBatch),
    Disconnected,
}

enum SenderInner {
    Bounded(Sender<FeedBatch>),
    Latest(Arc<Mutex<Option<FeedBatch>>>),
}

enum ReceiverInner {
    Bounded(Receiver<FeedBatch>),
    Latest(Arc<Mutex<Option<FeedBatch>>>),
}

/// Producer side of the hand-off.
pub struct BatchSender {
    inner: SenderInner,
}

/// Consumer side of the hand-off. At-most-one-consumer: batches are
/// dequeued exactly once, except when explicitly deferred.
pub struct BatchReceiver {
    inner: ReceiverInner,
    deferred: Option<FeedBatch>,
}

/// Constructors for the two hand-off flavors.
pub struct HandoffQueue;

impl HandoffQueue {
    /// Bounded FIFO hand-off; `publish` blocks when `capacity` batches
    /// are waiting.
    pub fn bounded(capacity: usize) -> (BatchSender, BatchReceiver) {
        let (tx, rx) = channel::bounded(capacity);
        (
            BatchSender {
                inner: SenderInner::Bounded(tx),
            },
            BatchReceiver {
                inner: ReceiverInner::Bounded(rx),
                deferred: None,
            },
        )
    }

    /// Single-slot latest-value hand-off; publishing replaces any
    /// unconsumed batch.
    pub fn latest() -> (BatchSender, BatchReceiver) {
        let slot = Arc::new(Mutex::new(None));
        (
            BatchSender {
                inner: SenderInner::Latest(slot.clone()),
            },
            BatchReceiver {
                inner: ReceiverInner::Latest(slot),
                deferred: None,
            },
        )
    }
}

impl BatchSender {
    /// Non-blocking publish. On a full bounded queue the batch is handed
    /// back for a blocking retry; the latest-value flavor never fills.
    pub fn try_publish(&self, batch: FeedBatch) -> Result<(), TryPublishError> {
        match &self.inner {
            SenderInner::Bounded(tx) => match tx.try_send(batch) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(b)) => Err(TryPublishError::Full(b)),
                Err(TrySendError::Disconnected(_)) => Err(TryPublishError::Disconnected),
            },
            SenderInner::Latest(slot) => {
                *slot.lock() = Some(batch);
                Ok(())
            }
        }
    }

    /// Blocking publish: waits until the queue has room. This is how
    /// replay backpressure reaches the producer.
    pub fn publish(&self, batch: FeedBatch) -> Result<(), HandoffError> {
        match &self.inner {
            SenderInner::Bounded(tx) => {
                tx.send(batch).map_err(|_| HandoffError::Disconnected)
            }
            SenderInner::Latest(slot) => {
                *slot.lock() = Some(batch);
                Ok(())
            }
        }
    }

    /// Blocking publish bounded by `timeout`; the batch is handed back on
    /// expiry so the producer can re-check its cancel signal.
    pub fn publish_timeout(
        &self,
        batch: FeedBatch,
        timeout: Duration,
    ) -> Result<(), TryPublishError> {
        match &self.inner {
            SenderInner::Bounded(tx) => match tx.send_timeout(batch, timeout) {
                Ok(()) => Ok(()),
                Err(SendTimeoutError::Timeout(b)) => Err(TryPublishError::Full(b)),
                Err(SendTimeoutError::Disconnected(_)) => Err(TryPublishError::Disconnected),
            },
            SenderInner::Latest(slot) => {
                *slot.lock() = Some(batch);
                Ok(())
            }
        }
    }
}

impl BatchReceiver {
    /// Dequeue the next batch, preferring a previously deferred one.
    pub fn try_take(&mut self) -> Option<FeedBatch> {
        if let Some(batch) = self.deferred.take() {
            return Some(batch);
        }
        match &self.inner {
            ReceiverInner::Bounded(rx) => rx.try_recv().ok(),
            ReceiverInner::Latest(slot) => slot.lock().take(),
        }
    }

    /// Hand a dequeued batch back for a later tick (replay skip-and-retry).
    /// At most one batch can be deferred at a time.
    pub fn defer(&mut self, batch: FeedBatch) {
        debug_assert!(self.deferred.is_none(), "a batch is already deferred");
        self.deferred = Some(batch);
    }

    /// True when neither the queue nor the defer slot holds a batch.
    pub fn is_empty(&self) -> bool {
        if self.deferred.is_some() {
            return false;
        }
        match &self.inner {
            ReceiverInner::Bounded(rx) => rx.is_empty(),
            ReceiverInner::Latest(slot) => slot.lock().is_none(),
        }
    }

    /// Discard everything buffered, returning the number of batches
    /// dropped. Called on connector shutdown so no stale data survives.
    pub fn drain(&mut self) -> usize {
        let mut dropped = usize::from(self.deferred.take().is_some());
        match &self.inner {
            ReceiverInner::Bounded(rx) => {
                while rx.try_recv().is_ok() {
                    dropped += 1;
                }
            }
            ReceiverInner::Latest(slot) => {
                if slot.lock().take().is_some() {
                    dropped += 1;
                }
            }
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn test_batch(offset: i64) -> FeedBatch {
        FeedBatch::new(offset, 0.0, Vec::new())
    }

    #[test]
    fn bounded_preserves_fifo_order() {
        let (tx, mut rx) = HandoffQueue::bounded(5);
        for i in 0..3 {
            tx.publish(test_batch(i)).unwrap();
        }
        for i in 0..3 {
            assert_eq!(rx.try_take().unwrap().logical_offset, i);
        }
        assert!(rx.try_take().is_none());
    }

    #[test]
    fn bounded_sixth_publish_blocks_until_pop() {
        let (tx, mut rx) = HandoffQueue::bounded(5);
        for i in 0..5 {
            tx.publish(test_batch(i)).unwrap();
        }
        // Queue full: a non-blocking attempt hands the batch back.
        match tx.try_publish(test_batch(5)) {
            Err(TryPublishError::Full(b)) => assert_eq!(b.logical_offset, 5),
            other => panic!("expected Full, got {other:?}"),
        }

        // A blocking publish completes only after the consumer pops one.
        let producer = thread::spawn(move || {
            tx.publish(test_batch(5)).unwrap();
        });
        thread::sleep(Duration::from_millis(50));
        assert_eq!(rx.try_take().unwrap().logical_offset, 0);
        producer.join().unwrap();

        // No data loss: offsets 1..=5 all arrive in order.
        for i in 1..=5 {
            assert_eq!(rx.try_take().unwrap().logical_offset, i);
        }
    }

    #[test]
    fn publish_timeout_returns_batch_when_full() {
        let (tx, _rx) = HandoffQueue::bounded(1);
        tx.publish(test_batch(0)).unwrap();
        match tx.publish_timeout(test_batch(1), Duration::from_millis(10)) {
            Err(TryPublishError::Full(b)) => assert_eq!(b.logical_offset, 1),
            other => panic!("expected Full, got {other:?}"),
        }
    }

    #[test]
    fn latest_keeps_only_newest() {
        let (tx, mut rx) = HandoffQueue::latest();
        tx.publish(test_batch(1)).unwrap();
        tx.publish(test_batch(2)).unwrap();
        tx.publish(test_batch(3)).unwrap();
        assert_eq!(rx.try_take().unwrap().logical_offset, 3);
        assert!(rx.try_take().is_none());
    }

    #[test]
    fn deferred_batch_comes_back_first() {
        let (tx, mut rx) = HandoffQueue::bounded(5);
        tx.publish(test_batch(10)).unwrap();
        tx.publish(test_batch(20)).unwrap();
        let head = rx.try_take().unwrap();
        rx.defer(head);
        assert!(!rx.is_empty());
        assert_eq!(rx.try_take().unwrap().logical_offset, 10);
        assert_eq!(rx.try_take().unwrap().logical_offset, 20);
    }

    #[test]
    fn drain_discards_everything() {
        let (tx, mut rx) = HandoffQueue::bounded(5);
        for i in 0..4 {
            tx.publish(test_batch(i)).unwrap();
        }
        let head = rx.try_take().unwrap();
        rx.defer(head);
        assert_eq!(rx.drain(), 4);
        assert!(rx.is_empty());
    }

    #[test]
    fn publish_after_receiver_drop_reports_disconnect() {
        let (tx, rx) = HandoffQueue::bounded(1);
        drop(rx);
        assert!(matches!(
            tx.publish(test_batch(0)),
            Err(HandoffError::Disconnected)
        ));
    }
}
