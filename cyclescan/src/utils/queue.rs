//! Bounded work queue shared by the producer and the dynamic workers.
//!
//! The queue is a bounded crossbeam channel, so its capacity is enforced
//! atomically by the channel itself; it is the only backpressure mechanism.
//! The sender also keeps a high-water mark of resident items.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError};
use smallvec::SmallVec;

use crate::def::MAX_PULL_COUNT;
use crate::partition::WorkUnit;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
    Unit(WorkUnit),
    /// No more units; one per worker
    Sentinel,
}

pub type PullBuffer = SmallVec<[QueueItem; MAX_PULL_COUNT]>;

/// Outcome of one aggregated pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pulled {
    Items(usize),
    /// Nothing arrived within the timeout
    Empty,
    /// All senders are gone and the queue is drained
    Closed,
}

pub struct QueueSender {
    sender: Sender<QueueItem>,
    capacity: usize,
    high_water: Arc<AtomicUsize>,
}

#[derive(Clone)]
pub struct QueueReceiver {
    receiver: Receiver<QueueItem>,
}

/// Creates a queue holding at most `capacity` items (at least one).
pub fn new(capacity: usize) -> (QueueSender, QueueReceiver) {
    let capacity = capacity.max(1);
    let (sender, receiver) = bounded(capacity);
    let tx = QueueSender {
        sender,
        capacity,
        high_water: Arc::new(AtomicUsize::new(0)),
    };
    (tx, QueueReceiver { receiver })
}

impl QueueSender {
    /// Blocks for at most `timeout` while the queue is full.
    pub fn push_timeout(
        &self,
        item: QueueItem,
        timeout: Duration,
    ) -> Result<(), SendTimeoutError<QueueItem>> {
        self.sender.send_timeout(item, timeout)?;
        self.high_water.fetch_max(self.sender.len(), Ordering::SeqCst);
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.sender.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }

    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }

    pub fn high_water_handle(&self) -> Arc<AtomicUsize> {
        self.high_water.clone()
    }
}

impl QueueReceiver {
    /// Takes up to `max` items without blocking. If none is available, blocks
    /// for one item for at most `timeout`. Stops right after a sentinel, so a
    /// worker never takes more than one.
    pub fn pull(&self, out: &mut PullBuffer, max: usize, timeout: Duration) -> Pulled {
        let mut taken = 0;
        while taken < max.max(1) {
            match self.receiver.try_recv() {
                Ok(item) => {
                    taken += 1;
                    let last = item == QueueItem::Sentinel;
                    out.push(item);
                    if last {
                        return Pulled::Items(taken);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return if taken > 0 {
                        Pulled::Items(taken)
                    } else {
                        Pulled::Closed
                    };
                }
            }
        }
        if taken > 0 {
            return Pulled::Items(taken);
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(item) => {
                out.push(item);
                Pulled::Items(1)
            }
            Err(RecvTimeoutError::Timeout) => Pulled::Empty,
            Err(RecvTimeoutError::Disconnected) => Pulled::Closed,
        }
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(i: u64) -> QueueItem {
        QueueItem::Unit(WorkUnit::Batch(vec![i]))
    }

    #[test]
    fn test_capacity_is_enforced() {
        let (tx, rx) = new(2);
        let t = Duration::from_millis(10);
        tx.push_timeout(unit(0), t).unwrap();
        tx.push_timeout(unit(1), t).unwrap();
        assert!(matches!(
            tx.push_timeout(unit(2), t),
            Err(SendTimeoutError::Timeout(_))
        ));
        assert_eq!(tx.len(), 2);
        assert_eq!(tx.high_water(), 2);
        assert_eq!(rx.len(), 2);
    }

    #[test]
    fn test_pull_aggregates_and_stops_at_sentinel() {
        let (tx, rx) = new(10);
        let t = Duration::from_millis(10);
        for i in 0..3 {
            tx.push_timeout(unit(i), t).unwrap();
        }
        tx.push_timeout(QueueItem::Sentinel, t).unwrap();
        tx.push_timeout(QueueItem::Sentinel, t).unwrap();

        let mut buf = PullBuffer::new();
        assert_eq!(rx.pull(&mut buf, 2, t), Pulled::Items(2));
        buf.clear();
        assert_eq!(rx.pull(&mut buf, 8, t), Pulled::Items(2));
        assert_eq!(buf[1], QueueItem::Sentinel);
        buf.clear();
        assert_eq!(rx.pull(&mut buf, 8, t), Pulled::Items(1));
        assert_eq!(buf[0], QueueItem::Sentinel);
    }

    #[test]
    fn test_pull_timeout_and_close() {
        let (tx, rx) = new(1);
        let mut buf = PullBuffer::new();
        assert_eq!(rx.pull(&mut buf, 4, Duration::from_millis(5)), Pulled::Empty);
        tx.push_timeout(unit(7), Duration::from_millis(5)).unwrap();
        drop(tx);
        assert_eq!(rx.pull(&mut buf, 4, Duration::from_millis(5)), Pulled::Items(1));
        buf.clear();
        assert_eq!(rx.pull(&mut buf, 4, Duration::from_millis(5)), Pulled::Closed);
        assert!(buf.is_empty());
    }
}
