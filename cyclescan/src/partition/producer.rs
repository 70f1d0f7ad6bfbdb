use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::SendTimeoutError;
use log::{debug, warn};

use super::BatchIter;
use crate::def::PRODUCER_THREAD_NAME;
use crate::utils::queue::{QueueItem, QueueSender};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerReport {
    pub batches: u64,
    pub queue_timeouts: u64,
    /// Stopped by cancellation or because every worker went away
    pub stopped: bool,
}

/// Feeds dynamic workers: generates batches lazily, pushes them through the
/// bounded queue, then pushes one sentinel per worker.
pub struct Producer {
    sender: QueueSender,
    batches: BatchIter,
    sentinels: usize,
    stop: Arc<AtomicBool>,
    push_timeout: Duration,
}

impl Producer {
    pub fn new(
        sender: QueueSender,
        domain_size: u64,
        batch_size: u64,
        sentinels: usize,
        stop: Arc<AtomicBool>,
        push_timeout: Duration,
    ) -> Self {
        Self {
            sender,
            batches: BatchIter::new(domain_size, batch_size),
            sentinels,
            stop,
            push_timeout,
        }
    }

    pub fn spawn(self) -> io::Result<JoinHandle<ProducerReport>> {
        thread::Builder::new()
            .name(PRODUCER_THREAD_NAME.to_string())
            .spawn(move || self.run())
    }

    pub fn run(mut self) -> ProducerReport {
        let mut report = ProducerReport::default();
        while let Some(unit) = self.batches.next() {
            if !self.push(QueueItem::Unit(unit), &mut report) {
                return report;
            }
            report.batches += 1;
        }
        for _ in 0..self.sentinels {
            if !self.push(QueueItem::Sentinel, &mut report) {
                return report;
            }
        }
        debug!(
            "producer done: {} batches, {} queue timeouts, high water {}/{}",
            report.batches,
            report.queue_timeouts,
            self.sender.high_water(),
            self.sender.capacity()
        );
        report
    }

    // retries on a full queue until the item is taken or the run is over
    fn push(&self, mut item: QueueItem, report: &mut ProducerReport) -> bool {
        loop {
            if self.stop.load(Ordering::SeqCst) {
                debug!("producer stopped after {} batches", report.batches);
                report.stopped = true;
                return false;
            }
            match self.sender.push_timeout(item, self.push_timeout) {
                Ok(()) => {
                    metrics::gauge!("cyclescan.queue.high_water").set(self.sender.high_water() as f64);
                    return true;
                }
                Err(SendTimeoutError::Timeout(back)) => {
                    report.queue_timeouts += 1;
                    metrics::counter!("cyclescan.producer.queue_timeouts").increment(1);
                    warn!(
                        "work queue full for {:?} ({} batches resident), retrying",
                        self.push_timeout,
                        self.sender.len()
                    );
                    item = back;
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    debug!("producer stopped: no worker left");
                    report.stopped = true;
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::WorkUnit;
    use crate::utils::queue::{self, PullBuffer, Pulled};

    #[test]
    fn test_produces_batches_then_sentinels() {
        let (tx, rx) = queue::new(100);
        let stop = Arc::new(AtomicBool::new(false));
        let report = Producer::new(tx, 10, 4, 3, stop, Duration::from_millis(10)).run();
        assert_eq!(
            report,
            ProducerReport {
                batches: 3,
                queue_timeouts: 0,
                stopped: false
            }
        );
        let mut buf = PullBuffer::new();
        let mut units = Vec::new();
        let mut sentinels = 0;
        while rx.pull(&mut buf, 8, Duration::from_millis(10)) != Pulled::Closed {
            for item in buf.drain(..) {
                match item {
                    QueueItem::Unit(unit) => units.push(unit),
                    QueueItem::Sentinel => sentinels += 1,
                }
            }
        }
        assert_eq!(sentinels, 3);
        assert_eq!(units.last(), Some(&WorkUnit::Batch(vec![8, 9])));
        let total: u64 = units.iter().map(|u| u.len()).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn test_full_queue_times_out_and_stops() {
        let (tx, rx) = queue::new(1);
        let stop = Arc::new(AtomicBool::new(false));
        let producer = Producer::new(tx, 100, 1, 1, stop.clone(), Duration::from_millis(5));
        let handle = producer.spawn().unwrap();
        thread::sleep(Duration::from_millis(50));
        stop.store(true, Ordering::SeqCst);
        let report = handle.join().unwrap();
        assert!(report.stopped);
        assert_eq!(report.batches, 1);
        assert!(report.queue_timeouts > 0);
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn test_stops_when_receivers_are_gone() {
        let (tx, rx) = queue::new(1);
        drop(rx);
        let stop = Arc::new(AtomicBool::new(false));
        let report = Producer::new(tx, 100, 10, 2, stop, Duration::from_millis(5)).run();
        assert!(report.stopped);
        assert_eq!(report.batches, 0);
    }
}
