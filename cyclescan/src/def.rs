//! Constants shared across the engine.
//!
//! Defaults for the [`Config`](crate::config::Config) knobs live here, along
//! with the fixed parameters of the pipeline:
//! - work queue capacity and dynamic batch sizing
//! - aggregated pull counts
//! - the small/large cycle threshold
//! - producer, worker and supervisor timing
//! - mode probing and thread names

use std::sync::atomic::Ordering;
use std::time::Duration;

pub const SC: Ordering = Ordering::SeqCst;

// bounded work queue, in batches
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

pub const MIN_BATCH_SIZE: u64 = 100;
pub const MAX_BATCH_SIZE: u64 = 1000;

// batches taken per non-blocking aggregation round
pub const MIN_PULL_COUNT: usize = 2;
pub const MAX_PULL_COUNT: usize = 8;
const PULL_BUDGET: u64 = 2000; // elements per aggregation round

/// Cycles up to this period keep their members and are keyed by the minimal member.
pub const SMALL_CYCLE_THRESHOLD: u64 = 100;

pub const PUSH_TIMEOUT: Duration = Duration::from_secs(10);
pub const PULL_TIMEOUT: Duration = Duration::from_millis(200);
pub const SUPERVISOR_TICK: Duration = Duration::from_millis(20);
pub const GLOBAL_TIMEOUT: Duration = Duration::from_secs(600);

pub const CANCEL_CHECK_INTERVAL: u64 = 256;

pub const PROBE_COUNT: u64 = 8;
pub const PROBE_STEP_LIMIT: u64 = 1 << 16;

pub const WORKER_THREAD_NAME: &str = "cyclescan-worker";
pub const PRODUCER_THREAD_NAME: &str = "cyclescan-producer";

/// Batch size for a domain of `n` elements: `isqrt(n)` clamped to
/// `[MIN_BATCH_SIZE, MAX_BATCH_SIZE]`, never larger than the domain itself.
pub fn adaptive_batch_size(n: u64) -> u64 {
    let root = n.isqrt();
    root.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE).min(n).max(1)
}

/// Number of batches a worker tries to take per non-blocking round.
/// Small batches are aggregated more aggressively.
pub fn adaptive_pull_count(batch_size: u64) -> usize {
    let count = PULL_BUDGET / batch_size.max(1);
    (count as usize).clamp(MIN_PULL_COUNT, MAX_PULL_COUNT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adaptive_batch_size() {
        assert_eq!(adaptive_batch_size(1), 1);
        assert_eq!(adaptive_batch_size(16), 16);
        assert_eq!(adaptive_batch_size(5_000), 100);
        assert_eq!(adaptive_batch_size(250_000), 500);
        assert_eq!(adaptive_batch_size(1 << 40), 1000);
    }

    #[test]
    fn test_adaptive_pull_count() {
        assert_eq!(adaptive_pull_count(1), MAX_PULL_COUNT);
        assert_eq!(adaptive_pull_count(100), MAX_PULL_COUNT);
        assert_eq!(adaptive_pull_count(500), 4);
        assert_eq!(adaptive_pull_count(1000), MIN_PULL_COUNT);
    }
}
