//! Configuration for a cycle analysis.
//!
//! A [`Config`] is immutable for the duration of one analysis. Every choice
//! it encodes (partitioning mode, walking algorithm, key policy) is resolved
//! once per run, never per call.
//!
//! # Tuning
//!
//! ## Partitioning
//! - `mode`: `Static` splits `[0, N)` into one contiguous range per worker and
//!   needs no coordination, but load can be skewed by a few long cycles.
//!   `Dynamic` streams small batches through a bounded queue and balances load
//!   automatically. `Auto` probes the domain and picks one.
//! - `batch_size`: elements per dynamic batch (`None` = adaptive, 100 to 1000)
//! - `queue_capacity`: maximum batches resident in the queue. Together with
//!   the batch size this bounds queue memory regardless of `N`.
//!
//! ## Walking
//! - `algorithm`: `Enumeration` (default) costs one oracle call per step.
//!   `Floyd` and `Brent` need O(1) space but 2.5x to 4x more oracle calls.
//! - `full_sequence`: keep every member of every cycle (O(N) memory in total)
//!
//! ## Timeouts
//! - `push_timeout`: how long the producer blocks on a full queue before
//!   logging a queue timeout and retrying
//! - `pull_timeout`: how long an idle worker blocks for the next batch
//! - `global_timeout`: budget for the parallel run; when exceeded the analysis
//!   is rerun sequentially (if `fallback` is enabled)

#![allow(clippy::too_many_arguments)]

use std::time::Duration;

use serde::Serialize;
use strum::{Display, EnumString};

use crate::def::{
    adaptive_batch_size, adaptive_pull_count, DEFAULT_QUEUE_CAPACITY, GLOBAL_TIMEOUT, PULL_TIMEOUT,
    PUSH_TIMEOUT, SMALL_CYCLE_THRESHOLD,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
pub enum Mode {
    Static,
    Dynamic,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
pub enum Algorithm {
    Enumeration,
    Floyd,
    Brent,
    Auto,
}

impl Algorithm {
    /// `Auto` walks by enumeration: it already needs O(1) extra space when
    /// only periods are requested, and it is the cheapest in oracle calls.
    pub fn resolve(self) -> Self {
        match self {
            Algorithm::Auto => Algorithm::Enumeration,
            other => other,
        }
    }
}

/// Key policy for cycles longer than the small-cycle threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
pub enum LargeCycleKey {
    MinMember,
    Discovery,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Number of parallel workers (clamped to available parallelism)
    pub workers: usize,
    pub mode: Mode,
    pub algorithm: Algorithm,
    /// Elements per dynamic batch, `None` for adaptive sizing
    pub batch_size: Option<u64>,
    pub queue_capacity: usize,
    /// Batches per non-blocking pull, `None` for adaptive
    pub pull_count: Option<usize>,
    pub full_sequence: bool,
    pub small_cycle_threshold: u64,
    pub large_cycle_key: LargeCycleKey,
    pub push_timeout: Duration,
    pub pull_timeout: Duration,
    pub global_timeout: Duration,
    /// Rerun sequentially when the parallel run crashes or times out
    pub fallback: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: available_workers(),
            mode: Mode::Auto,
            algorithm: Algorithm::Auto,
            batch_size: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            pull_count: None,
            full_sequence: false,
            small_cycle_threshold: SMALL_CYCLE_THRESHOLD,
            large_cycle_key: LargeCycleKey::MinMember,
            push_timeout: PUSH_TIMEOUT,
            pull_timeout: PULL_TIMEOUT,
            global_timeout: GLOBAL_TIMEOUT,
            fallback: true,
        }
    }
}

impl Config {
    pub fn new(
        workers: usize,
        mode: Mode,
        algorithm: Algorithm,
        batch_size: Option<u64>,
        queue_capacity: usize,
        full_sequence: bool,
        small_cycle_threshold: u64,
        large_cycle_key: LargeCycleKey,
        global_timeout: Duration,
        fallback: bool,
    ) -> Self {
        Self {
            workers,
            mode,
            algorithm,
            batch_size,
            queue_capacity,
            full_sequence,
            small_cycle_threshold,
            large_cycle_key,
            global_timeout,
            fallback,
            ..Config::default()
        }
    }

    pub fn from_workers(workers: usize) -> Self {
        Config {
            workers,
            ..Config::default()
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_full_sequence(mut self, full_sequence: bool) -> Self {
        self.full_sequence = full_sequence;
        self
    }

    pub fn with_large_cycle_key(mut self, key: LargeCycleKey) -> Self {
        self.large_cycle_key = key;
        self
    }

    pub fn with_global_timeout(mut self, timeout: Duration) -> Self {
        self.global_timeout = timeout;
        self
    }

    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn batch_size_for(&self, domain_size: u64) -> u64 {
        match self.batch_size {
            Some(size) => size.clamp(1, domain_size.max(1)),
            None => adaptive_batch_size(domain_size),
        }
    }

    pub fn pull_count_for(&self, batch_size: u64) -> usize {
        self.pull_count
            .unwrap_or_else(|| adaptive_pull_count(batch_size))
            .max(1)
    }
}

pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
