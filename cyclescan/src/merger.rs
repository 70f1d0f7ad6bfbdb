//! Merges the cycle records streamed by the workers into one result.
//!
//! The merger is the only place where reports from different workers meet.
//! Records are unified by canonical key, so a cycle found by several workers
//! is counted once. When the run is over the period sum must equal the domain
//! size exactly; anything else means a cycle was missed or double counted.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::time::Duration;

use log::{debug, error};

use crate::config::Mode;
use crate::cycle::{CanonicalKey, Cycle};
use crate::error::{AnalysisError, ParallelFailure, WorkerError};
use crate::worker::{WorkerEvent, WorkerStats};

/// How a result was produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Execution {
    Parallel {
        mode: Mode,
    },
    #[default]
    Sequential,
    /// The parallel run failed and was redone on the calling thread
    Fallback {
        mode: Mode,
        reason: ParallelFailure,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub execution: Execution,
    pub workers: usize,
    pub elapsed: Duration,
    /// Totals over all workers that finished
    pub walkers: WorkerStats,
    /// Records discarded because another worker reported the same cycle
    pub duplicates: u64,
    pub batches: u64,
    pub queue_timeouts: u64,
    pub queue_high_water: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub domain_size: u64,
    pub cycles: BTreeMap<CanonicalKey, Cycle>,
    pub period_sum: u64,
    pub max_period: u64,
    pub errors: Vec<WorkerError>,
    pub stats: RunStats,
}

impl AnalysisResult {
    pub fn canonical_cycle_count(&self) -> usize {
        self.cycles.len()
    }

    /// All periods, ascending.
    pub fn periods(&self) -> Vec<u64> {
        let mut periods: Vec<u64> = self.cycles.values().map(|c| c.period).collect();
        periods.sort_unstable();
        periods
    }

    /// Number of cycles per period.
    pub fn period_histogram(&self) -> BTreeMap<u64, u64> {
        let mut histogram = BTreeMap::new();
        for cycle in self.cycles.values() {
            *histogram.entry(cycle.period).or_insert(0) += 1;
        }
        histogram
    }

    /// `(key, period)` pairs in key order; equal for runs that found the same cycles.
    pub fn signature(&self) -> Vec<(CanonicalKey, u64)> {
        self.cycles.iter().map(|(k, c)| (*k, c.period)).collect()
    }
}

pub struct Merger {
    domain_size: u64,
    cycles: BTreeMap<CanonicalKey, Cycle>,
    period_sum: u64,
    max_period: u64,
    duplicates: u64,
    errors: Vec<WorkerError>,
    walkers: WorkerStats,
    // first record that could not be merged
    rejected: Option<AnalysisError>,
}

impl Merger {
    pub fn new(domain_size: u64) -> Self {
        Self {
            domain_size,
            cycles: BTreeMap::new(),
            period_sum: 0,
            max_period: 0,
            duplicates: 0,
            errors: Vec::new(),
            walkers: WorkerStats::default(),
            rejected: None,
        }
    }

    /// Consumes one worker event; returns the worker id when it reports completion.
    pub fn handle(&mut self, event: WorkerEvent) -> Option<usize> {
        match event {
            WorkerEvent::Cycle { worker_id, cycle } => {
                self.accept(worker_id, cycle);
                None
            }
            WorkerEvent::Error(err) => {
                self.record_error(err);
                None
            }
            WorkerEvent::Done { worker_id, stats } => {
                self.walkers.merge(&stats);
                Some(worker_id)
            }
        }
    }

    /// Returns `true` if the cycle was new.
    pub fn accept(&mut self, worker_id: usize, cycle: Cycle) -> bool {
        if let Err(reason) = cycle.validate(self.domain_size) {
            self.reject(AnalysisError::InvalidCycleRecord { worker_id, reason });
            return false;
        }
        match self.cycles.entry(cycle.canonical_key) {
            Entry::Occupied(entry) => {
                self.duplicates += 1;
                metrics::counter!("cyclescan.merger.duplicates").increment(1);
                let first = entry.get().period;
                if first != cycle.period {
                    self.reject(AnalysisError::ConflictingPeriods {
                        key: cycle.canonical_key,
                        first,
                        second: cycle.period,
                    });
                }
                false
            }
            Entry::Vacant(entry) => {
                self.period_sum = self.period_sum.saturating_add(cycle.period);
                self.max_period = self.max_period.max(cycle.period);
                entry.insert(cycle);
                true
            }
        }
    }

    pub fn record_error(&mut self, err: WorkerError) {
        self.errors.push(err);
    }

    fn reject(&mut self, err: AnalysisError) {
        error!("{}", err);
        if self.rejected.is_none() {
            self.rejected = Some(err);
        }
    }

    pub fn cycle_count(&self) -> usize {
        self.cycles.len()
    }

    pub fn period_sum(&self) -> u64 {
        self.period_sum
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    /// Checks the partition invariant and builds the result. `stats` is
    /// completed with the walker totals and duplicate count seen here.
    pub fn finalize(self, mut stats: RunStats) -> Result<AnalysisResult, AnalysisError> {
        if let Some(err) = self.rejected {
            return Err(err);
        }
        if self.period_sum != self.domain_size {
            let err = AnalysisError::DeduplicationInvariantViolation {
                expected: self.domain_size,
                actual: self.period_sum,
                cycles: self.cycles.len(),
                worker_errors: self.errors,
            };
            error!("{}", err);
            return Err(err);
        }
        stats.walkers = self.walkers;
        stats.duplicates = self.duplicates;
        debug!(
            "merged {} cycles ({} duplicates, {} worker errors)",
            self.cycles.len(),
            self.duplicates,
            self.errors.len()
        );
        metrics::counter!("cyclescan.merger.cycles").increment(self.cycles.len() as u64);
        Ok(AnalysisResult {
            domain_size: self.domain_size,
            cycles: self.cycles,
            period_sum: self.period_sum,
            max_period: self.max_period,
            errors: self.errors,
            stats,
        })
    }
}
