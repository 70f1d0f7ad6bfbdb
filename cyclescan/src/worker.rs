//! Workers walk the orbits of the start indices they are given.
//!
//! Each worker owns a private visited set; nothing about visitation is shared
//! between workers. Cycles that straddle partitions are therefore found by
//! every worker owning one of their members, and deduplicated by the merger.
//!
//! State machine:
//!
//! ```text
//! Idle -> Fetching -> Walking -> Emitting -> Fetching ... -> Done
//!                  \-> Draining (sentinel seen, local batches left) -> Done
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam::channel::Sender;
use log::{debug, trace, warn};
use serde::Serialize;

use crate::config::Config;
use crate::cycle::Cycle;
use crate::error::{WalkError, WorkerError};
use crate::oracle::TransitionOracle;
use crate::partition::WorkUnit;
use crate::utils::intset::IntSet;
use crate::utils::queue::{PullBuffer, Pulled, QueueItem, QueueReceiver};
use crate::walker::Walker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Fetching,
    Walking,
    Emitting,
    Draining,
    Done,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub units: u64,
    pub pulls: u64,
    /// Start indices examined
    pub starts: u64,
    /// Starts skipped because a previous walk of this worker covered them
    pub skipped: u64,
    pub walks: u64,
    pub oracle_calls: u64,
    pub cycles_emitted: u64,
    pub errors: u64,
}

impl WorkerStats {
    pub fn merge(&mut self, other: &WorkerStats) {
        self.units += other.units;
        self.pulls += other.pulls;
        self.starts += other.starts;
        self.skipped += other.skipped;
        self.walks += other.walks;
        self.oracle_calls += other.oracle_calls;
        self.cycles_emitted += other.cycles_emitted;
        self.errors += other.errors;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Cycle { worker_id: usize, cycle: Cycle },
    Error(WorkerError),
    /// Last event of a worker that ran to completion
    Done { worker_id: usize, stats: WorkerStats },
}

enum UnitOutcome {
    Completed,
    Abandoned,
    Stop,
}

pub struct Worker<O: TransitionOracle + ?Sized> {
    id: usize,
    oracle: Arc<O>,
    config: Config,
    cancel: Arc<AtomicBool>,
    events: Sender<WorkerEvent>,
    visited: IntSet,
    state: WorkerState,
    stats: WorkerStats,
}

impl<O: TransitionOracle + ?Sized> Worker<O> {
    pub fn new(
        id: usize,
        oracle: Arc<O>,
        config: &Config,
        cancel: Arc<AtomicBool>,
        events: Sender<WorkerEvent>,
    ) -> Self {
        Self {
            id,
            oracle,
            config: config.clone(),
            cancel,
            events,
            visited: IntSet::unbounded(),
            state: WorkerState::Idle,
            stats: WorkerStats::default(),
        }
    }

    /// Only remember visited indices in `[lo, hi)`.
    pub fn with_bounds(mut self, lo: u64, hi: u64) -> Self {
        self.visited = IntSet::bounded(lo, hi);
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    fn set_state(&mut self, state: WorkerState) {
        if self.state == state {
            return;
        }
        match state {
            WorkerState::Walking | WorkerState::Emitting => {
                trace!("worker {}: {:?} -> {:?}", self.id, self.state, state)
            }
            _ => debug!("worker {}: {:?} -> {:?}", self.id, self.state, state),
        }
        self.state = state;
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Static mode: walk every start of `range`, in sub-units of `chunk`
    /// indices, so a failing start only costs its own chunk.
    pub fn run_range(mut self, range: WorkUnit, chunk: u64) -> WorkerStats {
        for unit in range.chunks(chunk) {
            self.set_state(WorkerState::Fetching);
            if let UnitOutcome::Stop = self.process_unit(&unit) {
                break;
            }
        }
        self.finish()
    }

    /// Dynamic mode: pull up to `pull_count` batches at a time until a
    /// sentinel arrives, the queue closes or the run is cancelled.
    pub fn run_queue(mut self, queue: QueueReceiver, pull_count: usize) -> WorkerStats {
        let mut local = PullBuffer::new();
        let mut sentinel = false;
        'pull: while !sentinel && !self.cancelled() {
            self.set_state(WorkerState::Fetching);
            match queue.pull(&mut local, pull_count, self.config.pull_timeout) {
                Pulled::Items(n) => {
                    self.stats.pulls += 1;
                    metrics::histogram!("cyclescan.worker.pull_size").record(n as f64);
                }
                Pulled::Empty => continue,
                Pulled::Closed => break,
            }
            sentinel = local.iter().any(|item| *item == QueueItem::Sentinel);
            let pending = local.len() - usize::from(sentinel);
            if sentinel && pending > 0 {
                self.set_state(WorkerState::Draining);
            }
            for item in local.drain(..) {
                if let QueueItem::Unit(unit) = item {
                    if let UnitOutcome::Stop = self.process_unit(&unit) {
                        break 'pull;
                    }
                }
            }
        }
        self.finish()
    }

    fn process_unit(&mut self, unit: &WorkUnit) -> UnitOutcome {
        self.stats.units += 1;
        let oracle = self.oracle.clone();
        let cancel = self.cancel.clone();
        let walker = Walker::from_config(&*oracle, &self.config).with_cancel(&cancel);
        for start in unit.indices() {
            if self.cancelled() {
                return UnitOutcome::Stop;
            }
            self.stats.starts += 1;
            if self.visited.has(start) {
                self.stats.skipped += 1;
                continue;
            }
            if let Err(err) = oracle.from_index(start) {
                return self.abandon(unit, err.into());
            }
            let draining = self.state == WorkerState::Draining;
            self.set_state(WorkerState::Walking);
            let visited = &mut self.visited;
            let walk = walker.walk(start, |index| {
                visited.add(index);
            });
            match walk {
                Ok(walk) => {
                    self.stats.walks += 1;
                    self.stats.oracle_calls += walk.oracle_calls;
                    self.set_state(WorkerState::Emitting);
                    let cycle = Cycle::from_walk(
                        walk,
                        self.config.small_cycle_threshold,
                        self.config.large_cycle_key,
                    );
                    let event = WorkerEvent::Cycle {
                        worker_id: self.id,
                        cycle,
                    };
                    if self.events.send(event).is_err() {
                        return UnitOutcome::Stop;
                    }
                    self.stats.cycles_emitted += 1;
                }
                Err(WalkError::Cancelled) => return UnitOutcome::Stop,
                Err(err) => return self.abandon(unit, err),
            }
            if draining {
                self.set_state(WorkerState::Draining);
            }
        }
        UnitOutcome::Completed
    }

    fn abandon(&mut self, unit: &WorkUnit, source: WalkError) -> UnitOutcome {
        self.stats.errors += 1;
        let error = WorkerError {
            worker_id: self.id,
            unit_start: unit.first().unwrap_or_default(),
            unit_len: unit.len(),
            source,
        };
        warn!("{}", error);
        metrics::counter!("cyclescan.worker.errors").increment(1);
        if self.events.send(WorkerEvent::Error(error)).is_err() {
            return UnitOutcome::Stop;
        }
        UnitOutcome::Abandoned
    }

    fn finish(mut self) -> WorkerStats {
        self.set_state(WorkerState::Done);
        metrics::counter!("cyclescan.worker.oracle_calls").increment(self.stats.oracle_calls);
        metrics::counter!("cyclescan.worker.cycles_emitted").increment(self.stats.cycles_emitted);
        if self.cancelled() {
            debug!("worker {} cancelled: {:?}", self.id, self.stats);
        } else {
            let done = WorkerEvent::Done {
                worker_id: self.id,
                stats: self.stats,
            };
            // a closed channel means nobody waits for us any more
            let _ = self.events.send(done);
        }
        self.stats
    }
}
