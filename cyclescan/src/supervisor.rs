//! Runs an analysis on the worker pool and watches it.
//!
//! The supervisor partitions the domain, starts one worker per partition (or
//! a producer plus workers in dynamic mode) and merges the events they send
//! back. It polls every [`SUPERVISOR_TICK`] for worker panics and for the
//! global timeout. On either, the run is cancelled, its pool is abandoned and,
//! if the config allows it, the run is redone sequentially on the calling
//! thread.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam::channel::{unbounded, RecvTimeoutError};
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::config::{available_workers, Algorithm, Config, Mode};
use crate::def::{PROBE_COUNT, PROBE_STEP_LIMIT, SUPERVISOR_TICK};
use crate::error::{AnalysisError, ParallelFailure, WalkError};
use crate::merger::{AnalysisResult, Execution, Merger, RunStats};
use crate::oracle::TransitionOracle;
use crate::partition::{static_ranges, Producer, WorkUnit};
use crate::pool::PoolManager;
use crate::utils::queue;
use crate::walker::Walker;
use crate::worker::Worker;

pub struct Supervisor {
    config: Config,
    pool: Arc<PoolManager>,
    // one analysis at a time per supervisor
    run_lock: Mutex<()>,
}

impl Supervisor {
    /// A supervisor with its own pool of `config.workers` threads.
    pub fn new(config: Config) -> Self {
        let pool = Arc::new(PoolManager::new(config.workers));
        Self::with_pool(config, pool)
    }

    pub fn with_pool(config: Config, pool: Arc<PoolManager>) -> Self {
        Self {
            config,
            pool,
            run_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &Arc<PoolManager> {
        &self.pool
    }

    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    /// Finds every cycle of the permutation.
    pub fn analyze<O>(&self, oracle: Arc<O>) -> Result<AnalysisResult, AnalysisError>
    where
        O: TransitionOracle + ?Sized + 'static,
    {
        let _guard = self.run_lock.lock();
        let started = Instant::now();
        let n = oracle.size();
        let workers = self.effective_workers(n)?;
        let mode = match self.config.mode {
            Mode::Auto => choose_mode(&*oracle, n, workers),
            mode => mode,
        };
        info!(
            "analysing {} elements: {} workers, {} mode, {} walk",
            n,
            workers,
            mode,
            self.config.algorithm.resolve()
        );

        match self.run_parallel(&oracle, n, workers, mode, started) {
            Ok((merger, mut stats)) => {
                stats.execution = Execution::Parallel { mode };
                stats.elapsed = started.elapsed();
                merger.finalize(stats)
            }
            Err(reason) => {
                warn!("parallel analysis failed: {}", reason);
                if !self.config.fallback {
                    return Err(AnalysisError::ParallelFailed(reason));
                }
                metrics::counter!("cyclescan.supervisor.fallbacks").increment(1);
                warn!("falling back to a sequential pass");
                let (merger, mut stats) = self.run_sequential(oracle, n);
                stats.execution = Execution::Fallback { mode, reason };
                stats.elapsed = started.elapsed();
                merger.finalize(stats)
            }
        }
    }

    /// Single-threaded reference run on the calling thread.
    pub fn analyze_sequential<O>(&self, oracle: Arc<O>) -> Result<AnalysisResult, AnalysisError>
    where
        O: TransitionOracle + ?Sized,
    {
        let _guard = self.run_lock.lock();
        let started = Instant::now();
        let n = oracle.size();
        if n == 0 {
            return Err(AnalysisError::EmptyDomain);
        }
        let (merger, mut stats) = self.run_sequential(oracle, n);
        stats.elapsed = started.elapsed();
        merger.finalize(stats)
    }

    fn effective_workers(&self, n: u64) -> Result<usize, AnalysisError> {
        if n == 0 {
            return Err(AnalysisError::EmptyDomain);
        }
        if self.config.workers == 0 {
            return Err(AnalysisError::NoWorkers);
        }
        let cap = usize::try_from(n).unwrap_or(usize::MAX);
        Ok(self
            .config
            .workers
            .min(available_workers())
            .min(self.pool.size())
            .min(cap)
            .max(1))
    }

    fn run_parallel<O>(
        &self,
        oracle: &Arc<O>,
        n: u64,
        workers: usize,
        mode: Mode,
        started: Instant,
    ) -> Result<(Merger, RunStats), ParallelFailure>
    where
        O: TransitionOracle + ?Sized + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let (event_tx, event_rx) = unbounded();
        let panicked = Arc::new(AtomicUsize::new(0));
        let batch_size = self.config.batch_size_for(n);
        let mut producer = None;
        let mut high_water = None;

        match mode {
            Mode::Dynamic => {
                let (sender, receiver) = queue::new(self.config.queue_capacity);
                high_water = Some(sender.high_water_handle());
                let handle = Producer::new(
                    sender,
                    n,
                    batch_size,
                    workers,
                    cancel.clone(),
                    self.config.push_timeout,
                )
                .spawn()
                .map_err(|e| ParallelFailure::ProducerFailed(e.to_string()))?;
                producer = Some(handle);
                let pull_count = self.config.pull_count_for(batch_size);
                for id in 0..workers {
                    let worker = Worker::new(id, oracle.clone(), &self.config, cancel.clone(), event_tx.clone());
                    let receiver = receiver.clone();
                    self.pool.execute_counted(&panicked, move || {
                        worker.run_queue(receiver, pull_count);
                    });
                }
            }
            Mode::Static | Mode::Auto => {
                for (id, range) in static_ranges(n, workers).into_iter().enumerate() {
                    let mut worker = Worker::new(id, oracle.clone(), &self.config, cancel.clone(), event_tx.clone());
                    if let WorkUnit::Range { start, end } = range {
                        worker = worker.with_bounds(start, end);
                    }
                    self.pool.execute_counted(&panicked, move || {
                        worker.run_range(range, batch_size);
                    });
                }
            }
        }
        drop(event_tx);

        let mut merger = Merger::new(n);
        let mut done = 0;
        let outcome = loop {
            match event_rx.recv_timeout(SUPERVISOR_TICK) {
                Ok(event) => {
                    if merger.handle(event).is_some() {
                        done += 1;
                        if done == workers {
                            break Ok(());
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    // every worker is gone without reporting completion
                    let panics = panicked.load(Ordering::SeqCst);
                    break Err(ParallelFailure::WorkerPanicOrCrash { panics });
                }
            }
            let panics = panicked.load(Ordering::SeqCst);
            if panics > 0 {
                break Err(ParallelFailure::WorkerPanicOrCrash { panics });
            }
            let elapsed = started.elapsed();
            if elapsed >= self.config.global_timeout {
                break Err(ParallelFailure::GlobalTimeout { elapsed });
            }
        };

        if let Err(reason) = outcome {
            cancel.store(true, Ordering::SeqCst);
            // stuck workers keep their threads; later runs get new ones
            self.pool.abandon();
            // the producer is left to notice the cancellation on its own
            return Err(reason);
        }

        let mut stats = RunStats {
            workers,
            ..RunStats::default()
        };
        if let Some(handle) = producer {
            let report = handle
                .join()
                .map_err(|_| ParallelFailure::ProducerFailed("producer panicked".to_string()))?;
            stats.batches = report.batches;
            stats.queue_timeouts = report.queue_timeouts;
        }
        if let Some(high_water) = high_water {
            stats.queue_high_water = high_water.load(Ordering::SeqCst);
        }
        debug!("parallel run finished: {} cycles merged", merger.cycle_count());
        Ok((merger, stats))
    }

    fn run_sequential<O>(&self, oracle: Arc<O>, n: u64) -> (Merger, RunStats)
    where
        O: TransitionOracle + ?Sized,
    {
        let (event_tx, event_rx) = unbounded();
        let chunk = self.config.batch_size_for(n);
        Worker::new(0, oracle, &self.config, Arc::default(), event_tx)
            .with_bounds(0, n)
            .run_range(WorkUnit::Range { start: 0, end: n }, chunk);
        let mut merger = Merger::new(n);
        for event in event_rx.try_iter() {
            merger.handle(event);
        }
        let stats = RunStats {
            execution: Execution::Sequential,
            workers: 1,
            ..RunStats::default()
        };
        (merger, stats)
    }
}

/// Picks a partitioning mode from a few short probe walks.
///
/// Static ranges suit domains dominated by long cycles: the orbits are
/// walked once per partition anyway and need no queue. Many short cycles
/// favour dynamic batches, which balance uneven partitions.
pub fn choose_mode<O>(oracle: &O, n: u64, workers: usize) -> Mode
where
    O: TransitionOracle + ?Sized,
{
    if workers <= 1 {
        return Mode::Static;
    }
    let long = n / (2 * workers as u64);
    let limit = long.saturating_add(1).min(PROBE_STEP_LIMIT);
    let probes = PROBE_COUNT.min(n);
    let walker = Walker::new(oracle, Algorithm::Enumeration).with_step_limit(limit);
    let (mut measured, mut long_hits) = (0u64, 0u64);
    for k in 0..probes {
        let start = k * (n / probes);
        match walker.measure_period(start) {
            Ok((period, _)) => {
                measured += 1;
                if period > long {
                    long_hits += 1;
                }
            }
            Err(WalkError::StepLimit { .. }) => {
                measured += 1;
                long_hits += 1;
            }
            Err(_) => {}
        }
    }
    let mode = if measured > 0 && long_hits * 2 >= measured {
        Mode::Static
    } else {
        Mode::Dynamic
    };
    debug!("probed {} starts, {} long: {} mode", measured, long_hits, mode);
    mode
}
