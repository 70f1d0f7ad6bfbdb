use std::time::Duration;

use crate::cycle::CanonicalKey;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("OracleError: cannot reconstruct element from index {index}: {reason}")]
    Reconstruction { index: u64, reason: String },

    #[error("OracleError: transition failed at index {index}: {reason}")]
    Computation { index: u64, reason: String },

    #[error("OracleError: {from} -> {to} leaves the domain of size {size}")]
    OutOfDomain { from: u64, to: u64, size: u64 },

    #[error("OracleError: invalid parameters: {0}")]
    InvalidParameters(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WalkError {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    // a tail runs into the cycle, which a bijection cannot have
    #[error("WalkError: orbit of {start} re-entered at {repeated} instead of closing")]
    NotACycle { start: u64, repeated: u64 },

    #[error("WalkError: orbit of {start} did not close within {limit} steps")]
    StepLimit { start: u64, limit: u64 },

    #[error("WalkError: cancelled")]
    Cancelled,
}

/// A failure confined to one work unit. The unit is abandoned, the worker moves on.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("worker {worker_id} abandoned unit [{unit_start}; {unit_len}): {source}")]
pub struct WorkerError {
    pub worker_id: usize,
    pub unit_start: u64,
    pub unit_len: u64,
    pub source: WalkError,
}

/// Pool-wide failures. The supervisor reruns the analysis sequentially and
/// records the reason; the caller only sees one when fallback is disabled.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParallelFailure {
    #[error("worker panicked or crashed ({panics} panics)")]
    WorkerPanicOrCrash { panics: usize },

    #[error("global timeout after {elapsed:?}")]
    GlobalTimeout { elapsed: Duration },

    #[error("producer thread could not be started: {0}")]
    ProducerFailed(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("AnalysisError: domain size must be positive")]
    EmptyDomain,

    #[error("AnalysisError: worker count must be positive")]
    NoWorkers,

    /// `worker_errors` holds the abandoned units that may explain a short sum.
    #[error(
        "AnalysisError: period sum {actual} != domain size {expected} \
         ({cycles} cycles, {errors} worker errors)",
        errors = .worker_errors.len()
    )]
    DeduplicationInvariantViolation {
        expected: u64,
        actual: u64,
        cycles: usize,
        worker_errors: Vec<WorkerError>,
    },

    #[error("AnalysisError: {key} reported with periods {first} and {second}")]
    ConflictingPeriods {
        key: CanonicalKey,
        first: u64,
        second: u64,
    },

    #[error("AnalysisError: invalid cycle record from worker {worker_id}: {reason}")]
    InvalidCycleRecord { worker_id: usize, reason: String },

    #[error("AnalysisError: parallel run failed and fallback is disabled: {0}")]
    ParallelFailed(ParallelFailure),
}
