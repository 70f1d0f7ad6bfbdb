//! CycleScan finds the complete cycle decomposition of a permutation on a
//! finite domain, in parallel.
//!
//! # Overview
//! The permutation is given as a [`TransitionOracle`]: a deterministic
//! successor function over a domain indexed densely as `[0, N)`. The engine
//! walks the orbit of every index exactly once per worker that owns it,
//! merges the cycles the workers report and checks that the periods add up to
//! `N`.
//!
//! # Architecture
//! - [`Supervisor`]: validates the run, picks a partitioning mode, starts the
//!   workers on a persistent [`PoolManager`] and watches them for panics and
//!   the global timeout. Failed parallel runs are redone sequentially.
//! - Partitioning: `Static` assigns one contiguous range per worker; `Dynamic`
//!   streams batches through a bounded queue fed by a producer thread.
//! - [`Worker`](worker::Worker): walks every unvisited start in its units
//!   with a private visited set and emits one record per closed orbit.
//! - [`Walker`](walker::Walker): enumeration, Floyd or Brent period finding.
//! - [`Merger`](merger::Merger): deduplicates records by [`CanonicalKey`] and
//!   enforces the partition invariant `sum(periods) == N`.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use cyclescan::{Config, GaloisLfsr, Supervisor};
//!
//! let lfsr = GaloisLfsr::maximal(20).unwrap();
//! let supervisor = Supervisor::new(Config::default());
//! let result = supervisor.analyze(Arc::new(lfsr)).unwrap();
//! assert_eq!(result.periods(), vec![1, (1 << 20) - 1]);
//! ```

#![allow(clippy::too_many_arguments)]
pub mod config;
pub mod cycle;
pub mod def;
pub mod error;
pub mod merger;
pub mod oracle;
pub mod partition;
pub mod pool;
pub mod supervisor;
pub mod utils;
pub mod walker;
pub mod worker;

// for test
pub mod test_helper;

pub use config::{Algorithm, Config, LargeCycleKey, Mode};
pub use cycle::{CanonicalKey, Cycle};
pub use error::{AnalysisError, OracleError, ParallelFailure, WalkError, WorkerError};
pub use merger::{AnalysisResult, Execution, RunStats};
pub use oracle::{AffineMap, DomainIndex, GaloisLfsr, PermutationTable, TransitionOracle};
pub use pool::PoolManager;
pub use supervisor::Supervisor;
pub use walker::{cross_check, CrossCheck};
