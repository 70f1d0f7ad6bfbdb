//! Permutations with known cycle structure and oracles that misbehave on
//! purpose, for tests.

use std::thread;
use std::time::Duration;

use crate::def::WORKER_THREAD_NAME;
use crate::error::OracleError;
use crate::oracle::{DomainIndex, PermutationTable, TransitionOracle};

/// Cycles of the given lengths laid out as consecutive blocks:
/// `[2, 3]` gives `0 -> 1 -> 0` and `2 -> 3 -> 4 -> 2`.
pub fn permutation_with_cycle_lengths(lengths: &[u64]) -> PermutationTable {
    let n: u64 = lengths.iter().sum();
    let mut succ = Vec::with_capacity(n as usize);
    let mut base = 0u64;
    for &len in lengths {
        for i in 0..len {
            succ.push(base + (i + 1) % len);
        }
        base += len;
    }
    PermutationTable::new(succ).expect("consecutive blocks form a permutation")
}

/// Same cycle structure, members spread over the domain by `index * stride mod n`.
/// `stride` must be coprime with the domain size.
pub fn scattered_permutation(lengths: &[u64], stride: u64) -> PermutationTable {
    let n: u64 = lengths.iter().sum();
    let relabel = |i: u64| ((i as u128 * stride as u128) % n as u128) as u64;
    let mut cycles = Vec::with_capacity(lengths.len());
    let mut base = 0u64;
    for &len in lengths {
        cycles.push((base..base + len).map(relabel).collect::<Vec<_>>());
        base += len;
    }
    PermutationTable::from_cycles(&cycles).expect("stride must be coprime with the domain size")
}

pub fn on_worker_thread() -> bool {
    thread::current()
        .name()
        .is_some_and(|name| name.starts_with(WORKER_THREAD_NAME))
}

/// Panics on pool threads, behaves on any other thread.
pub struct PanicOnWorker<O>(pub O);

impl<O: DomainIndex> DomainIndex for PanicOnWorker<O> {
    type Element = O::Element;

    fn size(&self) -> u64 {
        self.0.size()
    }

    fn to_index(&self, elem: &O::Element) -> u64 {
        self.0.to_index(elem)
    }

    fn from_index(&self, index: u64) -> Result<O::Element, OracleError> {
        self.0.from_index(index)
    }
}

impl<O: TransitionOracle> TransitionOracle for PanicOnWorker<O> {
    fn step(&self, elem: &O::Element) -> Result<O::Element, OracleError> {
        self.0.step(elem)
    }

    fn next(&self, index: u64) -> Result<u64, OracleError> {
        if on_worker_thread() {
            panic!("injected failure at index {}", index);
        }
        self.0.next(index)
    }
}

/// Sleeps for `delay` per transition on pool threads.
pub struct StallOnWorker<O> {
    pub inner: O,
    pub delay: Duration,
}

impl<O: DomainIndex> DomainIndex for StallOnWorker<O> {
    type Element = O::Element;

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn to_index(&self, elem: &O::Element) -> u64 {
        self.inner.to_index(elem)
    }

    fn from_index(&self, index: u64) -> Result<O::Element, OracleError> {
        self.inner.from_index(index)
    }
}

impl<O: TransitionOracle> TransitionOracle for StallOnWorker<O> {
    fn step(&self, elem: &O::Element) -> Result<O::Element, OracleError> {
        self.inner.step(elem)
    }

    fn next(&self, index: u64) -> Result<u64, OracleError> {
        if on_worker_thread() {
            thread::sleep(self.delay);
        }
        self.inner.next(index)
    }
}

/// Indices in `bad` cannot be turned back into elements; transitions still work.
pub struct Unreconstructible<O> {
    inner: O,
    bad: Vec<u64>,
}

impl<O> Unreconstructible<O> {
    pub fn new(inner: O, bad: Vec<u64>) -> Self {
        Self { inner, bad }
    }
}

impl<O: DomainIndex> DomainIndex for Unreconstructible<O> {
    type Element = O::Element;

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn to_index(&self, elem: &O::Element) -> u64 {
        self.inner.to_index(elem)
    }

    fn from_index(&self, index: u64) -> Result<O::Element, OracleError> {
        if self.bad.contains(&index) {
            return Err(OracleError::Reconstruction {
                index,
                reason: "injected".to_string(),
            });
        }
        self.inner.from_index(index)
    }
}

impl<O: TransitionOracle> TransitionOracle for Unreconstructible<O> {
    fn step(&self, elem: &O::Element) -> Result<O::Element, OracleError> {
        self.inner.step(elem)
    }

    fn next(&self, index: u64) -> Result<u64, OracleError> {
        self.inner.next(index)
    }
}
