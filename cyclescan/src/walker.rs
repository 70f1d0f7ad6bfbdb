//! Sequential cycle walker.
//!
//! Walks the orbit of one start index until it closes. Three interchangeable
//! algorithms measure the period:
//!
//! - **Enumeration**: step forward until the start recurs. One oracle call per
//!   step, and it visits every member on the way.
//! - **Floyd**: tortoise and hare at speeds 1 and 2, then a second phase from
//!   the start locates the cycle entry (which must be the start itself for a
//!   bijection) and a third measures the period. About 4x the oracle calls of
//!   enumeration, O(1) space.
//! - **Brent**: power-of-two teleporting tortoise. About 3x the oracle calls.
//!
//! [`Walker::walk`] adds a member pass for Floyd and Brent (one more period of
//! oracle calls) so that every algorithm reports the same [`Walk`]: period,
//! minimal member and, when requested, the members in orbit order.
//!
//! A bijection on `N` elements has no cycle longer than `N`, so an orbit that
//! has not closed after `N` steps has a tail, which is reported as
//! [`WalkError::NotACycle`] instead of looping forever.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::config::{Algorithm, Config};
use crate::def::CANCEL_CHECK_INTERVAL;
use crate::error::{OracleError, WalkError};
use crate::oracle::TransitionOracle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Walk {
    pub start: u64,
    pub period: u64,
    pub min_member: u64,
    /// Members in orbit order from `start`
    pub sequence: Option<Vec<u64>>,
    pub oracle_calls: u64,
}

pub struct Walker<'a, O: TransitionOracle + ?Sized> {
    oracle: &'a O,
    size: u64,
    algorithm: Algorithm,
    small_cycle_threshold: u64,
    full_sequence: bool,
    step_limit: Option<u64>,
    cancel: Option<&'a AtomicBool>,
}

impl<'a, O: TransitionOracle + ?Sized> Walker<'a, O> {
    pub fn new(oracle: &'a O, algorithm: Algorithm) -> Self {
        Self {
            oracle,
            size: oracle.size(),
            algorithm: algorithm.resolve(),
            small_cycle_threshold: 0,
            full_sequence: false,
            step_limit: None,
            cancel: None,
        }
    }

    pub fn from_config(oracle: &'a O, config: &Config) -> Self {
        Self::new(oracle, config.algorithm)
            .with_members(config.small_cycle_threshold, config.full_sequence)
    }

    /// Keep members of cycles up to `small_cycle_threshold`, or of every cycle
    /// when `full_sequence` is set.
    pub fn with_members(mut self, small_cycle_threshold: u64, full_sequence: bool) -> Self {
        self.small_cycle_threshold = small_cycle_threshold;
        self.full_sequence = full_sequence;
        self
    }

    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = Some(limit);
        self
    }

    pub fn with_cancel(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    #[inline]
    fn succ(&self, index: u64, calls: &mut u64) -> Result<u64, WalkError> {
        *calls += 1;
        let next = self.oracle.next(index)?;
        if next >= self.size {
            return Err(OracleError::OutOfDomain {
                from: index,
                to: next,
                size: self.size,
            }
            .into());
        }
        Ok(next)
    }

    #[inline]
    fn tick(&self, start: u64, steps: u64) -> Result<(), WalkError> {
        if let Some(limit) = self.step_limit {
            if steps > limit {
                return Err(WalkError::StepLimit { start, limit });
            }
        }
        if steps % CANCEL_CHECK_INTERVAL == 0 {
            if let Some(cancel) = self.cancel {
                if cancel.load(Ordering::Relaxed) {
                    return Err(WalkError::Cancelled);
                }
            }
        }
        Ok(())
    }

    /// Period of the orbit through `start`, with the oracle calls it took.
    pub fn measure_period(&self, start: u64) -> Result<(u64, u64), WalkError> {
        let mut calls = 0;
        let period = match self.algorithm {
            Algorithm::Floyd => self.floyd(start, &mut calls)?,
            Algorithm::Brent => self.brent(start, &mut calls)?,
            Algorithm::Enumeration | Algorithm::Auto => self.enumerate(start, &mut calls)?,
        };
        Ok((period, calls))
    }

    /// Closes the orbit through `start`, calling `visit` once per member.
    pub fn walk<F: FnMut(u64)>(&self, start: u64, visit: F) -> Result<Walk, WalkError> {
        match self.algorithm {
            Algorithm::Floyd | Algorithm::Brent => {
                let (period, calls) = self.measure_period(start)?;
                let mut walk = self.trace(start, Some(period), visit)?;
                walk.oracle_calls += calls;
                Ok(walk)
            }
            Algorithm::Enumeration | Algorithm::Auto => self.trace(start, None, visit),
        }
    }

    fn enumerate(&self, start: u64, calls: &mut u64) -> Result<u64, WalkError> {
        let mut x = self.succ(start, calls)?;
        let mut steps = 1u64;
        while x != start {
            self.tick(start, steps)?;
            if steps >= self.size {
                return Err(WalkError::NotACycle { start, repeated: x });
            }
            x = self.succ(x, calls)?;
            steps += 1;
        }
        Ok(steps)
    }

    fn floyd(&self, start: u64, calls: &mut u64) -> Result<u64, WalkError> {
        // phase 1: find a meeting point inside the cycle
        let mut tortoise = self.succ(start, calls)?;
        let mut hare = self.succ(start, calls)?;
        hare = self.succ(hare, calls)?;
        let mut steps = 1u64;
        while tortoise != hare {
            self.tick(start, steps)?;
            tortoise = self.succ(tortoise, calls)?;
            hare = self.succ(hare, calls)?;
            hare = self.succ(hare, calls)?;
            steps += 1;
        }
        // phase 2: the cycle entry is `mu` steps from the start
        tortoise = start;
        while tortoise != hare {
            tortoise = self.succ(tortoise, calls)?;
            hare = self.succ(hare, calls)?;
        }
        if tortoise != start {
            return Err(WalkError::NotACycle {
                start,
                repeated: tortoise,
            });
        }
        // phase 3: period
        let mut period = 1u64;
        hare = self.succ(tortoise, calls)?;
        while tortoise != hare {
            self.tick(start, period)?;
            hare = self.succ(hare, calls)?;
            period += 1;
        }
        Ok(period)
    }

    fn brent(&self, start: u64, calls: &mut u64) -> Result<u64, WalkError> {
        let mut power = 1u64;
        let mut period = 1u64;
        let mut tortoise = start;
        let mut hare = self.succ(start, calls)?;
        let mut steps = 1u64;
        while tortoise != hare {
            self.tick(start, steps)?;
            if power == period {
                tortoise = hare;
                power *= 2;
                period = 0;
            }
            hare = self.succ(hare, calls)?;
            period += 1;
            steps += 1;
        }
        // hare runs `period` ahead; they meet at the cycle entry
        tortoise = start;
        hare = start;
        for _ in 0..period {
            hare = self.succ(hare, calls)?;
        }
        while tortoise != hare {
            tortoise = self.succ(tortoise, calls)?;
            hare = self.succ(hare, calls)?;
        }
        if tortoise != start {
            return Err(WalkError::NotACycle {
                start,
                repeated: tortoise,
            });
        }
        Ok(period)
    }

    // member pass; with `known_period` the orbit must close exactly there
    fn trace<F: FnMut(u64)>(
        &self,
        start: u64,
        known_period: Option<u64>,
        mut visit: F,
    ) -> Result<Walk, WalkError> {
        let mut calls = 0u64;
        let mut sequence = Some(Vec::new());
        let mut min_member = start;
        let mut x = start;
        let mut steps = 0u64;
        loop {
            visit(x);
            min_member = min_member.min(x);
            if let Some(seq) = sequence.as_mut() {
                seq.push(x);
                if !self.full_sequence && seq.len() as u64 > self.small_cycle_threshold {
                    sequence = None;
                }
            }
            x = self.succ(x, &mut calls)?;
            steps += 1;
            if x == start {
                break;
            }
            self.tick(start, steps)?;
            if steps >= self.size || known_period == Some(steps) {
                return Err(WalkError::NotACycle { start, repeated: x });
            }
        }
        if known_period.is_some_and(|p| p != steps) {
            return Err(WalkError::NotACycle { start, repeated: x });
        }
        Ok(Walk {
            start,
            period: steps,
            min_member,
            sequence,
            oracle_calls: calls,
        })
    }
}

/// Periods reported by every algorithm for one start.
#[derive(Debug, Clone)]
pub struct CrossCheck {
    pub start: u64,
    pub enumeration: Result<u64, WalkError>,
    pub floyd: Result<u64, WalkError>,
    pub brent: Result<u64, WalkError>,
}

impl CrossCheck {
    pub fn agrees(&self) -> bool {
        match (&self.enumeration, &self.floyd, &self.brent) {
            (Ok(a), Ok(b), Ok(c)) => a == b && b == c,
            _ => false,
        }
    }
}

/// Measures every start with all three algorithms, in parallel.
pub fn cross_check<O: TransitionOracle + ?Sized>(oracle: &O, starts: &[u64]) -> Vec<CrossCheck> {
    starts
        .par_iter()
        .map(|&start| {
            let period = |algorithm| {
                Walker::new(oracle, algorithm)
                    .measure_period(start)
                    .map(|(period, _)| period)
            };
            CrossCheck {
                start,
                enumeration: period(Algorithm::Enumeration),
                floyd: period(Algorithm::Floyd),
                brent: period(Algorithm::Brent),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OracleError;
    use crate::oracle::{DomainIndex, GaloisLfsr, PermutationTable};
    use crate::test_helper::permutation_with_cycle_lengths;

    const ALGORITHMS: [Algorithm; 3] = [Algorithm::Enumeration, Algorithm::Floyd, Algorithm::Brent];

    /// 0 -> 1 -> 2 -> 3 -> 1: a tail of length one into a 3-cycle.
    struct Rho;

    impl DomainIndex for Rho {
        type Element = u64;

        fn size(&self) -> u64 {
            4
        }

        fn to_index(&self, elem: &u64) -> u64 {
            *elem
        }

        fn from_index(&self, index: u64) -> Result<u64, OracleError> {
            Ok(index)
        }
    }

    impl TransitionOracle for Rho {
        fn step(&self, elem: &u64) -> Result<u64, OracleError> {
            Ok(if *elem == 3 { 1 } else { elem + 1 })
        }
    }

    #[test]
    fn test_algorithms_agree_on_every_start() {
        let table = permutation_with_cycle_lengths(&[1, 1, 2, 4, 8, 13]);
        let starts: Vec<u64> = (0..table.size()).collect();
        let checks = cross_check(&table, &starts);
        assert_eq!(checks.len(), starts.len());
        for check in checks {
            assert!(check.agrees(), "{:?}", check);
        }
    }

    #[test]
    fn test_periods_on_lfsr() {
        let lfsr = GaloisLfsr::maximal(10).unwrap();
        for algorithm in ALGORITHMS {
            let walker = Walker::new(&lfsr, algorithm);
            assert_eq!(walker.measure_period(0).unwrap().0, 1);
            assert_eq!(walker.measure_period(1).unwrap().0, 1023);
            assert_eq!(walker.measure_period(777).unwrap().0, 1023);
        }
    }

    #[test]
    fn test_oracle_call_costs() {
        let lfsr = GaloisLfsr::maximal(12).unwrap();
        let (_, enumeration) = Walker::new(&lfsr, Algorithm::Enumeration).measure_period(5).unwrap();
        let (_, floyd) = Walker::new(&lfsr, Algorithm::Floyd).measure_period(5).unwrap();
        let (_, brent) = Walker::new(&lfsr, Algorithm::Brent).measure_period(5).unwrap();
        assert_eq!(enumeration, 4095);
        assert!(floyd >= 2 * enumeration && floyd <= 5 * enumeration);
        assert!(brent > enumeration && brent <= 5 * enumeration);
    }

    #[test]
    fn test_walk_reports_members() {
        let table = PermutationTable::from_cycles(&[vec![0], vec![5, 2, 7, 1], vec![3, 4, 6]]).unwrap();
        for algorithm in ALGORITHMS {
            let mut visited = Vec::new();
            let walk = Walker::new(&table, algorithm)
                .with_members(10, false)
                .walk(7, |i| visited.push(i))
                .unwrap();
            assert_eq!(walk.period, 4);
            assert_eq!(walk.min_member, 1);
            assert_eq!(walk.sequence, Some(vec![7, 1, 5, 2]));
            assert_eq!(visited, vec![7, 1, 5, 2]);
        }
    }

    #[test]
    fn test_large_cycles_drop_members() {
        let lfsr = GaloisLfsr::maximal(8).unwrap();
        let walk = Walker::new(&lfsr, Algorithm::Enumeration)
            .with_members(100, false)
            .walk(3, |_| {})
            .unwrap();
        assert_eq!(walk.period, 255);
        assert_eq!(walk.min_member, 1);
        assert!(walk.sequence.is_none());

        let walk = Walker::new(&lfsr, Algorithm::Brent)
            .with_members(100, true)
            .walk(3, |_| {})
            .unwrap();
        assert_eq!(walk.sequence.map(|s| s.len()), Some(255));
    }

    #[test]
    fn test_tails_are_detected() {
        for algorithm in ALGORITHMS {
            let err = Walker::new(&Rho, algorithm).measure_period(0).unwrap_err();
            assert!(matches!(err, WalkError::NotACycle { start: 0, .. }), "{:?}", err);
            // points on the cycle itself are fine
            assert_eq!(Walker::new(&Rho, algorithm).measure_period(2).unwrap().0, 3);
        }
        let err = Walker::new(&Rho, Algorithm::Enumeration).walk(0, |_| {}).unwrap_err();
        assert!(matches!(err, WalkError::NotACycle { start: 0, .. }));
    }

    #[test]
    fn test_step_limit_and_cancel() {
        let lfsr = GaloisLfsr::maximal(16).unwrap();
        let err = Walker::new(&lfsr, Algorithm::Enumeration)
            .with_step_limit(1000)
            .measure_period(1)
            .unwrap_err();
        assert_eq!(err, WalkError::StepLimit { start: 1, limit: 1000 });

        let cancel = AtomicBool::new(true);
        let err = Walker::new(&lfsr, Algorithm::Floyd)
            .with_cancel(&cancel)
            .measure_period(1)
            .unwrap_err();
        assert_eq!(err, WalkError::Cancelled);
    }

    #[test]
    fn test_out_of_domain_successor() {
        let table = PermutationTable::new(vec![1, 0]).unwrap();
        struct Leaky(PermutationTable);
        impl DomainIndex for Leaky {
            type Element = u64;
            fn size(&self) -> u64 {
                self.0.size()
            }
            fn to_index(&self, elem: &u64) -> u64 {
                *elem
            }
            fn from_index(&self, index: u64) -> Result<u64, OracleError> {
                Ok(index)
            }
        }
        impl TransitionOracle for Leaky {
            fn step(&self, elem: &u64) -> Result<u64, OracleError> {
                Ok(if *elem == 1 { 9 } else { self.0.next(*elem)? })
            }
        }
        let err = Walker::new(&Leaky(table), Algorithm::Enumeration)
            .measure_period(0)
            .unwrap_err();
        assert_eq!(
            err,
            WalkError::Oracle(OracleError::OutOfDomain { from: 1, to: 9, size: 2 })
        );
    }
}
