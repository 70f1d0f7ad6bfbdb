//! Transition oracles: the bijective maps whose orbits are analysed.
//!
//! The engine never looks inside an oracle. It only needs a dense indexing of
//! the domain ([`DomainIndex`]) and the successor of an index
//! ([`TransitionOracle::next`]). Oracles must be deterministic and free of side
//! effects, since every worker calls them concurrently.

pub mod affine;
pub mod lfsr;
pub mod table;

use std::sync::Arc;

use auto_impl::auto_impl;

use crate::error::OracleError;

pub use affine::AffineMap;
pub use lfsr::{GaloisLfsr, LfsrState};
pub use table::PermutationTable;

/// Dense indexing of a finite domain: a total bijection between the domain
/// and `[0, size)`.
#[auto_impl(&, Box, Arc)]
pub trait DomainIndex {
    type Element;

    fn size(&self) -> u64;

    fn to_index(&self, elem: &Self::Element) -> u64;

    /// Rebuilds the element at `index`; fails with
    /// [`OracleError::Reconstruction`] when the index cannot be mapped back.
    fn from_index(&self, index: u64) -> Result<Self::Element, OracleError>;
}

pub trait TransitionOracle: DomainIndex + Send + Sync {
    fn step(&self, elem: &Self::Element) -> Result<Self::Element, OracleError>;

    /// Successor of `index`. Oracles whose elements are plain integers should
    /// override this to skip the element round trip.
    fn next(&self, index: u64) -> Result<u64, OracleError> {
        let elem = self.from_index(index)?;
        let succ = self.step(&elem)?;
        Ok(self.to_index(&succ))
    }
}

// Not derived with auto_impl: `Self::Element` has to resolve to `T::Element`.
impl<T: TransitionOracle + ?Sized> TransitionOracle for &T {
    fn step(&self, elem: &T::Element) -> Result<T::Element, OracleError> {
        (**self).step(elem)
    }

    fn next(&self, index: u64) -> Result<u64, OracleError> {
        (**self).next(index)
    }
}

impl<T: TransitionOracle + ?Sized> TransitionOracle for Box<T> {
    fn step(&self, elem: &T::Element) -> Result<T::Element, OracleError> {
        (**self).step(elem)
    }

    fn next(&self, index: u64) -> Result<u64, OracleError> {
        (**self).next(index)
    }
}

impl<T: TransitionOracle + ?Sized> TransitionOracle for Arc<T> {
    fn step(&self, elem: &T::Element) -> Result<T::Element, OracleError> {
        (**self).step(elem)
    }

    fn next(&self, index: u64) -> Result<u64, OracleError> {
        (**self).next(index)
    }
}

/// Greatest common divisor, used to validate affine multipliers.
pub(crate) fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rotate {
        n: u64,
    }

    impl DomainIndex for Rotate {
        type Element = String;

        fn size(&self) -> u64 {
            self.n
        }

        fn to_index(&self, elem: &String) -> u64 {
            elem.trim_start_matches('e').parse().unwrap_or(u64::MAX)
        }

        fn from_index(&self, index: u64) -> Result<String, OracleError> {
            if index >= self.n {
                return Err(OracleError::Reconstruction {
                    index,
                    reason: "past the end".to_string(),
                });
            }
            Ok(format!("e{}", index))
        }
    }

    impl TransitionOracle for Rotate {
        fn step(&self, elem: &String) -> Result<String, OracleError> {
            self.from_index((self.to_index(elem) + 1) % self.n)
        }
    }

    #[test]
    fn test_default_next_round_trips_elements() {
        let oracle = Rotate { n: 5 };
        assert_eq!(oracle.next(0).unwrap(), 1);
        assert_eq!(oracle.next(4).unwrap(), 0);
        assert!(matches!(
            oracle.next(9),
            Err(OracleError::Reconstruction { index: 9, .. })
        ));
    }

    fn successor<O: TransitionOracle>(oracle: &O, index: u64) -> u64 {
        oracle.next(index).unwrap()
    }

    fn stepped<O: TransitionOracle>(oracle: &O, index: u64) -> u64 {
        let elem = oracle.from_index(index).unwrap();
        oracle.to_index(&oracle.step(&elem).unwrap())
    }

    #[test]
    fn test_forwarding_impls() {
        let shared = Arc::new(Rotate { n: 3 });
        assert_eq!(successor(&shared, 2), 0);
        assert_eq!(stepped(&shared, 1), 2);
        assert_eq!(successor(&&*shared, 1), 2);
        assert_eq!(DomainIndex::size(&&*shared), 3);

        let boxed: Box<dyn TransitionOracle<Element = String>> = Box::new(Rotate { n: 4 });
        assert_eq!(successor(&boxed, 3), 0);
        assert_eq!(stepped(&boxed, 0), 1);
        assert_eq!(boxed.size(), 4);

        let shared_dyn: Arc<dyn TransitionOracle<Element = String>> = shared;
        assert_eq!(successor(&shared_dyn, 0), 1);
    }

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(12, 18), 6);
        assert_eq!(gcd(7, 16), 1);
        assert_eq!(gcd(0, 5), 5);
    }
}
