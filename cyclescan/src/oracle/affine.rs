use crate::error::OracleError;

use super::{gcd, DomainIndex, TransitionOracle};

/// `i -> (a * i + c) mod n`, a bijection exactly when `gcd(a, n) == 1`.
///
/// Affine maps scatter their cycles across the whole index range, which makes
/// them a good stress case for static partitioning: almost every cycle has
/// members in several ranges.
#[derive(Debug, Clone, Copy)]
pub struct AffineMap {
    size: u64,
    multiplier: u64,
    increment: u64,
}

impl AffineMap {
    pub fn new(size: u64, multiplier: u64, increment: u64) -> Result<Self, OracleError> {
        if size == 0 {
            return Err(OracleError::InvalidParameters("empty domain".to_string()));
        }
        let multiplier = multiplier % size;
        if gcd(multiplier, size) != 1 {
            return Err(OracleError::InvalidParameters(format!(
                "multiplier {} shares a factor with {}",
                multiplier, size
            )));
        }
        Ok(Self {
            size,
            multiplier,
            increment: increment % size,
        })
    }
}

impl DomainIndex for AffineMap {
    type Element = u64;

    fn size(&self) -> u64 {
        self.size
    }

    fn to_index(&self, elem: &u64) -> u64 {
        *elem
    }

    fn from_index(&self, index: u64) -> Result<u64, OracleError> {
        if index >= self.size {
            return Err(OracleError::Reconstruction {
                index,
                reason: format!("outside [0, {})", self.size),
            });
        }
        Ok(index)
    }
}

impl TransitionOracle for AffineMap {
    fn step(&self, elem: &u64) -> Result<u64, OracleError> {
        self.next(*elem)
    }

    fn next(&self, index: u64) -> Result<u64, OracleError> {
        let v = (self.multiplier as u128 * index as u128 + self.increment as u128) % self.size as u128;
        Ok(v as u64)
    }
}
