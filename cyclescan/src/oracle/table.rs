use crate::error::OracleError;

use super::{DomainIndex, TransitionOracle};

/// An explicit successor table, validated as a permutation of `[0, n)`.
#[derive(Debug, Clone)]
pub struct PermutationTable {
    succ: Vec<u64>,
}

impl PermutationTable {
    pub fn new(succ: Vec<u64>) -> Result<Self, OracleError> {
        if succ.is_empty() {
            return Err(OracleError::InvalidParameters("empty table".to_string()));
        }
        let n = succ.len() as u64;
        let mut hit = vec![false; succ.len()];
        for (i, &s) in succ.iter().enumerate() {
            if s >= n {
                return Err(OracleError::InvalidParameters(format!(
                    "{} -> {} leaves [0, {})",
                    i, s, n
                )));
            }
            if hit[s as usize] {
                return Err(OracleError::InvalidParameters(format!(
                    "{} has two preimages",
                    s
                )));
            }
            hit[s as usize] = true;
        }
        Ok(Self { succ })
    }

    /// Builds the permutation mapping each listed cycle `[a, b, c]` to
    /// `a -> b -> c -> a`. The cycles must cover `[0, n)` exactly once.
    pub fn from_cycles(cycles: &[Vec<u64>]) -> Result<Self, OracleError> {
        let n: usize = cycles.iter().map(|c| c.len()).sum();
        let mut succ = vec![u64::MAX; n];
        for cycle in cycles {
            for (pos, &member) in cycle.iter().enumerate() {
                let target = cycle[(pos + 1) % cycle.len()];
                let slot = succ.get_mut(member as usize).ok_or_else(|| {
                    OracleError::InvalidParameters(format!("member {} outside [0, {})", member, n))
                })?;
                if *slot != u64::MAX {
                    return Err(OracleError::InvalidParameters(format!(
                        "member {} listed twice",
                        member
                    )));
                }
                *slot = target;
            }
        }
        Self::new(succ)
    }
}

impl DomainIndex for PermutationTable {
    type Element = u64;

    fn size(&self) -> u64 {
        self.succ.len() as u64
    }

    fn to_index(&self, elem: &u64) -> u64 {
        *elem
    }

    fn from_index(&self, index: u64) -> Result<u64, OracleError> {
        if index >= self.size() {
            return Err(OracleError::Reconstruction {
                index,
                reason: "outside the table".to_string(),
            });
        }
        Ok(index)
    }
}

impl TransitionOracle for PermutationTable {
    fn step(&self, elem: &u64) -> Result<u64, OracleError> {
        self.next(*elem)
    }

    fn next(&self, index: u64) -> Result<u64, OracleError> {
        self.succ
            .get(index as usize)
            .copied()
            .ok_or(OracleError::Computation {
                index,
                reason: "outside the table".to_string(),
            })
    }
}
