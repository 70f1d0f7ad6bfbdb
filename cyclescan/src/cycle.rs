//! Cycle records and their canonical identity.
//!
//! Every worker closes orbits independently, so the same cycle can be reported
//! several times from different starting elements. The merger unifies such
//! reports by [`CanonicalKey`]:
//!
//! - `MinMember(m)`: the numerically smallest index on the cycle. Two reports
//!   of the same cycle always agree on it, whichever member they started from.
//! - `Discovery { start, period }`: the start of discovery plus the period.
//!   Cheaper to justify for huge cycles, but two workers that enter the same
//!   cycle at different points produce two different keys. The merger then sees
//!   a period sum larger than the domain and reports a
//!   [`DeduplicationInvariantViolation`](crate::error::AnalysisError).
//!
//! Cycles with period up to the small-cycle threshold are always keyed by
//! their minimal member.

use std::fmt;

use byteorder::{BigEndian, WriteBytesExt};
use serde::Serialize;

use crate::config::LargeCycleKey;
use crate::walker::Walk;

const TAG_MIN_MEMBER: u8 = 0;
const TAG_DISCOVERY: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum CanonicalKey {
    MinMember(u64),
    Discovery { start: u64, period: u64 },
}

impl CanonicalKey {
    pub fn for_walk(walk: &Walk, small_cycle_threshold: u64, large: LargeCycleKey) -> Self {
        if walk.period <= small_cycle_threshold || large == LargeCycleKey::MinMember {
            CanonicalKey::MinMember(walk.min_member)
        } else {
            CanonicalKey::Discovery {
                start: walk.start,
                period: walk.period,
            }
        }
    }

    /// Tagged big-endian byte form: `0 ‖ min` or `1 ‖ start ‖ period`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(17);
        // writes into a Vec cannot fail
        let _ = match *self {
            CanonicalKey::MinMember(min) => buf
                .write_u8(TAG_MIN_MEMBER)
                .and_then(|_| buf.write_u64::<BigEndian>(min)),
            CanonicalKey::Discovery { start, period } => buf
                .write_u8(TAG_DISCOVERY)
                .and_then(|_| buf.write_u64::<BigEndian>(start))
                .and_then(|_| buf.write_u64::<BigEndian>(period)),
        };
        buf
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalKey::MinMember(min) => write!(f, "min:{}", min),
            CanonicalKey::Discovery { start, period } => write!(f, "start:{}/period:{}", start, period),
        }
    }
}

/// A closed orbit. Immutable once emitted by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cycle {
    /// Minimal member of the cycle
    pub representative: u64,
    pub period: u64,
    pub canonical_key: CanonicalKey,
    /// Members in orbit order starting at `representative`, kept for small
    /// cycles or when full sequences are requested
    pub sampled_members: Option<Vec<u64>>,
}

impl Cycle {
    pub fn from_walk(walk: Walk, small_cycle_threshold: u64, large: LargeCycleKey) -> Self {
        let canonical_key = CanonicalKey::for_walk(&walk, small_cycle_threshold, large);
        let sampled_members = walk.sequence.map(|mut seq| {
            if let Some(pos) = seq.iter().position(|&i| i == walk.min_member) {
                seq.rotate_left(pos);
            }
            seq
        });
        Self {
            representative: walk.min_member,
            period: walk.period,
            canonical_key,
            sampled_members,
        }
    }

    /// Checks the record against itself: members, period and key must agree.
    pub fn validate(&self, domain_size: u64) -> Result<(), String> {
        if self.period == 0 || self.period > domain_size {
            return Err(format!("period {} outside [1, {}]", self.period, domain_size));
        }
        if self.representative >= domain_size {
            return Err(format!("representative {} outside domain", self.representative));
        }
        match self.canonical_key {
            CanonicalKey::MinMember(min) if min != self.representative => {
                return Err(format!("key {} does not match representative {}", min, self.representative));
            }
            CanonicalKey::Discovery { period, .. } if period != self.period => {
                return Err(format!("key period {} does not match period {}", period, self.period));
            }
            _ => {}
        }
        if let Some(members) = &self.sampled_members {
            if members.len() as u64 != self.period {
                return Err(format!("{} members for period {}", members.len(), self.period));
            }
            if members.first() != Some(&self.representative) {
                return Err("members do not start at the representative".to_string());
            }
            if members.iter().any(|&m| m < self.representative) {
                return Err("a member is smaller than the representative".to_string());
            }
        }
        Ok(())
    }
}
