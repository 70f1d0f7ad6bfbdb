//! Galois Linear Feedback Shift Register as a transition oracle.
//!
//! The register update `s -> (s ^ (s & 1 ? taps : 0)) >> 1` is a bijection on
//! all `2^n` states as long as the tap mask has bit `n` set: odd states land in
//! the upper half of the range, even states in the lower half, and each half is
//! reached injectively. The zero state is always a fixed point.
//!
//! With the maximum-length taps below the non-zero states form a single cycle,
//! so the orbit structure is `{1, 2^n - 1}`.

// Based on: https://www.physics.otago.ac.nz/reports/electronics/ETR2012-1.pdf

use crate::error::OracleError;

use super::{DomainIndex, TransitionOracle};

/// Register contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LfsrState(pub u64);

#[derive(Debug, Clone, Copy)]
pub struct GaloisLfsr {
    bit_count: usize,
    /// Tap positions encoded as a bit mask, bit `bit_count` always set
    taps: u64,
}

/// Tap positions giving maximum-length sequences for 5 to 63 bits.
fn maximal_taps(bit_count: usize) -> Option<(u32, u32, u32, u32)> {
    let pos = match bit_count {
        5 => (5, 4, 3, 2),
        6 => (6, 5, 3, 2),
        7 => (7, 6, 5, 4),
        8 => (8, 6, 5, 4),
        9 => (9, 8, 6, 5),
        10 => (10, 9, 7, 6),
        11 => (11, 10, 9, 7),
        12 => (12, 11, 8, 6),
        13 => (13, 12, 10, 9),
        14 => (14, 13, 11, 9),
        15 => (15, 14, 13, 11),
        16 => (16, 14, 13, 11),
        17 => (17, 16, 15, 14),
        18 => (18, 17, 16, 13),
        19 => (19, 18, 17, 14),
        20 => (20, 19, 16, 14),
        21 => (21, 20, 19, 16),
        22 => (22, 19, 18, 17),
        23 => (23, 22, 20, 18),
        24 => (24, 23, 21, 20),
        25 => (25, 24, 23, 22),
        26 => (26, 25, 24, 20),
        27 => (27, 26, 25, 22),
        28 => (28, 27, 24, 22),
        29 => (29, 28, 27, 25),
        30 => (30, 29, 26, 24),
        31 => (31, 30, 29, 28),
        32 => (32, 30, 26, 25),
        33 => (33, 32, 29, 27),
        34 => (34, 31, 30, 26),
        35 => (35, 34, 28, 27),
        36 => (36, 35, 29, 28),
        37 => (37, 36, 33, 31),
        38 => (38, 37, 33, 32),
        39 => (39, 38, 35, 32),
        40 => (40, 37, 36, 35),
        41 => (41, 40, 39, 38),
        42 => (42, 40, 37, 35),
        43 => (43, 42, 38, 37),
        44 => (44, 42, 39, 38),
        45 => (45, 44, 42, 41),
        46 => (46, 40, 39, 38),
        47 => (47, 46, 43, 42),
        48 => (48, 44, 41, 39),
        49 => (49, 45, 44, 43),
        50 => (50, 48, 47, 46),
        51 => (51, 50, 48, 45),
        52 => (52, 51, 49, 46),
        53 => (53, 52, 51, 47),
        54 => (54, 51, 48, 46),
        55 => (55, 54, 53, 49),
        56 => (56, 54, 52, 49),
        57 => (57, 55, 54, 52),
        58 => (58, 57, 53, 52),
        59 => (59, 57, 55, 52),
        60 => (60, 58, 56, 55),
        61 => (61, 60, 59, 56),
        62 => (62, 59, 57, 56),
        63 => (63, 62, 59, 58),
        _ => return None,
    };
    Some(pos)
}

impl GaloisLfsr {
    /// A register with maximum-length taps, `bit_count` in `[5, 63]`.
    pub fn maximal(bit_count: usize) -> Result<Self, OracleError> {
        let pos = maximal_taps(bit_count).ok_or_else(|| {
            OracleError::InvalidParameters(format!(
                "no maximum-length taps for {} bits",
                bit_count
            ))
        })?;
        let taps = (1u64 << pos.0) | (1u64 << pos.1) | (1u64 << pos.2) | (1u64 << pos.3);
        Self::with_taps(bit_count, taps)
    }

    /// A register with an explicit tap mask, `bit_count` in `[2, 63]`.
    pub fn with_taps(bit_count: usize, taps: u64) -> Result<Self, OracleError> {
        if !(2..=63).contains(&bit_count) {
            return Err(OracleError::InvalidParameters(format!(
                "bit count {} outside [2, 63]",
                bit_count
            )));
        }
        if taps & (1u64 << bit_count) == 0 {
            return Err(OracleError::InvalidParameters(format!(
                "taps {:#x} miss bit {}, the update would not be a bijection",
                taps, bit_count
            )));
        }
        if taps.checked_shr(bit_count as u32 + 1).unwrap_or(0) != 0 {
            return Err(OracleError::InvalidParameters(format!(
                "taps {:#x} exceed {} bits",
                taps, bit_count
            )));
        }
        Ok(Self { bit_count, taps })
    }

    pub fn bit_count(&self) -> usize {
        self.bit_count
    }

    pub fn taps(&self) -> u64 {
        self.taps
    }

    #[inline]
    fn advance(&self, state: u64) -> u64 {
        let taps = if state % 2 == 0 { 0 } else { self.taps };
        (state ^ taps) >> 1
    }
}

impl DomainIndex for GaloisLfsr {
    type Element = LfsrState;

    fn size(&self) -> u64 {
        1u64 << self.bit_count
    }

    fn to_index(&self, elem: &LfsrState) -> u64 {
        elem.0
    }

    fn from_index(&self, index: u64) -> Result<LfsrState, OracleError> {
        if index >= self.size() {
            return Err(OracleError::Reconstruction {
                index,
                reason: format!("state wider than {} bits", self.bit_count),
            });
        }
        Ok(LfsrState(index))
    }
}

impl TransitionOracle for GaloisLfsr {
    fn step(&self, elem: &LfsrState) -> Result<LfsrState, OracleError> {
        Ok(LfsrState(self.advance(elem.0)))
    }

    fn next(&self, index: u64) -> Result<u64, OracleError> {
        Ok(self.advance(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maximal_period() {
        let seed = 1u64;
        for bit_count in 5..17 {
            let lfsr = GaloisLfsr::maximal(bit_count).unwrap();
            let mut state = lfsr.next(seed).unwrap();
            let mut count = 1u64;
            while state != seed {
                state = lfsr.next(state).unwrap();
                count += 1;
            }
            assert_eq!(count, (1u64 << bit_count) - 1, "bit_count={}", bit_count);
        }
    }

    #[test]
    fn test_update_is_a_bijection() {
        let lfsr = GaloisLfsr::with_taps(6, 0b1010100).unwrap();
        let mut seen = vec![false; 64];
        for s in 0..64 {
            let t = lfsr.next(s).unwrap() as usize;
            assert!(!seen[t]);
            seen[t] = true;
        }
        assert_eq!(lfsr.next(0).unwrap(), 0);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(GaloisLfsr::maximal(4).is_err());
        assert!(GaloisLfsr::maximal(64).is_err());
        assert!(GaloisLfsr::with_taps(1, 0b10).is_err());
        // missing the top tap
        assert!(GaloisLfsr::with_taps(5, 0b011100).is_err());
        // tap beyond the register
        assert!(GaloisLfsr::with_taps(5, 0b1100000).is_err());
    }

    #[test]
    fn test_widest_register() {
        let lfsr = GaloisLfsr::maximal(63).unwrap();
        assert_eq!(lfsr.size(), 1 << 63);
        assert_eq!(lfsr.next(0).unwrap(), 0);
        let mut state = 1u64;
        for _ in 0..1000 {
            state = lfsr.next(state).unwrap();
            assert!(state < lfsr.size());
            assert_ne!(state, 0);
        }
        assert!(GaloisLfsr::with_taps(63, (1 << 63) | 1).is_ok());
        assert!(GaloisLfsr::with_taps(62, (1 << 63) | (1 << 62)).is_err());
    }

    #[test]
    fn test_reconstruction_bounds() {
        let lfsr = GaloisLfsr::maximal(5).unwrap();
        assert_eq!(lfsr.from_index(31).unwrap(), LfsrState(31));
        assert!(matches!(
            lfsr.from_index(32),
            Err(OracleError::Reconstruction { index: 32, .. })
        ));
    }
}
