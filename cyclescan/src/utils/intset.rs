use std::collections::HashMap;

const SHIFT: u64 = 6; // Number of bits to represent positions within a 64-bit u64 value (2^6 = 64)
const MASK: u64 = (1 << SHIFT) - 1; // Mask to extract the lower 6 bits of an index

/// Splits `value` into its word key and its bit position within the word.
#[inline]
fn into_parts(value: u64) -> (u64, u64) {
    (value >> SHIFT, value & MASK)
}

/// A sparse set of domain indices, used as a worker's private visited set.
///
/// # Design
///
/// Each index is divided into its lower 6 bits, the bit position inside a
/// 64-bit word, and the remaining higher bits, the key of that word in a
/// `HashMap`. Indices visited by one walk are usually dense in some range, so
/// the set needs about one bit per index instead of a full hash entry.
///
/// A set may be bounded to `[lo, hi)`. Inserts outside the bounds are dropped:
/// a static worker only ever starts walks inside its own range, so remembering
/// the rest of a long cycle would only cost memory.
///
/// # Example
///
/// ```
/// use cyclescan::utils::intset::IntSet;
/// let mut set = IntSet::bounded(0, 100);
/// assert!(set.add(10));
/// assert!(set.has(10));
/// assert!(!set.add(500));
/// assert!(!set.has(500));
/// ```
#[derive(Debug, Default)]
pub struct IntSet {
    data: HashMap<u64, u64>,
    bounds: Option<(u64, u64)>,
    len: u64,
}

impl IntSet {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn bounded(lo: u64, hi: u64) -> Self {
        Self {
            bounds: Some((lo, hi)),
            ..Self::default()
        }
    }

    #[inline]
    fn in_bounds(&self, value: u64) -> bool {
        match self.bounds {
            Some((lo, hi)) => lo <= value && value < hi,
            None => true,
        }
    }

    pub fn has(&self, value: u64) -> bool {
        let (high, low) = into_parts(value);
        match self.data.get(&high) {
            Some(word) => word & (1u64 << low) != 0,
            None => false,
        }
    }

    /// Adds `value`; returns `false` if it was present or out of bounds.
    pub fn add(&mut self, value: u64) -> bool {
        if !self.in_bounds(value) {
            return false;
        }
        let (high, low) = into_parts(value);
        let word = self.data.entry(high).or_insert(0);
        let old = *word;
        *word |= 1u64 << low;
        if *word != old {
            self.len += 1;
            return true;
        }
        false
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_has() {
        let mut set = IntSet::unbounded();
        assert!(!set.has(10));
        assert!(set.add(10));
        assert!(set.has(10));
        // Adding the same element again
        assert!(!set.add(10));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_word_edges() {
        let mut set = IntSet::unbounded();
        for v in [0, 63, 64, 127, 128, u64::MAX] {
            assert!(set.add(v));
            assert!(set.has(v));
        }
        assert!(!set.has(1));
        assert!(!set.has(65));
        assert_eq!(set.len(), 6);
    }

    #[test]
    fn test_bounds() {
        let mut set = IntSet::bounded(64, 130);
        assert!(!set.add(63));
        assert!(set.add(64));
        assert!(set.add(129));
        assert!(!set.add(130));
        assert!(!set.has(63));
        assert!(!set.has(130));
        assert_eq!(set.len(), 2);
        assert!(!set.is_empty());
    }
}
