//! Work partitioning.
//!
//! Static mode splits `[0, N)` into one contiguous range per worker, assigned
//! once. Dynamic mode cuts the domain into small batches that a producer
//! generates lazily and pushes through the bounded work queue.

pub mod producer;

use std::ops::Range;

pub use producer::{Producer, ProducerReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkUnit {
    Range { start: u64, end: u64 },
    Batch(Vec<u64>),
}

impl WorkUnit {
    pub fn len(&self) -> u64 {
        match self {
            WorkUnit::Range { start, end } => end.saturating_sub(*start),
            WorkUnit::Batch(indices) => indices.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn first(&self) -> Option<u64> {
        match self {
            WorkUnit::Range { start, end } if start < end => Some(*start),
            WorkUnit::Range { .. } => None,
            WorkUnit::Batch(indices) => indices.first().copied(),
        }
    }

    pub fn indices(&self) -> UnitIndices<'_> {
        match self {
            WorkUnit::Range { start, end } => UnitIndices::Range(*start..*end),
            WorkUnit::Batch(indices) => UnitIndices::Batch(indices.iter()),
        }
    }

    /// Splits a range into consecutive sub-ranges of at most `chunk` elements.
    /// Batches are returned whole.
    pub fn chunks(self, chunk: u64) -> Vec<WorkUnit> {
        match self {
            WorkUnit::Range { start, end } => {
                let chunk = chunk.max(1);
                let mut out = Vec::with_capacity(((end.saturating_sub(start)) / chunk + 1) as usize);
                let mut lo = start;
                while lo < end {
                    let hi = end.min(lo.saturating_add(chunk));
                    out.push(WorkUnit::Range { start: lo, end: hi });
                    lo = hi;
                }
                out
            }
            batch => vec![batch],
        }
    }
}

pub enum UnitIndices<'a> {
    Range(Range<u64>),
    Batch(std::slice::Iter<'a, u64>),
}

impl Iterator for UnitIndices<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        match self {
            UnitIndices::Range(range) => range.next(),
            UnitIndices::Batch(iter) => iter.next().copied(),
        }
    }
}

/// `workers` near-equal contiguous ranges covering `[0, n)`; the first
/// `n % workers` ranges are one element longer. Empty ranges are omitted.
pub fn static_ranges(n: u64, workers: usize) -> Vec<WorkUnit> {
    let workers = workers.max(1) as u64;
    let base = n / workers;
    let extra = n % workers;
    let mut ranges = Vec::with_capacity(workers as usize);
    let mut start = 0u64;
    for w in 0..workers {
        let len = base + u64::from(w < extra);
        if len == 0 {
            continue;
        }
        ranges.push(WorkUnit::Range {
            start,
            end: start + len,
        });
        start += len;
    }
    ranges
}

/// Lazily cuts `[0, n)` into batches of `batch_size` indices.
#[derive(Debug, Clone)]
pub struct BatchIter {
    next: u64,
    end: u64,
    batch_size: u64,
}

impl BatchIter {
    pub fn new(n: u64, batch_size: u64) -> Self {
        Self {
            next: 0,
            end: n,
            batch_size: batch_size.max(1),
        }
    }
}

impl Iterator for BatchIter {
    type Item = WorkUnit;

    fn next(&mut self) -> Option<WorkUnit> {
        if self.next >= self.end {
            return None;
        }
        let hi = self.end.min(self.next.saturating_add(self.batch_size));
        let batch = (self.next..hi).collect();
        self.next = hi;
        Some(WorkUnit::Batch(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_ranges_cover_domain() {
        for n in [1u64, 2, 7, 16, 1000] {
            for workers in [1usize, 2, 3, 4, 8] {
                let ranges = static_ranges(n, workers);
                assert!(ranges.len() <= workers);
                let mut expected = 0;
                for r in &ranges {
                    match r {
                        WorkUnit::Range { start, end } => {
                            assert_eq!(*start, expected);
                            assert!(end > start);
                            expected = *end;
                        }
                        _ => panic!("static partition must be ranges"),
                    }
                }
                assert_eq!(expected, n);
                let lens: Vec<u64> = ranges.iter().map(|r| r.len()).collect();
                assert!(lens.iter().max().unwrap() - lens.iter().min().unwrap() <= 1);
            }
        }
    }

    #[test]
    fn test_boundary_at_five() {
        assert_eq!(
            static_ranges(10, 2),
            vec![
                WorkUnit::Range { start: 0, end: 5 },
                WorkUnit::Range { start: 5, end: 10 }
            ]
        );
    }

    #[test]
    fn test_batches_are_lazy_and_complete() {
        let mut iter = BatchIter::new(10, 4);
        assert_eq!(iter.next(), Some(WorkUnit::Batch(vec![0, 1, 2, 3])));
        assert_eq!(iter.next(), Some(WorkUnit::Batch(vec![4, 5, 6, 7])));
        assert_eq!(iter.next(), Some(WorkUnit::Batch(vec![8, 9])));
        assert_eq!(iter.next(), None);
        assert_eq!(BatchIter::new(1, 100).count(), 1);
    }

    #[test]
    fn test_chunks_and_indices() {
        let unit = WorkUnit::Range { start: 3, end: 10 };
        assert_eq!(unit.first(), Some(3));
        assert_eq!(unit.indices().collect::<Vec<_>>(), (3..10).collect::<Vec<_>>());
        let chunks = unit.chunks(3);
        assert_eq!(
            chunks,
            vec![
                WorkUnit::Range { start: 3, end: 6 },
                WorkUnit::Range { start: 6, end: 9 },
                WorkUnit::Range { start: 9, end: 10 }
            ]
        );
        let batch = WorkUnit::Batch(vec![4, 2]);
        assert_eq!(batch.indices().collect::<Vec<_>>(), vec![4, 2]);
        assert_eq!(batch.clone().chunks(1), vec![batch]);
        assert!(WorkUnit::Range { start: 2, end: 2 }.is_empty());
    }
}
