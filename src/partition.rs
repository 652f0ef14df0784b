use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Contiguous slice of the record set owned by one worker rank.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub rank: usize,
    pub start: usize,
    pub end: usize,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Block partition of `n` records for `workers` ranks.
///
/// Every rank gets `n / workers` records and the first `n % workers` ranks
/// get one extra, so lengths differ by at most one. With more workers than
/// records the tail ranks get empty ranges. `workers` must be at least 1.
pub fn partition_for(rank: usize, n: usize, workers: usize) -> Partition {
    debug_assert!(workers >= 1 && rank < workers);
    let base = n / workers;
    let remainder = n % workers;

    let (start, len) = if rank < remainder {
        (rank * (base + 1), base + 1)
    } else {
        (rank * base + remainder, base)
    };

    Partition { rank, start, end: start + len }
}

/// All partitions for `(n, workers)` in rank order.
pub fn partition(n: usize, workers: usize) -> Vec<Partition> {
    (0..workers).map(|rank| partition_for(rank, n, workers)).collect()
}

/// Number of ranks that own at least one record. Ranks from this one
/// onwards are always empty.
pub fn occupied_ranks(n: usize, workers: usize) -> usize {
    workers.min(n)
}

/// Non-empty partitions for `(n, workers)` in rank order, computed lazily.
/// Cost depends on `n`, never on `workers`.
pub fn occupied(n: usize, workers: usize) -> impl Iterator<Item = Partition> {
    (0..occupied_ranks(n, workers)).map(move |rank| partition_for(rank, n, workers))
}
