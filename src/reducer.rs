use std::cmp::Reverse;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::ReduceError;
use crate::model::{RecordSet, ReductionResult, ScoredResult};
use crate::partition::{occupied, occupied_ranks, partition_for, Partition};
use crate::scorer::Scorer;

// Candidates are totally ordered by (score, index). Using the index as the
// secondary key makes the lowest index win ties in both directions, which is
// what a sequential scan with strict comparisons yields.
fn best_key(c: &ScoredResult) -> (OrderedFloat<f64>, usize) {
    (OrderedFloat(c.score), c.index)
}

fn worst_key(c: &ScoredResult) -> (OrderedFloat<f64>, Reverse<usize>) {
    (OrderedFloat(c.score), Reverse(c.index))
}

fn pick_best(a: Option<ScoredResult>, b: Option<ScoredResult>) -> Option<ScoredResult> {
    match (a, b) {
        (Some(x), Some(y)) => Some(if best_key(&y) < best_key(&x) { y } else { x }),
        (x, None) => x,
        (None, y) => y,
    }
}

fn pick_worst(a: Option<ScoredResult>, b: Option<ScoredResult>) -> Option<ScoredResult> {
    match (a, b) {
        (Some(x), Some(y)) => Some(if worst_key(&y) > worst_key(&x) { y } else { x }),
        (x, None) => x,
        (None, y) => y,
    }
}

/// Best and worst candidate seen by one worker.
///
/// `None` means "no record seen yet", so a worker with an empty partition
/// contributes nothing. `merge` is associative and commutative with
/// `empty()` as identity, which is what lets any worker count, merge order
/// or execution model reach the same answer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct LocalExtrema {
    pub best: Option<ScoredResult>,
    pub worst: Option<ScoredResult>,
}

impl LocalExtrema {
    pub fn empty() -> Self {
        Self { best: None, worst: None }
    }

    pub fn is_empty(&self) -> bool {
        self.best.is_none()
    }

    pub fn observe(&mut self, candidate: ScoredResult) {
        self.best = pick_best(self.best, Some(candidate));
        self.worst = pick_worst(self.worst, Some(candidate));
    }

    /// Sequential scan of one partition in increasing index order.
    pub fn scan<S: Scorer + ?Sized>(records: &RecordSet, part: &Partition, scorer: &S) -> Self {
        let mut local = Self::empty();
        for index in part.range() {
            local.observe(ScoredResult::new(scorer.score(&records[index]), index));
        }
        local
    }

    pub fn merge(&self, other: &Self) -> Self {
        Self {
            best: pick_best(self.best, other.best),
            worst: pick_worst(self.worst, other.worst),
        }
    }

    pub fn into_result(self) -> Option<ReductionResult> {
        match (self.best, self.worst) {
            (Some(best), Some(worst)) => Some(ReductionResult::new(best, worst)),
            _ => None,
        }
    }
}

/// Upper bound on threads spawned by one shared-memory pass.
pub const MAX_THREADS: usize = 256;

/// How the per-partition scans are executed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionModel {
    /// Partitions scanned one after another, folded in rank order.
    Sequential,
    /// One scoped thread per non-empty partition (at most `MAX_THREADS`),
    /// merged under a lock.
    #[default]
    SharedMemory,
}

impl fmt::Display for ExecutionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionModel::Sequential => write!(f, "sequential"),
            ExecutionModel::SharedMemory => write!(f, "shared-memory"),
        }
    }
}

/// A reduction result plus the wall-clock time of the pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedReduction {
    pub result: ReductionResult,
    pub workers: usize,
    pub elapsed: Duration,
}

/// Rejects inputs that have no well-defined extremum. Runs before any work.
pub fn validate(records: &RecordSet, workers: usize) -> Result<(), ReduceError> {
    if records.is_empty() {
        return Err(ReduceError::InvalidInput("record set is empty"));
    }
    if workers < 1 {
        return Err(ReduceError::InvalidInput("worker count must be at least 1"));
    }
    Ok(())
}

/// Finds the lowest- and highest-scoring records using `workers` threads.
pub fn reduce<S: Scorer + ?Sized>(
    records: &RecordSet,
    workers: usize,
    scorer: &S,
) -> Result<ReductionResult, ReduceError> {
    reduce_with(ExecutionModel::SharedMemory, records, workers, scorer)
}

pub fn reduce_with<S: Scorer + ?Sized>(
    model: ExecutionModel,
    records: &RecordSet,
    workers: usize,
    scorer: &S,
) -> Result<ReductionResult, ReduceError> {
    validate(records, workers)?;
    debug!(%model, workers, records = records.len(), "reducing");

    let merged = match model {
        ExecutionModel::Sequential => reduce_sequential(records, workers, scorer),
        ExecutionModel::SharedMemory => reduce_shared(records, workers, scorer),
    };

    merged
        .into_result()
        .ok_or(ReduceError::InvalidInput("record set is empty"))
}

pub fn reduce_timed<S: Scorer + ?Sized>(
    model: ExecutionModel,
    records: &RecordSet,
    workers: usize,
    scorer: &S,
) -> Result<TimedReduction, ReduceError> {
    let start = Instant::now();
    let result = reduce_with(model, records, workers, scorer)?;
    Ok(TimedReduction { result, workers, elapsed: start.elapsed() })
}

fn reduce_sequential<S: Scorer + ?Sized>(records: &RecordSet, workers: usize, scorer: &S) -> LocalExtrema {
    occupied(records.len(), workers)
        .map(|part| LocalExtrema::scan(records, &part, scorer))
        .fold(LocalExtrema::empty(), |acc, local| acc.merge(&local))
}

fn reduce_shared<S: Scorer + ?Sized>(records: &RecordSet, workers: usize, scorer: &S) -> LocalExtrema {
    let n = records.len();
    let active = occupied_ranks(n, workers);
    let threads = active.min(MAX_THREADS);
    let global = Mutex::new(LocalExtrema::empty());

    thread::scope(|scope| {
        for t in 0..threads {
            // Past MAX_THREADS each thread owns a contiguous run of ranks.
            let ranks = partition_for(t, active, threads);
            let global = &global;
            scope.spawn(move || {
                // Scan phase: accumulators are owned by this thread.
                let mut local = LocalExtrema::empty();
                for rank in ranks.range() {
                    let part = partition_for(rank, n, workers);
                    local = local.merge(&LocalExtrema::scan(records, &part, scorer));
                    trace!(rank, start = part.start, end = part.end, "partition scanned");
                }

                // Merge phase: O(1) critical section.
                let mut acc = global.lock().unwrap_or_else(PoisonError::into_inner);
                *acc = acc.merge(&local);
            });
        }
    });

    global.into_inner().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset;
    use crate::model::Record;
    use crate::scorer::ScoringConfig;

    const MODELS: [ExecutionModel; 2] = [ExecutionModel::Sequential, ExecutionModel::SharedMemory];

    fn flat(scores: &[f64]) -> RecordSet {
        scores.iter().map(|&s| Record::new(s, 0.0, 0.0, 0.0, 0.0)).collect()
    }

    fn by_co(record: &Record) -> f64 {
        record.co
    }

    #[test]
    fn sample_hours_best_and_worst() {
        let records = dataset::sample();
        let scoring = ScoringConfig::default();
        for model in MODELS {
            for workers in [1, 2, 4] {
                let result = reduce_with(model, &records, workers, &scoring).unwrap();
                assert_eq!(result.best_index, 9, "{model} with {workers} workers");
                assert_eq!(result.worst_index, 3, "{model} with {workers} workers");
                assert!((result.best_score - 129.19).abs() < 1e-9);
                assert!((result.worst_score - 2080.11).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn empty_record_set_is_invalid() {
        let err = reduce(&RecordSet::default(), 2, &ScoringConfig::default()).unwrap_err();
        assert!(matches!(err, ReduceError::InvalidInput(_)));
    }

    #[test]
    fn zero_workers_is_invalid() {
        let err = reduce(&dataset::sample(), 0, &ScoringConfig::default()).unwrap_err();
        assert!(matches!(err, ReduceError::InvalidInput(_)));
    }

    #[test]
    fn validation_runs_before_scoring() {
        let panicking = |_: &Record| -> f64 { panic!("scorer must not run") };
        assert!(reduce(&RecordSet::default(), 1, &panicking).is_err());
        assert!(reduce(&flat(&[1.0]), 0, &panicking).is_err());
    }

    #[test]
    fn ties_go_to_the_lowest_index() {
        let records = flat(&[5.0, 1.0, 9.0, 1.0, 9.0, 3.0]);
        for model in MODELS {
            for workers in 1..=8 {
                let result = reduce_with(model, &records, workers, &by_co).unwrap();
                assert_eq!(result.best_index, 1);
                assert_eq!(result.worst_index, 2);
            }
        }
    }

    #[test]
    fn all_equal_scores_pick_index_zero() {
        let records = flat(&[7.0; 9]);
        let result = reduce(&records, 4, &by_co).unwrap();
        assert_eq!((result.best_index, result.worst_index), (0, 0));
    }

    #[test]
    fn single_record() {
        let result = reduce(&flat(&[42.0]), 3, &by_co).unwrap();
        assert_eq!(result.best(), ScoredResult::new(42.0, 0));
        assert_eq!(result.worst(), ScoredResult::new(42.0, 0));
    }

    #[test]
    fn more_workers_than_records() {
        let records = flat(&[3.0, -1.0, 8.0]);
        let result = reduce(&records, records.len() + 3, &by_co).unwrap();
        assert_eq!(result.best(), ScoredResult::new(-1.0, 1));
        assert_eq!(result.worst(), ScoredResult::new(8.0, 2));
    }

    #[test]
    fn infinite_scores_still_win() {
        let records = flat(&[f64::INFINITY, f64::NEG_INFINITY]);
        let result = reduce(&records, 2, &by_co).unwrap();
        assert_eq!(result.best_index, 1);
        assert_eq!(result.worst_index, 0);
    }

    #[test]
    fn scan_skips_nothing_in_its_range() {
        let records = flat(&[4.0, 2.0, 6.0, 0.0]);
        let part = Partition { rank: 0, start: 1, end: 3 };
        let local = LocalExtrema::scan(&records, &part, &by_co);
        assert_eq!(local.best, Some(ScoredResult::new(2.0, 1)));
        assert_eq!(local.worst, Some(ScoredResult::new(6.0, 2)));
    }

    #[test]
    fn empty_partition_scan_is_identity() {
        let records = flat(&[1.0]);
        let part = Partition { rank: 1, start: 1, end: 1 };
        let local = LocalExtrema::scan(&records, &part, &by_co);
        assert!(local.is_empty());

        let other = LocalExtrema::scan(&records, &Partition { rank: 0, start: 0, end: 1 }, &by_co);
        assert_eq!(local.merge(&other), other);
        assert_eq!(other.merge(&local), other);
    }

    #[test]
    fn merge_tie_break_is_order_independent() {
        let low = LocalExtrema {
            best: Some(ScoredResult::new(1.0, 2)),
            worst: Some(ScoredResult::new(9.0, 2)),
        };
        let high = LocalExtrema {
            best: Some(ScoredResult::new(1.0, 7)),
            worst: Some(ScoredResult::new(9.0, 7)),
        };
        assert_eq!(low.merge(&high), high.merge(&low));
        assert_eq!(low.merge(&high), low);
    }

    #[test]
    fn repeated_calls_agree() {
        let records = dataset::sample();
        let scoring = ScoringConfig::default();
        let first = reduce(&records, 3, &scoring).unwrap();
        for _ in 0..10 {
            assert!(reduce(&records, 3, &scoring).unwrap().bit_identical(&first));
        }
    }

    #[test]
    fn timed_reduction_reports_workers() {
        let timed = reduce_timed(ExecutionModel::SharedMemory, &dataset::sample(), 2, &ScoringConfig::default())
            .unwrap();
        assert_eq!(timed.workers, 2);
        assert_eq!(timed.result.best_index, 9);
    }

    #[test]
    fn huge_worker_counts_do_not_allocate_per_worker() {
        let records = dataset::sample();
        let scoring = ScoringConfig::default();
        for model in MODELS {
            for workers in [u32::MAX as usize, usize::MAX] {
                let result = reduce_with(model, &records, workers, &scoring).unwrap();
                assert_eq!((result.best_index, result.worst_index), (9, 3), "{model} with {workers} workers");
            }
        }
    }

    #[test]
    fn more_ranks_than_thread_cap_agree() {
        let records: RecordSet = (0..(MAX_THREADS * 3 + 7)).map(|i| Record::new(((i * 37) % 101) as f64, 0.0, 0.0, 0.0, 0.0)).collect();
        let expected = reduce_with(ExecutionModel::Sequential, &records, 1, &by_co).unwrap();
        for workers in [MAX_THREADS + 1, MAX_THREADS * 2, records.len(), records.len() * 4] {
            let result = reduce_with(ExecutionModel::SharedMemory, &records, workers, &by_co).unwrap();
            assert!(result.bit_identical(&expected), "{workers} workers");
        }
    }
}
