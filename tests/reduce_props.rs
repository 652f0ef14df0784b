//! Property-based tests for partitioning and the extremum reduction.
//!
//! The answer must not depend on how many workers run the pass or which
//! execution model runs it.

use airq::model::{Record, RecordSet, ScoredResult};
use airq::partition::partition;
use airq::reducer::{reduce_with, ExecutionModel, LocalExtrema};
use airq::scorer::{IdealPoint, ScoringConfig, Weights};
use proptest::prelude::*;

fn record_strategy() -> impl Strategy<Value = Record> {
    (0.0..10.0f64, 0.0..1000.0f64, 0.0..500.0f64, -20.0..45.0f64, 0.0..100.0f64)
        .prop_map(|(co, nmhc, nox, t, h)| Record::new(co, nmhc, nox, t, h))
}

fn record_set_strategy() -> impl Strategy<Value = RecordSet> {
    prop::collection::vec(record_strategy(), 1..120).prop_map(RecordSet::new)
}

/// Records drawn from a handful of values so that ties are common.
fn tied_record_set_strategy() -> impl Strategy<Value = RecordSet> {
    prop::collection::vec(0u8..4, 1..60)
        .prop_map(|codes| codes.into_iter().map(|c| Record::new(f64::from(c), 0.0, 0.0, 22.0, 50.0)).collect())
}

fn scoring_strategy() -> impl Strategy<Value = ScoringConfig> {
    (0.0..5.0f64, 0.0..5.0f64, 0.0..5.0f64, 0.0..2.0f64, 0.0..2.0f64, 10.0..30.0f64, 30.0..70.0f64).prop_map(
        |(co, nmhc, nox, temperature, humidity, t, h)| {
            ScoringConfig::new(Weights { co, nmhc, nox, temperature, humidity }, IdealPoint { temperature: t, humidity: h })
        },
    )
}

fn local_strategy() -> impl Strategy<Value = LocalExtrema> {
    prop::option::of((0u8..5, 0usize..8)).prop_map(|candidate| match candidate {
        Some((score, index)) => {
            let c = ScoredResult::new(f64::from(score), index);
            LocalExtrema { best: Some(c), worst: Some(c) }
        }
        None => LocalExtrema::empty(),
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn partitions_cover_disjointly(n in 0usize..500, w in 1usize..64) {
        let parts = partition(n, w);
        prop_assert_eq!(parts.len(), w);

        let mut next = 0;
        for (rank, p) in parts.iter().enumerate() {
            prop_assert_eq!(p.start, next);
            let larger = rank < n % w;
            prop_assert_eq!(p.len(), n / w + usize::from(larger));
            next = p.end;
        }
        prop_assert_eq!(next, n);
    }

    #[test]
    fn worker_count_does_not_change_answer(records in record_set_strategy(), scoring in scoring_strategy()) {
        let n = records.len();
        let reference = reduce_with(ExecutionModel::Sequential, &records, 1, &scoring).unwrap();

        for workers in [1, 2, n, n + 3] {
            for model in [ExecutionModel::Sequential, ExecutionModel::SharedMemory] {
                let result = reduce_with(model, &records, workers, &scoring).unwrap();
                prop_assert!(result.bit_identical(&reference), "{} with {} workers: {:?} vs {:?}", model, workers, result, reference);
            }
        }
    }

    #[test]
    fn result_is_min_and_max(records in record_set_strategy(), scoring in scoring_strategy(), workers in 1usize..16) {
        use airq::scorer::Scorer;

        let result = reduce_with(ExecutionModel::SharedMemory, &records, workers, &scoring).unwrap();
        prop_assert!(result.best_score <= result.worst_score);
        prop_assert!(result.best_index < records.len());
        prop_assert!(result.worst_index < records.len());

        let scores: Vec<f64> = records.iter().map(|r| scoring.score(r)).collect();
        prop_assert_eq!(scores[result.best_index], result.best_score);
        prop_assert_eq!(scores[result.worst_index], result.worst_score);
        prop_assert!(scores.iter().all(|&s| result.best_score <= s && s <= result.worst_score));
    }

    #[test]
    fn lowest_index_wins_ties(records in tied_record_set_strategy(), workers in 1usize..20) {
        let by_co = |r: &Record| r.co;
        let result = reduce_with(ExecutionModel::SharedMemory, &records, workers, &by_co).unwrap();

        let first_min = records.iter().position(|r| r.co == result.best_score).unwrap();
        let first_max = records.iter().position(|r| r.co == result.worst_score).unwrap();
        prop_assert_eq!(result.best_index, first_min);
        prop_assert_eq!(result.worst_index, first_max);
    }

    #[test]
    fn merge_is_commutative(a in local_strategy(), b in local_strategy()) {
        prop_assert_eq!(a.merge(&b), b.merge(&a));
    }

    #[test]
    fn merge_is_associative(a in local_strategy(), b in local_strategy(), c in local_strategy()) {
        prop_assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
    }

    #[test]
    fn empty_is_merge_identity(a in local_strategy()) {
        prop_assert_eq!(a.merge(&LocalExtrema::empty()), a);
        prop_assert_eq!(LocalExtrema::empty().merge(&a), a);
    }

    #[test]
    fn reduce_is_idempotent(records in record_set_strategy(), workers in 1usize..8) {
        let scoring = ScoringConfig::default();
        let first = reduce_with(ExecutionModel::SharedMemory, &records, workers, &scoring).unwrap();
        let second = reduce_with(ExecutionModel::SharedMemory, &records, workers, &scoring).unwrap();
        prop_assert!(first.bit_identical(&second));
    }
}
