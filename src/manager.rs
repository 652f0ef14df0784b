use std::thread;

use tracing::{info, warn};

use crate::error::ReduceError;
use crate::model::RecordSet;
use crate::reducer::{self, ExecutionModel, TimedReduction};
use crate::scorer::Scorer;

#[derive(Debug, Clone)]
pub struct SystemProfile {
    pub logical_cores: usize,
    /// Threads for the async runtime (network and coordination only)
    pub worker_threads: usize,
    /// Largest worker count the default sweep goes up to
    pub max_sweep_workers: usize,
}

impl SystemProfile {
    pub fn detect() -> Self {
        let cores = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);

        if cores <= 1 {
            warn!(cores, "single core detected, parallel runs will be time-sliced");
            Self {
                logical_cores: cores,
                worker_threads: 2, // 1 Compute + 1 I/O
                max_sweep_workers: 4,
            }
        } else {
            Self {
                logical_cores: cores,
                worker_threads: cores,
                max_sweep_workers: cores.max(4),
            }
        }
    }

    /// Powers of two from 1 up to `max_sweep_workers`: 1, 2, 4, ...
    pub fn sweep_plan(&self) -> Vec<usize> {
        let mut plan = Vec::new();
        let mut workers = 1;
        while workers <= self.max_sweep_workers {
            plan.push(workers);
            workers *= 2;
        }
        plan
    }
}

/// Runs one timed reduction per entry of `plan`, in order.
/// The first failure aborts the sweep.
pub fn run_sweep<S: Scorer + ?Sized>(
    model: ExecutionModel,
    records: &RecordSet,
    scorer: &S,
    plan: &[usize],
) -> Result<Vec<TimedReduction>, ReduceError> {
    let mut runs = Vec::with_capacity(plan.len());
    for &workers in plan {
        let run = reducer::reduce_timed(model, records, workers, scorer)?;
        info!(
            %model,
            workers,
            elapsed_us = run.elapsed.as_micros() as u64,
            best = run.result.best_index,
            worst = run.result.worst_index,
            "sweep step done"
        );
        runs.push(run);
    }
    Ok(runs)
}
