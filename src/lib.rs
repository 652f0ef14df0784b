pub mod model;
pub mod scorer;
pub mod partition;
pub mod reducer;
pub mod error;
pub mod dataset;
pub mod parser;
pub mod config;
pub mod manager;
pub mod report;
pub mod server;
pub mod cluster;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::config::Config;
use crate::error::{DatasetError, ReduceError};
use crate::model::{Record, RecordSet};
use crate::reducer::{ExecutionModel, TimedReduction};
use crate::scorer::{Scorer, ScoringConfig};

pub use crate::model::{ReductionResult, ScoredResult};
pub use crate::reducer::reduce;

/// A loaded record set together with the scoring it is ranked by.
/// Cheap to clone; both halves are shared read-only.
#[derive(Clone)]
pub struct AirQualityAnalyzer {
    records: Arc<RecordSet>,
    scoring: Arc<ScoringConfig>,
}

impl fmt::Debug for AirQualityAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AirQualityAnalyzer")
        .field("records", &self.records.len())
        .field("scoring", &self.scoring)
        .finish()
    }
}

impl AirQualityAnalyzer {
    pub fn new(records: RecordSet, scoring: ScoringConfig) -> Self {
        Self { records: Arc::new(records), scoring: Arc::new(scoring) }
    }

    /// Uses `config.dataset` when set, the built-in sample hours otherwise.
    pub fn from_config(config: &Config) -> Result<Self, DatasetError> {
        let records = match &config.dataset {
            Some(path) => dataset::load(path)?,
            None => dataset::sample(),
        };
        info!(records = records.len(), formula = %config.scoring.formula(), "analyzer ready");
        Ok(Self::new(records, config.scoring))
    }

    pub fn records(&self) -> &Arc<RecordSet> {
        &self.records
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    pub fn record(&self, index: usize) -> Option<Record> {
        self.records.get(index).copied()
    }

    pub fn score_of(&self, index: usize) -> Option<f64> {
        self.records.get(index).map(|r| self.scoring.score(r))
    }

    pub fn reduce(&self, model: ExecutionModel, workers: usize) -> Result<TimedReduction, ReduceError> {
        reducer::reduce_timed(model, &self.records, workers, self.scoring.as_ref())
    }

    pub fn sweep(&self, model: ExecutionModel, plan: &[usize]) -> Result<Vec<TimedReduction>, ReduceError> {
        manager::run_sweep(model, &self.records, self.scoring.as_ref(), plan)
    }

    /// Same contract as `reduce`, executed by a loopback process group.
    pub async fn reduce_distributed(&self, workers: usize) -> Result<TimedReduction, ReduceError> {
        let start = Instant::now();
        let result = cluster::reduce_over_loopback(self.records.clone(), self.scoring.clone(), workers).await?;
        Ok(TimedReduction { result, workers, elapsed: start.elapsed() })
    }
}
