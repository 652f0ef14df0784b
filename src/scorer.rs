use serde::{Deserialize, Serialize};
use crate::model::Record;

/// Maps a record to a single number. LOWER is ALWAYS more favorable.
///
/// Implementations must be pure: the reducer calls `score` from many
/// workers at once and relies on the same record always producing the
/// same bits.
pub trait Scorer: Send + Sync {
    fn score(&self, record: &Record) -> f64;
}

impl<F> Scorer for F
where
    F: Fn(&Record) -> f64 + Send + Sync,
{
    fn score(&self, record: &Record) -> f64 {
        self(record)
    }
}

/// Per-attribute weights of the pollution score.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct Weights {
    pub co: f64,
    pub nmhc: f64,
    pub nox: f64,
    /// Applied to the distance from the ideal temperature
    pub temperature: f64,
    /// Applied to the distance from the ideal humidity
    pub humidity: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            co: 3.0, // most harmful
            nmhc: 2.0,
            nox: 2.0,
            temperature: 0.5,
            humidity: 0.3,
        }
    }
}

/// Comfort point the climate penalties are measured from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct IdealPoint {
    pub temperature: f64,
    pub humidity: f64,
}

impl Default for IdealPoint {
    fn default() -> Self {
        Self { temperature: 22.0, humidity: 50.0 }
    }
}

/// Weighted air-quality score:
/// `w1*CO + w2*NMHC + w3*NOx + w4*|temp - T_ideal| + w5*|hum - H_ideal|`
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: Weights,
    pub ideal: IdealPoint,
}

impl ScoringConfig {
    pub fn new(weights: Weights, ideal: IdealPoint) -> Self {
        Self { weights, ideal }
    }

    /// Human-readable formula, used in reports.
    pub fn formula(&self) -> String {
        let w = &self.weights;
        format!(
            "{}*CO + {}*NMHC + {}*NOx + {}*|temp-{}| + {}*|hum-{}|",
            w.co, w.nmhc, w.nox, w.temperature, self.ideal.temperature, w.humidity, self.ideal.humidity
        )
    }
}

impl Scorer for ScoringConfig {
    #[inline]
    fn score(&self, record: &Record) -> f64 {
        let w = &self.weights;
        // Summation order is fixed so every execution model produces the same bits.
        w.co * record.co
            + w.nmhc * record.nmhc
            + w.nox * record.nox
            + w.temperature * (record.temperature - self.ideal.temperature).abs()
            + w.humidity * (record.humidity - self.ideal.humidity).abs()
    }
}
