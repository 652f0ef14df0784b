use serde::{Deserialize, Serialize};
use std::ops::Index;
use std::slice;

/// Number of attributes carried by every record.
pub const ATTRIBUTE_COUNT: usize = 5;

/// One hourly air-quality observation.
/// Its position in the owning `RecordSet` is its only identity.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Record {
    /// Carbon monoxide (mg/m3)
    pub co: f64,

    /// Non-methane hydrocarbons (ug/m3)
    pub nmhc: f64,

    /// Nitrogen oxides (ppb)
    pub nox: f64,

    /// Degrees Celsius
    pub temperature: f64,

    /// Relative humidity (%)
    pub humidity: f64,
}

impl Record {
    pub fn new(co: f64, nmhc: f64, nox: f64, temperature: f64, humidity: f64) -> Self {
        Self { co, nmhc, nox, temperature, humidity }
    }

    pub fn from_attributes(attrs: [f64; ATTRIBUTE_COUNT]) -> Self {
        let [co, nmhc, nox, temperature, humidity] = attrs;
        Self { co, nmhc, nox, temperature, humidity }
    }

    pub fn attributes(&self) -> [f64; ATTRIBUTE_COUNT] {
        [self.co, self.nmhc, self.nox, self.temperature, self.humidity]
    }
}

/// Ordered, fixed-length collection of records.
/// Never mutated once built, so workers share it by reference without locking.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl RecordSet {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, Record> {
        self.records.iter()
    }
}

impl Index<usize> for RecordSet {
    type Output = Record;

    fn index(&self, index: usize) -> &Record {
        &self.records[index]
    }
}

impl From<Vec<Record>> for RecordSet {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Score of a single record, tagged with its position.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ScoredResult {
    #[serde(with = "score_bits")]
    pub score: f64,
    pub index: usize,
}

impl ScoredResult {
    pub fn new(score: f64, index: usize) -> Self {
        Self { score, index }
    }
}

/// Final answer of a reduction: the global minimum and maximum with their indices.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ReductionResult {
    pub best_score: f64,
    pub best_index: usize,
    pub worst_score: f64,
    pub worst_index: usize,
}

impl ReductionResult {
    pub fn new(best: ScoredResult, worst: ScoredResult) -> Self {
        Self {
            best_score: best.score,
            best_index: best.index,
            worst_score: worst.score,
            worst_index: worst.index,
        }
    }

    pub fn best(&self) -> ScoredResult {
        ScoredResult::new(self.best_score, self.best_index)
    }

    pub fn worst(&self) -> ScoredResult {
        ScoredResult::new(self.worst_score, self.worst_index)
    }

    /// Bitwise comparison, so `-0.0` and `0.0` (or two NaNs) are told apart.
    pub fn bit_identical(&self, other: &ReductionResult) -> bool {
        self.best_score.to_bits() == other.best_score.to_bits()
            && self.best_index == other.best_index
            && self.worst_score.to_bits() == other.worst_score.to_bits()
            && self.worst_index == other.worst_index
    }
}

/// Scores are serialized as their IEEE-754 bit pattern. Text floats lose the
/// last bit on some values and cannot carry infinities or NaN.
mod score_bits {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(score: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(score.to_bits())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = u64::deserialize(deserializer)?;
        Ok(f64::from_bits(bits))
    }
}
