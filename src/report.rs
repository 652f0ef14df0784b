//! Text rendering of results for the binaries. Hours are 1-based here.

use std::fmt::Write;
use std::time::Duration;

use crate::model::{Record, ScoredResult};

pub fn hour_of(index: usize) -> usize {
    index + 1
}

pub fn describe_record(record: &Record) -> String {
    format!(
        "CO: {:.1} mg/m3, NMHC: {:.0} ug/m3, NOx: {:.0} ppb, Temp: {:.1} C, Humidity: {:.1}%",
        record.co, record.nmhc, record.nox, record.temperature, record.humidity
    )
}

/// Block for one extreme, e.g. the best hour.
pub fn extreme(title: &str, scored: ScoredResult, record: Option<&Record>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}:", title);
    let _ = writeln!(out, "   Hour: {}, Score: {:.2}", hour_of(scored.index), scored.score);
    if let Some(record) = record {
        let _ = writeln!(out, "   {}", describe_record(record));
    }
    out
}

/// One line of a sweep summary table.
pub fn sweep_row(workers: usize, elapsed: Duration, best: ScoredResult, worst: ScoredResult) -> String {
    format!(
        "{:>7} | {:>12.6}s | best hour {:>3} ({:>9.2}) | worst hour {:>3} ({:>9.2})",
        workers,
        elapsed.as_secs_f64(),
        hour_of(best.index),
        best.score,
        hour_of(worst.index),
        worst.score
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extreme_uses_one_based_hours() {
        let record = Record::new(0.5, 33.0, 29.0, 16.3, 52.8);
        let text = extreme("BEST AIR QUALITY (LOWEST SCORE)", ScoredResult::new(129.19, 9), Some(&record));
        assert!(text.contains("Hour: 10, Score: 129.19"));
        assert!(text.contains("NMHC: 33 ug/m3"));
        assert!(text.contains("Humidity: 52.8%"));
    }

    #[test]
    fn sweep_row_lists_both_hours() {
        let row = sweep_row(
            4,
            Duration::from_micros(12),
            ScoredResult::new(129.19, 9),
            ScoredResult::new(2080.11, 3),
        );
        assert!(row.contains("best hour  10"));
        assert!(row.contains("worst hour   4"));
    }
}
