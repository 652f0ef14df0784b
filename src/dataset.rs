use std::fs;
use std::path::Path;

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, not_line_ending},
    combinator::{all_consuming, opt},
    multi::separated_list1,
    number::complete::double,
    sequence::{delimited, preceded, tuple},
    IResult,
};
use rand::Rng;
use tracing::info;

use crate::error::DatasetError;
use crate::model::{Record, RecordSet, ATTRIBUTE_COUNT};
use crate::parser::ws;

/// Ten hourly readings. Columns: CO, NMHC, NOx, Temperature, Humidity.
const SAMPLE_HOURS: [[f64; ATTRIBUTE_COUNT]; 10] = [
    [1.9, 145.0, 128.0, 19.6, 35.9], // Hour 1
    [1.2, 88.0, 69.0, 15.1, 58.2],   // Hour 2
    [3.1, 342.0, 207.0, 13.8, 58.2], // Hour 3
    [4.4, 776.0, 256.0, 18.4, 46.3], // Hour 4
    [2.8, 386.0, 196.0, 26.7, 28.7], // Hour 5
    [1.6, 144.0, 133.0, 12.6, 50.8], // Hour 6
    [1.4, 88.0, 95.0, 9.3, 75.0],    // Hour 7
    [2.9, 468.0, 180.0, 19.4, 44.1], // Hour 8
    [4.2, 589.0, 211.0, 22.8, 32.1], // Hour 9
    [0.5, 33.0, 29.0, 16.3, 52.8],   // Hour 10
];

pub fn sample() -> RecordSet {
    SAMPLE_HOURS.iter().copied().map(Record::from_attributes).collect()
}

/// Random readings in roughly the same ranges as the sample hours.
pub fn synthetic<R: Rng>(rng: &mut R, n: usize) -> RecordSet {
    (0..n)
        .map(|_| Record {
            co: rng.gen_range(0.1..6.0),
            nmhc: rng.gen_range(10.0..1000.0),
            nox: rng.gen_range(10.0..400.0),
            temperature: rng.gen_range(-5.0..40.0),
            humidity: rng.gen_range(10.0..95.0),
        })
        .collect()
}

pub fn load(path: &Path) -> Result<RecordSet, DatasetError> {
    let text = fs::read_to_string(path)?;
    let records = parse_records(&text)?;
    info!(path = %path.display(), records = records.len(), "dataset loaded");
    Ok(records)
}

// --- ROW FORMAT ---
// {1.9, 145, 128, 19.6, 35.9},  // Hour 1
// 1.2, 88, 69, 15.1, 58.2       # braces, trailing comma and comments optional

fn comment(input: &str) -> IResult<&str, &str> {
    preceded(alt((tag("//"), tag("#"))), not_line_ending)(input)
}

fn values(input: &str) -> IResult<&str, Vec<f64>> {
    separated_list1(ws(char(',')), ws(double))(input)
}

fn row(input: &str) -> IResult<&str, Vec<f64>> {
    let braced = delimited(ws(char('{')), values, ws(char('}')));
    let (input, (fields, _, _)) = tuple((alt((braced, values)), opt(ws(char(','))), opt(comment)))(input)?;
    Ok((input, fields))
}

pub fn parse_records(text: &str) -> Result<RecordSet, DatasetError> {
    let mut records = Vec::new();

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with("//") || line.starts_with('#') {
            continue;
        }

        let fields = match all_consuming(row)(line) {
            Ok((_, fields)) => fields,
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                return Err(DatasetError::Syntax {
                    line: line_no,
                    message: format!("Invalid syntax near: '{}'", e.input),
                });
            }
            Err(nom::Err::Incomplete(_)) => {
                return Err(DatasetError::Syntax { line: line_no, message: "Incomplete row.".to_string() });
            }
        };

        let attrs: [f64; ATTRIBUTE_COUNT] = fields.try_into().map_err(|found: Vec<f64>| DatasetError::Syntax {
            line: line_no,
            message: format!("expected {} values, found {}", ATTRIBUTE_COUNT, found.len()),
        })?;
        records.push(Record::from_attributes(attrs));
    }

    if records.is_empty() {
        return Err(DatasetError::Empty);
    }
    Ok(RecordSet::new(records))
}
