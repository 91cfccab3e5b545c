//! Reads raw trip CSV exports into typed [`TripRecord`]s.
//!
//! Rows with a missing or unparseable required value are dropped and counted,
//! never treated as errors. Only I/O and header-level CSV failures abort.

use chrono::{DateTime, NaiveDateTime};
use csv::{ByteRecord, ReaderBuilder, Trim};
use flate2::read::MultiGzDecoder;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::PipelineError;

pub const STARTED_AT: &str = "started_at";
pub const ENDED_AT: &str = "ended_at";
pub const START_LAT: &str = "start_lat";
pub const START_LNG: &str = "start_lng";
pub const END_LAT: &str = "end_lat";
pub const END_LNG: &str = "end_lng";

/// Columns every input file must provide, in [`ColumnIndex`] order.
pub const REQUIRED_COLUMNS: [&str; 6] =
    [STARTED_AT, ENDED_AT, START_LAT, START_LNG, END_LAT, END_LNG];

/// Accepted local timestamp layouts, tried in order.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
];

/// One fully-populated trip row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripRecord {
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub start_lat: f64,
    pub start_lng: f64,
    pub end_lat: f64,
    pub end_lng: f64,
}

/// Why a raw row was left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The column is absent from the header, short in this row, or empty.
    MissingField { column: &'static str },
    /// The value is present but does not convert to its target type.
    UnparseableValue { column: &'static str },
}

/// Dropped rows broken down by reason and column.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DropCounts {
    pub missing_field: BTreeMap<&'static str, u64>,
    pub unparseable_value: BTreeMap<&'static str, u64>,
}

impl DropCounts {
    pub fn record(&mut self, reason: DropReason) {
        let (map, column) = match reason {
            DropReason::MissingField { column } => (&mut self.missing_field, column),
            DropReason::UnparseableValue { column } => (&mut self.unparseable_value, column),
        };
        *map.entry(column).or_default() += 1;
    }

    pub fn merge(&mut self, other: DropCounts) {
        for (column, n) in other.missing_field {
            *self.missing_field.entry(column).or_default() += n;
        }
        for (column, n) in other.unparseable_value {
            *self.unparseable_value.entry(column).or_default() += n;
        }
    }
}

/// Result of loading one or more inputs.
#[derive(Debug, Default, Clone, Serialize)]
pub struct LoadOutcome {
    #[serde(skip)]
    pub records: Vec<TripRecord>,
    pub files: usize,
    pub rows_read: u64,
    pub dropped: u64,
    pub drop_reasons: DropCounts,
}

impl LoadOutcome {
    pub fn kept(&self) -> usize {
        self.records.len()
    }

    fn drop_row(&mut self, reason: DropReason) {
        self.dropped += 1;
        self.drop_reasons.record(reason);
    }

    /// Appends `other` after `self`. Record order follows merge order.
    pub fn merge(mut self, other: LoadOutcome) -> Self {
        self.records.extend(other.records);
        self.files += other.files;
        self.rows_read += other.rows_read;
        self.dropped += other.dropped;
        self.drop_reasons.merge(other.drop_reasons);
        self
    }
}

/// Header positions of the required columns.
#[derive(Debug, Clone, Copy)]
struct ColumnIndex([Option<usize>; 6]);

impl ColumnIndex {
    fn from_headers(headers: &ByteRecord) -> Self {
        let mut positions = [None; 6];
        for (slot, name) in positions.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = headers.iter().position(|h| {
                let h = h.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(h);
                h.trim_ascii() == name.as_bytes()
            });
        }
        Self(positions)
    }

    fn missing(&self) -> Vec<&'static str> {
        REQUIRED_COLUMNS
            .iter()
            .zip(self.0)
            .filter(|(_, pos)| pos.is_none())
            .map(|(name, _)| *name)
            .collect()
    }

    fn field<'r>(&self, record: &'r ByteRecord, slot: usize) -> Result<&'r str, DropReason> {
        let column = REQUIRED_COLUMNS[slot];
        let raw = self.0[slot]
            .and_then(|pos| record.get(pos))
            .ok_or(DropReason::MissingField { column })?;
        let value = std::str::from_utf8(raw)
            .map_err(|_| DropReason::UnparseableValue { column })?
            .trim();
        if value.is_empty() {
            return Err(DropReason::MissingField { column });
        }
        Ok(value)
    }

    fn timestamp(&self, record: &ByteRecord, slot: usize) -> Result<NaiveDateTime, DropReason> {
        let value = self.field(record, slot)?;
        parse_timestamp(value).ok_or(DropReason::UnparseableValue {
            column: REQUIRED_COLUMNS[slot],
        })
    }

    fn coordinate(&self, record: &ByteRecord, slot: usize) -> Result<f64, DropReason> {
        let column = REQUIRED_COLUMNS[slot];
        let value = self.field(record, slot)?;
        match value.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(DropReason::UnparseableValue { column }),
        }
    }

    fn parse(&self, record: &ByteRecord) -> Result<TripRecord, DropReason> {
        Ok(TripRecord {
            start_time: self.timestamp(record, 0)?,
            end_time: self.timestamp(record, 1)?,
            start_lat: self.coordinate(record, 2)?,
            start_lng: self.coordinate(record, 3)?,
            end_lat: self.coordinate(record, 4)?,
            end_lng: self.coordinate(record, 5)?,
        })
    }
}

/// Parses a local timestamp to at least second precision. Values carrying a
/// UTC offset are normalized to UTC.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

/// Reads trip rows from any CSV source with a header row. `source` only
/// labels log lines.
pub fn load_reader<R: Read>(reader: R, source: &str) -> Result<LoadOutcome, PipelineError> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let columns = ColumnIndex::from_headers(rdr.byte_headers()?);
    let missing = columns.missing();
    if !missing.is_empty() {
        warn!(source, ?missing, "Input is missing required columns, all rows will be dropped");
    }

    let mut outcome = LoadOutcome {
        files: 1,
        ..Default::default()
    };
    let mut record = ByteRecord::new();

    while rdr.read_byte_record(&mut record)? {
        outcome.rows_read += 1;
        match columns.parse(&record) {
            Ok(trip) => outcome.records.push(trip),
            Err(reason) => outcome.drop_row(reason),
        }
    }

    debug!(
        source,
        rows_read = outcome.rows_read,
        kept = outcome.kept(),
        dropped = outcome.dropped,
        "Loaded input"
    );

    Ok(outcome)
}

/// Loads a single `.csv` file, or a gzip-compressed one when the name ends
/// in `.gz`.
pub fn load_file(path: &Path) -> Result<LoadOutcome, PipelineError> {
    let file = BufReader::new(File::open(path)?);
    let source = path.display().to_string();

    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        load_reader(MultiGzDecoder::new(file), &source)
    } else {
        load_reader(file, &source)
    }
}

/// Expands directories into their `.csv` / `.csv.gz` entries (sorted); plain
/// file paths are kept as given.
pub fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, PipelineError> {
    let mut files = Vec::new();

    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(input)? {
            let path = entry?.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if path.is_file() && (name.ends_with(".csv") || name.ends_with(".csv.gz")) {
                entries.push(path);
            }
        }
        entries.sort();
        files.extend(entries);
    }

    Ok(files)
}

/// Loads every file in parallel and merges the outcomes in input order.
#[tracing::instrument(skip(paths), fields(files = paths.len()))]
pub fn load_files(paths: &[PathBuf]) -> Result<LoadOutcome, PipelineError> {
    let outcomes = paths
        .par_iter()
        .map(|path| load_file(path))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(outcomes
        .into_iter()
        .fold(LoadOutcome::default(), LoadOutcome::merge))
}
