//! Record types flowing through the pipeline, and the raw source schema.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

use crate::error::{PipelineError, RecordKey, Result, Stage};

/// Expected source columns, in source order.
pub const RAW_COLUMNS: [&str; 17] = [
    "instant",
    "dteday",
    "season",
    "yr",
    "mnth",
    "hr",
    "holiday",
    "weekday",
    "workingday",
    "weathersit",
    "temp",
    "atemp",
    "hum",
    "windspeed",
    "casual",
    "registered",
    "cnt",
];

/// Positions in [`RAW_COLUMNS`].
pub mod col {
    pub const INSTANT: usize = 0;
    pub const DTEDAY: usize = 1;
    pub const SEASON: usize = 2;
    pub const YR: usize = 3;
    pub const MNTH: usize = 4;
    pub const HR: usize = 5;
    pub const HOLIDAY: usize = 6;
    pub const WEEKDAY: usize = 7;
    pub const WORKINGDAY: usize = 8;
    pub const WEATHERSIT: usize = 9;
    pub const TEMP: usize = 10;
    pub const ATEMP: usize = 11;
    pub const HUM: usize = 12;
    pub const WINDSPEED: usize = 13;
    pub const CASUAL: usize = 14;
    pub const REGISTERED: usize = 15;
    pub const CNT: usize = 16;
}

/// The source table as read: header names plus untyped cell values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Maps each expected column to its position in a concrete table.
#[derive(Debug, Clone)]
pub struct ColumnIndex {
    positions: [usize; 17],
}

impl ColumnIndex {
    /// Resolves the expected schema against `headers`.
    ///
    /// Column order is free; the count and the name set must match exactly.
    pub fn resolve(headers: &[String], stage: Stage) -> Result<Self> {
        let found: HashSet<&str> = headers.iter().map(|h| h.trim()).collect();
        let expected: HashSet<&str> = RAW_COLUMNS.iter().copied().collect();

        if headers.len() != RAW_COLUMNS.len() || found != expected {
            let mut missing: Vec<_> = expected.difference(&found).copied().collect();
            let mut unexpected: Vec<_> = found.difference(&expected).copied().collect();
            missing.sort_unstable();
            unexpected.sort_unstable();
            return Err(PipelineError::Schema {
                stage,
                message: format!(
                    "expected {} columns, found {}; missing {:?}; unexpected {:?}",
                    RAW_COLUMNS.len(),
                    headers.len(),
                    missing,
                    unexpected
                ),
            });
        }

        let mut positions = [0usize; 17];
        for (slot, name) in positions.iter_mut().zip(RAW_COLUMNS) {
            // Presence was checked above.
            *slot = headers.iter().position(|h| h.trim() == name).unwrap_or_default();
        }
        Ok(Self { positions })
    }

    pub fn reader<'a>(&'a self, stage: Stage, row: usize, values: &'a [String]) -> RowReader<'a> {
        RowReader {
            stage,
            key: RecordKey::Row(row),
            columns: self,
            values,
        }
    }
}

/// Typed access to one raw row, attributing failures to a stage and record.
pub struct RowReader<'a> {
    stage: Stage,
    key: RecordKey,
    columns: &'a ColumnIndex,
    values: &'a [String],
}

impl<'a> RowReader<'a> {
    pub fn key(&self) -> RecordKey {
        self.key
    }

    /// Switches error attribution from the row number to the record index.
    pub fn identify(&mut self, instant: u32) {
        self.key = RecordKey::Instant(instant);
    }

    pub fn raw(&self, column: usize) -> &'a str {
        self.values
            .get(self.columns.positions[column])
            .map(|v| v.trim())
            .unwrap_or("")
    }

    pub fn parse<T: FromStr>(&self, column: usize, expected: &'static str) -> Result<T> {
        let raw = self.raw(column);
        raw.parse::<T>().map_err(|_| self.type_error(column, raw, expected))
    }

    pub fn date(&self, column: usize) -> Result<NaiveDate> {
        let raw = self.raw(column);
        parse_date(raw).ok_or_else(|| self.type_error(column, raw, "date (YYYY-MM-DD)"))
    }

    pub fn range_error(
        &self,
        column: usize,
        value: impl ToString,
        constraint: impl Into<String>,
    ) -> PipelineError {
        PipelineError::Range {
            stage: self.stage,
            key: self.key,
            field: RAW_COLUMNS[column],
            value: value.to_string(),
            constraint: constraint.into(),
        }
    }

    fn type_error(&self, column: usize, raw: &str, expected: &'static str) -> PipelineError {
        PipelineError::Type {
            stage: self.stage,
            key: self.key,
            field: RAW_COLUMNS[column],
            value: raw.to_string(),
            expected,
        }
    }
}

/// Accepts `YYYY-MM-DD` and ISO datetimes (`YYYY-MM-DDTHH:MM:SS`).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.date()))
        .ok()
}

/// One hourly observation, fully typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub instant: u32,
    pub dteday: NaiveDate,
    pub season: u8,
    pub yr: u8,
    pub mnth: u8,
    pub hr: u8,
    pub holiday: u8,
    pub weekday: u8,
    pub workingday: u8,
    pub weathersit: u8,
    pub temp: f64,
    pub atemp: f64,
    pub hum: f64,
    pub windspeed: f64,
    pub casual: u32,
    pub registered: u32,
    pub cnt: u32,
}

impl RawRecord {
    /// Coerces every field of a raw row to its semantic type.
    pub fn from_row(mut row: RowReader<'_>) -> Result<Self> {
        let instant = row.parse(col::INSTANT, "record index")?;
        row.identify(instant);

        Ok(Self {
            instant,
            dteday: row.date(col::DTEDAY)?,
            season: row.parse(col::SEASON, "categorical code")?,
            yr: row.parse(col::YR, "year offset")?,
            mnth: row.parse(col::MNTH, "categorical code")?,
            hr: row.parse(col::HR, "hour of day")?,
            holiday: row.parse(col::HOLIDAY, "flag")?,
            weekday: row.parse(col::WEEKDAY, "categorical code")?,
            workingday: row.parse(col::WORKINGDAY, "flag")?,
            weathersit: row.parse(col::WEATHERSIT, "categorical code")?,
            temp: row.parse(col::TEMP, "float fraction")?,
            atemp: row.parse(col::ATEMP, "float fraction")?,
            hum: row.parse(col::HUM, "float fraction")?,
            windspeed: row.parse(col::WINDSPEED, "float fraction")?,
            casual: row.parse(col::CASUAL, "non-negative count")?,
            registered: row.parse(col::REGISTERED, "non-negative count")?,
            cnt: row.parse(col::CNT, "non-negative count")?,
        })
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::Instant(self.instant)
    }
}

/// Climate values scaled back to physical units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DenormalizedClimate {
    pub temp_celsius: f64,
    pub atemp_celsius: f64,
    pub humidity_pct: f64,
    pub windspeed_kmh: f64,
}

/// Normalizer output: the raw record plus its denormalized climate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub raw: RawRecord,
    pub climate: DenormalizedClimate,
}

/// Feature engineer output, one per surviving raw record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub raw: RawRecord,
    pub climate: DenormalizedClimate,
    pub is_peak_hour: bool,
    pub is_weekend: bool,
    pub season_name: String,
    pub weather_desc: String,
    pub day_name: String,
    pub month_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Vec<String> {
        RAW_COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    fn row(values: &str) -> Vec<String> {
        values.split(',').map(str::to_string).collect()
    }

    #[test]
    fn test_resolve_accepts_reordered_columns() {
        let mut h = headers();
        h.swap(0, 16);
        let index = ColumnIndex::resolve(&h, Stage::Validate).unwrap();
        let values = row("16,2011-01-01,1,0,1,0,0,6,0,1,0.24,0.2879,0.81,0,3,13,1");
        let record = RawRecord::from_row(index.reader(Stage::Normalize, 1, &values)).unwrap();
        assert_eq!(record.instant, 1);
        assert_eq!(record.cnt, 16);
    }

    #[test]
    fn test_resolve_reports_missing_and_unexpected() {
        let mut h = headers();
        h[16] = "total".into();
        let err = ColumnIndex::resolve(&h, Stage::Validate).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, PipelineError::Schema { .. }));
        assert!(msg.contains("\"cnt\""));
        assert!(msg.contains("\"total\""));
    }

    #[test]
    fn test_resolve_rejects_extra_column() {
        let mut h = headers();
        h.push("notes".into());
        assert!(matches!(
            ColumnIndex::resolve(&h, Stage::Validate),
            Err(PipelineError::Schema { .. })
        ));
    }

    #[test]
    fn test_from_row_type_error_names_record() {
        let index = ColumnIndex::resolve(&headers(), Stage::Normalize).unwrap();
        let values = row("7,2011-01-01,1,0,1,x,0,6,0,1,0.24,0.2879,0.81,0,3,13,16");
        let err = RawRecord::from_row(index.reader(Stage::Normalize, 1, &values)).unwrap_err();
        match err {
            PipelineError::Type { key, field, .. } => {
                assert_eq!(key, RecordKey::Instant(7));
                assert_eq!(field, "hr");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_row_bad_index_falls_back_to_row_number() {
        let index = ColumnIndex::resolve(&headers(), Stage::Normalize).unwrap();
        let values = row("abc,2011-01-01,1,0,1,0,0,6,0,1,0.24,0.2879,0.81,0,3,13,16");
        let err = RawRecord::from_row(index.reader(Stage::Normalize, 5, &values)).unwrap_err();
        assert!(matches!(err, PipelineError::Type { key: RecordKey::Row(5), .. }));
    }

    #[test]
    fn test_negative_count_is_a_type_error() {
        let index = ColumnIndex::resolve(&headers(), Stage::Normalize).unwrap();
        let values = row("1,2011-01-01,1,0,1,0,0,6,0,1,0.24,0.2879,0.81,0,-3,13,10");
        let err = RawRecord::from_row(index.reader(Stage::Normalize, 1, &values)).unwrap_err();
        assert!(matches!(err, PipelineError::Type { field: "casual", .. }));
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2012, 3, 4);
        assert_eq!(parse_date("2012-03-04"), expected);
        assert_eq!(parse_date("2012-03-04T00:00:00"), expected);
        assert_eq!(parse_date("03/04/2012"), None);
    }
}
