//! Schema and value-range gate over the raw table.
//!
//! The validator never touches the rows it inspects; on success the same
//! table moves on to the normalizer.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::info;

use crate::config::ObservationWindow;
use crate::error::{Result, Stage};
use crate::model::{ColumnIndex, RawTable, col};

const CLIMATE_COLUMNS: [usize; 4] = [col::TEMP, col::ATEMP, col::HUM, col::WINDSPEED];

/// Descriptive statistics of an accepted table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationSummary {
    pub records: usize,
    pub columns: usize,
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    pub total_rentals: u64,
    pub mean_rentals_per_hour: f64,
}

pub struct Validator {
    window: ObservationWindow,
}

impl Validator {
    pub fn new(window: ObservationWindow) -> Self {
        Self { window }
    }

    /// Checks the schema, then every row, stopping at the first violation.
    #[tracing::instrument(skip_all, fields(stage = %Stage::Validate, rows = table.len()))]
    pub fn validate(&self, table: &RawTable) -> Result<ValidationSummary> {
        let columns = ColumnIndex::resolve(&table.headers, Stage::Validate)?;

        let mut min_date: Option<NaiveDate> = None;
        let mut max_date: Option<NaiveDate> = None;
        let mut total_rentals = 0u64;

        for (i, values) in table.rows.iter().enumerate() {
            let mut row = columns.reader(Stage::Validate, i + 1, values);
            let instant: u32 = row.parse(col::INSTANT, "record index")?;
            row.identify(instant);

            let date = row.date(col::DTEDAY)?;
            if !self.window.contains(date.year()) {
                return Err(row.range_error(
                    col::DTEDAY,
                    date,
                    format!(
                        "year in {{{}, {}}}",
                        self.window.first_year,
                        self.window.second_year()
                    ),
                ));
            }

            let yr: u8 = row.parse(col::YR, "year offset")?;
            let expected_offset = date.year() - self.window.first_year;
            if i32::from(yr) != expected_offset {
                return Err(row.range_error(
                    col::YR,
                    yr,
                    format!("yr == year offset of {date} ({expected_offset})"),
                ));
            }

            let hr: u8 = row.parse(col::HR, "hour of day")?;
            if hr > 23 {
                return Err(row.range_error(col::HR, hr, "0 <= hr <= 23"));
            }

            for flag in [col::HOLIDAY, col::WORKINGDAY] {
                let value: u8 = row.parse(flag, "flag")?;
                if value > 1 {
                    return Err(row.range_error(flag, value, "flag in {0, 1}"));
                }
            }

            for column in CLIMATE_COLUMNS {
                let value: f64 = row.parse(column, "float fraction")?;
                if !(0.0..=1.0).contains(&value) {
                    return Err(row.range_error(column, value, "0 <= value <= 1"));
                }
            }

            let casual: u32 = row.parse(col::CASUAL, "non-negative count")?;
            let registered: u32 = row.parse(col::REGISTERED, "non-negative count")?;
            let cnt: u32 = row.parse(col::CNT, "non-negative count")?;
            let expected_total = u64::from(casual) + u64::from(registered);
            if u64::from(cnt) != expected_total {
                return Err(row.range_error(
                    col::CNT,
                    cnt,
                    format!("cnt == casual + registered ({expected_total})"),
                ));
            }

            min_date = Some(min_date.map_or(date, |d| d.min(date)));
            max_date = Some(max_date.map_or(date, |d| d.max(date)));
            total_rentals += u64::from(cnt);
        }

        let records = table.len();
        let mean_rentals_per_hour = if records == 0 {
            0.0
        } else {
            total_rentals as f64 / records as f64
        };

        let summary = ValidationSummary {
            records,
            columns: table.headers.len(),
            min_date,
            max_date,
            total_rentals,
            mean_rentals_per_hour,
        };

        info!(
            records = summary.records,
            columns = summary.columns,
            min_date = ?summary.min_date,
            max_date = ?summary.max_date,
            total_rentals = summary.total_rentals,
            mean_rentals_per_hour = summary.mean_rentals_per_hour,
            "Dataset accepted"
        );

        Ok(summary)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ObservationWindow::default())
    }
}
