//! Type coercion, exact-duplicate removal and climate denormalization.

use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::error::{Result, Stage};
use crate::model::{ColumnIndex, DenormalizedClimate, NormalizedRecord, RawRecord, RawTable};

/// Maximum physical values the source fractions were normalized by.
pub const TEMP_MAX_CELSIUS: f64 = 41.0;
pub const ATEMP_MAX_CELSIUS: f64 = 50.0;
pub const HUMIDITY_MAX_PCT: f64 = 100.0;
pub const WINDSPEED_MAX_KMH: f64 = 67.0;

#[derive(Debug, Clone, Serialize)]
pub struct NormalizedDataset {
    pub records: Vec<NormalizedRecord>,
    pub duplicates_removed: usize,
}

/// Field-wise identity of a record. Floats compare by bit pattern, with the
/// two zeros folded together.
#[derive(Debug, PartialEq, Eq, Hash)]
struct Fingerprint {
    ints: [u32; 12],
    date: chrono::NaiveDate,
    floats: [u64; 4],
}

impl Fingerprint {
    fn of(r: &RawRecord) -> Self {
        let bits = |v: f64| (v + 0.0).to_bits();
        Self {
            ints: [
                r.instant,
                r.season.into(),
                r.yr.into(),
                r.mnth.into(),
                r.hr.into(),
                r.holiday.into(),
                r.weekday.into(),
                r.workingday.into(),
                r.weathersit.into(),
                r.casual,
                r.registered,
                r.cnt,
            ],
            date: r.dteday,
            floats: [bits(r.temp), bits(r.atemp), bits(r.hum), bits(r.windspeed)],
        }
    }
}

pub fn denormalize(raw: &RawRecord) -> DenormalizedClimate {
    DenormalizedClimate {
        temp_celsius: raw.temp * TEMP_MAX_CELSIUS,
        atemp_celsius: raw.atemp * ATEMP_MAX_CELSIUS,
        humidity_pct: raw.hum * HUMIDITY_MAX_PCT,
        windspeed_kmh: raw.windspeed * WINDSPEED_MAX_KMH,
    }
}

/// Coerces every row, drops exact duplicates and appends physical units.
///
/// Rows are visited in table order, so the surviving copy of a duplicate is
/// always its first occurrence and output order follows input order.
#[tracing::instrument(skip_all, fields(stage = %Stage::Normalize, rows = table.len()))]
pub fn normalize(table: &RawTable) -> Result<NormalizedDataset> {
    let columns = ColumnIndex::resolve(&table.headers, Stage::Normalize)?;

    let mut seen = HashSet::with_capacity(table.len());
    let mut records = Vec::with_capacity(table.len());

    for (i, values) in table.rows.iter().enumerate() {
        let raw = RawRecord::from_row(columns.reader(Stage::Normalize, i + 1, values))?;
        if !seen.insert(Fingerprint::of(&raw)) {
            continue;
        }
        let climate = denormalize(&raw);
        records.push(NormalizedRecord { raw, climate });
    }

    let duplicates_removed = table.len() - records.len();
    if duplicates_removed > 0 {
        warn!(duplicates_removed, "Exact duplicate records dropped");
    } else {
        info!("No duplicate records found");
    }

    log_range("temp_celsius", records.iter().map(|r| r.climate.temp_celsius));
    log_range("atemp_celsius", records.iter().map(|r| r.climate.atemp_celsius));
    log_range("humidity_pct", records.iter().map(|r| r.climate.humidity_pct));
    log_range("windspeed_kmh", records.iter().map(|r| r.climate.windspeed_kmh));

    info!(records = records.len(), "Normalization complete");

    Ok(NormalizedDataset {
        records,
        duplicates_removed,
    })
}

fn log_range(column: &'static str, values: impl Iterator<Item = f64>) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if min <= max {
        info!(column, min, max, "Denormalized range");
    }
}
