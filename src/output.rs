//! Parquet artifacts for the enriched dataset and both rollups.
//!
//! Each artifact is written whole and overwrites any previous file, so
//! re-running the stage is idempotent.

use arrow::array::{
    Array, ArrayRef, BooleanArray, Date32Array, Float64Array, Int32Array, StringArray, UInt8Array,
    UInt32Array, UInt64Array,
};
use arrow::datatypes::{Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::aggregators::{DailyAggregate, WeeklyAggregate};
use crate::config::Codec;
use crate::error::{PipelineError, Result, Stage};
use crate::model::EnrichedRecord;

pub const FULL_ARTIFACT: &str = "bike_sharing_full.parquet";
pub const DAILY_ARTIFACT: &str = "daily_summary.parquet";
pub const WEEKLY_ARTIFACT: &str = "weekly_summary.parquet";

/// `num_days_from_ce` of 1970-01-01; Arrow `Date32` counts days from there.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactReport {
    pub name: &'static str,
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WriteReport {
    pub artifacts: Vec<ArtifactReport>,
}

impl WriteReport {
    pub fn total_kb(&self) -> f64 {
        self.artifacts.iter().map(|a| a.bytes).sum::<u64>() as f64 / 1024.0
    }
}

pub struct ParquetWriter {
    compression: Compression,
}

impl ParquetWriter {
    pub fn new(codec: Codec) -> Self {
        let compression = match codec {
            Codec::Snappy => Compression::SNAPPY,
            Codec::Gzip => Compression::GZIP(GzipLevel::default()),
            Codec::Lz4 => Compression::LZ4_RAW,
            Codec::Zstd => Compression::ZSTD(ZstdLevel::default()),
            Codec::None => Compression::UNCOMPRESSED,
        };
        Self { compression }
    }

    /// Writes all three artifacts into `dir`, creating it if needed.
    #[tracing::instrument(skip_all, fields(stage = %Stage::Write, dir = %dir.display()))]
    pub fn write_all(
        &self,
        dir: &Path,
        enriched: &[EnrichedRecord],
        daily: &[DailyAggregate],
        weekly: &[WeeklyAggregate],
    ) -> Result<WriteReport> {
        fs::create_dir_all(dir).map_err(|e| PipelineError::io(Stage::Write, dir, e))?;

        let artifacts = vec![
            self.write_artifact(dir, FULL_ARTIFACT, enriched_batch(enriched))?,
            self.write_artifact(dir, DAILY_ARTIFACT, daily_batch(daily))?,
            self.write_artifact(dir, WEEKLY_ARTIFACT, weekly_batch(weekly))?,
        ];
        let report = WriteReport { artifacts };

        info!(
            files = report.artifacts.len(),
            total_kb = report.total_kb(),
            "All artifacts written"
        );
        Ok(report)
    }

    fn write_artifact(
        &self,
        dir: &Path,
        name: &'static str,
        batch: std::result::Result<RecordBatch, ArrowError>,
    ) -> Result<ArtifactReport> {
        let path = dir.join(name);
        let io_err = |e: std::io::Error| PipelineError::io(Stage::Write, &path, e);

        let batch = batch.map_err(|e| io_err(std::io::Error::other(e)))?;

        let file = File::create(&path).map_err(io_err)?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .build();

        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
            .map_err(|e| io_err(std::io::Error::other(e)))?;
        if batch.num_rows() > 0 {
            writer
                .write(&batch)
                .map_err(|e| io_err(std::io::Error::other(e)))?;
        }
        writer.close().map_err(|e| io_err(std::io::Error::other(e)))?;

        let bytes = fs::metadata(&path).map_err(io_err)?.len();
        info!(
            artifact = name,
            rows = batch.num_rows(),
            columns = batch.num_columns(),
            size_kb = bytes as f64 / 1024.0,
            "Artifact written"
        );

        Ok(ArtifactReport {
            name,
            path,
            rows: batch.num_rows(),
            bytes,
        })
    }
}

/// Column-by-column batch assembly; every column is non-nullable.
#[derive(Default)]
struct Columns {
    fields: Vec<Field>,
    arrays: Vec<ArrayRef>,
}

impl Columns {
    fn push(&mut self, name: &str, array: ArrayRef) {
        self.fields
            .push(Field::new(name, array.data_type().clone(), false));
        self.arrays.push(array);
    }

    fn finish(self) -> std::result::Result<RecordBatch, ArrowError> {
        debug!(columns = self.fields.len(), "Assembling record batch");
        RecordBatch::try_new(Arc::new(Schema::new(self.fields)), self.arrays)
    }
}

fn date32(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

fn column<'a, T, A>(rows: &'a [T], f: impl Fn(&'a T) -> A) -> Vec<A> {
    rows.iter().map(f).collect()
}

pub fn enriched_batch(records: &[EnrichedRecord]) -> std::result::Result<RecordBatch, ArrowError> {
    let mut c = Columns::default();
    c.push("instant", Arc::new(UInt32Array::from(column(records, |r| r.raw.instant))));
    c.push("dteday", Arc::new(Date32Array::from(column(records, |r| date32(r.raw.dteday)))));
    c.push("season", Arc::new(UInt8Array::from(column(records, |r| r.raw.season))));
    c.push("yr", Arc::new(UInt8Array::from(column(records, |r| r.raw.yr))));
    c.push("mnth", Arc::new(UInt8Array::from(column(records, |r| r.raw.mnth))));
    c.push("hr", Arc::new(UInt8Array::from(column(records, |r| r.raw.hr))));
    c.push("holiday", Arc::new(UInt8Array::from(column(records, |r| r.raw.holiday))));
    c.push("weekday", Arc::new(UInt8Array::from(column(records, |r| r.raw.weekday))));
    c.push("workingday", Arc::new(UInt8Array::from(column(records, |r| r.raw.workingday))));
    c.push("weathersit", Arc::new(UInt8Array::from(column(records, |r| r.raw.weathersit))));
    c.push("temp", Arc::new(Float64Array::from(column(records, |r| r.raw.temp))));
    c.push("atemp", Arc::new(Float64Array::from(column(records, |r| r.raw.atemp))));
    c.push("hum", Arc::new(Float64Array::from(column(records, |r| r.raw.hum))));
    c.push("windspeed", Arc::new(Float64Array::from(column(records, |r| r.raw.windspeed))));
    c.push("casual", Arc::new(UInt32Array::from(column(records, |r| r.raw.casual))));
    c.push("registered", Arc::new(UInt32Array::from(column(records, |r| r.raw.registered))));
    c.push("cnt", Arc::new(UInt32Array::from(column(records, |r| r.raw.cnt))));
    c.push("temp_celsius", Arc::new(Float64Array::from(column(records, |r| r.climate.temp_celsius))));
    c.push("atemp_celsius", Arc::new(Float64Array::from(column(records, |r| r.climate.atemp_celsius))));
    c.push("humidity_pct", Arc::new(Float64Array::from(column(records, |r| r.climate.humidity_pct))));
    c.push("windspeed_kmh", Arc::new(Float64Array::from(column(records, |r| r.climate.windspeed_kmh))));
    c.push("is_peak_hour", Arc::new(BooleanArray::from(column(records, |r| r.is_peak_hour))));
    c.push("is_weekend", Arc::new(BooleanArray::from(column(records, |r| r.is_weekend))));
    c.push("season_name", Arc::new(StringArray::from(column(records, |r| r.season_name.as_str()))));
    c.push("weather_desc", Arc::new(StringArray::from(column(records, |r| r.weather_desc.as_str()))));
    c.push("day_name", Arc::new(StringArray::from(column(records, |r| r.day_name.as_str()))));
    c.push("month_name", Arc::new(StringArray::from(column(records, |r| r.month_name.as_str()))));
    c.finish()
}

pub fn daily_batch(daily: &[DailyAggregate]) -> std::result::Result<RecordBatch, ArrowError> {
    let mut c = Columns::default();
    c.push("date", Arc::new(Date32Array::from(column(daily, |d| date32(d.date)))));
    c.push("total_rentals", Arc::new(UInt64Array::from(column(daily, |d| d.total_rentals))));
    c.push("casual_users", Arc::new(UInt64Array::from(column(daily, |d| d.casual_users))));
    c.push("registered_users", Arc::new(UInt64Array::from(column(daily, |d| d.registered_users))));
    c.push("avg_temp_celsius", Arc::new(Float64Array::from(column(daily, |d| d.avg_temp_celsius))));
    c.push("avg_humidity_pct", Arc::new(Float64Array::from(column(daily, |d| d.avg_humidity_pct))));
    c.push("avg_windspeed_kmh", Arc::new(Float64Array::from(column(daily, |d| d.avg_windspeed_kmh))));
    c.push("most_common_weather", Arc::new(StringArray::from(column(daily, |d| d.most_common_weather.as_str()))));
    c.push("peak_hours_count", Arc::new(UInt32Array::from(column(daily, |d| d.peak_hours_count))));
    c.push("is_weekend", Arc::new(BooleanArray::from(column(daily, |d| d.is_weekend))));
    c.finish()
}

pub fn weekly_batch(weekly: &[WeeklyAggregate]) -> std::result::Result<RecordBatch, ArrowError> {
    let mut c = Columns::default();
    c.push("week_start", Arc::new(Date32Array::from(column(weekly, |w| date32(w.week_start)))));
    c.push("iso_year", Arc::new(Int32Array::from(column(weekly, |w| w.iso_year))));
    c.push("iso_week", Arc::new(UInt32Array::from(column(weekly, |w| w.iso_week))));
    c.push("first_date", Arc::new(Date32Array::from(column(weekly, |w| date32(w.first_date)))));
    c.push("last_date", Arc::new(Date32Array::from(column(weekly, |w| date32(w.last_date)))));
    c.push("total_rentals", Arc::new(UInt64Array::from(column(weekly, |w| w.total_rentals))));
    c.push("casual_users", Arc::new(UInt64Array::from(column(weekly, |w| w.casual_users))));
    c.push("registered_users", Arc::new(UInt64Array::from(column(weekly, |w| w.registered_users))));
    c.push("avg_temp_celsius", Arc::new(Float64Array::from(column(weekly, |w| w.avg_temp_celsius))));
    c.push("avg_humidity_pct", Arc::new(Float64Array::from(column(weekly, |w| w.avg_humidity_pct))));
    c.push("avg_windspeed_kmh", Arc::new(Float64Array::from(column(weekly, |w| w.avg_windspeed_kmh))));
    c.finish()
}
