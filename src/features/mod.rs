//! Per-record derived features.
//!
//! Every feature is a pure function of one normalized record, so output order
//! and cardinality match the input exactly.

pub mod labels;

use tracing::info;

use crate::config::WeekdayConvention;
use crate::error::{PipelineError, Result, Stage};
use crate::model::{EnrichedRecord, NormalizedRecord, RawRecord};

/// Morning (7–9) and evening (17–19) commute hours.
pub const PEAK_HOURS: [u8; 6] = [7, 8, 9, 17, 18, 19];

pub fn is_peak_hour(hour: u8) -> bool {
    PEAK_HOURS.contains(&hour)
}

pub struct FeatureEngineer {
    convention: WeekdayConvention,
}

impl FeatureEngineer {
    pub fn new(convention: WeekdayConvention) -> Self {
        Self { convention }
    }

    /// Enriches every record, failing on the first unmapped categorical code.
    #[tracing::instrument(skip_all, fields(stage = %Stage::EngineerFeatures, records = records.len()))]
    pub fn engineer(&self, records: &[NormalizedRecord]) -> Result<Vec<EnrichedRecord>> {
        let enriched = records
            .iter()
            .map(|r| self.enrich(r))
            .collect::<Result<Vec<_>>>()?;

        let peak = enriched.iter().filter(|r| r.is_peak_hour).count();
        let weekend = enriched.iter().filter(|r| r.is_weekend).count();
        info!(
            records = enriched.len(),
            peak_hour_records = peak,
            weekend_records = weekend,
            convention = %self.convention,
            "Feature engineering complete"
        );

        Ok(enriched)
    }

    pub fn enrich(&self, record: &NormalizedRecord) -> Result<EnrichedRecord> {
        let raw = &record.raw;
        let season_name = label(raw, "season", raw.season, labels::SEASONS)?;
        let weather_desc = label(raw, "weathersit", raw.weathersit, labels::WEATHER)?;
        let day_name = label(raw, "weekday", raw.weekday, labels::day_table(self.convention))?;
        let month_name = label(raw, "mnth", raw.mnth, labels::MONTHS)?;

        Ok(EnrichedRecord {
            raw: raw.clone(),
            climate: record.climate,
            is_peak_hour: is_peak_hour(raw.hr),
            is_weekend: labels::is_weekend_day(day_name),
            season_name: season_name.to_string(),
            weather_desc: weather_desc.to_string(),
            day_name: day_name.to_string(),
            month_name: month_name.to_string(),
        })
    }
}

impl Default for FeatureEngineer {
    fn default() -> Self {
        Self::new(WeekdayConvention::default())
    }
}

fn label(
    raw: &RawRecord,
    field: &'static str,
    code: u8,
    table: &[(u8, &'static str)],
) -> Result<&'static str> {
    labels::lookup(table, code).ok_or(PipelineError::UnknownCode {
        stage: Stage::EngineerFeatures,
        key: raw.key(),
        field,
        code,
    })
}
