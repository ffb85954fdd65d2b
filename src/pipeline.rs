//! Stage orchestration.
//!
//! Each stage can be triggered on its own, in which case it loads its input
//! from the run's staging area and saves its output there. [`Pipeline::run`]
//! chains all five in memory instead.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::aggregators::{self, DailyAggregate, WeeklyAggregate};
use crate::config::PipelineConfig;
use crate::error::{Result, Stage};
use crate::features::FeatureEngineer;
use crate::model::{EnrichedRecord, NormalizedRecord, RawTable};
use crate::normalizer;
use crate::output::{ParquetWriter, WriteReport};
use crate::parser;
use crate::staging::{StagingArea, datasets};
use crate::validator::{ValidationSummary, Validator};

/// What a single stage did, printed by the CLI as JSON.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageReport {
    Validate(ValidationSummary),
    Normalize {
        records: usize,
        duplicates_removed: usize,
    },
    EngineerFeatures {
        records: usize,
    },
    Aggregate {
        daily_rows: usize,
        weekly_rows: usize,
    },
    Write(WriteReport),
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_date: NaiveDate,
    pub stages: Vec<StageReport>,
}

pub struct Pipeline {
    config: PipelineConfig,
    staging: StagingArea,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let staging = StagingArea::new(config.staging_dir());
        Self { config, staging }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Runs one stage against the staging area.
    pub fn run_stage(&self, stage: Stage) -> Result<StageReport> {
        let _span = tracing::info_span!(
            "stage",
            stage = %stage,
            run_date = %self.config.run_date
        )
        .entered();

        match stage {
            Stage::Validate => self.validate_stage(),
            Stage::Normalize => self.normalize_stage(),
            Stage::EngineerFeatures => self.features_stage(),
            Stage::Aggregate => self.aggregate_stage(),
            Stage::Write => self.write_stage(),
        }
    }

    fn validate_stage(&self) -> Result<StageReport> {
        let table = parser::read_table(&self.config.raw_input)?;
        let summary = Validator::new(self.config.window).validate(&table)?;
        self.staging.save(Stage::Validate, datasets::VALIDATED, &table)?;
        Ok(StageReport::Validate(summary))
    }

    fn normalize_stage(&self) -> Result<StageReport> {
        let table: RawTable = self.staging.load(Stage::Normalize, datasets::VALIDATED)?;
        let dataset = normalizer::normalize(&table)?;
        self.staging
            .save(Stage::Normalize, datasets::NORMALIZED, &dataset.records)?;
        Ok(StageReport::Normalize {
            records: dataset.records.len(),
            duplicates_removed: dataset.duplicates_removed,
        })
    }

    fn features_stage(&self) -> Result<StageReport> {
        let records: Vec<NormalizedRecord> = self
            .staging
            .load(Stage::EngineerFeatures, datasets::NORMALIZED)?;
        let enriched = FeatureEngineer::new(self.config.weekday_convention).engineer(&records)?;
        self.staging
            .save(Stage::EngineerFeatures, datasets::ENRICHED, &enriched)?;
        Ok(StageReport::EngineerFeatures {
            records: enriched.len(),
        })
    }

    fn aggregate_stage(&self) -> Result<StageReport> {
        let enriched: Vec<EnrichedRecord> =
            self.staging.load(Stage::Aggregate, datasets::ENRICHED)?;
        let aggregates = aggregators::aggregate(&enriched)?;
        self.staging
            .save(Stage::Aggregate, datasets::DAILY, &aggregates.daily)?;
        self.staging
            .save(Stage::Aggregate, datasets::WEEKLY, &aggregates.weekly)?;
        Ok(StageReport::Aggregate {
            daily_rows: aggregates.daily.len(),
            weekly_rows: aggregates.weekly.len(),
        })
    }

    fn write_stage(&self) -> Result<StageReport> {
        let enriched: Vec<EnrichedRecord> = self.staging.load(Stage::Write, datasets::ENRICHED)?;
        let daily: Vec<DailyAggregate> = self.staging.load(Stage::Write, datasets::DAILY)?;
        let weekly: Vec<WeeklyAggregate> = self.staging.load(Stage::Write, datasets::WEEKLY)?;
        let report = ParquetWriter::new(self.config.compression).write_all(
            self.config.output_dir(),
            &enriched,
            &daily,
            &weekly,
        )?;
        Ok(StageReport::Write(report))
    }

    /// Runs all five stages back to back without touching the staging area.
    #[tracing::instrument(skip_all, fields(run_date = %self.config.run_date))]
    pub fn run(&self) -> Result<RunReport> {
        let mut stages = Vec::with_capacity(Stage::ALL.len());

        let table = parser::read_table(&self.config.raw_input)?;
        stages.push(StageReport::Validate(
            Validator::new(self.config.window).validate(&table)?,
        ));

        let dataset = normalizer::normalize(&table)?;
        stages.push(StageReport::Normalize {
            records: dataset.records.len(),
            duplicates_removed: dataset.duplicates_removed,
        });

        let enriched =
            FeatureEngineer::new(self.config.weekday_convention).engineer(&dataset.records)?;
        stages.push(StageReport::EngineerFeatures {
            records: enriched.len(),
        });

        let aggregates = aggregators::aggregate(&enriched)?;
        stages.push(StageReport::Aggregate {
            daily_rows: aggregates.daily.len(),
            weekly_rows: aggregates.weekly.len(),
        });

        let written = ParquetWriter::new(self.config.compression).write_all(
            self.config.output_dir(),
            &enriched,
            &aggregates.daily,
            &aggregates.weekly,
        )?;
        stages.push(StageReport::Write(written));

        info!(stages = stages.len(), "Pipeline run complete");
        Ok(RunReport {
            run_date: self.config.run_date,
            stages,
        })
    }
}
