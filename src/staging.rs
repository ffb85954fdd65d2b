//! Gzip-compressed JSON datasets handed from one stage to the next.
//!
//! Lets each stage run as its own process: a stage loads what its
//! predecessor saved and saves what its successor loads. Saving overwrites.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{PipelineError, Result, Stage};

/// Dataset names within a staging area.
pub mod datasets {
    pub const VALIDATED: &str = "validated";
    pub const NORMALIZED: &str = "normalized";
    pub const ENRICHED: &str = "enriched";
    pub const DAILY: &str = "daily";
    pub const WEEKLY: &str = "weekly";
}

#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, dataset: &str) -> PathBuf {
        self.dir.join(format!("{dataset}.json.gz"))
    }

    /// Serializes `value` to `<dir>/<dataset>.json.gz`.
    pub fn save<T: Serialize + ?Sized>(&self, stage: Stage, dataset: &str, value: &T) -> Result<PathBuf> {
        let path = self.path_of(dataset);
        fs::create_dir_all(&self.dir).map_err(|e| PipelineError::io(stage, &self.dir, e))?;

        let file = File::create(&path).map_err(|e| PipelineError::io(stage, &path, e))?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        serde_json::to_writer(&mut encoder, value).map_err(|e| PipelineError::io(stage, &path, e))?;
        encoder
            .finish()
            .and_then(|mut inner| inner.flush())
            .map_err(|e| PipelineError::io(stage, &path, e))?;

        debug!(path = %path.display(), "Staged dataset saved");
        Ok(path)
    }

    /// Loads a dataset saved by an earlier stage.
    pub fn load<T: DeserializeOwned>(&self, stage: Stage, dataset: &str) -> Result<T> {
        let path = self.path_of(dataset);
        let file = File::open(&path).map_err(|e| PipelineError::io(stage, &path, e))?;
        let decoder = GzDecoder::new(BufReader::new(file));
        let value = serde_json::from_reader(decoder).map_err(|e| PipelineError::io(stage, &path, e))?;

        debug!(path = %path.display(), "Staged dataset loaded");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawTable;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path().join("run_date=2025-11-21"));
        let table = RawTable {
            headers: vec!["a".into(), "b".into()],
            rows: vec![vec!["1".into(), "0.1".into()]],
        };

        let path = staging.save(Stage::Validate, datasets::VALIDATED, &table).unwrap();
        assert!(path.ends_with("validated.json.gz"));

        let loaded: RawTable = staging.load(Stage::Normalize, datasets::VALIDATED).unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_floats_survive_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        let values = vec![0.2879 * 50.0, 0.1 + 0.2, 1.0 / 3.0, 19.9995];
        staging.save(Stage::Aggregate, "floats", &values).unwrap();
        let loaded: Vec<f64> = staging.load(Stage::Write, "floats").unwrap();
        let bits = |v: &[f64]| v.iter().map(|f| f.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&loaded), bits(&values));
    }

    #[test]
    fn test_missing_dataset_reports_stage_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        let err = staging
            .load::<RawTable>(Stage::Normalize, datasets::VALIDATED)
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Normalize);
        assert!(err.to_string().contains("validated.json.gz"));
    }
}
