//! Error taxonomy for the pipeline.
//!
//! Every failure is fatal to the current run. Each variant names the stage it
//! came from and, where a single record is at fault, that record's key.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The five pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Validate,
    Normalize,
    EngineerFeatures,
    Aggregate,
    Write,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Validate,
        Stage::Normalize,
        Stage::EngineerFeatures,
        Stage::Aggregate,
        Stage::Write,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Normalize => "normalize",
            Stage::EngineerFeatures => "engineer_features",
            Stage::Aggregate => "aggregate",
            Stage::Write => "write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifies the record (or group) an error points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKey {
    /// 1-based data row in the source table, used before `instant` is known.
    Row(usize),
    /// The record's `instant` index.
    Instant(u32),
    /// An aggregate group key.
    Date(NaiveDate),
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Row(row) => write!(f, "row {row}"),
            RecordKey::Instant(instant) => write!(f, "record {instant}"),
            RecordKey::Date(date) => write!(f, "group {date}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Column count or name set differs from the expected schema.
    #[error("[{stage}] schema error: {message}")]
    Schema { stage: Stage, message: String },

    /// A value lies outside its allowed domain.
    #[error("[{stage}] range error at {key}: {field} = {value} violates {constraint}")]
    Range {
        stage: Stage,
        key: RecordKey,
        field: &'static str,
        value: String,
        constraint: String,
    },

    /// A value cannot be coerced to its semantic type.
    #[error("[{stage}] type error at {key}: {field} = {value:?} is not a valid {expected}")]
    Type {
        stage: Stage,
        key: RecordKey,
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    /// A categorical code has no entry in its lookup table.
    #[error("[{stage}] unknown code at {key}: {field} = {code} has no mapping")]
    UnknownCode {
        stage: Stage,
        key: RecordKey,
        field: &'static str,
        code: u8,
    },

    /// The aggregator produced a duplicate group key.
    #[error("[{stage}] aggregation invariant violated at {key}: {message}")]
    AggregationInvariant {
        stage: Stage,
        key: RecordKey,
        message: String,
    },

    /// Reading or writing a file failed.
    #[error("[{stage}] I/O error on {}: {source}", path.display())]
    Io {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Stage the error originated from.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Schema { stage, .. }
            | PipelineError::Range { stage, .. }
            | PipelineError::Type { stage, .. }
            | PipelineError::UnknownCode { stage, .. }
            | PipelineError::AggregationInvariant { stage, .. }
            | PipelineError::Io { stage, .. } => *stage,
        }
    }

    /// Wraps any I/O-like failure with the stage and path it happened on.
    pub fn io(stage: Stage, path: impl Into<PathBuf>, source: impl Into<std::io::Error>) -> Self {
        PipelineError::Io {
            stage,
            path: path.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_error_names_stage_record_and_constraint() {
        let err = PipelineError::Range {
            stage: Stage::Validate,
            key: RecordKey::Instant(42),
            field: "cnt",
            value: "17".into(),
            constraint: "cnt == casual + registered (16)".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("validate"));
        assert!(msg.contains("record 42"));
        assert!(msg.contains("casual + registered"));
        assert_eq!(err.stage(), Stage::Validate);
    }

    #[test]
    fn test_io_error_keeps_path() {
        let err = PipelineError::io(
            Stage::Write,
            "/nope/daily_summary.parquet",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("daily_summary.parquet"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_stage_order() {
        let names: Vec<_> = Stage::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            ["validate", "normalize", "engineer_features", "aggregate", "write"]
        );
    }
}
