//! Run configuration handed explicitly to every stage.

use chrono::NaiveDate;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Which day the source data encodes as weekday code 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeekdayConvention {
    /// 0 = Sunday … 6 = Saturday (Capital Bikeshare `hour.csv`).
    #[default]
    SundayZero,
    /// 0 = Monday … 6 = Sunday.
    MondayZero,
}

impl FromStr for WeekdayConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sunday" | "sunday-zero" => Ok(Self::SundayZero),
            "monday" | "monday-zero" => Ok(Self::MondayZero),
            other => Err(format!(
                "unsupported weekday convention '{other}' (expected 'sunday' or 'monday')"
            )),
        }
    }
}

impl fmt::Display for WeekdayConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SundayZero => f.write_str("sunday"),
            Self::MondayZero => f.write_str("monday"),
        }
    }
}

/// Block compression applied to every output artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    #[default]
    Snappy,
    Gzip,
    Lz4,
    Zstd,
    None,
}

impl FromStr for Codec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "snappy" => Ok(Self::Snappy),
            "gzip" => Ok(Self::Gzip),
            "lz4" => Ok(Self::Lz4),
            "zstd" => Ok(Self::Zstd),
            "none" => Ok(Self::None),
            other => Err(format!("unsupported compression '{other}'")),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Snappy => "snappy",
            Self::Gzip => "gzip",
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

/// The two calendar years the source log covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationWindow {
    pub first_year: i32,
}

impl ObservationWindow {
    pub fn new(first_year: i32) -> Self {
        Self { first_year }
    }

    pub fn second_year(&self) -> i32 {
        self.first_year + 1
    }

    pub fn contains(&self, year: i32) -> bool {
        year == self.first_year || year == self.second_year()
    }
}

impl Default for ObservationWindow {
    fn default() -> Self {
        Self::new(2011)
    }
}

/// Everything a run needs to know. Immutable once built.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Source CSV.
    pub raw_input: PathBuf,
    /// Directory receiving the three artifacts (and the staging area).
    pub output_dir: PathBuf,
    /// Logical date of the run. Only used to label logs and staging data.
    pub run_date: NaiveDate,
    pub window: ObservationWindow,
    pub weekday_convention: WeekdayConvention,
    pub compression: Codec,
}

impl PipelineConfig {
    pub fn new(
        raw_input: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        run_date: NaiveDate,
    ) -> Self {
        Self {
            raw_input: raw_input.into(),
            output_dir: output_dir.into(),
            run_date,
            window: ObservationWindow::default(),
            weekday_convention: WeekdayConvention::default(),
            compression: Codec::default(),
        }
    }

    pub fn with_window(mut self, window: ObservationWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_weekday_convention(mut self, convention: WeekdayConvention) -> Self {
        self.weekday_convention = convention;
        self
    }

    pub fn with_compression(mut self, compression: Codec) -> Self {
        self.compression = compression;
        self
    }

    /// Per-run directory holding the datasets passed between stages.
    pub fn staging_dir(&self) -> PathBuf {
        self.output_dir
            .join("staging")
            .join(format!("run_date={}", self.run_date.format("%Y-%m-%d")))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}
