//! Daily and weekly rollups of the enriched dataset.
//!
//! Rollups are always recomputed from the full enriched dataset; there is no
//! incremental path.

pub mod aggregate;
pub mod types;
pub mod utility;

pub use aggregate::{aggregate, aggregate_daily, aggregate_weekly};
pub use types::{Aggregates, DailyAggregate, WeeklyAggregate};
