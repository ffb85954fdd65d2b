//! Data types produced by the aggregation stage.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row per calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub total_rentals: u64,
    pub casual_users: u64,
    pub registered_users: u64,
    pub avg_temp_celsius: f64,
    pub avg_humidity_pct: f64,
    pub avg_windspeed_kmh: f64,
    /// Weather label seen in most of the day's records.
    pub most_common_weather: String,
    pub peak_hours_count: u32,
    /// True if any of the day's records falls on a weekend.
    pub is_weekend: bool,
}

/// One row per ISO week, keyed by the week's Monday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyAggregate {
    pub week_start: NaiveDate,
    pub iso_year: i32,
    pub iso_week: u32,
    /// Earliest date observed in the week.
    pub first_date: NaiveDate,
    /// Latest date observed in the week.
    pub last_date: NaiveDate,
    pub total_rentals: u64,
    pub casual_users: u64,
    pub registered_users: u64,
    pub avg_temp_celsius: f64,
    pub avg_humidity_pct: f64,
    pub avg_windspeed_kmh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregates {
    pub daily: Vec<DailyAggregate>,
    pub weekly: Vec<WeeklyAggregate>,
}
