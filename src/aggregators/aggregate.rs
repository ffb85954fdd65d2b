use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::{BTreeMap, HashSet};
use tracing::info;

use crate::aggregators::types::{Aggregates, DailyAggregate, WeeklyAggregate};
use crate::aggregators::utility::{mean, most_frequent};
use crate::error::{PipelineError, RecordKey, Result, Stage};
use crate::model::EnrichedRecord;

/// Computes both rollups over the full enriched dataset.
#[tracing::instrument(skip_all, fields(stage = %Stage::Aggregate, records = records.len()))]
pub fn aggregate(records: &[EnrichedRecord]) -> Result<Aggregates> {
    let daily = aggregate_daily(records)?;
    let weekly = aggregate_weekly(records)?;
    Ok(Aggregates { daily, weekly })
}

/// Groups records by calendar date, in ascending date order.
///
/// Within a group records keep their input order, which is what the
/// dominant-weather tie-break relies on.
pub fn aggregate_daily(records: &[EnrichedRecord]) -> Result<Vec<DailyAggregate>> {
    let groups = group_by(records, |r| r.raw.dteday);

    let daily: Vec<DailyAggregate> = groups
        .into_iter()
        .map(|(date, members)| {
            let sums = Sums::of(&members);
            let means = ClimateMeans::of(&members);
            DailyAggregate {
                date,
                total_rentals: sums.total,
                casual_users: sums.casual,
                registered_users: sums.registered,
                avg_temp_celsius: means.temp,
                avg_humidity_pct: means.humidity,
                avg_windspeed_kmh: means.windspeed,
                most_common_weather: most_frequent(members.iter().map(|r| r.weather_desc.as_str()))
                    .unwrap_or_default()
                    .to_string(),
                peak_hours_count: members.iter().filter(|r| r.is_peak_hour).count() as u32,
                is_weekend: members.iter().any(|r| r.is_weekend),
            }
        })
        .collect();

    ensure_unique_keys(daily.iter().map(|d| d.date), "date")?;

    let total: u64 = daily.iter().map(|d| d.total_rentals).sum();
    info!(
        days = daily.len(),
        total_rentals = total,
        mean_rentals_per_day = per_group(total, daily.len()),
        "Daily aggregation complete"
    );

    Ok(daily)
}

/// Groups records by ISO week (Monday start), in ascending week order.
pub fn aggregate_weekly(records: &[EnrichedRecord]) -> Result<Vec<WeeklyAggregate>> {
    let groups = group_by(records, |r| week_start(r.raw.dteday));

    let weekly: Vec<WeeklyAggregate> = groups
        .into_iter()
        .map(|(week_start, members)| {
            let sums = Sums::of(&members);
            let means = ClimateMeans::of(&members);
            let iso = week_start.iso_week();
            // Groups are never empty, so the fallbacks are never taken.
            let first_date = members.iter().map(|r| r.raw.dteday).min().unwrap_or(week_start);
            let last_date = members.iter().map(|r| r.raw.dteday).max().unwrap_or(week_start);
            WeeklyAggregate {
                week_start,
                iso_year: iso.year(),
                iso_week: iso.week(),
                first_date,
                last_date,
                total_rentals: sums.total,
                casual_users: sums.casual,
                registered_users: sums.registered,
                avg_temp_celsius: means.temp,
                avg_humidity_pct: means.humidity,
                avg_windspeed_kmh: means.windspeed,
            }
        })
        .collect();

    ensure_unique_keys(weekly.iter().map(|w| w.week_start), "week_start")?;

    let total: u64 = weekly.iter().map(|w| w.total_rentals).sum();
    info!(
        weeks = weekly.len(),
        total_rentals = total,
        mean_rentals_per_week = per_group(total, weekly.len()),
        "Weekly aggregation complete"
    );

    Ok(weekly)
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date.week(Weekday::Mon).first_day()
}

fn group_by<K, F>(records: &[EnrichedRecord], key: F) -> BTreeMap<K, Vec<&EnrichedRecord>>
where
    K: Ord,
    F: Fn(&EnrichedRecord) -> K,
{
    let mut groups: BTreeMap<K, Vec<&EnrichedRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(key(record)).or_default().push(record);
    }
    groups
}

fn ensure_unique_keys(keys: impl Iterator<Item = NaiveDate>, grain: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(PipelineError::AggregationInvariant {
                stage: Stage::Aggregate,
                key: RecordKey::Date(key),
                message: format!("{grain} appears more than once in the rollup"),
            });
        }
    }
    Ok(())
}

fn per_group(total: u64, groups: usize) -> f64 {
    if groups == 0 {
        0.0
    } else {
        total as f64 / groups as f64
    }
}

struct Sums {
    total: u64,
    casual: u64,
    registered: u64,
}

impl Sums {
    fn of(members: &[&EnrichedRecord]) -> Self {
        let mut sums = Sums {
            total: 0,
            casual: 0,
            registered: 0,
        };
        for r in members {
            sums.total += u64::from(r.raw.cnt);
            sums.casual += u64::from(r.raw.casual);
            sums.registered += u64::from(r.raw.registered);
        }
        sums
    }
}

struct ClimateMeans {
    temp: f64,
    humidity: f64,
    windspeed: f64,
}

impl ClimateMeans {
    fn of(members: &[&EnrichedRecord]) -> Self {
        let series = |f: fn(&EnrichedRecord) -> f64| -> Vec<f64> {
            members.iter().map(|r| f(r)).collect()
        };
        Self {
            temp: mean(&series(|r: &EnrichedRecord| r.climate.temp_celsius)),
            humidity: mean(&series(|r: &EnrichedRecord| r.climate.humidity_pct)),
            windspeed: mean(&series(|r: &EnrichedRecord| r.climate.windspeed_kmh)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DenormalizedClimate, RawRecord};

    fn record(instant: u32, date: (i32, u32, u32), hr: u8, cnt: u32, weather: &str) -> EnrichedRecord {
        let dteday = NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap();
        EnrichedRecord {
            raw: RawRecord {
                instant,
                dteday,
                season: 1,
                yr: 0,
                mnth: dteday.month() as u8,
                hr,
                holiday: 0,
                weekday: dteday.weekday().num_days_from_sunday() as u8,
                workingday: 0,
                weathersit: 1,
                temp: 0.5,
                atemp: 0.5,
                hum: 0.5,
                windspeed: 0.1,
                casual: 1,
                registered: cnt - 1,
                cnt,
            },
            climate: DenormalizedClimate {
                temp_celsius: f64::from(hr),
                atemp_celsius: 25.0,
                humidity_pct: 50.0,
                windspeed_kmh: 6.7,
            },
            is_peak_hour: crate::features::is_peak_hour(hr),
            is_weekend: matches!(dteday.weekday(), Weekday::Sat | Weekday::Sun),
            season_name: "Spring".into(),
            weather_desc: weather.into(),
            day_name: String::new(),
            month_name: String::new(),
        }
    }

    #[test]
    fn test_daily_sums_means_and_peak_count() {
        let records = vec![
            record(1, (2011, 1, 3), 8, 10, "Clear/Partly Cloudy"),
            record(2, (2011, 1, 3), 12, 20, "Mist/Cloudy"),
            record(3, (2011, 1, 3), 18, 30, "Mist/Cloudy"),
        ];
        let daily = aggregate_daily(&records).unwrap();
        assert_eq!(daily.len(), 1);
        let d = &daily[0];
        assert_eq!(d.total_rentals, 60);
        assert_eq!(d.casual_users, 3);
        assert_eq!(d.registered_users, 57);
        assert!((d.avg_temp_celsius - (8.0 + 12.0 + 18.0) / 3.0).abs() < 1e-9);
        assert_eq!(d.most_common_weather, "Mist/Cloudy");
        assert_eq!(d.peak_hours_count, 2);
        assert!(!d.is_weekend);
    }

    #[test]
    fn test_daily_weather_tie_uses_record_order() {
        let records = vec![
            record(1, (2011, 1, 3), 0, 5, "Light Rain/Snow"),
            record(2, (2011, 1, 3), 1, 5, "Clear/Partly Cloudy"),
            record(3, (2011, 1, 3), 2, 5, "Clear/Partly Cloudy"),
            record(4, (2011, 1, 3), 3, 5, "Light Rain/Snow"),
        ];
        let daily = aggregate_daily(&records).unwrap();
        assert_eq!(daily[0].most_common_weather, "Light Rain/Snow");
    }

    #[test]
    fn test_daily_rows_sorted_and_unique() {
        let records = vec![
            record(1, (2011, 1, 5), 0, 5, "Mist/Cloudy"),
            record(2, (2011, 1, 3), 0, 7, "Mist/Cloudy"),
            record(3, (2011, 1, 5), 1, 9, "Mist/Cloudy"),
        ];
        let daily = aggregate_daily(&records).unwrap();
        let dates: Vec<_> = daily.iter().map(|d| d.date.to_string()).collect();
        assert_eq!(dates, vec!["2011-01-03", "2011-01-05"]);
        assert_eq!(daily[1].total_rentals, 14);
    }

    #[test]
    fn test_weekly_groups_by_iso_week() {
        // 2011-01-01 (Sat) and 2011-01-02 (Sun) belong to ISO week 2010-W52.
        let records = vec![
            record(1, (2011, 1, 1), 0, 10, "Mist/Cloudy"),
            record(2, (2011, 1, 2), 0, 20, "Mist/Cloudy"),
            record(3, (2011, 1, 3), 0, 30, "Mist/Cloudy"),
            record(4, (2011, 1, 9), 0, 40, "Mist/Cloudy"),
        ];
        let weekly = aggregate_weekly(&records).unwrap();
        assert_eq!(weekly.len(), 2);

        let first = &weekly[0];
        assert_eq!(first.week_start, NaiveDate::from_ymd_opt(2010, 12, 27).unwrap());
        assert_eq!((first.iso_year, first.iso_week), (2010, 52));
        assert_eq!(first.first_date, NaiveDate::from_ymd_opt(2011, 1, 1).unwrap());
        assert_eq!(first.last_date, NaiveDate::from_ymd_opt(2011, 1, 2).unwrap());
        assert_eq!(first.total_rentals, 30);

        let second = &weekly[1];
        assert_eq!(second.week_start, NaiveDate::from_ymd_opt(2011, 1, 3).unwrap());
        assert_eq!((second.iso_year, second.iso_week), (2011, 1));
        assert_eq!(second.last_date, NaiveDate::from_ymd_opt(2011, 1, 9).unwrap());
        assert_eq!(second.total_rentals, 70);
    }

    #[test]
    fn test_conservation_across_grains() {
        let records: Vec<_> = (0..40u32)
            .map(|i| {
                let day = 1 + i / 3;
                record(i + 1, (2011, 2, day), (i % 24) as u8, 1 + i, "Mist/Cloudy")
            })
            .collect();
        let total: u64 = records.iter().map(|r| u64::from(r.raw.cnt)).sum();
        let aggs = aggregate(&records).unwrap();
        assert_eq!(aggs.daily.iter().map(|d| d.total_rentals).sum::<u64>(), total);
        assert_eq!(aggs.weekly.iter().map(|w| w.total_rentals).sum::<u64>(), total);
    }

    #[test]
    fn test_duplicate_key_is_invariant_error() {
        let day = NaiveDate::from_ymd_opt(2011, 1, 3).unwrap();
        let err = ensure_unique_keys([day, day].into_iter(), "date").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::AggregationInvariant { key: RecordKey::Date(d), .. } if d == day
        ));
    }

    #[test]
    fn test_recomputation_is_identical() {
        let records = vec![
            record(1, (2011, 3, 1), 7, 11, "Clear/Partly Cloudy"),
            record(2, (2011, 3, 1), 17, 13, "Mist/Cloudy"),
            record(3, (2011, 3, 8), 9, 17, "Mist/Cloudy"),
        ];
        assert_eq!(aggregate(&records).unwrap(), aggregate(&records).unwrap());
    }

    #[test]
    fn test_empty_input_gives_empty_rollups() {
        let aggs = aggregate(&[]).unwrap();
        assert!(aggs.daily.is_empty());
        assert!(aggs.weekly.is_empty());
    }
}
