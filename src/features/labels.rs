//! Fixed code → label tables for the categorical columns.
//!
//! Lookups return `None` for codes outside a table; callers turn that into a
//! hard failure.

use crate::config::WeekdayConvention;

pub static SEASONS: &[(u8, &str)] = &[(1, "Spring"), (2, "Summer"), (3, "Fall"), (4, "Winter")];

pub static WEATHER: &[(u8, &str)] = &[
    (1, "Clear/Partly Cloudy"),
    (2, "Mist/Cloudy"),
    (3, "Light Rain/Snow"),
    (4, "Heavy Rain/Snow"),
];

pub static MONTHS: &[(u8, &str)] = &[
    (1, "January"),
    (2, "February"),
    (3, "March"),
    (4, "April"),
    (5, "May"),
    (6, "June"),
    (7, "July"),
    (8, "August"),
    (9, "September"),
    (10, "October"),
    (11, "November"),
    (12, "December"),
];

static DAYS_FROM_SUNDAY: &[(u8, &str)] = &[
    (0, "Sunday"),
    (1, "Monday"),
    (2, "Tuesday"),
    (3, "Wednesday"),
    (4, "Thursday"),
    (5, "Friday"),
    (6, "Saturday"),
];

static DAYS_FROM_MONDAY: &[(u8, &str)] = &[
    (0, "Monday"),
    (1, "Tuesday"),
    (2, "Wednesday"),
    (3, "Thursday"),
    (4, "Friday"),
    (5, "Saturday"),
    (6, "Sunday"),
];

pub fn lookup(table: &[(u8, &'static str)], code: u8) -> Option<&'static str> {
    table
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| *label)
}

pub fn day_table(convention: WeekdayConvention) -> &'static [(u8, &'static str)] {
    match convention {
        WeekdayConvention::SundayZero => DAYS_FROM_SUNDAY,
        WeekdayConvention::MondayZero => DAYS_FROM_MONDAY,
    }
}

pub fn is_weekend_day(day_name: &str) -> bool {
    matches!(day_name, "Saturday" | "Sunday")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn assert_bijective(table: &[(u8, &str)]) {
        let codes: HashSet<_> = table.iter().map(|(c, _)| c).collect();
        let labels: HashSet<_> = table.iter().map(|(_, l)| l).collect();
        assert_eq!(codes.len(), table.len());
        assert_eq!(labels.len(), table.len());
    }

    #[test]
    fn test_tables_are_bijective() {
        assert_bijective(SEASONS);
        assert_bijective(WEATHER);
        assert_bijective(MONTHS);
        assert_bijective(DAYS_FROM_SUNDAY);
        assert_bijective(DAYS_FROM_MONDAY);
    }

    #[test]
    fn test_lookup_misses_outside_domain() {
        assert_eq!(lookup(SEASONS, 0), None);
        assert_eq!(lookup(SEASONS, 5), None);
        assert_eq!(lookup(WEATHER, 4), Some("Heavy Rain/Snow"));
        assert_eq!(lookup(MONTHS, 13), None);
        assert_eq!(lookup(MONTHS, 12), Some("December"));
    }

    #[test]
    fn test_weekend_codes_per_convention() {
        let weekend = |convention| -> Vec<u8> {
            day_table(convention)
                .iter()
                .filter(|(_, name)| is_weekend_day(name))
                .map(|(code, _)| *code)
                .collect()
        };
        assert_eq!(weekend(WeekdayConvention::SundayZero), vec![0, 6]);
        assert_eq!(weekend(WeekdayConvention::MondayZero), vec![5, 6]);
    }
}
