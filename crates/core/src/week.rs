//! Week bucketing.
//!
//! Every grouping, filter and review-request correlation in the engine uses
//! [`WeekKey`]: the calendar date of the week's Sunday, formatted
//! `YYYY-MM-DD`. The ISO-8601 week number produced by [`iso_week_label`] is
//! for human-readable labels only and must never be used as a key.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// The Sunday-anchored bucket a date falls into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekKey(NaiveDate);

impl WeekKey {
    pub fn for_date(date: NaiveDate) -> Self {
        let offset = i64::from(date.weekday().num_days_from_sunday());
        Self(date - Duration::days(offset))
    }

    pub fn sunday(self) -> NaiveDate {
        self.0
    }

    /// Half-open `[sunday, next sunday)` range for date-column filtering.
    pub fn date_range(self) -> (NaiveDate, NaiveDate) {
        (self.0, self.0 + Duration::days(7))
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        let (start, end) = self.date_range();
        date >= start && date < end
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for WeekKey {
    type Err = DomainError;

    /// Parses a calendar date and normalizes it onto its week's Sunday, so a
    /// stored key that was written from any day of the week still resolves
    /// to the same bucket.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|error| {
            DomainError::InvariantViolation(format!("malformed week key `{value}`: {error}"))
        })?;
        Ok(Self::for_date(date))
    }
}

/// Display-only ISO-8601 week label, e.g. `2026-W32`.
pub fn iso_week_label(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{iso_week_label, WeekKey};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn buckets_onto_the_preceding_sunday() {
        // 2026-08-02 is a Sunday.
        assert_eq!(WeekKey::for_date(date(2026, 8, 2)).to_string(), "2026-08-02");
        assert_eq!(WeekKey::for_date(date(2026, 8, 3)).to_string(), "2026-08-02");
        assert_eq!(WeekKey::for_date(date(2026, 8, 8)).to_string(), "2026-08-02");
        assert_eq!(WeekKey::for_date(date(2026, 8, 9)).to_string(), "2026-08-09");
    }

    #[test]
    fn bucketing_is_a_fixed_point() {
        for day in 1..=28 {
            let key = WeekKey::for_date(date(2026, 2, day));
            assert_eq!(WeekKey::for_date(key.sunday()), key);
        }
    }

    #[test]
    fn crosses_month_and_year_boundaries() {
        // 2026-01-01 is a Thursday; its week's Sunday is 2025-12-28.
        assert_eq!(WeekKey::for_date(date(2026, 1, 1)).to_string(), "2025-12-28");
        // 2026-03-02 is a Monday; its week's Sunday is 2026-03-01.
        assert_eq!(WeekKey::for_date(date(2026, 3, 2)).to_string(), "2026-03-01");
    }

    #[test]
    fn parse_normalizes_onto_sunday() {
        let parsed: WeekKey = "2026-08-05".parse().expect("parse");
        assert_eq!(parsed.to_string(), "2026-08-02");

        let already_sunday: WeekKey = "2026-08-02".parse().expect("parse");
        assert_eq!(parsed, already_sunday);
    }

    #[test]
    fn date_range_is_half_open() {
        let key = WeekKey::for_date(date(2026, 8, 2));
        assert!(key.contains(date(2026, 8, 2)));
        assert!(key.contains(date(2026, 8, 8)));
        assert!(!key.contains(date(2026, 8, 9)));
        assert!(!key.contains(date(2026, 8, 1)));
    }

    #[test]
    fn iso_label_is_not_the_bucket_key() {
        // Sunday 2026-01-04 belongs to ISO week 1 of 2026, but the label and
        // the key are different strings with different meanings.
        let d = date(2026, 1, 4);
        assert_eq!(WeekKey::for_date(d).to_string(), "2026-01-04");
        assert_eq!(iso_week_label(d), "2026-W01");
    }
}
