//! Inclusive calendar-date intervals.
//!
//! A rental day is indivisible: an interval covers every day from `start`
//! through `end`, both included, so two intervals that share a single day
//! overlap.

use crate::error::EngineError;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An inclusive range of rental days with `start <= end`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawInterval")]
pub struct DateInterval {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawInterval {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawInterval> for DateInterval {
    type Error = EngineError;

    fn try_from(raw: RawInterval) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

impl DateInterval {
    /// Creates an interval.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInterval`] if `end` is before `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, EngineError> {
        if end < start {
            return Err(EngineError::InvalidInterval {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parses ISO dates (`2024-03-10`) or RFC 3339 datetimes
    /// (`2024-03-10T09:00:00.000Z`); datetimes keep only their calendar date.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInterval`] if either bound does not parse
    /// or `end` is before `start`.
    pub fn parse(start: &str, end: &str) -> Result<Self, EngineError> {
        let invalid = || EngineError::InvalidInterval {
            start: start.to_string(),
            end: end.to_string(),
        };
        let start_date = parse_day(start).ok_or_else(invalid)?;
        let end_date = parse_day(end).ok_or_else(invalid)?;
        Self::new(start_date, end_date)
    }

    /// First rental day
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last rental day
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// True when the two intervals share at least one day
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        !(self.end < other.start || self.start > other.end)
    }

    /// Number of rental days, counting both endpoints (a same-day rental is 1)
    #[must_use]
    pub fn duration_days(&self) -> u32 {
        let days = (self.end - self.start).num_days() + 1;
        // start <= end holds by construction, and any NaiveDate span fits in u32.
        u32::try_from(days).unwrap_or(u32::MAX)
    }
}

impl fmt::Display for DateInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

fn parse_day(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.date_naive()))
}

/// `overlaps` as a free function
#[must_use]
pub fn overlaps(a: &DateInterval, b: &DateInterval) -> bool {
    a.overlaps(b)
}

/// `duration_days` as a free function
#[must_use]
pub fn duration_days(interval: &DateInterval) -> u32 {
    interval.duration_days()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn interval(start: &str, end: &str) -> DateInterval {
        DateInterval::new(day(start), day(end)).unwrap()
    }

    #[test]
    fn test_duration_counts_both_endpoints() {
        assert_eq!(interval("2024-01-01", "2024-01-01").duration_days(), 1);
        assert_eq!(interval("2024-01-01", "2024-01-03").duration_days(), 3);
        assert_eq!(interval("2024-02-28", "2024-03-01").duration_days(), 3);
    }

    #[test]
    fn test_reversed_bounds_are_rejected() {
        let err = DateInterval::new(day("2024-01-03"), day("2024-01-01")).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInterval { .. }));
    }

    #[test]
    fn test_touching_days_overlap() {
        let existing = interval("2024-03-10", "2024-03-15");
        assert!(existing.overlaps(&interval("2024-03-15", "2024-03-20")));
        assert!(existing.overlaps(&interval("2024-03-01", "2024-03-10")));
        assert!(!existing.overlaps(&interval("2024-03-16", "2024-03-20")));
        assert!(!existing.overlaps(&interval("2024-03-01", "2024-03-09")));
    }

    #[test]
    fn test_containment_overlaps() {
        let outer = interval("2024-03-01", "2024-03-31");
        let inner = interval("2024-03-10", "2024-03-12");
        assert!(overlaps(&outer, &inner));
        assert!(overlaps(&inner, &outer));
    }

    #[test]
    fn test_parse_accepts_dates_and_datetimes() {
        let parsed = DateInterval::parse("2024-03-10", "2024-03-12T18:30:00.000Z").unwrap();
        assert_eq!(parsed, interval("2024-03-10", "2024-03-12"));
        assert_eq!(duration_days(&parsed), 3);

        assert!(DateInterval::parse("10/03/2024", "2024-03-12").is_err());
        assert!(DateInterval::parse("2024-03-12", "2024-03-10").is_err());
    }

    #[test]
    fn test_deserialize_enforces_ordering() {
        let ok: DateInterval =
            serde_json::from_str(r#"{"start":"2024-01-01","end":"2024-01-02"}"#).unwrap();
        assert_eq!(ok.duration_days(), 2);

        let reversed =
            serde_json::from_str::<DateInterval>(r#"{"start":"2024-01-02","end":"2024-01-01"}"#);
        assert!(reversed.is_err());
    }
}
