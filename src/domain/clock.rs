use crate::error::{EngineError, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const CLOCK_FORMAT: &str = "%H:%M";

/// Source of "now" for expiry checks and timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| EngineError::Validation(format!("invalid date '{raw}'")))
}

/// Parses an `HH:MM` wall-clock time on the canonical UTC timeline.
pub fn parse_clock(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), CLOCK_FORMAT)
        .map_err(|_| EngineError::Validation(format!("invalid time '{raw}'")))
}

/// Day of week with Sunday as 0, the numbering availability rules use.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// A half-open `[start, end)` interval within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if end <= start {
            return Err(EngineError::Validation(
                "end time must be after start time".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    /// The interval of `minutes` length beginning at `start`. Intervals that
    /// would run past midnight are rejected.
    pub fn starting_at(start: NaiveTime, minutes: u32) -> Result<Self> {
        if minutes == 0 {
            return Err(EngineError::Validation(
                "duration must be positive".to_string(),
            ));
        }
        let (end, wrapped) = start.overflowing_add_signed(Duration::minutes(i64::from(minutes)));
        if wrapped != 0 {
            return Err(EngineError::Validation(
                "interval may not cross midnight".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn contains(&self, other: &TimeRange) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Serde adapter for `HH:MM` times.
pub mod hhmm {
    use super::CLOCK_FORMAT;
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format(CLOCK_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(raw.trim(), CLOCK_FORMAT).map_err(serde::de::Error::custom)
    }
}
