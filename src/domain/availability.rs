use super::clock::{TimeRange, hhmm};
use crate::error::{EngineError, Result};
use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shortest window a mentor may publish.
pub const MIN_RULE_MINUTES: i64 = 30;

/// A recurring weekly window during which a mentor can be booked.
///
/// Times are wall-clock values on the server's canonical UTC timeline; the
/// mentor's profile timezone is not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRule {
    pub id: Uuid,
    pub mentor_id: Uuid,
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: u8,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
}

impl AvailabilityRule {
    pub fn new(
        mentor_id: Uuid,
        day_of_week: u8,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<Self> {
        if day_of_week > 6 {
            return Err(EngineError::Validation(format!(
                "day_of_week must be within 0..=6, got {day_of_week}"
            )));
        }
        let window = TimeRange::new(start_time, end_time)?;
        if window.minutes() < MIN_RULE_MINUTES {
            return Err(EngineError::Validation(format!(
                "availability duration must be at least {MIN_RULE_MINUTES} minutes"
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            mentor_id,
            day_of_week,
            start_time,
            end_time,
        })
    }

    pub fn window(&self) -> TimeRange {
        TimeRange {
            start: self.start_time,
            end: self.end_time,
        }
    }
}

/// Cuts each rule window into back-to-back slots of `duration_minutes`,
/// dropping any slot that overlaps a `taken` interval.
///
/// Windows are walked independently in order of their start time: a gap
/// between two windows is never bridged into one slot, and a trailing
/// remainder shorter than the duration is discarded.
pub fn plan_slots(
    rules: &[AvailabilityRule],
    duration_minutes: u32,
    taken: &[TimeRange],
) -> Vec<TimeRange> {
    if duration_minutes == 0 {
        return Vec::new();
    }
    let step = Duration::minutes(i64::from(duration_minutes));

    let mut windows: Vec<TimeRange> = rules.iter().map(AvailabilityRule::window).collect();
    windows.sort_by_key(|w| (w.start, w.end));

    let mut slots = Vec::new();
    for window in windows {
        let mut start = window.start;
        loop {
            let (end, wrapped) = start.overflowing_add_signed(step);
            if wrapped != 0 || end > window.end {
                break;
            }
            let candidate = TimeRange { start, end };
            if !taken.iter().any(|b| candidate.overlaps(b)) {
                slots.push(candidate);
            }
            start = end;
        }
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::parse_clock;

    fn t(raw: &str) -> NaiveTime {
        parse_clock(raw).unwrap()
    }

    fn rule(start: &str, end: &str) -> AvailabilityRule {
        AvailabilityRule::new(Uuid::new_v4(), 1, t(start), t(end)).unwrap()
    }

    fn range(start: &str, end: &str) -> TimeRange {
        TimeRange::new(t(start), t(end)).unwrap()
    }

    #[test]
    fn test_rule_validation() {
        let mentor = Uuid::new_v4();
        assert!(AvailabilityRule::new(mentor, 7, t("10:00"), t("11:00")).is_err());
        assert!(AvailabilityRule::new(mentor, 1, t("11:00"), t("10:00")).is_err());
        assert!(AvailabilityRule::new(mentor, 1, t("10:00"), t("10:29")).is_err());
        assert!(AvailabilityRule::new(mentor, 1, t("10:00"), t("10:30")).is_ok());
    }

    #[test]
    fn test_exact_window_yields_one_slot() {
        let slots = plan_slots(&[rule("10:00", "11:00")], 60, &[]);
        assert_eq!(slots, vec![range("10:00", "11:00")]);
    }

    #[test]
    fn test_short_window_yields_nothing() {
        let slots = plan_slots(&[rule("10:00", "10:45")], 60, &[]);
        assert!(slots.is_empty());
    }

    #[test]
    fn test_taken_interval_is_skipped() {
        let slots = plan_slots(
            &[rule("10:00", "12:00")],
            60,
            &[range("10:00", "11:00")],
        );
        assert_eq!(slots, vec![range("11:00", "12:00")]);
    }

    #[test]
    fn test_partial_overlap_blocks_both_neighbours() {
        let slots = plan_slots(
            &[rule("09:00", "12:00")],
            60,
            &[range("09:30", "10:30")],
        );
        assert_eq!(slots, vec![range("11:00", "12:00")]);
    }

    #[test]
    fn test_windows_are_not_merged() {
        // 10:00-10:30 and 10:30-11:00 are separate windows; no 60 minute slot
        // may bridge them.
        let slots = plan_slots(
            &[rule("10:30", "11:00"), rule("10:00", "10:30")],
            60,
            &[],
        );
        assert!(slots.is_empty());

        let slots = plan_slots(
            &[rule("14:00", "15:00"), rule("09:00", "10:00")],
            30,
            &[],
        );
        assert_eq!(
            slots,
            vec![
                range("09:00", "09:30"),
                range("09:30", "10:00"),
                range("14:00", "14:30"),
                range("14:30", "15:00"),
            ]
        );
    }

    #[test]
    fn test_window_ending_at_day_end() {
        let slots = plan_slots(&[rule("22:59", "23:59")], 60, &[]);
        assert_eq!(slots, vec![range("22:59", "23:59")]);
    }
}
