//! Walk-forward schedule: calendar-month training/test windows anchored at an
//! explicit reference time.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// `YYYY-MM` of the start.
    pub fn label(&self) -> String {
        self.start.format("%Y-%m").to_string()
    }

    /// Split into calendar months, clipped to the range.
    pub fn split_months(&self) -> Vec<DateRange> {
        let mut out = Vec::new();
        let Some(mut cursor) = month_start(self.start) else {
            return out;
        };
        while cursor < self.end {
            let Some(next) = add_months(cursor, 1) else {
                break;
            };
            let piece = DateRange::new(cursor.max(self.start), next.min(self.end));
            if !piece.is_empty() {
                out.push(piece);
            }
            cursor = next;
        }
        out
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {})", self.start.format("%Y-%m-%d"), self.end.format("%Y-%m-%d"))
    }
}

/// One walk-forward fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleWindow {
    pub index: usize,
    pub training: DateRange,
    pub test: DateRange,
}

/// First instant of the month containing `t`.
pub fn month_start(t: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(t.year(), t.month(), 1, 0, 0, 0).single()
}

/// Shift a month start by `months` (may be negative).
pub fn add_months(first_of_month: DateTime<Utc>, months: i32) -> Option<DateTime<Utc>> {
    let total = first_of_month.year() * 12 + first_of_month.month0() as i32 + months;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()
}

/// Build the walk-forward schedule ending at the month containing `reference_now`.
///
/// The most recent test window ends at the first instant of the reference
/// month; each cycle's training window immediately precedes its test window.
/// `(total - training) / test` cycles fit, returned oldest first. The active
/// cycle is the last one.
pub fn build_schedule(
    reference_now: DateTime<Utc>,
    training_months: u32,
    test_months: u32,
    total_months: u32,
) -> Vec<CycleWindow> {
    if training_months == 0 || test_months == 0 || total_months < training_months + test_months {
        return Vec::new();
    }
    let Some(anchor) = month_start(reference_now) else {
        return Vec::new();
    };
    let cycles = (total_months - training_months) / test_months;
    let (training, test) = (training_months as i32, test_months as i32);

    (0..cycles)
        .filter_map(|k| {
            let back = (cycles - 1 - k) as i32 * test;
            let test_end = add_months(anchor, -back)?;
            let test_start = add_months(test_end, -test)?;
            let train_start = add_months(test_start, -training)?;
            Some(CycleWindow {
                index: k as usize,
                training: DateRange::new(train_start, test_start),
                test: DateRange::new(test_start, test_end),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    // ─── Schedule ───

    #[test]
    fn single_cycle_three_plus_one() {
        let schedule = build_schedule(at(2025, 10, 17, 9), 3, 1, 4);
        assert_eq!(schedule.len(), 1);
        let cycle = schedule[0];
        assert_eq!(cycle.training, DateRange::new(at(2025, 6, 1, 0), at(2025, 9, 1, 0)));
        assert_eq!(cycle.test, DateRange::new(at(2025, 9, 1, 0), at(2025, 10, 1, 0)));
    }

    #[test]
    fn schedule_is_deterministic_within_month() {
        let a = build_schedule(at(2025, 10, 1, 0), 3, 1, 6);
        let b = build_schedule(at(2025, 10, 31, 23), 3, 1, 6);
        assert_eq!(a, b);
    }

    #[test]
    fn multiple_cycles_oldest_first() {
        let schedule = build_schedule(at(2025, 10, 17, 9), 3, 1, 6);
        assert_eq!(schedule.len(), 3);
        assert!(schedule.windows(2).all(|w| w[0].test.start < w[1].test.start));
        // active cycle tests the month before the reference month
        let active = schedule.last().unwrap();
        assert_eq!(active.test.start, at(2025, 9, 1, 0));
        assert_eq!(schedule[0].test.start, at(2025, 7, 1, 0));
        assert_eq!(schedule[0].training.start, at(2025, 4, 1, 0));
    }

    #[test]
    fn crosses_year_boundary() {
        let schedule = build_schedule(at(2026, 2, 3, 0), 3, 1, 4);
        assert_eq!(schedule[0].training.start, at(2025, 10, 1, 0));
        assert_eq!(schedule[0].test.start, at(2026, 1, 1, 0));
    }

    #[test]
    fn invalid_lengths_yield_empty() {
        assert!(build_schedule(at(2025, 10, 1, 0), 0, 1, 4).is_empty());
        assert!(build_schedule(at(2025, 10, 1, 0), 3, 0, 4).is_empty());
        assert!(build_schedule(at(2025, 10, 1, 0), 3, 1, 3).is_empty());
    }

    // ─── Ranges ───

    #[test]
    fn split_training_into_months() {
        let range = DateRange::new(at(2025, 6, 1, 0), at(2025, 9, 1, 0));
        let months = range.split_months();
        let labels: Vec<String> = months.iter().map(DateRange::label).collect();
        assert_eq!(labels, vec!["2025-06", "2025-07", "2025-08"]);
        assert_eq!(months[1], DateRange::new(at(2025, 7, 1, 0), at(2025, 8, 1, 0)));
    }

    #[test]
    fn split_clips_partial_months() {
        let range = DateRange::new(at(2025, 6, 15, 0), at(2025, 7, 10, 0));
        let months = range.split_months();
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].start, at(2025, 6, 15, 0));
        assert_eq!(months[1].end, at(2025, 7, 10, 0));
    }

    #[test]
    fn half_open_contains() {
        let range = DateRange::new(at(2025, 6, 1, 0), at(2025, 7, 1, 0));
        assert!(range.contains(at(2025, 6, 1, 0)));
        assert!(!range.contains(at(2025, 7, 1, 0)));
    }
}
