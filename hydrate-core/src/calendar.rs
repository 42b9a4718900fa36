//! Calendar-day windows
//!
//! Every "today" calculation goes through [`daily_window`], computed from the
//! caller's `now` on each call so that crossing midnight advances the window
//! on the next read. Days are local-calendar days in `now`'s time zone.

use chrono::{DateTime, Days, LocalResult, NaiveDate, TimeZone, Utc};

use crate::types::TimeRange;

/// First instant of `date` in `tz`.
///
/// When midnight falls into a DST gap the earliest valid instant after the
/// gap is used.
pub fn start_of_day<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => (1..=96)
            .map(|step| midnight + chrono::Duration::minutes(15 * step))
            .find_map(|probe| tz.from_local_datetime(&probe).earliest())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight)),
    }
}

/// `[startOfDay(date), startOfDay(date + 1))` in `tz`.
pub fn day_range<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> TimeRange {
    let next = date.checked_add_days(Days::new(1)).unwrap_or(date);
    TimeRange::new(start_of_day(date, tz), start_of_day(next, tz))
}

/// The DailyWindow containing `now`.
pub fn daily_window<Tz: TimeZone>(now: &DateTime<Tz>) -> TimeRange {
    day_range(now.date_naive(), &now.timezone())
}

/// Local calendar date of an instant in `tz`.
pub fn local_date<Tz: TimeZone>(ts: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    ts.with_timezone(tz).date_naive()
}

/// An inclusive run of calendar days, e.g. the last 7 days ending today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    /// First day in the window
    pub first: NaiveDate,
    /// Number of calendar days, at least 1
    pub days: u32,
}

impl DayWindow {
    pub fn new(first: NaiveDate, days: u32) -> Self {
        Self {
            first,
            days: days.max(1),
        }
    }

    /// Window of `days` calendar days whose last day is `last`.
    pub fn ending_on(last: NaiveDate, days: u32) -> Self {
        let days = days.max(1);
        let first = last
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .unwrap_or(NaiveDate::MIN);
        Self { first, days }
    }

    pub fn last(&self) -> NaiveDate {
        self.first
            .checked_add_days(Days::new(u64::from(self.days - 1)))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.first && date <= self.last()
    }

    /// Each calendar day in order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.first.iter_days().take(self.days as usize)
    }

    /// Instant range covering the whole window in `tz`.
    pub fn time_range<Tz: TimeZone>(&self, tz: &Tz) -> TimeRange {
        TimeRange::new(
            start_of_day(self.first, tz),
            day_range(self.last(), tz).end,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_daily_window_is_local_midnight_to_midnight() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap();
        let window = daily_window(&now);

        let expected_start = tz.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap();
        assert_eq!(window.start, expected_start.with_timezone(&Utc));
        assert_eq!(window.end - window.start, chrono::Duration::days(1));
        assert!(window.contains(now.with_timezone(&Utc)));
    }

    #[test]
    fn test_window_advances_after_midnight() {
        let before = Utc.with_ymd_and_hms(2025, 3, 14, 23, 59, 59).unwrap();
        let after = before + chrono::Duration::seconds(2);
        assert_ne!(daily_window(&before), daily_window(&after));
        assert_eq!(daily_window(&before).end, daily_window(&after).start);
    }

    #[test]
    fn test_day_window_ending_on() {
        let last = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        let window = DayWindow::ending_on(last, 7);
        assert_eq!(window.first, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(window.last(), last);
        assert_eq!(window.dates().count(), 7);
        assert!(window.contains(last));
        assert!(!window.contains(NaiveDate::from_ymd_opt(2025, 3, 8).unwrap()));
    }
}
