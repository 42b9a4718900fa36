//! Progress statistics over a snapshot of drink events.
//!
//! Every function here is pure and total: callers pass an event slice (in
//! any order) plus the `now` or window to evaluate, and get a number back.
//! Days are local-calendar days in the time zone of `now`/`tz`.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, TimeZone};

use crate::calendar::{daily_window, local_date, DayWindow};
use crate::types::{BeverageKind, DrinkEvent};

/// Sum of volumes inside the DailyWindow containing `now`.
pub fn today_total<Tz: TimeZone>(events: &[DrinkEvent], now: &DateTime<Tz>) -> i64 {
    let window = daily_window(now);
    events
        .iter()
        .filter(|e| window.contains(e.timestamp))
        .map(|e| e.volume_ml)
        .sum()
}

/// Per-day sums for days inside `window` that have at least one event.
pub fn day_sums<Tz: TimeZone>(
    events: &[DrinkEvent],
    window: &DayWindow,
    tz: &Tz,
) -> BTreeMap<NaiveDate, i64> {
    let mut sums = BTreeMap::new();
    for event in events {
        let date = local_date(event.timestamp, tz);
        if window.contains(date) {
            *sums.entry(date).or_insert(0) += event.volume_ml;
        }
    }
    sums
}

/// Per-day series covering every day of `window`, empty days as zero.
pub fn daily_totals<Tz: TimeZone>(
    events: &[DrinkEvent],
    window: &DayWindow,
    tz: &Tz,
) -> Vec<(NaiveDate, i64)> {
    let sums = day_sums(events, window, tz);
    window
        .dates()
        .map(|date| (date, sums.get(&date).copied().unwrap_or(0)))
        .collect()
}

/// Total volume in `window` divided by the number of calendar days it spans.
///
/// Days without entries count toward the denominator.
pub fn average<Tz: TimeZone>(events: &[DrinkEvent], window: &DayWindow, tz: &Tz) -> f64 {
    let total: i64 = day_sums(events, window, tz).values().sum();
    total as f64 / f64::from(window.days)
}

/// Largest per-day sum in `window`. Days without entries are absent, not zero.
pub fn best_day<Tz: TimeZone>(events: &[DrinkEvent], window: &DayWindow, tz: &Tz) -> Option<i64> {
    day_sums(events, window, tz).into_values().max()
}

/// Percentage (rounded) of days in `window` whose total reached `goal_ml`.
///
/// Returns 0 when `goal_ml <= 0`.
pub fn goal_rate<Tz: TimeZone>(
    events: &[DrinkEvent],
    window: &DayWindow,
    goal_ml: i64,
    tz: &Tz,
) -> u32 {
    if goal_ml <= 0 {
        return 0;
    }
    let met = day_sums(events, window, tz)
        .values()
        .filter(|&&sum| sum >= goal_ml)
        .count();
    (100.0 * met as f64 / f64::from(window.days)).round() as u32
}

/// Consecutive days with at least one event, walking back from today.
///
/// Today must have an event for the streak to start; a log that stops
/// yesterday reports 0.
pub fn streak<Tz: TimeZone>(events: &[DrinkEvent], now: &DateTime<Tz>) -> u32 {
    let tz = now.timezone();
    let today = now.date_naive();
    let mut days: Vec<NaiveDate> = events
        .iter()
        .map(|e| local_date(e.timestamp, &tz))
        .filter(|d| *d <= today)
        .collect();
    days.sort_unstable();
    days.dedup();

    let mut count = 0;
    let mut expected = today;
    for day in days.into_iter().rev() {
        if day != expected {
            break;
        }
        count += 1;
        match expected.pred_opt() {
            Some(prev) => expected = prev,
            None => break,
        }
    }
    count
}

/// Longest run of consecutive days with at least one event, over all history.
pub fn longest_streak<Tz: TimeZone>(events: &[DrinkEvent], tz: &Tz) -> u32 {
    let mut days: Vec<NaiveDate> = events.iter().map(|e| local_date(e.timestamp, tz)).collect();
    days.sort_unstable();
    days.dedup();

    let mut longest = 0;
    let mut current = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in days {
        current = match previous {
            Some(prev) if prev.succ_opt() == Some(day) => current + 1,
            _ => 1,
        };
        longest = longest.max(current);
        previous = Some(day);
    }
    longest
}

/// Volume still needed to reach the goal; 0 once reached or when `goal_ml <= 0`.
pub fn left_goal(total_ml: i64, goal_ml: i64) -> i64 {
    if goal_ml <= 0 {
        return 0;
    }
    (goal_ml - total_ml).max(0)
}

/// Progress toward the goal as a percentage, clamped to `[0, 100]`.
///
/// Returns 0 when `goal_ml <= 0`.
pub fn goal_percentage(total_ml: i64, goal_ml: i64) -> f64 {
    if goal_ml <= 0 {
        return 0.0;
    }
    (100.0 * total_ml as f64 / goal_ml as f64).clamp(0.0, 100.0)
}

/// Volume per beverage kind, largest first. Kinds with no volume are omitted.
pub fn beverage_breakdown(events: &[DrinkEvent]) -> Vec<(BeverageKind, i64)> {
    let mut totals: HashMap<BeverageKind, i64> = HashMap::new();
    for event in events {
        *totals.entry(event.beverage_kind).or_insert(0) += event.volume_ml;
    }
    let mut breakdown: Vec<_> = totals.into_iter().filter(|(_, v)| *v > 0).collect();
    breakdown.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.as_str().cmp(b.0.as_str())));
    breakdown
}

/// Default statistics periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatsPeriod {
    #[default]
    Week,
    Month,
    Year,
}

impl StatsPeriod {
    pub fn days(&self) -> u32 {
        match self {
            StatsPeriod::Week => 7,
            StatsPeriod::Month => 30,
            StatsPeriod::Year => 365,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            StatsPeriod::Week => "Last 7 days",
            StatsPeriod::Month => "Last 30 days",
            StatsPeriod::Year => "Last 365 days",
        }
    }

    /// Window of this period ending on `now`'s calendar day.
    pub fn window_ending<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DayWindow {
        DayWindow::ending_on(now.date_naive(), self.days())
    }
}

impl std::str::FromStr for StatsPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "week" => Ok(StatsPeriod::Week),
            "month" => Ok(StatsPeriod::Month),
            "year" => Ok(StatsPeriod::Year),
            _ => Err(format!("unknown period: {} (expected week, month or year)", s)),
        }
    }
}

/// Everything the statistics view shows, computed from one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSummary {
    pub period: StatsPeriod,
    pub today_ml: i64,
    pub goal_ml: i64,
    pub left_ml: i64,
    pub today_percentage: f64,
    pub average_ml: f64,
    pub best_day_ml: Option<i64>,
    pub goal_rate: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub breakdown: Vec<(BeverageKind, i64)>,
    pub daily: Vec<(NaiveDate, i64)>,
}

impl ProgressSummary {
    pub fn compute<Tz: TimeZone>(
        events: &[DrinkEvent],
        now: &DateTime<Tz>,
        goal_ml: i64,
        period: StatsPeriod,
    ) -> Self {
        let tz = now.timezone();
        let window = period.window_ending(now);
        let today_ml = today_total(events, now);
        let range = window.time_range(&tz);
        let in_window: Vec<DrinkEvent> = events
            .iter()
            .filter(|e| range.contains(e.timestamp))
            .cloned()
            .collect();

        Self {
            period,
            today_ml,
            goal_ml,
            left_ml: left_goal(today_ml, goal_ml),
            today_percentage: goal_percentage(today_ml, goal_ml),
            average_ml: average(events, &window, &tz),
            best_day_ml: best_day(events, &window, &tz),
            goal_rate: goal_rate(events, &window, goal_ml, &tz),
            current_streak: streak(events, now),
            longest_streak: longest_streak(events, &tz),
            breakdown: beverage_breakdown(&in_window),
            daily: daily_totals(events, &window, &tz),
        }
    }
}
