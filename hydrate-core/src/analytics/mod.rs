//! Analytics module for hydrate
//!
//! Provides the progress statistics shown by both processes:
//! - Today's total and remaining volume
//! - Averages, best day and goal-rate over 7/30/365-day windows
//! - Current and longest streaks
//! - Per-beverage breakdown
//!
//! All functions are pure over an event snapshot; see [`progress`].

pub mod progress;

pub use progress::{
    average, best_day, beverage_breakdown, daily_totals, goal_percentage, goal_rate, left_goal,
    longest_streak, streak, today_total, ProgressSummary, StatsPeriod,
};
