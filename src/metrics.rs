//! Statistics derived from the mirrored records
//!
//! Everything here is a pure function of the records passed in and the
//! caller's notion of "today". Nothing is cached.

use chrono::{Duration, NaiveDate};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::models::{Habit, SleepEntry};

/// Days covered by [`habit_rate`], today included
pub const RATE_WINDOW_DAYS: u32 = 30;

/// Percentage of habits completed on `today`, rounded to the nearest integer.
///
/// Zero when there are no habits.
pub fn completion_rate(habits: &[Habit], today: NaiveDate) -> u32 {
    if habits.is_empty() {
        return 0;
    }
    let done = habits.iter().filter(|h| h.is_completed_on(today)).count();
    ((done as f64 / habits.len() as f64) * 100.0).round() as u32
}

/// Consecutive days, walking back from `today`, on which at least one habit
/// was completed. Zero if nothing was completed today.
pub fn streak(habits: &[Habit], today: NaiveDate) -> u32 {
    let days: BTreeSet<NaiveDate> = habits
        .iter()
        .flat_map(|h| h.completed_days.iter().copied())
        .collect();
    run_ending_at(&days, today)
}

/// [`streak`] for a single habit
pub fn habit_streak(habit: &Habit, today: NaiveDate) -> u32 {
    run_ending_at(&habit.completed_days, today)
}

// Each step consumes a distinct member of `days`, so the walk is finite.
fn run_ending_at(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut count = 0;
    let mut day = today;
    while days.contains(&day) {
        count += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    count
}

/// Longest run of consecutive days with at least one completion
pub fn longest_streak(habits: &[Habit]) -> u32 {
    let days: BTreeSet<NaiveDate> = habits
        .iter()
        .flat_map(|h| h.completed_days.iter().copied())
        .collect();

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

/// Mean hours over every entry ever recorded, rounded to one decimal.
///
/// `None` when there are no entries.
pub fn average_sleep(entries: &[SleepEntry]) -> Option<f64> {
    if entries.is_empty() {
        return None;
    }
    let total: f64 = entries.iter().map(|e| e.hours).sum();
    let mean = total / entries.len() as f64;
    Some((mean * 10.0).round() / 10.0)
}

/// Fraction of the last [`RATE_WINDOW_DAYS`] days (today included) on which
/// the habit was completed, in `[0, 1]`.
pub fn habit_rate(habit: &Habit, today: NaiveDate) -> f64 {
    let start = today - Duration::days(i64::from(RATE_WINDOW_DAYS) - 1);
    let hits = habit.completed_days.range(start..=today).count();
    hits as f64 / f64::from(RATE_WINDOW_DAYS)
}

/// Snapshot of every statistic for one owner on one day
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub today: NaiveDate,
    pub completion_rate: u32,
    pub streak: u32,
    pub longest_streak: u32,
    pub average_sleep: Option<f64>,
    pub habit_rates: Vec<(Uuid, f64)>,
}

pub fn summarize(habits: &[Habit], sleep_entries: &[SleepEntry], today: NaiveDate) -> Summary {
    Summary {
        today,
        completion_rate: completion_rate(habits, today),
        streak: streak(habits, today),
        longest_streak: longest_streak(habits),
        average_sleep: average_sleep(sleep_entries),
        habit_rates: habits
            .iter()
            .map(|h| (h.id, habit_rate(h, today)))
            .collect(),
    }
}
