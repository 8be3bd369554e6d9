//! Pure metric formulas. Every ratio returns 0 instead of dividing by zero.

use crate::constants::{CHALLENGE_WEIGHT, GOAL_WEIGHT, HABIT_WEIGHT, USER_WEIGHT};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// `100 * part / whole`, or 0 when `whole` is not positive.
pub fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

/// Share of completed occurrences among completed and failed ones.
/// Skipped occurrences never reach this function.
pub fn habit_consistency(completed: u32, failed: u32) -> f64 {
    let completed = f64::from(completed);
    percent(completed, completed + f64::from(failed))
}

/// Progress toward a goal's target from its latest snapshot, in `[0, 100]`.
pub fn goal_completion_percent(target_value: f64, latest_value: Option<f64>) -> f64 {
    match latest_value {
        Some(current) if current.is_finite() => percent(current, target_value).clamp(0.0, 100.0),
        Some(_) | None => 0.0,
    }
}

/// Mean of the values, 0 for an empty input.
pub fn average<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0u32), |(sum, count), v| (sum + v, count.saturating_add(1)));
    if count == 0 {
        0.0
    } else {
        sum / f64::from(count)
    }
}

/// Round to one decimal place for reports.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn days_f64(days: i64) -> f64 {
    i32::try_from(days).map_or(f64::from(i32::MAX), f64::from)
}

/// Where a challenge stands on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    NotStarted,
    Active,
    Finished,
    Inactive,
}

impl ChallengeStatus {
    /// Classify a challenge. Dates take priority over the active flag.
    pub fn classify(start: NaiveDate, end: NaiveDate, is_active: bool, today: NaiveDate) -> Self {
        if today < start {
            ChallengeStatus::NotStarted
        } else if today > end {
            ChallengeStatus::Finished
        } else if is_active {
            ChallengeStatus::Active
        } else {
            ChallengeStatus::Inactive
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChallengeStatus::NotStarted => "not_started",
            ChallengeStatus::Active => "active",
            ChallengeStatus::Finished => "finished",
            ChallengeStatus::Inactive => "inactive",
        }
    }
}

/// Day counts for a challenge window, inclusive of both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChallengeTiming {
    pub duration_days: i64,
    pub days_passed: i64,
    pub days_remaining: i64,
    pub time_progress_percent: f64,
    pub status: ChallengeStatus,
}

impl ChallengeTiming {
    pub fn compute(start: NaiveDate, end: NaiveDate, is_active: bool, today: NaiveDate) -> Self {
        let duration_days = ((end - start).num_days() + 1).max(0);

        let (days_passed, days_remaining) = if today < start {
            (0, duration_days)
        } else {
            let passed = ((today - start).num_days() + 1).min(duration_days);
            let remaining = (end - today).num_days().clamp(0, duration_days);
            (passed, remaining)
        };

        Self {
            duration_days,
            days_passed,
            days_remaining,
            time_progress_percent: percent(days_f64(days_passed), days_f64(duration_days)),
            status: ChallengeStatus::classify(start, end, is_active, today),
        }
    }
}

/// Inputs of the category activity score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActivityCounts {
    pub goals: u32,
    pub habits: u32,
    pub challenges: u32,
    pub users: u32,
}

/// Weighted sum used only as a ranking key; unbounded.
pub fn category_activity_score(counts: &ActivityCounts) -> f64 {
    f64::from(counts.goals) * GOAL_WEIGHT
        + f64::from(counts.habits) * HABIT_WEIGHT
        + f64::from(counts.challenges) * CHALLENGE_WEIGHT
        + f64::from(counts.users) * USER_WEIGHT
}
