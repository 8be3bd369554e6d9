// src/commands/analytics.rs
//
// Read-only reports over the analytics views. Listings are paginated with
// `Page`; `today` is passed in so reports are reproducible.

use crate::analytics::{
    queries, views, CategorySummaryRow, ChallengePopularity, ChallengeSummaryRow, ChallengeTiming,
    GoalLeaderboardEntry, Participation, UserGoalRanking, UserHabitRanking, UserLeaderboardEntry,
    UserProgressRow, UserSubscriberRanking,
};
use crate::db::{with_connection, SharedDatabase};
use crate::error::AppError;
use crate::models::{Challenge, ChallengeCategory, Habit};
use chrono::NaiveDate;
use serde::Serialize;

use super::{ChallengeResponse, Page, Paginated};

/// One challenge with its timing and participation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChallengeDetails {
    #[serde(flatten)]
    pub challenge: ChallengeResponse,
    #[serde(flatten)]
    pub timing: ChallengeTiming,
    #[serde(flatten)]
    pub participation: Participation,
}

pub fn user_progress_report(
    db: &SharedDatabase,
    page: Page,
) -> Result<Paginated<UserProgressRow>, AppError> {
    let rows = with_connection(db, "user progress report", views::user_progress)?;
    Ok(page.apply(rows))
}

pub fn challenge_report(
    db: &SharedDatabase,
    page: Page,
    today: NaiveDate,
) -> Result<Paginated<ChallengeSummaryRow>, AppError> {
    let rows = with_connection(db, "challenge report", |conn| views::challenge_summaries(conn, today))?;
    Ok(page.apply(rows))
}

/// Categories ordered by popularity rank.
pub fn category_report(
    db: &SharedDatabase,
    page: Page,
) -> Result<Paginated<CategorySummaryRow>, AppError> {
    let mut rows = with_connection(db, "category report", views::category_summaries)?;
    rows.sort_by_key(|row| row.popularity_rank);
    Ok(page.apply(rows))
}

pub fn top_users_by_goals(
    db: &SharedDatabase,
    page: Page,
) -> Result<Paginated<UserGoalRanking>, AppError> {
    let rows = with_connection(db, "rank users by goals", views::users_by_completed_goals)?;
    Ok(page.apply(rows))
}

pub fn top_users_by_habits(
    db: &SharedDatabase,
    page: Page,
) -> Result<Paginated<UserHabitRanking>, AppError> {
    let rows = with_connection(db, "rank users by habits", views::users_by_habit_consistency)?;
    Ok(page.apply(rows))
}

pub fn top_users_by_subscribers(
    db: &SharedDatabase,
    page: Page,
) -> Result<Paginated<UserSubscriberRanking>, AppError> {
    let rows = with_connection(db, "rank users by subscribers", views::users_by_subscribers)?;
    Ok(page.apply(rows))
}

pub fn top_challenges(
    db: &SharedDatabase,
    page: Page,
    today: NaiveDate,
) -> Result<Paginated<ChallengePopularity>, AppError> {
    let rows = with_connection(db, "rank challenges", |conn| {
        views::challenges_by_popularity(conn, today)
    })?;
    Ok(page.apply(rows))
}

pub fn challenge_goal_leaderboard(
    db: &SharedDatabase,
    challenge_id: i64,
    page: Page,
) -> Result<Paginated<GoalLeaderboardEntry>, AppError> {
    let rows = with_connection(db, "goal leaderboard", |conn| {
        views::goal_leaderboard(conn, challenge_id)
    })?;
    Ok(page.apply(rows))
}

pub fn challenge_user_leaderboard(
    db: &SharedDatabase,
    challenge_id: i64,
    page: Page,
) -> Result<Paginated<UserLeaderboardEntry>, AppError> {
    let rows = with_connection(db, "user leaderboard", |conn| {
        views::user_leaderboard(conn, challenge_id)
    })?;
    Ok(page.apply(rows))
}

pub fn challenge_details(
    db: &SharedDatabase,
    challenge_id: i64,
    today: NaiveDate,
) -> Result<ChallengeDetails, AppError> {
    with_connection(db, "challenge details", |conn| {
        let timing = queries::challenge_timing(conn, challenge_id, today)?;
        let challenge = Challenge::find_by_id(conn, challenge_id)?
            .ok_or_else(|| AppError::not_found("Challenge"))?;
        let participation = queries::challenge_participation(conn, challenge_id)?;
        let category_ids = ChallengeCategory::category_ids(conn, challenge_id)?;
        Ok(ChallengeDetails {
            challenge: ChallengeResponse::new(challenge, category_ids),
            timing,
            participation,
        })
    })
}

pub fn goal_completion(db: &SharedDatabase, goal_id: i64) -> Result<f64, AppError> {
    with_connection(db, "goal completion", |conn| queries::goal_completion(conn, goal_id))
}

pub fn habit_consistency(db: &SharedDatabase, habit_id: i64) -> Result<f64, AppError> {
    with_connection(db, "habit consistency", |conn| {
        if Habit::find_by_id(conn, habit_id)?.is_none() {
            return Err(AppError::not_found("Habit"));
        }
        queries::habit_consistency(conn, habit_id)
    })
}
