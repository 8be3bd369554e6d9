// src/analytics/queries.rs

use super::metrics::{self, ActivityCounts, ChallengeTiming};
use crate::error::AppError;
use crate::models::{Challenge, Goal};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::HashMap;

/// Public goals enrolled in a challenge and the distinct users owning them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Participation {
    pub participants: u32,
    pub goals: u32,
}

const LATEST_VALUE: &str = "(SELECT p.current_value FROM goal_progresses p
      WHERE p.goal_id = g.id ORDER BY p.progress_date DESC, p.id DESC LIMIT 1)";

/// Consistency of one habit. A habit without logs scores 0.
pub fn habit_consistency(conn: &Connection, habit_id: i64) -> Result<f64, AppError> {
    let (completed, failed): (u32, u32) = conn.query_row(
        "SELECT COALESCE(SUM(status = 'completed'), 0), COALESCE(SUM(status = 'failed'), 0)
         FROM habit_logs WHERE habit_id = ?1",
        params![habit_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(metrics::habit_consistency(completed, failed))
}

/// Completion percentage of one goal from its latest snapshot.
pub fn goal_completion(conn: &Connection, goal_id: i64) -> Result<f64, AppError> {
    let (target_value, latest): (f64, Option<f64>) = conn
        .query_row(
            &format!("SELECT g.target_value, {LATEST_VALUE} FROM goals g WHERE g.id = ?1"),
            params![goal_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => AppError::not_found("Goal"),
            other => other.into(),
        })?;
    Ok(metrics::goal_completion_percent(target_value, latest))
}

/// Timing of one challenge as seen on `today`.
pub fn challenge_timing(
    conn: &Connection,
    challenge_id: i64,
    today: NaiveDate,
) -> Result<ChallengeTiming, AppError> {
    let challenge =
        Challenge::find_by_id(conn, challenge_id)?.ok_or_else(|| AppError::not_found("Challenge"))?;
    Ok(ChallengeTiming::compute(
        challenge.start_date,
        challenge.end_date,
        challenge.is_active,
        today,
    ))
}

pub fn challenge_participation(conn: &Connection, challenge_id: i64) -> Result<Participation, AppError> {
    let participation = conn.query_row(
        "SELECT COUNT(DISTINCT g.user_id), COUNT(g.id)
         FROM goal_challenges gc
         JOIN goals g ON g.id = gc.goal_id
         WHERE gc.challenge_id = ?1 AND g.is_public = 1",
        params![challenge_id],
        |row| {
            Ok(Participation {
                participants: row.get(0)?,
                goals: row.get(1)?,
            })
        },
    )?;
    Ok(participation)
}

/// Inputs of a category's activity score.
pub fn category_activity(conn: &Connection, category_id: i64) -> Result<ActivityCounts, AppError> {
    let counts = conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM goals WHERE category_id = ?1),
            (SELECT COUNT(*) FROM habits WHERE category_id = ?1),
            (SELECT COUNT(*) FROM challenge_categories WHERE category_id = ?1),
            (SELECT COUNT(*) FROM (
                SELECT user_id FROM goals WHERE category_id = ?1
                UNION
                SELECT user_id FROM habits WHERE category_id = ?1))",
        params![category_id],
        |row| {
            Ok(ActivityCounts {
                goals: row.get(0)?,
                habits: row.get(1)?,
                challenges: row.get(2)?,
                users: row.get(3)?,
            })
        },
    )?;
    Ok(counts)
}

/// Completion percentage of every goal, keyed by goal id.
pub(crate) fn completion_by_goal(conn: &Connection) -> Result<HashMap<i64, f64>, AppError> {
    let mut stmt = conn.prepare(&format!("SELECT g.id, g.target_value, {LATEST_VALUE} FROM goals g"))?;
    let rows = stmt.query_map([], |row| {
        let id: i64 = row.get(0)?;
        let target: f64 = row.get(1)?;
        let latest: Option<f64> = row.get(2)?;
        Ok((id, metrics::goal_completion_percent(target, latest)))
    })?;
    Ok(rows.collect::<Result<_, _>>()?)
}

/// Whether each goal has at least one snapshot, keyed by goal id.
pub(crate) fn goals_with_progress(conn: &Connection) -> Result<HashMap<i64, bool>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT g.id, EXISTS(SELECT 1 FROM goal_progresses p WHERE p.goal_id = g.id) FROM goals g",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(rows.collect::<Result<_, _>>()?)
}

/// Consistency of every habit, keyed by habit id.
pub(crate) fn consistency_by_habit(conn: &Connection) -> Result<HashMap<i64, f64>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT h.id,
                COALESCE(SUM(l.status = 'completed'), 0),
                COALESCE(SUM(l.status = 'failed'), 0)
         FROM habits h
         LEFT JOIN habit_logs l ON l.habit_id = h.id
         GROUP BY h.id",
    )?;
    let rows = stmt.query_map([], |row| {
        let id: i64 = row.get(0)?;
        let completed: u32 = row.get(1)?;
        let failed: u32 = row.get(2)?;
        Ok((id, metrics::habit_consistency(completed, failed)))
    })?;
    Ok(rows.collect::<Result<_, _>>()?)
}

/// Public goals enrolled in a challenge.
pub(crate) fn public_challenge_goals(conn: &Connection, challenge_id: i64) -> Result<Vec<Goal>, AppError> {
    let goals = Goal::find_by_challenge(conn, challenge_id)?;
    Ok(goals.into_iter().filter(|g| g.is_public).collect())
}
