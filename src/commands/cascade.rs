// src/commands/cascade.rs
//
// Deletes cascade in the schema. These helpers record a `deleted` audit
// entry for every dependent row before the parent row goes away.

use crate::audit::{capture_delete, AuditContext};
use crate::error::AppError;
use crate::models::{
    Category, Challenge, ChallengeCategory, Goal, GoalChallenge, GoalProgress, Habit, HabitLog,
    Subscription, User, Visibility,
};
use rusqlite::Connection;

pub(super) fn goal(conn: &Connection, ctx: AuditContext, goal: &Goal) -> Result<(), AppError> {
    for progress in GoalProgress::find_by_goal(conn, goal.id)? {
        capture_delete(conn, ctx, &progress)?;
    }
    for membership in GoalChallenge::find_by_goal(conn, goal.id)? {
        capture_delete(conn, ctx, &membership)?;
    }
    capture_delete(conn, ctx, goal)?;
    Ok(())
}

pub(super) fn habit(conn: &Connection, ctx: AuditContext, habit: &Habit) -> Result<(), AppError> {
    for log in HabitLog::find_by_habit(conn, habit.id)? {
        capture_delete(conn, ctx, &log)?;
    }
    capture_delete(conn, ctx, habit)?;
    Ok(())
}

pub(super) fn challenge(
    conn: &Connection,
    ctx: AuditContext,
    challenge: &Challenge,
) -> Result<(), AppError> {
    for membership in GoalChallenge::find_by_challenge(conn, challenge.id)? {
        capture_delete(conn, ctx, &membership)?;
    }
    for link in ChallengeCategory::find_by_challenge(conn, challenge.id)? {
        capture_delete(conn, ctx, &link)?;
    }
    capture_delete(conn, ctx, challenge)?;
    Ok(())
}

pub(super) fn category(
    conn: &Connection,
    ctx: AuditContext,
    category: &Category,
) -> Result<(), AppError> {
    for g in Goal::find_by_category(conn, category.id, Visibility::All)? {
        goal(conn, ctx, &g)?;
    }
    for h in Habit::find_by_category(conn, category.id, Visibility::All)? {
        habit(conn, ctx, &h)?;
    }
    for link in ChallengeCategory::find_by_category(conn, category.id)? {
        capture_delete(conn, ctx, &link)?;
    }
    capture_delete(conn, ctx, category)?;
    Ok(())
}

pub(super) fn user(conn: &Connection, ctx: AuditContext, user: &User) -> Result<(), AppError> {
    for g in Goal::find_by_user(conn, user.id, Visibility::All)? {
        goal(conn, ctx, &g)?;
    }
    for h in Habit::find_by_user(conn, user.id, Visibility::All)? {
        habit(conn, ctx, &h)?;
    }
    for sub in Subscription::involving(conn, user.id)? {
        capture_delete(conn, ctx, &sub)?;
    }
    capture_delete(conn, ctx, user)?;
    Ok(())
}
