use crate::analytics::ChallengeStatus;
use crate::audit::{capture_delete, capture_insert, capture_update, AuditContext, BatchLog};
use crate::db::{with_connection, with_transaction, SharedDatabase};
use crate::error::AppError;
use crate::models::{Category, Challenge, ChallengeCategory, Goal, GoalChallenge, NewChallenge, User};
use crate::validation::{validate_date_range, validate_title};
use chrono::NaiveDate;
use rusqlite::Connection;

use super::batch::run_batch;
use super::{
    cascade, BatchRequest, ChallengeResponse, NewChallengeWithCategories, UpdateChallengeRequest,
};

fn load_response(conn: &Connection, challenge: Challenge) -> Result<ChallengeResponse, AppError> {
    let category_ids = ChallengeCategory::category_ids(conn, challenge.id)?;
    Ok(ChallengeResponse::new(challenge, category_ids))
}

fn find_challenge(conn: &Connection, id: i64) -> Result<Challenge, AppError> {
    Challenge::find_by_id(conn, id)?.ok_or_else(|| AppError::not_found("Challenge"))
}

fn insert_challenge(conn: &Connection, request: &NewChallenge) -> Result<Challenge, AppError> {
    let name = validate_title("name", &request.name)?.to_string();
    validate_date_range(request.start_date, request.end_date)?;
    let new = NewChallenge {
        name,
        ..request.clone()
    };
    Ok(Challenge::create(conn, &new)?)
}

pub fn create_challenge(
    db: &SharedDatabase,
    ctx: AuditContext,
    request: NewChallenge,
) -> Result<ChallengeResponse, AppError> {
    with_transaction(db, "create challenge", |conn| {
        let challenge = insert_challenge(conn, &request)?;
        capture_insert(conn, ctx, &challenge)?;
        load_response(conn, challenge)
    })
}

pub fn get_challenge(db: &SharedDatabase, id: i64) -> Result<ChallengeResponse, AppError> {
    with_connection(db, "load challenge", |conn| {
        let challenge = find_challenge(conn, id)?;
        load_response(conn, challenge)
    })
}

pub fn get_challenges(db: &SharedDatabase) -> Result<Vec<ChallengeResponse>, AppError> {
    with_connection(db, "load challenges", |conn| {
        Challenge::find_all(conn)?
            .into_iter()
            .map(|challenge| load_response(conn, challenge))
            .collect()
    })
}

/// Challenges a category is attached to.
pub fn get_category_challenges(
    db: &SharedDatabase,
    category_id: i64,
) -> Result<Vec<ChallengeResponse>, AppError> {
    with_connection(db, "load category challenges", |conn| {
        if Category::find_by_id(conn, category_id)?.is_none() {
            return Err(AppError::not_found("Category"));
        }
        Challenge::find_by_category(conn, category_id)?
            .into_iter()
            .map(|challenge| load_response(conn, challenge))
            .collect()
    })
}

pub fn update_challenge(
    db: &SharedDatabase,
    ctx: AuditContext,
    id: i64,
    request: UpdateChallengeRequest,
) -> Result<ChallengeResponse, AppError> {
    let name = request
        .name
        .as_deref()
        .map(|n| validate_title("name", n))
        .transpose()?;

    with_transaction(db, "update challenge", |conn| {
        let before = find_challenge(conn, id)?;
        let mut after = before.clone();
        if let Some(name) = name {
            after.name = name.to_string();
        }
        if let Some(description) = &request.description {
            after.description.clone_from(description);
        }
        after.start_date = request.start_date.unwrap_or(after.start_date);
        after.end_date = request.end_date.unwrap_or(after.end_date);
        validate_date_range(after.start_date, after.end_date)?;
        if let Some(is_active) = request.is_active {
            after.is_active = is_active;
        }
        after.update(conn)?;
        capture_update(conn, ctx, &before, &after)?;
        load_response(conn, after)
    })
}

/// Delete a challenge with its memberships and category links.
pub fn delete_challenge(db: &SharedDatabase, ctx: AuditContext, id: i64) -> Result<bool, AppError> {
    with_transaction(db, "delete challenge", |conn| {
        let Some(challenge) = Challenge::find_by_id(conn, id)? else {
            return Ok(false);
        };
        cascade::challenge(conn, ctx, &challenge)?;
        Ok(Challenge::delete(conn, id)?)
    })
}

// ── Categories ────────────────────────────────────────────────────────

pub fn add_challenge_category(
    db: &SharedDatabase,
    ctx: AuditContext,
    challenge_id: i64,
    category_id: i64,
) -> Result<ChallengeResponse, AppError> {
    with_transaction(db, "attach challenge category", |conn| {
        let challenge = find_challenge(conn, challenge_id)?;
        let category =
            Category::find_by_id(conn, category_id)?.ok_or_else(|| AppError::not_found("Category"))?;
        if ChallengeCategory::exists(conn, challenge_id, category_id)? {
            return Err(AppError::AlreadyExists { name: category.name });
        }
        let link = ChallengeCategory::create(conn, challenge_id, category_id)?;
        capture_insert(conn, ctx, &link)?;
        load_response(conn, challenge)
    })
}

pub fn remove_challenge_category(
    db: &SharedDatabase,
    ctx: AuditContext,
    challenge_id: i64,
    category_id: i64,
) -> Result<bool, AppError> {
    with_transaction(db, "detach challenge category", |conn| {
        if !ChallengeCategory::exists(conn, challenge_id, category_id)? {
            return Ok(false);
        }
        capture_delete(
            conn,
            ctx,
            &ChallengeCategory {
                challenge_id,
                category_id,
            },
        )?;
        Ok(ChallengeCategory::delete(conn, challenge_id, category_id)?)
    })
}

/// Create many challenges in chunks of `batch_size`, each attached to its
/// listed categories. An unknown category fails the whole item.
pub fn batch_create_challenges(
    db: &SharedDatabase,
    ctx: AuditContext,
    request: BatchRequest<NewChallengeWithCategories>,
) -> Result<BatchLog, AppError> {
    run_batch(db, ctx, &request, |conn, item| {
        let challenge = insert_challenge(conn, &item.challenge)?;
        let mut category_ids = item.category_ids.clone();
        category_ids.sort_unstable();
        category_ids.dedup();
        for category_id in category_ids {
            if Category::find_by_id(conn, category_id)?.is_none() {
                return Err(AppError::invalid(
                    "category_id",
                    format!("category {category_id} does not exist"),
                ));
            }
            let link = ChallengeCategory::create(conn, challenge.id, category_id)?;
            capture_insert(conn, ctx, &link)?;
        }
        Ok(challenge)
    })
}

// ── Membership ────────────────────────────────────────────────────────

/// Check whether a goal may join a challenge on `today`.
fn check_join(
    conn: &Connection,
    goal: &Goal,
    challenge: &Challenge,
    today: NaiveDate,
) -> Result<(), AppError> {
    let owner = User::find_by_id(conn, goal.user_id)?.ok_or_else(|| AppError::not_found("User"))?;
    if !goal.is_public || !owner.is_public {
        return Err(AppError::invalid("goal_id", "private goals cannot join challenges"));
    }
    if goal.deadline < today {
        return Err(AppError::invalid("goal_id", "goal deadline has passed"));
    }
    if goal.is_completed {
        return Err(AppError::invalid("goal_id", "goal is already completed"));
    }
    let status = ChallengeStatus::classify(
        challenge.start_date,
        challenge.end_date,
        challenge.is_active,
        today,
    );
    if status != ChallengeStatus::Active {
        return Err(AppError::invalid(
            "challenge_id",
            format!("challenge is {} and cannot be joined", status.as_str()),
        ));
    }
    if !ChallengeCategory::exists(conn, challenge.id, goal.category_id)? {
        return Err(AppError::invalid(
            "goal_id",
            "goal category is not part of the challenge",
        ));
    }
    if GoalChallenge::find(conn, goal.id, challenge.id)?.is_some() {
        return Err(AppError::AlreadyExists {
            name: format!("goal {} in challenge {}", goal.id, challenge.id),
        });
    }
    Ok(())
}

pub fn join_challenge(
    db: &SharedDatabase,
    ctx: AuditContext,
    goal_id: i64,
    challenge_id: i64,
    today: NaiveDate,
) -> Result<GoalChallenge, AppError> {
    with_transaction(db, "join challenge", |conn| {
        let goal = Goal::find_by_id(conn, goal_id)?.ok_or_else(|| AppError::not_found("Goal"))?;
        let challenge = find_challenge(conn, challenge_id)?;
        check_join(conn, &goal, &challenge, today)?;

        let membership = GoalChallenge::create(conn, goal_id, challenge_id)?;
        capture_insert(conn, ctx, &membership)?;
        log::info!("Goal {goal_id} joined challenge {challenge_id}");
        Ok(membership)
    })
}

pub fn leave_challenge(
    db: &SharedDatabase,
    ctx: AuditContext,
    goal_id: i64,
    challenge_id: i64,
) -> Result<bool, AppError> {
    with_transaction(db, "leave challenge", |conn| {
        let Some(membership) = GoalChallenge::find(conn, goal_id, challenge_id)? else {
            return Ok(false);
        };
        capture_delete(conn, ctx, &membership)?;
        Ok(GoalChallenge::delete(conn, goal_id, challenge_id)?)
    })
}
