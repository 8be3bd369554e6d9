use crate::audit::{capture_delete, capture_insert, capture_update, AuditContext, BatchLog};
use crate::db::{with_connection, with_transaction, SharedDatabase};
use crate::error::AppError;
use crate::models::{
    Category, Goal, GoalProgress, NewGoal, NewGoalProgress, User, Visibility,
};
use crate::validation::{validate_progress_value, validate_target_value, validate_title};
use rusqlite::Connection;

use super::batch::run_batch;
use super::{
    cascade, missing_reference, BatchRequest, GoalProgressResponse, GoalResponse,
    UpdateGoalProgressRequest, UpdateGoalRequest,
};

/// Field checks plus owner, category and per-user title uniqueness.
fn check_new_goal(conn: &Connection, request: &NewGoal) -> Result<NewGoal, AppError> {
    let title = validate_title("title", &request.title)?;
    validate_target_value(request.target_value)?;
    if !User::exists(conn, request.user_id)? {
        return Err(AppError::invalid("user_id", format!("user {} does not exist", request.user_id)));
    }
    if Category::find_by_id(conn, request.category_id)?.is_none() {
        return Err(AppError::invalid(
            "category_id",
            format!("category {} does not exist", request.category_id),
        ));
    }
    if Goal::title_taken(conn, request.user_id, title)? {
        return Err(AppError::AlreadyExists { name: title.to_string() });
    }
    Ok(NewGoal {
        title: title.to_string(),
        ..request.clone()
    })
}

pub fn create_goal(
    db: &SharedDatabase,
    ctx: AuditContext,
    request: NewGoal,
) -> Result<GoalResponse, AppError> {
    let goal = with_transaction(db, "create goal", |conn| {
        let new = check_new_goal(conn, &request)?;
        let goal = Goal::create(conn, &new)?;
        capture_insert(conn, ctx, &goal)?;
        Ok(goal)
    })?;
    log::info!("Created goal {} for user {}", goal.id, goal.user_id);
    Ok(GoalResponse::from(goal))
}

pub fn get_goal(db: &SharedDatabase, id: i64) -> Result<GoalResponse, AppError> {
    let goal = with_connection(db, "load goal", |conn| {
        Goal::find_by_id(conn, id)?.ok_or_else(|| AppError::not_found("Goal"))
    })?;
    Ok(GoalResponse::from(goal))
}

pub fn get_user_goals(
    db: &SharedDatabase,
    user_id: i64,
    visibility: Visibility,
) -> Result<Vec<GoalResponse>, AppError> {
    let goals = with_connection(db, "load user goals", |conn| {
        if !User::exists(conn, user_id)? {
            return Err(AppError::not_found("User"));
        }
        Ok(Goal::find_by_user(conn, user_id, visibility)?)
    })?;
    Ok(goals.into_iter().map(GoalResponse::from).collect())
}

pub fn get_category_goals(
    db: &SharedDatabase,
    category_id: i64,
    visibility: Visibility,
) -> Result<Vec<GoalResponse>, AppError> {
    let goals = with_connection(db, "load category goals", |conn| {
        Ok(Goal::find_by_category(conn, category_id, visibility)?)
    })?;
    Ok(goals.into_iter().map(GoalResponse::from).collect())
}

pub fn update_goal(
    db: &SharedDatabase,
    ctx: AuditContext,
    id: i64,
    request: UpdateGoalRequest,
) -> Result<GoalResponse, AppError> {
    let title = request
        .title
        .as_deref()
        .map(|t| validate_title("title", t))
        .transpose()?;
    if let Some(target) = request.target_value {
        validate_target_value(target)?;
    }

    let goal = with_transaction(db, "update goal", |conn| {
        let before = Goal::find_by_id(conn, id)?.ok_or_else(|| AppError::not_found("Goal"))?;
        let mut after = before.clone();
        if let Some(title) = title {
            if title != before.title && Goal::title_taken(conn, before.user_id, title)? {
                return Err(AppError::AlreadyExists { name: title.to_string() });
            }
            after.title = title.to_string();
        }
        if let Some(description) = &request.description {
            after.description.clone_from(description);
        }
        if let Some(category_id) = request.category_id {
            after.category_id = category_id;
        }
        if let Some(target) = request.target_value {
            after.target_value = target;
        }
        if let Some(deadline) = request.deadline {
            after.deadline = deadline;
        }
        if let Some(is_completed) = request.is_completed {
            after.is_completed = is_completed;
        }
        if let Some(is_public) = request.is_public {
            after.is_public = is_public;
        }
        after
            .update(conn)
            .map_err(|e| missing_reference(e.into(), "category_id"))?;
        capture_update(conn, ctx, &before, &after)?;
        Ok(after)
    })?;

    Ok(GoalResponse::from(goal))
}

/// Delete a goal with its progress snapshots and challenge memberships.
pub fn delete_goal(db: &SharedDatabase, ctx: AuditContext, id: i64) -> Result<bool, AppError> {
    with_transaction(db, "delete goal", |conn| {
        let Some(goal) = Goal::find_by_id(conn, id)? else {
            return Ok(false);
        };
        cascade::goal(conn, ctx, &goal)?;
        Ok(Goal::delete(conn, id)?)
    })
}

// ── Progress snapshots ────────────────────────────────────────────────

fn insert_progress(conn: &Connection, request: &NewGoalProgress) -> Result<GoalProgress, AppError> {
    validate_progress_value(request.current_value)?;
    if Goal::find_by_id(conn, request.goal_id)?.is_none() {
        return Err(AppError::not_found("Goal"));
    }
    Ok(GoalProgress::create(conn, request)?)
}

pub fn add_goal_progress(
    db: &SharedDatabase,
    ctx: AuditContext,
    request: NewGoalProgress,
) -> Result<GoalProgressResponse, AppError> {
    let progress = with_transaction(db, "add goal progress", |conn| {
        let progress = insert_progress(conn, &request)?;
        capture_insert(conn, ctx, &progress)?;
        Ok(progress)
    })?;

    Ok(GoalProgressResponse::from(progress))
}

/// Snapshots of a goal, oldest first.
pub fn get_goal_progress(db: &SharedDatabase, goal_id: i64) -> Result<Vec<GoalProgressResponse>, AppError> {
    let progress = with_connection(db, "load goal progress", |conn| {
        if Goal::find_by_id(conn, goal_id)?.is_none() {
            return Err(AppError::not_found("Goal"));
        }
        Ok(GoalProgress::find_by_goal(conn, goal_id)?)
    })?;
    Ok(progress.into_iter().map(GoalProgressResponse::from).collect())
}

pub fn update_goal_progress(
    db: &SharedDatabase,
    ctx: AuditContext,
    id: i64,
    request: UpdateGoalProgressRequest,
) -> Result<GoalProgressResponse, AppError> {
    if let Some(value) = request.current_value {
        validate_progress_value(value)?;
    }

    let progress = with_transaction(db, "update goal progress", |conn| {
        let before = GoalProgress::find_by_id(conn, id)?
            .ok_or_else(|| AppError::not_found("Goal progress"))?;
        let mut after = before.clone();
        after.progress_date = request.progress_date.unwrap_or(after.progress_date);
        after.current_value = request.current_value.unwrap_or(after.current_value);
        if let Some(notes) = &request.notes {
            after.notes.clone_from(notes);
        }
        after.update(conn)?;
        capture_update(conn, ctx, &before, &after)?;
        Ok(after)
    })?;

    Ok(GoalProgressResponse::from(progress))
}

pub fn delete_goal_progress(db: &SharedDatabase, ctx: AuditContext, id: i64) -> Result<bool, AppError> {
    with_transaction(db, "delete goal progress", |conn| {
        let Some(progress) = GoalProgress::find_by_id(conn, id)? else {
            return Ok(false);
        };
        capture_delete(conn, ctx, &progress)?;
        Ok(GoalProgress::delete(conn, id)?)
    })
}

// ── Batch create ──────────────────────────────────────────────────────

/// Create many goals in chunks of `batch_size`.
///
/// Invalid items are reported in the returned log and skipped.
pub fn batch_create_goals(
    db: &SharedDatabase,
    ctx: AuditContext,
    request: BatchRequest<NewGoal>,
) -> Result<BatchLog, AppError> {
    run_batch(db, ctx, &request, |conn, item| {
        let new = check_new_goal(conn, item)?;
        Ok(Goal::create(conn, &new)?)
    })
}

/// Record many progress snapshots in chunks of `batch_size`.
pub fn batch_create_goal_progress(
    db: &SharedDatabase,
    ctx: AuditContext,
    request: BatchRequest<NewGoalProgress>,
) -> Result<BatchLog, AppError> {
    run_batch(db, ctx, &request, insert_progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditEntry, AuditedTable, BatchErrorKind, Operation};
    use crate::test_utils::{date, new_goal, seed_owner, setup_shared_db};

    fn owner(db: &SharedDatabase) -> (i64, i64) {
        with_connection(db, "seed", |conn| Ok(seed_owner(conn, "alice"))).unwrap()
    }

    fn audit_count(db: &SharedDatabase) -> i64 {
        with_connection(db, "count", |conn| Ok(AuditEntry::count(conn)?)).unwrap()
    }

    #[test]
    fn test_create_goal_checks_references() {
        let (db, _dir) = setup_shared_db();
        let (user_id, category_id) = owner(&db);

        let err = create_goal(&db, AuditContext::anonymous(), new_goal(user_id, 999, "Run", 5.0))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { field: "category_id", .. }));

        let err = create_goal(&db, AuditContext::anonymous(), new_goal(999, category_id, "Run", 5.0))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { field: "user_id", .. }));

        let err = create_goal(&db, AuditContext::anonymous(), new_goal(user_id, category_id, "Run", 0.0))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { field: "target_value", .. }));
        assert_eq!(audit_count(&db), 0);
    }

    #[test]
    fn test_duplicate_title_per_user() {
        let (db, _dir) = setup_shared_db();
        let (user_id, category_id) = owner(&db);
        create_goal(&db, AuditContext::as_user(user_id), new_goal(user_id, category_id, "Run", 5.0))
            .unwrap();

        let err = create_goal(&db, AuditContext::as_user(user_id), new_goal(user_id, category_id, "Run", 9.0))
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists { .. }));
    }

    #[test]
    fn test_update_goal_and_visibility() {
        let (db, _dir) = setup_shared_db();
        let (user_id, category_id) = owner(&db);
        let goal = create_goal(&db, AuditContext::as_user(user_id), new_goal(user_id, category_id, "Run", 5.0))
            .unwrap();

        let request = UpdateGoalRequest {
            is_public: Some(false),
            ..UpdateGoalRequest::default()
        };
        update_goal(&db, AuditContext::as_user(user_id), goal.id, request).unwrap();

        assert!(get_user_goals(&db, user_id, Visibility::PublicOnly).unwrap().is_empty());
        assert_eq!(get_user_goals(&db, user_id, Visibility::All).unwrap().len(), 1);
        assert_eq!(audit_count(&db), 2);
    }

    #[test]
    fn test_progress_round_trip_and_cascade_audit() {
        let (db, _dir) = setup_shared_db();
        let (user_id, category_id) = owner(&db);
        let ctx = AuditContext::as_user(user_id);
        let goal = create_goal(&db, ctx, new_goal(user_id, category_id, "Run", 100.0)).unwrap();

        for (day, value) in [(1, 10.0), (2, 20.0)] {
            add_goal_progress(
                &db,
                ctx,
                NewGoalProgress {
                    goal_id: goal.id,
                    progress_date: date(2024, 1, day),
                    current_value: value,
                    notes: None,
                },
            )
            .unwrap();
        }
        assert_eq!(get_goal_progress(&db, goal.id).unwrap().len(), 2);
        assert_eq!(audit_count(&db), 3);

        assert!(delete_goal(&db, ctx, goal.id).unwrap());
        // goal + two snapshots
        assert_eq!(audit_count(&db), 6);
        assert!(matches!(get_goal(&db, goal.id).unwrap_err(), AppError::NotFound { .. }));
    }

    #[test]
    fn test_corrected_snapshot_moves_completion() {
        let (db, _dir) = setup_shared_db();
        let (user_id, category_id) = owner(&db);
        let ctx = AuditContext::as_user(user_id);
        let goal = create_goal(&db, ctx, new_goal(user_id, category_id, "Run", 100.0)).unwrap();
        let progress = add_goal_progress(
            &db,
            ctx,
            NewGoalProgress {
                goal_id: goal.id,
                progress_date: date(2024, 1, 1),
                current_value: 10.0,
                notes: None,
            },
        )
        .unwrap();

        let request = UpdateGoalProgressRequest {
            current_value: Some(60.0),
            ..UpdateGoalProgressRequest::default()
        };
        update_goal_progress(&db, ctx, progress.id, request).unwrap();

        let completion = with_connection(&db, "completion", |conn| {
            crate::analytics::queries::goal_completion(conn, goal.id)
        })
        .unwrap();
        assert!((completion - 60.0).abs() < 1e-9);
        assert_eq!(audit_count(&db), 3);

        let err = update_goal_progress(&db, ctx, 999, UpdateGoalProgressRequest::default()).unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[test]
    fn test_progress_for_missing_goal() {
        let (db, _dir) = setup_shared_db();
        let err = add_goal_progress(
            &db,
            AuditContext::anonymous(),
            NewGoalProgress {
                goal_id: 5,
                progress_date: date(2024, 1, 1),
                current_value: 1.0,
                notes: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound { entity: "Goal" }));
    }

    #[test]
    fn test_batch_create_reports_item_errors() {
        let (db, _dir) = setup_shared_db();
        let (user_id, category_id) = owner(&db);

        let request = BatchRequest::new(
            vec![
                new_goal(user_id, category_id, "One", 10.0),
                new_goal(user_id, category_id, "Two", 10.0),
                new_goal(user_id, category_id, "One", 10.0),
                new_goal(user_id, 999, "Three", 10.0),
                new_goal(user_id, category_id, "Four", 10.0),
            ],
            2,
        );
        let log = batch_create_goals(&db, AuditContext::as_user(user_id), request).unwrap();

        assert_eq!(log.total_processed, 5);
        assert_eq!(log.successful, 3);
        assert_eq!(log.failed, 2);
        assert_eq!(log.batches_processed, 3);
        let failed: Vec<(usize, BatchErrorKind)> = log.errors.iter().map(|e| (e.index, e.kind)).collect();
        assert_eq!(
            failed,
            vec![(2, BatchErrorKind::Duplicate), (3, BatchErrorKind::Reference)]
        );
        assert_eq!(log.changed_by, Some(user_id));
        assert_eq!(audit_count(&db), 3);

        let stored = with_connection(&db, "load log", |conn| Ok(BatchLog::find_by_id(conn, log.id)?))
            .unwrap()
            .unwrap();
        assert_eq!(stored.created_ids, log.created_ids);
    }

    #[test]
    fn test_batch_limits() {
        let (db, _dir) = setup_shared_db();
        let empty = BatchRequest::new(Vec::new(), 10);
        assert!(batch_create_goals(&db, AuditContext::anonymous(), empty).is_err());

        let (user_id, category_id) = owner(&db);
        let zero = BatchRequest::new(vec![new_goal(user_id, category_id, "X", 1.0)], 0);
        let err = batch_create_goals(&db, AuditContext::anonymous(), zero).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { field: "batch_size", .. }));
    }

    fn progress(goal_id: i64, day: u32, value: f64) -> NewGoalProgress {
        NewGoalProgress {
            goal_id,
            progress_date: date(2024, 1, day),
            current_value: value,
            notes: None,
        }
    }

    #[test]
    fn test_delete_progress_records_one_entry() {
        let (db, _dir) = setup_shared_db();
        let (user_id, category_id) = owner(&db);
        let ctx = AuditContext::as_user(user_id);
        let goal = create_goal(&db, ctx, new_goal(user_id, category_id, "Run", 100.0)).unwrap();
        let snapshot = add_goal_progress(&db, ctx, progress(goal.id, 1, 10.0)).unwrap();
        let before = audit_count(&db);

        assert!(delete_goal_progress(&db, ctx, snapshot.id).unwrap());
        assert_eq!(audit_count(&db), before + 1);

        let entries = with_connection(&db, "history", |conn| {
            Ok(AuditEntry::find_for_record(conn, AuditedTable::GoalProgresses, snapshot.id)?)
        })
        .unwrap();
        let deleted = entries.last().unwrap();
        assert_eq!(deleted.operation, Operation::Deleted);
        assert!(deleted.old_values.is_some());
        assert!(deleted.new_values.is_none());

        assert!(!delete_goal_progress(&db, ctx, snapshot.id).unwrap());
        assert_eq!(audit_count(&db), before + 1);
        assert!(get_goal_progress(&db, goal.id).unwrap().is_empty());
    }

    #[test]
    fn test_category_goals_respect_visibility() {
        let (db, _dir) = setup_shared_db();
        let (user_id, category_id) = owner(&db);
        let other = with_connection(&db, "other", |conn| Ok(Category::create(conn, "Other", None)?))
            .unwrap();
        let ctx = AuditContext::as_user(user_id);
        create_goal(&db, ctx, new_goal(user_id, category_id, "Run", 5.0)).unwrap();
        let mut hidden = new_goal(user_id, category_id, "Swim", 5.0);
        hidden.is_public = false;
        create_goal(&db, ctx, hidden).unwrap();
        create_goal(&db, ctx, new_goal(user_id, other.id, "Read", 5.0)).unwrap();

        let public: Vec<String> = get_category_goals(&db, category_id, Visibility::PublicOnly)
            .unwrap()
            .into_iter()
            .map(|g| g.title)
            .collect();
        assert_eq!(public, vec!["Run"]);
        assert_eq!(get_category_goals(&db, category_id, Visibility::All).unwrap().len(), 2);
    }

    #[test]
    fn test_description_can_be_cleared() {
        let (db, _dir) = setup_shared_db();
        let (user_id, category_id) = owner(&db);
        let ctx = AuditContext::as_user(user_id);
        let goal = create_goal(&db, ctx, new_goal(user_id, category_id, "Run", 5.0)).unwrap();

        let set = UpdateGoalRequest {
            description: Some(Some("Every morning".to_string())),
            ..UpdateGoalRequest::default()
        };
        let updated = update_goal(&db, ctx, goal.id, set).unwrap();
        assert_eq!(updated.description.as_deref(), Some("Every morning"));

        let untouched = update_goal(&db, ctx, goal.id, UpdateGoalRequest::default()).unwrap();
        assert_eq!(untouched.description.as_deref(), Some("Every morning"));

        let clear = UpdateGoalRequest {
            description: Some(None),
            ..UpdateGoalRequest::default()
        };
        assert_eq!(update_goal(&db, ctx, goal.id, clear).unwrap().description, None);
        assert_eq!(audit_count(&db), 3);
    }

    #[test]
    fn test_batch_progress_reports_missing_goals() {
        let (db, _dir) = setup_shared_db();
        let (user_id, category_id) = owner(&db);
        let ctx = AuditContext::as_user(user_id);
        let goal = create_goal(&db, ctx, new_goal(user_id, category_id, "Run", 100.0)).unwrap();

        let request = BatchRequest::new(
            vec![
                progress(goal.id, 1, 10.0),
                progress(999, 2, 20.0),
                progress(goal.id, 3, f64::NAN),
                progress(goal.id, 4, 40.0),
            ],
            3,
        );
        let log = batch_create_goal_progress(&db, ctx, request).unwrap();

        assert_eq!(log.table_name, "goal_progresses");
        assert_eq!(log.successful, 2);
        assert_eq!(log.batches_processed, 2);
        let failed: Vec<(usize, BatchErrorKind)> = log.errors.iter().map(|e| (e.index, e.kind)).collect();
        assert_eq!(
            failed,
            vec![(1, BatchErrorKind::Reference), (2, BatchErrorKind::Validation)]
        );
        assert_eq!(get_goal_progress(&db, goal.id).unwrap().len(), 2);
        // goal plus two snapshots
        assert_eq!(audit_count(&db), 3);
    }
}
