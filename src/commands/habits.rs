use crate::audit::{capture_delete, capture_insert, capture_update, AuditContext, BatchLog};
use crate::db::{with_connection, with_transaction, SharedDatabase};
use crate::error::AppError;
use crate::models::{Category, Habit, HabitLog, NewHabit, NewHabitLog, User, Visibility};
use crate::validation::{validate_frequency, validate_title};
use rusqlite::Connection;

use super::batch::run_batch;
use super::{
    cascade, missing_reference, BatchRequest, HabitLogResponse, HabitResponse,
    UpdateHabitLogRequest, UpdateHabitRequest,
};

/// Validate a new habit and insert it.
fn insert_habit(conn: &Connection, request: &NewHabit) -> Result<Habit, AppError> {
    let title = validate_title("title", &request.title)?.to_string();
    validate_frequency(request.frequency_type, request.frequency_value)?;
    if !User::exists(conn, request.user_id)? {
        return Err(AppError::invalid("user_id", format!("user {} does not exist", request.user_id)));
    }
    if Category::find_by_id(conn, request.category_id)?.is_none() {
        return Err(AppError::invalid(
            "category_id",
            format!("category {} does not exist", request.category_id),
        ));
    }
    let new = NewHabit {
        title,
        ..request.clone()
    };
    Ok(Habit::create(conn, &new)?)
}

fn insert_habit_log(conn: &Connection, request: &NewHabitLog) -> Result<HabitLog, AppError> {
    if Habit::find_by_id(conn, request.habit_id)?.is_none() {
        return Err(AppError::not_found("Habit"));
    }
    Ok(HabitLog::create(conn, request)?)
}

pub fn create_habit(
    db: &SharedDatabase,
    ctx: AuditContext,
    request: NewHabit,
) -> Result<HabitResponse, AppError> {
    let habit = with_transaction(db, "create habit", |conn| {
        let habit = insert_habit(conn, &request)?;
        capture_insert(conn, ctx, &habit)?;
        Ok(habit)
    })?;

    Ok(HabitResponse::from(habit))
}

pub fn get_habit(db: &SharedDatabase, id: i64) -> Result<HabitResponse, AppError> {
    let habit = with_connection(db, "load habit", |conn| {
        Habit::find_by_id(conn, id)?.ok_or_else(|| AppError::not_found("Habit"))
    })?;
    Ok(HabitResponse::from(habit))
}

pub fn get_user_habits(
    db: &SharedDatabase,
    user_id: i64,
    visibility: Visibility,
) -> Result<Vec<HabitResponse>, AppError> {
    let habits = with_connection(db, "load user habits", |conn| {
        if !User::exists(conn, user_id)? {
            return Err(AppError::not_found("User"));
        }
        Ok(Habit::find_by_user(conn, user_id, visibility)?)
    })?;
    Ok(habits.into_iter().map(HabitResponse::from).collect())
}

pub fn get_category_habits(
    db: &SharedDatabase,
    category_id: i64,
    visibility: Visibility,
) -> Result<Vec<HabitResponse>, AppError> {
    let habits = with_connection(db, "load category habits", |conn| {
        if Category::find_by_id(conn, category_id)?.is_none() {
            return Err(AppError::not_found("Category"));
        }
        Ok(Habit::find_by_category(conn, category_id, visibility)?)
    })?;
    Ok(habits.into_iter().map(HabitResponse::from).collect())
}

pub fn update_habit(
    db: &SharedDatabase,
    ctx: AuditContext,
    id: i64,
    request: UpdateHabitRequest,
) -> Result<HabitResponse, AppError> {
    let title = request
        .title
        .as_deref()
        .map(|t| validate_title("title", t))
        .transpose()?;

    let habit = with_transaction(db, "update habit", |conn| {
        let before = Habit::find_by_id(conn, id)?.ok_or_else(|| AppError::not_found("Habit"))?;
        let mut after = before.clone();
        if let Some(title) = title {
            after.title = title.to_string();
        }
        if let Some(description) = &request.description {
            after.description.clone_from(description);
        }
        if let Some(category_id) = request.category_id {
            after.category_id = category_id;
        }
        after.frequency_type = request.frequency_type.unwrap_or(after.frequency_type);
        after.frequency_value = request.frequency_value.unwrap_or(after.frequency_value);
        validate_frequency(after.frequency_type, after.frequency_value)?;
        if let Some(is_active) = request.is_active {
            after.is_active = is_active;
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

    Ok(HabitResponse::from(habit))
}

/// Delete a habit together with its logs.
pub fn delete_habit(db: &SharedDatabase, ctx: AuditContext, id: i64) -> Result<bool, AppError> {
    with_transaction(db, "delete habit", |conn| {
        let Some(habit) = Habit::find_by_id(conn, id)? else {
            return Ok(false);
        };
        cascade::habit(conn, ctx, &habit)?;
        Ok(Habit::delete(conn, id)?)
    })
}

// ── Logs ──────────────────────────────────────────────────────────────

pub fn log_habit(
    db: &SharedDatabase,
    ctx: AuditContext,
    request: NewHabitLog,
) -> Result<HabitLogResponse, AppError> {
    let log = with_transaction(db, "log habit", |conn| {
        let log = insert_habit_log(conn, &request)?;
        capture_insert(conn, ctx, &log)?;
        Ok(log)
    })?;
    Ok(HabitLogResponse::from(log))
}

pub fn get_habit_logs(db: &SharedDatabase, habit_id: i64) -> Result<Vec<HabitLogResponse>, AppError> {
    let logs = with_connection(db, "load habit logs", |conn| {
        if Habit::find_by_id(conn, habit_id)?.is_none() {
            return Err(AppError::not_found("Habit"));
        }
        Ok(HabitLog::find_by_habit(conn, habit_id)?)
    })?;
    Ok(logs.into_iter().map(HabitLogResponse::from).collect())
}

pub fn update_habit_log(
    db: &SharedDatabase,
    ctx: AuditContext,
    id: i64,
    request: UpdateHabitLogRequest,
) -> Result<HabitLogResponse, AppError> {
    let log = with_transaction(db, "update habit log", |conn| {
        let before = HabitLog::find_by_id(conn, id)?.ok_or_else(|| AppError::not_found("Habit log"))?;
        let mut after = before.clone();
        after.log_date = request.log_date.unwrap_or(after.log_date);
        after.status = request.status.unwrap_or(after.status);
        if let Some(notes) = &request.notes {
            after.notes.clone_from(notes);
        }
        after.update(conn)?;
        capture_update(conn, ctx, &before, &after)?;
        Ok(after)
    })?;
    Ok(HabitLogResponse::from(log))
}

pub fn delete_habit_log(db: &SharedDatabase, ctx: AuditContext, id: i64) -> Result<bool, AppError> {
    with_transaction(db, "delete habit log", |conn| {
        let Some(log) = HabitLog::find_by_id(conn, id)? else {
            return Ok(false);
        };
        capture_delete(conn, ctx, &log)?;
        Ok(HabitLog::delete(conn, id)?)
    })
}

// ── Batch create ──────────────────────────────────────────────────────

pub fn batch_create_habits(
    db: &SharedDatabase,
    ctx: AuditContext,
    request: BatchRequest<NewHabit>,
) -> Result<BatchLog, AppError> {
    run_batch(db, ctx, &request, insert_habit)
}

pub fn batch_create_habit_logs(
    db: &SharedDatabase,
    ctx: AuditContext,
    request: BatchRequest<NewHabitLog>,
) -> Result<BatchLog, AppError> {
    run_batch(db, ctx, &request, insert_habit_log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::queries;
    use crate::audit::{AuditEntry, AuditedTable, BatchErrorKind, Operation};
    use crate::models::LogStatus;
    use crate::test_utils::{date, new_habit, seed_owner, setup_shared_db};

    fn audit_count(db: &SharedDatabase) -> i64 {
        with_connection(db, "count", |conn| Ok(AuditEntry::count(conn)?)).unwrap()
    }

    #[test]
    fn test_create_habit_validates_frequency() {
        let (db, _dir) = setup_shared_db();
        let (user_id, category_id) =
            with_connection(&db, "seed", |conn| Ok(seed_owner(conn, "alice"))).unwrap();

        let mut bad = new_habit(user_id, category_id, "Read");
        bad.frequency_value = 0;
        let err = create_habit(&db, AuditContext::anonymous(), bad).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { field: "frequency_value", .. }));
        assert_eq!(audit_count(&db), 0);
    }

    #[test]
    fn test_logs_feed_consistency() {
        let (db, _dir) = setup_shared_db();
        let (user_id, category_id) =
            with_connection(&db, "seed", |conn| Ok(seed_owner(conn, "alice"))).unwrap();
        let ctx = AuditContext::as_user(user_id);
        let habit = create_habit(&db, ctx, new_habit(user_id, category_id, "Read")).unwrap();

        for (day, status) in [
            (1, LogStatus::Completed),
            (2, LogStatus::Failed),
            (3, LogStatus::Skipped),
        ] {
            log_habit(
                &db,
                ctx,
                NewHabitLog {
                    habit_id: habit.id,
                    log_date: date(2024, 2, day),
                    status,
                    notes: None,
                },
            )
            .unwrap();
        }

        assert_eq!(get_habit_logs(&db, habit.id).unwrap().len(), 3);
        let consistency =
            with_connection(&db, "consistency", |conn| queries::habit_consistency(conn, habit.id)).unwrap();
        assert!((consistency - 50.0).abs() < 1e-9);

        assert!(delete_habit(&db, ctx, habit.id).unwrap());
        // 1 habit + 3 logs created, then the same rows deleted
        assert_eq!(audit_count(&db), 8);
    }

    #[test]
    fn test_correcting_a_log_changes_consistency() {
        let (db, _dir) = setup_shared_db();
        let (user_id, category_id) =
            with_connection(&db, "seed", |conn| Ok(seed_owner(conn, "alice"))).unwrap();
        let ctx = AuditContext::as_user(user_id);
        let habit = create_habit(&db, ctx, new_habit(user_id, category_id, "Read")).unwrap();
        let log = log_habit(
            &db,
            ctx,
            NewHabitLog {
                habit_id: habit.id,
                log_date: date(2024, 2, 1),
                status: LogStatus::Failed,
                notes: None,
            },
        )
        .unwrap();

        let request = UpdateHabitLogRequest {
            status: Some(LogStatus::Completed),
            ..UpdateHabitLogRequest::default()
        };
        let updated = update_habit_log(&db, ctx, log.id, request).unwrap();
        assert_eq!(updated.status, LogStatus::Completed);

        let consistency =
            with_connection(&db, "consistency", |conn| queries::habit_consistency(conn, habit.id)).unwrap();
        assert!((consistency - 100.0).abs() < 1e-9);
        assert_eq!(audit_count(&db), 3);
    }

    #[test]
    fn test_deactivate_habit() {
        let (db, _dir) = setup_shared_db();
        let (user_id, category_id) =
            with_connection(&db, "seed", |conn| Ok(seed_owner(conn, "alice"))).unwrap();
        let habit =
            create_habit(&db, AuditContext::anonymous(), new_habit(user_id, category_id, "Read")).unwrap();

        let request = UpdateHabitRequest {
            is_active: Some(false),
            ..UpdateHabitRequest::default()
        };
        let updated = update_habit(&db, AuditContext::anonymous(), habit.id, request).unwrap();
        assert!(!updated.is_active);
        assert_eq!(get_user_habits(&db, user_id, Visibility::All).unwrap().len(), 1);
    }

    fn entry(habit_id: i64, day: u32, status: LogStatus) -> NewHabitLog {
        NewHabitLog {
            habit_id,
            log_date: date(2024, 2, day),
            status,
            notes: None,
        }
    }

    #[test]
    fn test_delete_log_records_one_entry() {
        let (db, _dir) = setup_shared_db();
        let (user_id, category_id) =
            with_connection(&db, "seed", |conn| Ok(seed_owner(conn, "alice"))).unwrap();
        let ctx = AuditContext::as_user(user_id);
        let habit = create_habit(&db, ctx, new_habit(user_id, category_id, "Read")).unwrap();
        let log = log_habit(&db, ctx, entry(habit.id, 1, LogStatus::Completed)).unwrap();
        let before = audit_count(&db);

        assert!(delete_habit_log(&db, ctx, log.id).unwrap());
        assert_eq!(audit_count(&db), before + 1);

        let entries = with_connection(&db, "history", |conn| {
            Ok(AuditEntry::find_for_record(conn, AuditedTable::HabitLogs, log.id)?)
        })
        .unwrap();
        let deleted = entries.last().unwrap();
        assert_eq!(deleted.operation, Operation::Deleted);
        assert_eq!(deleted.changed_by, Some(user_id));
        assert!(deleted.old_values.is_some());
        assert!(deleted.new_values.is_none());

        assert!(!delete_habit_log(&db, ctx, log.id).unwrap());
        assert_eq!(audit_count(&db), before + 1);
        assert!(get_habit_logs(&db, habit.id).unwrap().is_empty());
    }

    #[test]
    fn test_category_habits() {
        let (db, _dir) = setup_shared_db();
        let (alice, sport) = with_connection(&db, "seed", |conn| Ok(seed_owner(conn, "alice"))).unwrap();
        let (bob, books) = with_connection(&db, "seed", |conn| Ok(seed_owner(conn, "bob"))).unwrap();
        let ctx = AuditContext::anonymous();
        create_habit(&db, ctx, new_habit(alice, sport, "Stretch")).unwrap();
        let mut private = new_habit(bob, sport, "Plank");
        private.is_public = false;
        create_habit(&db, ctx, private).unwrap();
        create_habit(&db, ctx, new_habit(bob, books, "Read")).unwrap();

        let public: Vec<String> = get_category_habits(&db, sport, Visibility::PublicOnly)
            .unwrap()
            .into_iter()
            .map(|h| h.title)
            .collect();
        assert_eq!(public, vec!["Stretch"]);
        assert_eq!(get_category_habits(&db, sport, Visibility::All).unwrap().len(), 2);
        assert!(matches!(
            get_category_habits(&db, 999, Visibility::All).unwrap_err(),
            AppError::NotFound { entity: "Category" }
        ));
    }

    #[test]
    fn test_batch_create_habits_and_logs() {
        let (db, _dir) = setup_shared_db();
        let (user_id, category_id) =
            with_connection(&db, "seed", |conn| Ok(seed_owner(conn, "alice"))).unwrap();
        let ctx = AuditContext::as_user(user_id);

        let mut lazy = new_habit(user_id, category_id, "Nap");
        lazy.frequency_value = 0;
        let request = BatchRequest::new(
            vec![
                new_habit(user_id, category_id, "Read"),
                lazy,
                new_habit(user_id, 999, "Swim"),
            ],
            10,
        );
        let log = batch_create_habits(&db, ctx, request).unwrap();
        assert_eq!(log.table_name, "habits");
        assert_eq!(log.successful, 1);
        let failed: Vec<(usize, BatchErrorKind)> = log.errors.iter().map(|e| (e.index, e.kind)).collect();
        assert_eq!(failed, vec![(1, BatchErrorKind::Validation), (2, BatchErrorKind::Reference)]);

        let habit_id = log.created_ids[0];
        let request = BatchRequest::new(
            vec![
                entry(habit_id, 1, LogStatus::Completed),
                entry(999, 2, LogStatus::Completed),
                entry(habit_id, 3, LogStatus::Failed),
            ],
            1,
        );
        let logs = batch_create_habit_logs(&db, ctx, request).unwrap();
        assert_eq!(logs.successful, 2);
        assert_eq!(logs.batches_processed, 3);
        assert_eq!(logs.errors.len(), 1);
        assert_eq!(logs.errors[0].kind, BatchErrorKind::Reference);
        assert_eq!(get_habit_logs(&db, habit_id).unwrap().len(), 2);

        let consistency =
            with_connection(&db, "consistency", |conn| queries::habit_consistency(conn, habit_id)).unwrap();
        assert!((consistency - 50.0).abs() < 1e-9);
    }
}
