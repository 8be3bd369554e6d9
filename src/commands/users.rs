use crate::audit::{capture_insert, capture_update, AuditContext, BatchLog};
use crate::db::{with_connection, with_transaction, SharedDatabase};
use crate::error::AppError;
use crate::models::{NewUser, User};
use crate::validation::{validate_person_name, validate_username};

use super::batch::run_batch;
use super::{already_exists, cascade, BatchRequest, UpdateUserRequest, UserResponse};

fn checked_user(request: &NewUser) -> Result<NewUser, AppError> {
    Ok(NewUser {
        username: validate_username(&request.username)?.to_string(),
        first_name: validate_person_name("first_name", &request.first_name)?.to_string(),
        last_name: validate_person_name("last_name", &request.last_name)?.to_string(),
        ..request.clone()
    })
}

pub fn create_user(
    db: &SharedDatabase,
    ctx: AuditContext,
    request: NewUser,
) -> Result<UserResponse, AppError> {
    let new = checked_user(&request)?;

    let user = with_transaction(db, "create user", |conn| {
        let user = User::create(conn, &new)?;
        capture_insert(conn, ctx, &user)?;
        Ok(user)
    })
    .map_err(|e| already_exists(e, &new.username))?;

    log::info!("Created user {} ({})", user.username, user.id);
    Ok(UserResponse::from(user))
}

pub fn get_user(db: &SharedDatabase, id: i64) -> Result<UserResponse, AppError> {
    let user = with_connection(db, "load user", |conn| {
        User::find_by_id(conn, id)?.ok_or_else(|| AppError::not_found("User"))
    })?;
    Ok(UserResponse::from(user))
}

pub fn get_user_by_username(db: &SharedDatabase, username: &str) -> Result<UserResponse, AppError> {
    let user = with_connection(db, "load user by name", |conn| {
        User::find_by_username(conn, username.trim())?.ok_or_else(|| AppError::not_found("User"))
    })?;
    Ok(UserResponse::from(user))
}

pub fn list_users(db: &SharedDatabase) -> Result<Vec<UserResponse>, AppError> {
    let users = with_connection(db, "load users", |conn| Ok(User::find_all(conn)?))?;
    Ok(users.into_iter().map(UserResponse::from).collect())
}

pub fn update_user(
    db: &SharedDatabase,
    ctx: AuditContext,
    id: i64,
    request: UpdateUserRequest,
) -> Result<UserResponse, AppError> {
    let first_name = request
        .first_name
        .as_deref()
        .map(|name| validate_person_name("first_name", name))
        .transpose()?;
    let last_name = request
        .last_name
        .as_deref()
        .map(|name| validate_person_name("last_name", name))
        .transpose()?;

    let user = with_transaction(db, "update user", |conn| {
        let before = User::find_by_id(conn, id)?.ok_or_else(|| AppError::not_found("User"))?;
        let mut after = before.clone();
        if let Some(name) = first_name {
            after.first_name = name.to_string();
        }
        if let Some(name) = last_name {
            after.last_name = name.to_string();
        }
        if let Some(description) = &request.description {
            after.description.clone_from(description);
        }
        if let Some(is_active) = request.is_active {
            after.is_active = is_active;
        }
        if let Some(is_public) = request.is_public {
            after.is_public = is_public;
        }
        after.update(conn)?;
        capture_update(conn, ctx, &before, &after)?;
        Ok(after)
    })?;

    Ok(UserResponse::from(user))
}

/// Delete a user with everything they own.
pub fn delete_user(db: &SharedDatabase, ctx: AuditContext, id: i64) -> Result<bool, AppError> {
    with_transaction(db, "delete user", |conn| {
        let Some(user) = User::find_by_id(conn, id)? else {
            return Ok(false);
        };
        cascade::user(conn, ctx, &user)?;
        Ok(User::delete(conn, id)?)
    })
}

/// Create many users in chunks of `batch_size`.
pub fn batch_create_users(
    db: &SharedDatabase,
    ctx: AuditContext,
    request: BatchRequest<NewUser>,
) -> Result<BatchLog, AppError> {
    run_batch(db, ctx, &request, |conn, item| {
        let new = checked_user(item)?;
        User::create(conn, &new).map_err(|e| already_exists(e.into(), &new.username))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditEntry, AuditedTable, BatchErrorKind, Operation};
    use crate::test_utils::{new_user, setup_shared_db};

    fn audit_count(db: &SharedDatabase) -> i64 {
        with_connection(db, "count", |conn| Ok(AuditEntry::count(conn)?)).unwrap()
    }

    #[test]
    fn test_create_user_validates_and_audits() {
        let (db, _dir) = setup_shared_db();

        let user = create_user(&db, AuditContext::anonymous(), new_user("  alice  ")).unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(get_user_by_username(&db, "alice").unwrap().id, user.id);
        assert_eq!(audit_count(&db), 1);

        let err = create_user(&db, AuditContext::anonymous(), new_user("al")).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { field: "username", .. }));
        assert_eq!(audit_count(&db), 1);
    }

    #[test]
    fn test_duplicate_username_leaves_no_audit_row() {
        let (db, _dir) = setup_shared_db();
        create_user(&db, AuditContext::anonymous(), new_user("alice")).unwrap();

        let err = create_user(&db, AuditContext::anonymous(), new_user("alice")).unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists { .. }));
        assert_eq!(audit_count(&db), 1);
    }

    #[test]
    fn test_noop_update_writes_no_audit_row() {
        let (db, _dir) = setup_shared_db();
        let user = create_user(&db, AuditContext::anonymous(), new_user("alice")).unwrap();

        update_user(&db, AuditContext::as_user(user.id), user.id, UpdateUserRequest::default())
            .unwrap();
        assert_eq!(audit_count(&db), 1);

        let request = UpdateUserRequest {
            is_public: Some(false),
            ..UpdateUserRequest::default()
        };
        let updated = update_user(&db, AuditContext::as_user(user.id), user.id, request).unwrap();
        assert!(!updated.is_public);
        assert_eq!(audit_count(&db), 2);

        let history = with_connection(&db, "history", |conn| {
            Ok(AuditEntry::find_for_record(conn, AuditedTable::Users, user.id)?)
        })
        .unwrap();
        assert_eq!(history[1].operation, Operation::Updated);
        assert_eq!(history[1].changed_by, Some(user.id));
    }

    #[test]
    fn test_get_missing_user() {
        let (db, _dir) = setup_shared_db();
        assert!(matches!(get_user(&db, 3).unwrap_err(), AppError::NotFound { entity: "User" }));
        assert!(!delete_user(&db, AuditContext::anonymous(), 3).unwrap());
    }

    #[test]
    fn test_delete_user_audits_and_removes() {
        let (db, _dir) = setup_shared_db();
        let user = create_user(&db, AuditContext::anonymous(), new_user("alice")).unwrap();

        assert!(delete_user(&db, AuditContext::anonymous(), user.id).unwrap());
        assert!(list_users(&db).unwrap().is_empty());
        assert_eq!(audit_count(&db), 2);
    }

    #[test]
    fn test_batch_create_users() {
        let (db, _dir) = setup_shared_db();
        create_user(&db, AuditContext::anonymous(), new_user("alice")).unwrap();

        let request = BatchRequest::new(
            vec![new_user("bob"), new_user("alice"), new_user("x"), new_user("bob"), new_user("carol")],
            2,
        );
        let log = batch_create_users(&db, AuditContext::anonymous(), request).unwrap();

        assert_eq!(log.table_name, "users");
        assert_eq!(log.successful, 2);
        assert_eq!(log.failed, 3);
        assert_eq!(log.changed_by, None);
        let failed: Vec<(usize, BatchErrorKind)> = log.errors.iter().map(|e| (e.index, e.kind)).collect();
        assert_eq!(
            failed,
            vec![
                (1, BatchErrorKind::Duplicate),
                (2, BatchErrorKind::Validation),
                (3, BatchErrorKind::Duplicate),
            ]
        );
        assert_eq!(list_users(&db).unwrap().len(), 3);
        assert_eq!(audit_count(&db), 3);
    }
}
