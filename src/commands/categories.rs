use crate::audit::{capture_insert, capture_update, AuditContext, BatchLog};
use crate::db::{with_connection, with_transaction, SharedDatabase};
use crate::error::AppError;
use crate::models::{Category, NewCategory};
use crate::validation::validate_category_name;

use super::batch::run_batch;
use super::{already_exists, cascade, BatchRequest, CategoryResponse};

pub fn get_categories(db: &SharedDatabase) -> Result<Vec<CategoryResponse>, AppError> {
    let categories = with_connection(db, "load categories", |conn| Ok(Category::find_all(conn)?))?;
    Ok(categories.into_iter().map(CategoryResponse::from).collect())
}

pub fn get_category(db: &SharedDatabase, id: i64) -> Result<CategoryResponse, AppError> {
    let category = with_connection(db, "load category", |conn| {
        Category::find_by_id(conn, id)?.ok_or_else(|| AppError::not_found("Category"))
    })?;
    Ok(CategoryResponse::from(category))
}

pub fn create_category(
    db: &SharedDatabase,
    ctx: AuditContext,
    name: &str,
    description: Option<&str>,
) -> Result<CategoryResponse, AppError> {
    let name = validate_category_name(name)?;

    let category = with_transaction(db, "create category", |conn| {
        let category = Category::create(conn, name, description)?;
        capture_insert(conn, ctx, &category)?;
        Ok(category)
    })
    .map_err(|e| already_exists(e, name))?;

    Ok(CategoryResponse::from(category))
}

pub fn update_category(
    db: &SharedDatabase,
    ctx: AuditContext,
    id: i64,
    name: &str,
    description: Option<&str>,
) -> Result<CategoryResponse, AppError> {
    let name = validate_category_name(name)?;

    let category = with_transaction(db, "update category", |conn| {
        let before = Category::find_by_id(conn, id)?.ok_or_else(|| AppError::not_found("Category"))?;
        let mut after = before.clone();
        after.name = name.to_string();
        after.description = description.map(str::to_string);
        after.update(conn)?;
        capture_update(conn, ctx, &before, &after)?;
        Ok(after)
    })
    .map_err(|e| already_exists(e, name))?;

    Ok(CategoryResponse::from(category))
}

/// Delete a category together with its goals, habits and challenge links.
pub fn delete_category(db: &SharedDatabase, ctx: AuditContext, id: i64) -> Result<bool, AppError> {
    with_transaction(db, "delete category", |conn| {
        let Some(category) = Category::find_by_id(conn, id)? else {
            return Ok(false);
        };
        cascade::category(conn, ctx, &category)?;
        Ok(Category::delete(conn, id)?)
    })
}

/// Create many categories in chunks of `batch_size`.
pub fn batch_create_categories(
    db: &SharedDatabase,
    ctx: AuditContext,
    request: BatchRequest<NewCategory>,
) -> Result<BatchLog, AppError> {
    run_batch(db, ctx, &request, |conn, item| {
        let name = validate_category_name(&item.name)?;
        Category::create(conn, name, item.description.as_deref())
            .map_err(|e| already_exists(e.into(), name))
    })
}
