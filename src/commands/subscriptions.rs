use crate::audit::{capture_delete, capture_insert, AuditContext, BatchLog};
use crate::db::{with_connection, with_transaction, SharedDatabase};
use crate::error::AppError;
use crate::models::{Subscription, User};
use rusqlite::Connection;

use super::batch::run_batch;
use super::{BatchRequest, NewSubscription, SubscriptionResponse, UserResponse};

/// Check a follow edge and insert it.
fn insert_subscription(
    conn: &Connection,
    subscriber_id: i64,
    subscribing_id: i64,
) -> Result<Subscription, AppError> {
    if subscriber_id == subscribing_id {
        return Err(AppError::invalid("subscription", "users cannot follow themselves"));
    }
    for (field, id) in [("subscriber_id", subscriber_id), ("subscribing_id", subscribing_id)] {
        if !User::exists(conn, id)? {
            return Err(AppError::invalid(field, format!("user {id} does not exist")));
        }
    }
    if Subscription::find(conn, subscriber_id, subscribing_id)?.is_some() {
        return Err(AppError::AlreadyExists {
            name: format!("subscription {subscriber_id} -> {subscribing_id}"),
        });
    }
    Ok(Subscription::create(conn, subscriber_id, subscribing_id)?)
}

/// `subscriber_id` starts following `subscribing_id`.
pub fn subscribe(
    db: &SharedDatabase,
    ctx: AuditContext,
    subscriber_id: i64,
    subscribing_id: i64,
) -> Result<SubscriptionResponse, AppError> {
    let subscription = with_transaction(db, "subscribe", |conn| {
        let subscription = insert_subscription(conn, subscriber_id, subscribing_id)?;
        capture_insert(conn, ctx, &subscription)?;
        Ok(subscription)
    })?;

    Ok(SubscriptionResponse::from(subscription))
}

pub fn is_subscribed(
    db: &SharedDatabase,
    subscriber_id: i64,
    subscribing_id: i64,
) -> Result<bool, AppError> {
    with_connection(db, "check subscription", |conn| {
        Ok(Subscription::find(conn, subscriber_id, subscribing_id)?.is_some())
    })
}

pub fn unsubscribe(
    db: &SharedDatabase,
    ctx: AuditContext,
    subscriber_id: i64,
    subscribing_id: i64,
) -> Result<bool, AppError> {
    with_transaction(db, "unsubscribe", |conn| {
        let Some(subscription) = Subscription::find(conn, subscriber_id, subscribing_id)? else {
            return Ok(false);
        };
        capture_delete(conn, ctx, &subscription)?;
        Ok(Subscription::delete(conn, subscriber_id, subscribing_id)?)
    })
}

pub fn get_followers(db: &SharedDatabase, user_id: i64) -> Result<Vec<UserResponse>, AppError> {
    let users = with_connection(db, "load followers", |conn| {
        if !User::exists(conn, user_id)? {
            return Err(AppError::not_found("User"));
        }
        Ok(Subscription::followers(conn, user_id)?)
    })?;
    Ok(users.into_iter().map(UserResponse::from).collect())
}

pub fn get_following(db: &SharedDatabase, user_id: i64) -> Result<Vec<UserResponse>, AppError> {
    let users = with_connection(db, "load following", |conn| {
        if !User::exists(conn, user_id)? {
            return Err(AppError::not_found("User"));
        }
        Ok(Subscription::following(conn, user_id)?)
    })?;
    Ok(users.into_iter().map(UserResponse::from).collect())
}

/// Create many follow edges in chunks of `batch_size`.
///
/// Subscriptions have no single-column id, so the log counts them without
/// listing created ids.
pub fn batch_create_subscriptions(
    db: &SharedDatabase,
    ctx: AuditContext,
    request: BatchRequest<NewSubscription>,
) -> Result<BatchLog, AppError> {
    run_batch(db, ctx, &request, |conn, item| {
        insert_subscription(conn, item.subscriber_id, item.subscribing_id)
    })
}
