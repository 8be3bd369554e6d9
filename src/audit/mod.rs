//! Change capture for audited tables.
//!
//! Every audited row type implements [`Auditable`], which exposes the row's
//! table, its identifier and a JSON snapshot. Writes go through
//! [`capture_insert`], [`capture_update`] and [`capture_delete`] inside the
//! same transaction as the data change, so a failed capture rolls the write
//! back. The acting user is passed explicitly in an [`AuditContext`].

pub mod batch;
pub mod entry;
mod tables;

pub use batch::{BatchError, BatchErrorKind, BatchLog, BatchOutcome};
pub use entry::AuditEntry;
pub use tables::snapshot_current;

use crate::error::AppError;
use crate::models::{parse_text_enum, UnknownVariant, User};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Kind of change recorded in an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Created,
    Updated,
    Deleted,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Created => "created",
            Operation::Updated => "updated",
            Operation::Deleted => "deleted",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Operation::Created),
            "updated" => Ok(Operation::Updated),
            "deleted" => Ok(Operation::Deleted),
            other => Err(UnknownVariant {
                kind: "audit operation",
                value: other.to_string(),
            }),
        }
    }
}

impl ToSql for Operation {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Operation {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        parse_text_enum(value)
    }
}

/// Tables whose changes are captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditedTable {
    Users,
    Categories,
    Goals,
    GoalProgresses,
    Habits,
    HabitLogs,
    Challenges,
    GoalChallenges,
    ChallengeCategories,
    Subscriptions,
}

impl AuditedTable {
    pub const ALL: [AuditedTable; 10] = [
        AuditedTable::Users,
        AuditedTable::Categories,
        AuditedTable::Goals,
        AuditedTable::GoalProgresses,
        AuditedTable::Habits,
        AuditedTable::HabitLogs,
        AuditedTable::Challenges,
        AuditedTable::GoalChallenges,
        AuditedTable::ChallengeCategories,
        AuditedTable::Subscriptions,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            AuditedTable::Users => "users",
            AuditedTable::Categories => "categories",
            AuditedTable::Goals => "goals",
            AuditedTable::GoalProgresses => "goal_progresses",
            AuditedTable::Habits => "habits",
            AuditedTable::HabitLogs => "habit_logs",
            AuditedTable::Challenges => "challenges",
            AuditedTable::GoalChallenges => "goal_challenges",
            AuditedTable::ChallengeCategories => "challenge_categories",
            AuditedTable::Subscriptions => "subscriptions",
        }
    }

    /// Whether rows of this table carry a single integer identifier.
    pub fn has_record_id(self) -> bool {
        match self {
            AuditedTable::GoalChallenges
            | AuditedTable::ChallengeCategories
            | AuditedTable::Subscriptions => false,
            AuditedTable::Users
            | AuditedTable::Categories
            | AuditedTable::Goals
            | AuditedTable::GoalProgresses
            | AuditedTable::Habits
            | AuditedTable::HabitLogs
            | AuditedTable::Challenges => true,
        }
    }
}

impl fmt::Display for AuditedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for AuditedTable {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditedTable::ALL
            .into_iter()
            .find(|t| t.table_name() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "audited table",
                value: s.to_string(),
            })
    }
}

/// Snapshot keys maintained by the store itself; ignored when deciding
/// whether an update changed anything.
const BOOKKEEPING_FIELDS: &[&str] = &["updated_at"];

/// A row type whose changes are recorded in the audit log.
pub trait Auditable: Serialize {
    const TABLE: AuditedTable;

    /// The row's identifier, or `None` for composite-key tables.
    fn record_id(&self) -> Option<i64>;

    fn snapshot(&self) -> Result<Value, AppError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Who is performing a write. Passed explicitly to every audited operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditContext {
    pub user_id: Option<i64>,
}

impl AuditContext {
    pub fn as_user(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    pub fn anonymous() -> Self {
        Self { user_id: None }
    }
}

/// Record a newly inserted row.
pub fn capture_insert<T: Auditable>(
    conn: &Connection,
    ctx: AuditContext,
    after: &T,
) -> Result<AuditEntry, AppError> {
    let new_values = after.snapshot()?;
    write_entry(conn, ctx, T::TABLE, after.record_id(), Operation::Created, None, Some(new_values))
}

/// Record a deleted row.
pub fn capture_delete<T: Auditable>(
    conn: &Connection,
    ctx: AuditContext,
    before: &T,
) -> Result<AuditEntry, AppError> {
    let old_values = before.snapshot()?;
    write_entry(conn, ctx, T::TABLE, before.record_id(), Operation::Deleted, Some(old_values), None)
}

/// Record an updated row. Writes nothing and returns `None` when the two
/// images only differ in bookkeeping fields.
pub fn capture_update<T: Auditable>(
    conn: &Connection,
    ctx: AuditContext,
    before: &T,
    after: &T,
) -> Result<Option<AuditEntry>, AppError> {
    let old_values = before.snapshot()?;
    let new_values = after.snapshot()?;

    if same_content(&old_values, &new_values) {
        log::debug!(
            "Skipping audit for unchanged {} row {:?}",
            T::TABLE,
            after.record_id()
        );
        return Ok(None);
    }

    let record_id = after.record_id().or_else(|| before.record_id());
    write_entry(conn, ctx, T::TABLE, record_id, Operation::Updated, Some(old_values), Some(new_values))
        .map(Some)
}

fn same_content(before: &Value, after: &Value) -> bool {
    match (before, after) {
        (Value::Object(old), Value::Object(new)) => {
            let significant = |(key, _): &(&String, &Value)| !BOOKKEEPING_FIELDS.contains(&key.as_str());
            old.iter().filter(significant).eq(new.iter().filter(significant))
        }
        _ => before == after,
    }
}

/// The acting user if it names an existing user; otherwise `None`.
fn resolve_actor(conn: &Connection, ctx: AuditContext) -> Result<Option<i64>, AppError> {
    let Some(user_id) = ctx.user_id else {
        log::warn!("Audited write without an acting user");
        return Ok(None);
    };
    if User::exists(conn, user_id)? {
        Ok(Some(user_id))
    } else {
        log::warn!("Acting user {user_id} does not exist, recording change as anonymous");
        Ok(None)
    }
}

fn write_entry(
    conn: &Connection,
    ctx: AuditContext,
    table: AuditedTable,
    record_id: Option<i64>,
    operation: Operation,
    old_values: Option<Value>,
    new_values: Option<Value>,
) -> Result<AuditEntry, AppError> {
    let changed_by = resolve_actor(conn, ctx)?;
    let entry = AuditEntry::insert(conn, table, record_id, operation, old_values, new_values, changed_by)?;
    log::debug!("Audited {operation} on {table} (record {record_id:?})");
    Ok(entry)
}
