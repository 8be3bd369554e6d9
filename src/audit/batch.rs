use super::AuditedTable;
use crate::error::{is_fk_violation, is_unique_violation, AppError};
use crate::models::now;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::{Deserialize, Serialize};

/// Class of a batch item failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchErrorKind {
    /// The item collides with an existing row or an earlier item.
    #[serde(rename = "duplicate_error")]
    Duplicate,
    /// The item refers to a row that does not exist.
    #[serde(rename = "reference_error")]
    Reference,
    #[serde(rename = "validation_error")]
    Validation,
    /// The insert itself failed.
    #[serde(rename = "creation_error")]
    Creation,
}

impl BatchErrorKind {
    pub fn of(error: &AppError) -> Self {
        match error {
            AppError::AlreadyExists { .. } => BatchErrorKind::Duplicate,
            AppError::Database(e) if is_unique_violation(e) => BatchErrorKind::Duplicate,
            AppError::Database(e) if is_fk_violation(e) => BatchErrorKind::Reference,
            AppError::NotFound { .. } => BatchErrorKind::Reference,
            AppError::InvalidInput { field, .. } if field.ends_with("_id") => {
                BatchErrorKind::Reference
            }
            AppError::InvalidInput { .. } => BatchErrorKind::Validation,
            AppError::DeleteFailed { .. }
            | AppError::Database(_)
            | AppError::Serialization(_)
            | AppError::LockPoisoned
            | AppError::Internal(_) => BatchErrorKind::Creation,
        }
    }
}

/// Why one item of a batch was not created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    /// Position of the item in the request.
    pub index: usize,
    #[serde(rename = "type")]
    pub kind: BatchErrorKind,
    pub message: String,
}

impl BatchError {
    pub fn new(index: usize, error: &AppError) -> Self {
        Self {
            index,
            kind: BatchErrorKind::of(error),
            message: error.to_string(),
        }
    }
}

/// Running totals of a batch create, saved as one `batch_logs` row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub total_processed: u32,
    pub successful: u32,
    pub errors: Vec<BatchError>,
    pub created_ids: Vec<i64>,
    pub batches_processed: u32,
    pub batch_size: u32,
}

/// Summary of a batch create call, persisted in `batch_logs`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchLog {
    pub id: i64,
    pub table_name: String,
    pub changed_by: Option<i64>,
    pub total_processed: u32,
    pub successful: u32,
    pub failed: u32,
    pub errors: Vec<BatchError>,
    pub created_ids: Vec<i64>,
    pub batches_processed: u32,
    pub batch_size: u32,
    pub created_at: DateTime<Utc>,
}

impl BatchLog {
    fn from_row(row: &Row<'_>) -> Result<Self> {
        let errors: serde_json::Value = row.get(6)?;
        let created_ids: serde_json::Value = row.get(7)?;
        Ok(Self {
            id: row.get(0)?,
            table_name: row.get(1)?,
            changed_by: row.get(2)?,
            total_processed: row.get(3)?,
            successful: row.get(4)?,
            failed: row.get(5)?,
            errors: serde_json::from_value(errors).map_err(|e| json_column_error(6, e))?,
            created_ids: serde_json::from_value(created_ids).map_err(|e| json_column_error(7, e))?,
            batches_processed: row.get(8)?,
            batch_size: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    pub fn save(
        conn: &Connection,
        table: AuditedTable,
        changed_by: Option<i64>,
        outcome: BatchOutcome,
    ) -> std::result::Result<Self, AppError> {
        let created_at = now();
        let BatchOutcome {
            total_processed,
            successful,
            errors,
            created_ids,
            batches_processed,
            batch_size,
        } = outcome;
        let failed = total_processed.saturating_sub(successful);

        conn.execute(
            "INSERT INTO batch_logs (table_name, changed_by, total_processed, successful, failed,
                                     errors, created_ids, batches_processed, batch_size, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                table.table_name(),
                changed_by,
                total_processed,
                successful,
                failed,
                serde_json::to_value(&errors)?,
                serde_json::to_value(&created_ids)?,
                batches_processed,
                batch_size,
                created_at,
            ],
        )?;

        Ok(Self {
            id: conn.last_insert_rowid(),
            table_name: table.table_name().to_string(),
            changed_by,
            total_processed,
            successful,
            failed,
            errors,
            created_ids,
            batches_processed,
            batch_size,
            created_at,
        })
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        conn.query_row(
            "SELECT id, table_name, changed_by, total_processed, successful, failed, errors,
                    created_ids, batches_processed, batch_size, created_at
             FROM batch_logs WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .optional()
    }
}

fn json_column_error(column: usize, e: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
}
