use super::{AuditedTable, Operation};
use crate::models::now;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::Serialize;
use serde_json::Value;

/// One append-only row of the audit log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub table_name: String,
    pub record_id: Option<i64>,
    pub operation: Operation,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub changed_by: Option<i64>,
    pub changed_at: DateTime<Utc>,
}

const COLUMNS: &str =
    "id, table_name, record_id, operation, old_values, new_values, changed_by, changed_at";

impl AuditEntry {
    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            table_name: row.get(1)?,
            record_id: row.get(2)?,
            operation: row.get(3)?,
            old_values: row.get(4)?,
            new_values: row.get(5)?,
            changed_by: row.get(6)?,
            changed_at: row.get(7)?,
        })
    }

    pub(crate) fn insert(
        conn: &Connection,
        table: AuditedTable,
        record_id: Option<i64>,
        operation: Operation,
        old_values: Option<Value>,
        new_values: Option<Value>,
        changed_by: Option<i64>,
    ) -> Result<Self> {
        let changed_at = now();
        conn.execute(
            "INSERT INTO audit_logs (table_name, record_id, operation, old_values, new_values, changed_by, changed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                table.table_name(),
                record_id,
                operation,
                old_values,
                new_values,
                changed_by,
                changed_at,
            ],
        )?;
        Ok(Self {
            id: conn.last_insert_rowid(),
            table_name: table.table_name().to_string(),
            record_id,
            operation,
            old_values,
            new_values,
            changed_by,
            changed_at,
        })
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM audit_logs WHERE id = ?1"),
            params![id],
            Self::from_row,
        )
        .optional()
    }

    /// A page of entries, newest first.
    pub fn list(conn: &Connection, limit: u32, offset: u32) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM audit_logs ORDER BY id DESC LIMIT ?1 OFFSET ?2"
        ))?;
        let rows = stmt.query_map(params![limit, offset], Self::from_row)?;
        rows.collect()
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        conn.query_row("SELECT COUNT(*) FROM audit_logs", [], |row| row.get(0))
    }

    /// History of one row, oldest first.
    pub fn find_for_record(conn: &Connection, table: AuditedTable, record_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM audit_logs WHERE table_name = ?1 AND record_id = ?2 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![table.table_name(), record_id], Self::from_row)?;
        rows.collect()
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        let changed = conn.execute("DELETE FROM audit_logs WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}
