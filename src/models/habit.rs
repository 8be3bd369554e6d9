use super::{now, parse_text_enum, UnknownVariant, Visibility};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category_id: i64,
    /// Length of the period the frequency applies to, in days.
    pub frequency_type: i32,
    /// Expected occurrences per period.
    pub frequency_value: i32,
    pub is_active: bool,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewHabit {
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category_id: i64,
    pub frequency_type: i32,
    pub frequency_value: i32,
    #[serde(default = "default_true")]
    pub is_public: bool,
}

fn default_true() -> bool {
    true
}

const HABIT_COLUMNS: &str = "id, user_id, title, description, category_id, frequency_type, \
     frequency_value, is_active, is_public, created_at, updated_at";

impl Habit {
    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            category_id: row.get(4)?,
            frequency_type: row.get(5)?,
            frequency_value: row.get(6)?,
            is_active: row.get(7)?,
            is_public: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    pub fn create(conn: &Connection, new: &NewHabit) -> Result<Self> {
        let ts = now();
        conn.execute(
            "INSERT INTO habits (user_id, title, description, category_id, frequency_type,
                                 frequency_value, is_active, is_public, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8, ?8)",
            params![
                new.user_id,
                new.title,
                new.description,
                new.category_id,
                new.frequency_type,
                new.frequency_value,
                new.is_public,
                ts,
            ],
        )?;
        Ok(Self {
            id: conn.last_insert_rowid(),
            user_id: new.user_id,
            title: new.title.clone(),
            description: new.description.clone(),
            category_id: new.category_id,
            frequency_type: new.frequency_type,
            frequency_value: new.frequency_value,
            is_active: true,
            is_public: new.is_public,
            created_at: ts,
            updated_at: ts,
        })
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        conn.query_row(
            &format!("SELECT {HABIT_COLUMNS} FROM habits WHERE id = ?1"),
            params![id],
            Self::from_row,
        )
        .optional()
    }

    pub fn find_all(conn: &Connection, visibility: Visibility) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {HABIT_COLUMNS} FROM habits WHERE (?1 = 0 OR is_public = 1) ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![visibility.public_only()], Self::from_row)?;
        rows.collect()
    }

    pub fn find_by_user(conn: &Connection, user_id: i64, visibility: Visibility) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {HABIT_COLUMNS} FROM habits
             WHERE user_id = ?1 AND (?2 = 0 OR is_public = 1) ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![user_id, visibility.public_only()], Self::from_row)?;
        rows.collect()
    }

    pub fn find_by_category(
        conn: &Connection,
        category_id: i64,
        visibility: Visibility,
    ) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {HABIT_COLUMNS} FROM habits
             WHERE category_id = ?1 AND (?2 = 0 OR is_public = 1) ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![category_id, visibility.public_only()], Self::from_row)?;
        rows.collect()
    }

    pub fn update(&mut self, conn: &Connection) -> Result<bool> {
        self.updated_at = now();
        let changed = conn.execute(
            "UPDATE habits
             SET title = ?1, description = ?2, category_id = ?3, frequency_type = ?4,
                 frequency_value = ?5, is_active = ?6, is_public = ?7, updated_at = ?8
             WHERE id = ?9",
            params![
                self.title,
                self.description,
                self.category_id,
                self.frequency_type,
                self.frequency_value,
                self.is_active,
                self.is_public,
                self.updated_at,
                self.id,
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        let changed = conn.execute("DELETE FROM habits WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}

/// Outcome recorded for one habit occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    #[default]
    Completed,
    Failed,
    /// Excluded from consistency calculations.
    Skipped,
}

impl LogStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LogStatus::Completed => "completed",
            LogStatus::Failed => "failed",
            LogStatus::Skipped => "skipped",
        }
    }
}

impl FromStr for LogStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "completed" => Ok(LogStatus::Completed),
            "failed" => Ok(LogStatus::Failed),
            "skipped" => Ok(LogStatus::Skipped),
            other => Err(UnknownVariant {
                kind: "habit log status",
                value: other.to_string(),
            }),
        }
    }
}

impl ToSql for LogStatus {
    fn to_sql(&self) -> Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for LogStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        parse_text_enum(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitLog {
    pub id: i64,
    pub habit_id: i64,
    pub log_date: NaiveDate,
    pub status: LogStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewHabitLog {
    pub habit_id: i64,
    pub log_date: NaiveDate,
    #[serde(default)]
    pub status: LogStatus,
    pub notes: Option<String>,
}

const LOG_COLUMNS: &str = "id, habit_id, log_date, status, notes, created_at, updated_at";

impl HabitLog {
    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            habit_id: row.get(1)?,
            log_date: row.get(2)?,
            status: row.get(3)?,
            notes: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    pub fn create(conn: &Connection, new: &NewHabitLog) -> Result<Self> {
        let ts = now();
        conn.execute(
            "INSERT INTO habit_logs (habit_id, log_date, status, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![new.habit_id, new.log_date, new.status, new.notes, ts],
        )?;
        Ok(Self {
            id: conn.last_insert_rowid(),
            habit_id: new.habit_id,
            log_date: new.log_date,
            status: new.status,
            notes: new.notes.clone(),
            created_at: ts,
            updated_at: ts,
        })
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        conn.query_row(
            &format!("SELECT {LOG_COLUMNS} FROM habit_logs WHERE id = ?1"),
            params![id],
            Self::from_row,
        )
        .optional()
    }

    pub fn find_by_habit(conn: &Connection, habit_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {LOG_COLUMNS} FROM habit_logs WHERE habit_id = ?1 ORDER BY log_date, id"
        ))?;
        let rows = stmt.query_map(params![habit_id], Self::from_row)?;
        rows.collect()
    }

    pub fn update(&mut self, conn: &Connection) -> Result<bool> {
        self.updated_at = now();
        let changed = conn.execute(
            "UPDATE habit_logs SET log_date = ?1, status = ?2, notes = ?3, updated_at = ?4 WHERE id = ?5",
            params![self.log_date, self.status, self.notes, self.updated_at, self.id],
        )?;
        Ok(changed > 0)
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        let changed = conn.execute("DELETE FROM habit_logs WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}
