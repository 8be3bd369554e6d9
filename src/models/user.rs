use super::{now, parse_text_enum, UnknownVariant};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

impl FromStr for UserRole {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            other => Err(UnknownVariant {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

impl ToSql for UserRole {
    fn to_sql(&self) -> Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for UserRole {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        parse_text_enum(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub description: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when registering a user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default = "default_true")]
    pub is_public: bool,
}

fn default_true() -> bool {
    true
}

const COLUMNS: &str =
    "id, username, first_name, last_name, description, role, is_active, is_public, created_at, updated_at";

impl User {
    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            description: row.get(4)?,
            role: row.get(5)?,
            is_active: row.get(6)?,
            is_public: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    pub fn create(conn: &Connection, new: &NewUser) -> Result<Self> {
        let ts = now();
        conn.execute(
            "INSERT INTO users (username, first_name, last_name, description, role, is_active, is_public, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?7)",
            params![
                new.username,
                new.first_name,
                new.last_name,
                new.description,
                new.role,
                new.is_public,
                ts,
            ],
        )?;
        Ok(Self {
            id: conn.last_insert_rowid(),
            username: new.username.clone(),
            first_name: new.first_name.clone(),
            last_name: new.last_name.clone(),
            description: new.description.clone(),
            role: new.role,
            is_active: true,
            is_public: new.is_public,
            created_at: ts,
            updated_at: ts,
        })
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            Self::from_row,
        )
        .optional()
    }

    pub fn find_by_username(conn: &Connection, username: &str) -> Result<Option<Self>> {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM users WHERE username = ?1"),
            params![username],
            Self::from_row,
        )
        .optional()
    }

    pub fn exists(conn: &Connection, id: i64) -> Result<bool> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )
    }

    pub fn find_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM users ORDER BY id"))?;
        let rows = stmt.query_map([], Self::from_row)?;
        rows.collect()
    }

    /// Persist all mutable fields. Returns false if the row no longer exists.
    pub fn update(&mut self, conn: &Connection) -> Result<bool> {
        self.updated_at = now();
        let changed = conn.execute(
            "UPDATE users
             SET username = ?1, first_name = ?2, last_name = ?3, description = ?4,
                 role = ?5, is_active = ?6, is_public = ?7, updated_at = ?8
             WHERE id = ?9",
            params![
                self.username,
                self.first_name,
                self.last_name,
                self.description,
                self.role,
                self.is_active,
                self.is_public,
                self.updated_at,
                self.id,
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        let changed = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}
