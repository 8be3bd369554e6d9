use super::now;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::{Deserialize, Serialize};

/// A time-boxed activity that goals can join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewChallenge {
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

const CHALLENGE_COLUMNS: &str =
    "id, name, description, start_date, end_date, is_active, created_at, updated_at";

impl Challenge {
    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            start_date: row.get(3)?,
            end_date: row.get(4)?,
            is_active: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    pub fn create(conn: &Connection, new: &NewChallenge) -> Result<Self> {
        let ts = now();
        conn.execute(
            "INSERT INTO challenges (name, description, start_date, end_date, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                new.name,
                new.description,
                new.start_date,
                new.end_date,
                new.is_active,
                ts,
            ],
        )?;
        Ok(Self {
            id: conn.last_insert_rowid(),
            name: new.name.clone(),
            description: new.description.clone(),
            start_date: new.start_date,
            end_date: new.end_date,
            is_active: new.is_active,
            created_at: ts,
            updated_at: ts,
        })
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        conn.query_row(
            &format!("SELECT {CHALLENGE_COLUMNS} FROM challenges WHERE id = ?1"),
            params![id],
            Self::from_row,
        )
        .optional()
    }

    pub fn find_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHALLENGE_COLUMNS} FROM challenges ORDER BY start_date, id"
        ))?;
        let rows = stmt.query_map([], Self::from_row)?;
        rows.collect()
    }

    /// Challenges a goal has joined.
    pub fn find_by_goal(conn: &Connection, goal_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT c.id, c.name, c.description, c.start_date, c.end_date, c.is_active,
                    c.created_at, c.updated_at
             FROM challenges c
             JOIN goal_challenges gc ON gc.challenge_id = c.id
             WHERE gc.goal_id = ?1
             ORDER BY c.start_date, c.id",
        )?;
        let rows = stmt.query_map(params![goal_id], Self::from_row)?;
        rows.collect()
    }

    /// Challenges attached to a category.
    pub fn find_by_category(conn: &Connection, category_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT c.id, c.name, c.description, c.start_date, c.end_date, c.is_active,
                    c.created_at, c.updated_at
             FROM challenges c
             JOIN challenge_categories cc ON cc.challenge_id = c.id
             WHERE cc.category_id = ?1
             ORDER BY c.start_date, c.id",
        )?;
        let rows = stmt.query_map(params![category_id], Self::from_row)?;
        rows.collect()
    }

    pub fn update(&mut self, conn: &Connection) -> Result<bool> {
        self.updated_at = now();
        let changed = conn.execute(
            "UPDATE challenges
             SET name = ?1, description = ?2, start_date = ?3, end_date = ?4,
                 is_active = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                self.name,
                self.description,
                self.start_date,
                self.end_date,
                self.is_active,
                self.updated_at,
                self.id,
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        let changed = conn.execute("DELETE FROM challenges WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}

/// Membership of a goal in a challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalChallenge {
    pub goal_id: i64,
    pub challenge_id: i64,
    pub joined_at: DateTime<Utc>,
}

impl GoalChallenge {
    pub fn create(conn: &Connection, goal_id: i64, challenge_id: i64) -> Result<Self> {
        let joined_at = now();
        conn.execute(
            "INSERT INTO goal_challenges (goal_id, challenge_id, joined_at) VALUES (?1, ?2, ?3)",
            params![goal_id, challenge_id, joined_at],
        )?;
        Ok(Self {
            goal_id,
            challenge_id,
            joined_at,
        })
    }

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            goal_id: row.get(0)?,
            challenge_id: row.get(1)?,
            joined_at: row.get(2)?,
        })
    }

    pub fn find(conn: &Connection, goal_id: i64, challenge_id: i64) -> Result<Option<Self>> {
        conn.query_row(
            "SELECT goal_id, challenge_id, joined_at FROM goal_challenges
             WHERE goal_id = ?1 AND challenge_id = ?2",
            params![goal_id, challenge_id],
            Self::from_row,
        )
        .optional()
    }

    pub fn find_by_goal(conn: &Connection, goal_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT goal_id, challenge_id, joined_at FROM goal_challenges
             WHERE goal_id = ?1 ORDER BY challenge_id",
        )?;
        let rows = stmt.query_map(params![goal_id], Self::from_row)?;
        rows.collect()
    }

    pub fn find_by_challenge(conn: &Connection, challenge_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT goal_id, challenge_id, joined_at FROM goal_challenges
             WHERE challenge_id = ?1 ORDER BY goal_id",
        )?;
        let rows = stmt.query_map(params![challenge_id], Self::from_row)?;
        rows.collect()
    }

    pub fn delete(conn: &Connection, goal_id: i64, challenge_id: i64) -> Result<bool> {
        let changed = conn.execute(
            "DELETE FROM goal_challenges WHERE goal_id = ?1 AND challenge_id = ?2",
            params![goal_id, challenge_id],
        )?;
        Ok(changed > 0)
    }
}

/// Attachment of a category to a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeCategory {
    pub challenge_id: i64,
    pub category_id: i64,
}

impl ChallengeCategory {
    pub fn create(conn: &Connection, challenge_id: i64, category_id: i64) -> Result<Self> {
        conn.execute(
            "INSERT INTO challenge_categories (challenge_id, category_id) VALUES (?1, ?2)",
            params![challenge_id, category_id],
        )?;
        Ok(Self {
            challenge_id,
            category_id,
        })
    }

    pub fn exists(conn: &Connection, challenge_id: i64, category_id: i64) -> Result<bool> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM challenge_categories WHERE challenge_id = ?1 AND category_id = ?2)",
            params![challenge_id, category_id],
            |row| row.get(0),
        )
    }

    pub fn category_ids(conn: &Connection, challenge_id: i64) -> Result<Vec<i64>> {
        let mut stmt = conn.prepare(
            "SELECT category_id FROM challenge_categories WHERE challenge_id = ?1 ORDER BY category_id",
        )?;
        let rows = stmt.query_map(params![challenge_id], |row| row.get(0))?;
        rows.collect()
    }

    pub fn find_by_challenge(conn: &Connection, challenge_id: i64) -> Result<Vec<Self>> {
        Ok(Self::category_ids(conn, challenge_id)?
            .into_iter()
            .map(|category_id| Self {
                challenge_id,
                category_id,
            })
            .collect())
    }

    pub fn find_by_category(conn: &Connection, category_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT challenge_id FROM challenge_categories WHERE category_id = ?1 ORDER BY challenge_id",
        )?;
        let rows = stmt.query_map(params![category_id], |row| {
            Ok(Self {
                challenge_id: row.get(0)?,
                category_id,
            })
        })?;
        rows.collect()
    }

    pub fn delete(conn: &Connection, challenge_id: i64, category_id: i64) -> Result<bool> {
        let changed = conn.execute(
            "DELETE FROM challenge_categories WHERE challenge_id = ?1 AND category_id = ?2",
            params![challenge_id, category_id],
        )?;
        Ok(changed > 0)
    }
}
