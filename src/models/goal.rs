use super::{now, Visibility};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category_id: i64,
    pub target_value: f64,
    pub deadline: NaiveDate,
    pub is_completed: bool,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGoal {
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category_id: i64,
    pub target_value: f64,
    pub deadline: NaiveDate,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default = "default_true")]
    pub is_public: bool,
}

fn default_true() -> bool {
    true
}

const GOAL_COLUMNS: &str = "id, user_id, title, description, category_id, target_value, deadline, \
     is_completed, is_public, created_at, updated_at";

impl Goal {
    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            category_id: row.get(4)?,
            target_value: row.get(5)?,
            deadline: row.get(6)?,
            is_completed: row.get(7)?,
            is_public: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    pub fn create(conn: &Connection, new: &NewGoal) -> Result<Self> {
        let ts = now();
        conn.execute(
            "INSERT INTO goals (user_id, title, description, category_id, target_value, deadline,
                                is_completed, is_public, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                new.user_id,
                new.title,
                new.description,
                new.category_id,
                new.target_value,
                new.deadline,
                new.is_completed,
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
            target_value: new.target_value,
            deadline: new.deadline,
            is_completed: new.is_completed,
            is_public: new.is_public,
            created_at: ts,
            updated_at: ts,
        })
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        conn.query_row(
            &format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = ?1"),
            params![id],
            Self::from_row,
        )
        .optional()
    }

    pub fn find_all(conn: &Connection, visibility: Visibility) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {GOAL_COLUMNS} FROM goals WHERE (?1 = 0 OR is_public = 1) ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![visibility.public_only()], Self::from_row)?;
        rows.collect()
    }

    pub fn find_by_user(conn: &Connection, user_id: i64, visibility: Visibility) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {GOAL_COLUMNS} FROM goals
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
            "SELECT {GOAL_COLUMNS} FROM goals
             WHERE category_id = ?1 AND (?2 = 0 OR is_public = 1) ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![category_id, visibility.public_only()], Self::from_row)?;
        rows.collect()
    }

    /// Goals enrolled in a challenge, public or not.
    pub fn find_by_challenge(conn: &Connection, challenge_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT g.id, g.user_id, g.title, g.description, g.category_id, g.target_value,
                    g.deadline, g.is_completed, g.is_public, g.created_at, g.updated_at
             FROM goals g
             JOIN goal_challenges gc ON gc.goal_id = g.id
             WHERE gc.challenge_id = ?1
             ORDER BY g.id",
        )?;
        let rows = stmt.query_map(params![challenge_id], Self::from_row)?;
        rows.collect()
    }

    /// Whether the user already owns a goal with this title.
    pub fn title_taken(conn: &Connection, user_id: i64, title: &str) -> Result<bool> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM goals WHERE user_id = ?1 AND title = ?2)",
            params![user_id, title],
            |row| row.get(0),
        )
    }

    pub fn update(&mut self, conn: &Connection) -> Result<bool> {
        self.updated_at = now();
        let changed = conn.execute(
            "UPDATE goals
             SET title = ?1, description = ?2, category_id = ?3, target_value = ?4,
                 deadline = ?5, is_completed = ?6, is_public = ?7, updated_at = ?8
             WHERE id = ?9",
            params![
                self.title,
                self.description,
                self.category_id,
                self.target_value,
                self.deadline,
                self.is_completed,
                self.is_public,
                self.updated_at,
                self.id,
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        let changed = conn.execute("DELETE FROM goals WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}

/// A dated snapshot of a goal's current value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub id: i64,
    pub goal_id: i64,
    pub progress_date: NaiveDate,
    pub current_value: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGoalProgress {
    pub goal_id: i64,
    pub progress_date: NaiveDate,
    pub current_value: f64,
    pub notes: Option<String>,
}

const PROGRESS_COLUMNS: &str =
    "id, goal_id, progress_date, current_value, notes, created_at, updated_at";

impl GoalProgress {
    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            goal_id: row.get(1)?,
            progress_date: row.get(2)?,
            current_value: row.get(3)?,
            notes: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    pub fn create(conn: &Connection, new: &NewGoalProgress) -> Result<Self> {
        let ts = now();
        conn.execute(
            "INSERT INTO goal_progresses (goal_id, progress_date, current_value, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![new.goal_id, new.progress_date, new.current_value, new.notes, ts],
        )?;
        Ok(Self {
            id: conn.last_insert_rowid(),
            goal_id: new.goal_id,
            progress_date: new.progress_date,
            current_value: new.current_value,
            notes: new.notes.clone(),
            created_at: ts,
            updated_at: ts,
        })
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        conn.query_row(
            &format!("SELECT {PROGRESS_COLUMNS} FROM goal_progresses WHERE id = ?1"),
            params![id],
            Self::from_row,
        )
        .optional()
    }

    /// All snapshots of a goal, oldest first.
    pub fn find_by_goal(conn: &Connection, goal_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM goal_progresses
             WHERE goal_id = ?1 ORDER BY progress_date, id"
        ))?;
        let rows = stmt.query_map(params![goal_id], Self::from_row)?;
        rows.collect()
    }

    /// Most recent snapshot by progress date; ties go to the later insert.
    pub fn latest(conn: &Connection, goal_id: i64) -> Result<Option<Self>> {
        conn.query_row(
            &format!(
                "SELECT {PROGRESS_COLUMNS} FROM goal_progresses
                 WHERE goal_id = ?1 ORDER BY progress_date DESC, id DESC LIMIT 1"
            ),
            params![goal_id],
            Self::from_row,
        )
        .optional()
    }

    pub fn update(&mut self, conn: &Connection) -> Result<bool> {
        self.updated_at = now();
        let changed = conn.execute(
            "UPDATE goal_progresses
             SET progress_date = ?1, current_value = ?2, notes = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                self.progress_date,
                self.current_value,
                self.notes,
                self.updated_at,
                self.id,
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        let changed = conn.execute("DELETE FROM goal_progresses WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{date, new_goal, seed_owner, setup_test_db};

    #[test]
    fn test_create_and_find_goal() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let (user_id, category_id) = seed_owner(conn, "alice");

        let goal = Goal::create(conn, &new_goal(user_id, category_id, "Run", 100.0)).unwrap();
        assert_eq!(Goal::find_by_id(conn, goal.id).unwrap(), Some(goal));
    }

    #[test]
    fn test_visibility_filters_private_goals() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let (user_id, category_id) = seed_owner(conn, "alice");

        Goal::create(conn, &new_goal(user_id, category_id, "Public", 10.0)).unwrap();
        let mut private = new_goal(user_id, category_id, "Private", 10.0);
        private.is_public = false;
        Goal::create(conn, &private).unwrap();

        assert_eq!(Goal::find_by_user(conn, user_id, Visibility::PublicOnly).unwrap().len(), 1);
        assert_eq!(Goal::find_by_user(conn, user_id, Visibility::All).unwrap().len(), 2);
        assert_eq!(
            Goal::find_by_category(conn, category_id, Visibility::PublicOnly).unwrap().len(),
            1
        );
        assert_eq!(Goal::find_all(conn, Visibility::All).unwrap().len(), 2);
    }

    #[test]
    fn test_title_taken_is_per_user() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let (alice, category_id) = seed_owner(conn, "alice");
        let (bob, _) = seed_owner(conn, "bob");

        Goal::create(conn, &new_goal(alice, category_id, "Run", 10.0)).unwrap();
        assert!(Goal::title_taken(conn, alice, "Run").unwrap());
        assert!(!Goal::title_taken(conn, bob, "Run").unwrap());
    }

    #[test]
    fn test_goal_requires_existing_user() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let (_, category_id) = seed_owner(conn, "alice");

        let err = Goal::create(conn, &new_goal(999, category_id, "Run", 10.0)).unwrap_err();
        assert!(crate::error::is_fk_violation(&err));
    }

    #[test]
    fn test_progress_ordering_and_latest() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let (user_id, category_id) = seed_owner(conn, "alice");
        let goal = Goal::create(conn, &new_goal(user_id, category_id, "Run", 100.0)).unwrap();

        for (day, value) in [(3, 30.0), (1, 10.0), (2, 20.0)] {
            GoalProgress::create(
                conn,
                &NewGoalProgress {
                    goal_id: goal.id,
                    progress_date: date(2024, 1, day),
                    current_value: value,
                    notes: None,
                },
            )
            .unwrap();
        }

        let values: Vec<f64> = GoalProgress::find_by_goal(conn, goal.id)
            .unwrap()
            .into_iter()
            .map(|p| p.current_value)
            .collect();
        assert_eq!(values, vec![10.0, 20.0, 30.0]);
        assert_eq!(GoalProgress::latest(conn, goal.id).unwrap().unwrap().current_value, 30.0);
    }

    #[test]
    fn test_deleting_goal_cascades_to_progress() {
        let (db, _dir) = setup_test_db();
        let conn = db.connection();
        let (user_id, category_id) = seed_owner(conn, "alice");
        let goal = Goal::create(conn, &new_goal(user_id, category_id, "Run", 100.0)).unwrap();
        let snapshot = GoalProgress::create(
            conn,
            &NewGoalProgress {
                goal_id: goal.id,
                progress_date: date(2024, 1, 1),
                current_value: 5.0,
                notes: Some("first run".into()),
            },
        )
        .unwrap();

        assert!(Goal::delete(conn, goal.id).unwrap());
        assert!(GoalProgress::find_by_id(conn, snapshot.id).unwrap().is_none());
    }
}
