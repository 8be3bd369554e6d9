//! Shared test utilities for goalpost.
//!
//! This module provides common setup functions and fixtures used across test modules.

#![cfg(test)]

use crate::db::{migrations, Database, SharedDatabase};
use crate::models::{Category, NewChallenge, NewGoal, NewHabit, NewUser, User};
use chrono::NaiveDate;
use rusqlite::Connection;
use tempfile::{tempdir, TempDir};

/// Create a temporary test database with migrations applied.
///
/// Returns a tuple of (Database, TempDir). The TempDir must be kept alive
/// for the duration of the test to prevent the database file from being deleted.
pub fn setup_test_db() -> (Database, TempDir) {
    let dir = tempdir().expect("Failed to create temp directory for test DB");
    let db_path = dir.path().join("test.db");
    let db = Database::open(&db_path).expect("Failed to open test database");
    migrations::run(db.connection()).expect("Failed to run migrations on test DB");
    (db, dir)
}

/// Same as [`setup_test_db`], wrapped for the command layer.
pub fn setup_shared_db() -> (SharedDatabase, TempDir) {
    let (db, dir) = setup_test_db();
    (db.into_shared(), dir)
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
}

pub fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        description: None,
        role: crate::models::UserRole::User,
        is_public: true,
    }
}

pub fn new_goal(user_id: i64, category_id: i64, title: &str, target_value: f64) -> NewGoal {
    NewGoal {
        user_id,
        title: title.to_string(),
        description: None,
        category_id,
        target_value,
        deadline: date(2030, 12, 31),
        is_completed: false,
        is_public: true,
    }
}

pub fn new_habit(user_id: i64, category_id: i64, title: &str) -> NewHabit {
    NewHabit {
        user_id,
        title: title.to_string(),
        description: None,
        category_id,
        frequency_type: 7,
        frequency_value: 3,
        is_public: true,
    }
}

pub fn new_challenge(name: &str, start_date: NaiveDate, end_date: NaiveDate) -> NewChallenge {
    NewChallenge {
        name: name.to_string(),
        description: None,
        start_date,
        end_date,
        is_active: true,
    }
}

/// Insert a user and a category named after them. Returns (user_id, category_id).
pub fn seed_owner(conn: &Connection, username: &str) -> (i64, i64) {
    let user = User::create(conn, &new_user(username)).expect("seed user");
    let category =
        Category::create(conn, &format!("{username}-category"), None).expect("seed category");
    (user.id, category.id)
}
