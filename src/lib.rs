//! Data layer of a goal and habit tracker: relational schema on SQLite,
//! change capture into an audit log, and analytics over users, challenges
//! and categories.

pub mod analytics;
pub mod audit;
pub mod commands;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod models;
pub mod validation;
#[cfg(test)]
mod test_utils;

use crate::db::{migrations, Database, SharedDatabase};
use std::path::Path;

/// Open the database at `path`, creating its directory, and bring the
/// schema up to date.
pub fn open_database(path: &Path) -> Result<SharedDatabase, error::AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            error::AppError::Internal(format!("Could not create data directory: {e}"))
        })?;
    }
    let db = Database::open(path)?;
    migrations::run(db.connection())?;
    log::info!(
        "Opened database {} at schema version {}",
        path.display(),
        migrations::schema_version(db.connection())?
    );
    Ok(db.into_shared())
}
