// src/commands/mod.rs
//
// Application operations. Writes validate their input, run in one
// transaction together with audit capture, and return response DTOs.

mod batch;
mod cascade;
mod dtos;
pub mod analytics;
pub mod audit;
pub mod categories;
pub mod challenges;
pub mod goals;
pub mod habits;
pub mod subscriptions;
pub mod users;

pub use dtos::*;

use crate::error::{is_fk_violation, is_unique_violation, AppError};

/// Turn a UNIQUE violation into `AlreadyExists`.
fn already_exists(e: AppError, name: &str) -> AppError {
    match &e {
        AppError::Database(db_err) if is_unique_violation(db_err) => AppError::AlreadyExists {
            name: name.into(),
        },
        _ => e,
    }
}

/// Turn a FOREIGN KEY violation on write into `InvalidInput`.
fn missing_reference(e: AppError, field: &'static str) -> AppError {
    match &e {
        AppError::Database(db_err) if is_fk_violation(db_err) => {
            AppError::invalid(field, "refers to a row that does not exist")
        }
        _ => e,
    }
}
