// src/db/helpers.rs

use crate::db::SharedDatabase;
use crate::error::AppError;
use rusqlite::Connection;

/// Execute a read operation with proper lock handling and error logging.
///
/// # Example
/// ```ignore
/// with_connection(&db, "load categories", |conn| {
///     Ok(Category::find_all(conn)?)
/// })
/// ```
pub fn with_connection<F, T>(db: &SharedDatabase, operation: &str, f: F) -> Result<T, AppError>
where
    F: FnOnce(&Connection) -> Result<T, AppError>,
{
    let db = db.lock().map_err(|e| {
        log::error!("Failed to acquire database lock for {operation}: {e}");
        AppError::LockPoisoned
    })?;

    f(db.connection()).inspect_err(|e| log::warn!("Failed to {operation}: {e}"))
}

/// Execute a write inside one transaction.
///
/// The closure's data changes and any audit entries it records commit
/// together; an error from the closure rolls all of them back.
pub fn with_transaction<F, T>(db: &SharedDatabase, operation: &str, f: F) -> Result<T, AppError>
where
    F: FnOnce(&Connection) -> Result<T, AppError>,
{
    let db = db.lock().map_err(|e| {
        log::error!("Failed to acquire database lock for {operation}: {e}");
        AppError::LockPoisoned
    })?;

    let tx = db.connection().unchecked_transaction()?;
    match f(&*tx) {
        Ok(value) => {
            tx.commit()?;
            log::debug!("Committed {operation}");
            Ok(value)
        }
        Err(e) => {
            log::warn!("Failed to {operation}, rolling back: {e}");
            // Dropping the transaction rolls it back.
            drop(tx);
            Err(e)
        }
    }
}
