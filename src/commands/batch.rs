// src/commands/batch.rs
//
// Chunked batch creates. Each chunk commits in its own transaction and each
// item runs in a savepoint inside it, so a failed item leaves neither rows
// nor audit entries behind while the rest of its chunk commits.

use crate::audit::{
    capture_insert, AuditContext, Auditable, BatchError, BatchLog, BatchOutcome,
};
use crate::db::{with_transaction, SharedDatabase};
use crate::error::AppError;
use crate::models::User;
use crate::validation::validate_batch;
use rusqlite::Connection;

use super::BatchRequest;

fn to_u32(n: usize, field: &'static str) -> Result<u32, AppError> {
    u32::try_from(n).map_err(|_| AppError::invalid(field, "out of range"))
}

/// Run one item in a savepoint.
///
/// The outer error means the savepoint itself failed and the chunk must be
/// abandoned; the inner one is the item's own failure, already rolled back.
fn in_savepoint<R>(
    conn: &Connection,
    item: impl FnOnce(&Connection) -> Result<R, AppError>,
) -> Result<Result<R, AppError>, AppError> {
    conn.execute_batch("SAVEPOINT batch_item")?;
    match item(conn) {
        Ok(row) => {
            conn.execute_batch("RELEASE batch_item")?;
            Ok(Ok(row))
        }
        Err(e) => {
            conn.execute_batch("ROLLBACK TO batch_item; RELEASE batch_item")?;
            Ok(Err(e))
        }
    }
}

/// Create `request.items` with `create` in chunks of `request.batch_size`
/// and persist the resulting [`BatchLog`] under the table of `R`.
///
/// `create` validates and inserts one item; the runner records its audit
/// entry. Item failures are reported with their index and classified. A
/// chunk that cannot commit reports all of its items as failed.
pub(super) fn run_batch<T, R, F>(
    db: &SharedDatabase,
    ctx: AuditContext,
    request: &BatchRequest<T>,
    mut create: F,
) -> Result<BatchLog, AppError>
where
    R: Auditable,
    F: FnMut(&Connection, &T) -> Result<R, AppError>,
{
    validate_batch(request.items.len(), request.batch_size)?;
    let table = R::TABLE;

    let mut outcome = BatchOutcome {
        total_processed: to_u32(request.items.len(), "items")?,
        batch_size: to_u32(request.batch_size, "batch_size")?,
        ..BatchOutcome::default()
    };

    let indexed: Vec<(usize, &T)> = request.items.iter().enumerate().collect();
    for chunk in indexed.chunks(request.batch_size) {
        let committed = with_transaction(db, "create batch chunk", |conn| {
            let mut created = Vec::with_capacity(chunk.len());
            let mut errors = Vec::new();
            for &(index, item) in chunk {
                let attempt = in_savepoint(conn, |conn| {
                    let row = create(conn, item)?;
                    capture_insert(conn, ctx, &row)?;
                    Ok(row.record_id())
                })?;
                match attempt {
                    Ok(id) => created.push(id),
                    Err(e) => errors.push(BatchError::new(index, &e)),
                }
            }
            Ok((created, errors))
        });

        match committed {
            Ok((created, mut errors)) => {
                outcome.successful += to_u32(created.len(), "items")?;
                outcome.created_ids.extend(created.into_iter().flatten());
                outcome.errors.append(&mut errors);
            }
            Err(e) => {
                log::error!("{table} batch chunk rolled back: {e}");
                outcome
                    .errors
                    .extend(chunk.iter().map(|&(index, _)| BatchError::new(index, &e)));
            }
        }
        outcome.batches_processed += 1;
    }

    let log = with_transaction(db, "save batch log", |conn| {
        let changed_by = match ctx.user_id {
            Some(id) if User::exists(conn, id)? => Some(id),
            Some(_) | None => None,
        };
        BatchLog::save(conn, table, changed_by, outcome)
    })?;

    log::info!(
        "{table} batch finished: {} created, {} failed in {} chunks",
        log.successful,
        log.failed,
        log.batches_processed
    );
    Ok(log)
}
