use super::schema::SCHEMA;
use rusqlite::{Connection, Result};

/// Version stamped into `PRAGMA user_version` once the schema is applied.
pub const SCHEMA_VERSION: i32 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    let current = schema_version(conn)?;
    conn.execute_batch(SCHEMA)?;

    if current < SCHEMA_VERSION {
        log::info!("Migrated database schema from version {current} to {SCHEMA_VERSION}");
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }
    Ok(())
}

pub fn schema_version(conn: &Connection) -> Result<i32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}
