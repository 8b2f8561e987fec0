//! Database migrations.
//!
//! Migrations are run in order and tracked in the `migrations` table.
//! Provisioning is explicit: opening a pool never creates the schema.

use crate::DatabaseResult;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version.
pub const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> DatabaseResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM migrations",
        [],
        |row| row.get(0),
    )?;

    info!(current_version, target_version = CURRENT_VERSION, "Running migrations");

    if current_version < 1 {
        migrate_v1_pending_events(conn)?;
    }

    info!("Migrations complete");
    Ok(())
}

/// Drop the pending-event schema and its migration history.
///
/// Rows still pending are discarded; callers flush first.
pub fn teardown_schema(conn: &Connection) -> DatabaseResult<()> {
    conn.execute_batch(
        "
        DROP TABLE IF EXISTS pending_events;
        DROP TABLE IF EXISTS migrations;
        ",
    )?;
    info!("Pending event schema dropped");
    Ok(())
}

fn record_migration(conn: &Connection, version: i32, name: &str) -> DatabaseResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![version, name],
    )?;
    debug!(version, name, "Migration applied");
    Ok(())
}

/// V1: Pending event queue.
///
/// AUTOINCREMENT keeps ids monotonic across deletes so a drained id is
/// never handed out again.
fn migrate_v1_pending_events(conn: &Connection) -> DatabaseResult<()> {
    info!("Applying migration v1: pending events");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS pending_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );
        ",
    )?;

    record_migration(conn, 1, "pending_events")?;
    Ok(())
}
