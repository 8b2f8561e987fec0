//! SQL for the pending-event table.
//!
//! Functions take a bare connection so the same statements back every
//! store implementation and can be exercised against an in-memory database.

use crate::{DatabaseResult, PendingEvent};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, warn};

/// Name of the pending-event table.
pub const PENDING_EVENTS_TABLE: &str = "pending_events";

/// Check whether a table exists.
pub fn table_exists(conn: &Connection, name: &str) -> DatabaseResult<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Insert one pending event and return its id.
///
/// A single-row insert in its own implicit transaction.
pub fn insert_pending_event(conn: &Connection, payload: &str) -> DatabaseResult<i64> {
    conn.execute(
        "INSERT INTO pending_events (payload) VALUES (?1)",
        params![payload],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Count rows currently pending.
pub fn count_pending_events(conn: &Connection) -> DatabaseResult<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM pending_events", [], |row| {
        row.get(0)
    })?;
    Ok(count as usize)
}

/// Read every pending row in id order and delete exactly those rows.
///
/// Runs under `BEGIN IMMEDIATE`, so the read and the delete see the same
/// committed set and a concurrent consumer waits until this one commits.
/// The delete is bounded by the highest id read. If it removes a different
/// number of rows than were read, the transaction is rolled back and an
/// empty batch is returned with the store unchanged. Any error drops the
/// transaction, which rolls it back.
pub fn claim_and_remove_pending_events(conn: &mut Connection) -> DatabaseResult<Vec<PendingEvent>> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let rows = {
        let mut stmt =
            tx.prepare("SELECT id, payload, created_at FROM pending_events ORDER BY id ASC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PendingEvent {
                    id: row.get(0)?,
                    payload: row.get(1)?,
                    created_at: parse_datetime(row.get::<_, String>(2)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let Some(max_id) = rows.last().map(|row| row.id) else {
        return Ok(Vec::new());
    };

    let deleted = tx.execute(
        "DELETE FROM pending_events WHERE id <= ?1",
        params![max_id],
    )?;

    if deleted != rows.len() {
        warn!(
            claimed = rows.len(),
            deleted,
            max_id,
            "Claim count mismatch, rolling back"
        );
        tx.rollback()?;
        return Ok(Vec::new());
    }

    tx.commit()?;
    debug!(count = rows.len(), max_id, "Claimed pending events");
    Ok(rows)
}

/// Parse an RFC3339 datetime string, falling back to current time on error.
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
