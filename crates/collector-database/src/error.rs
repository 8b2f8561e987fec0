//! Event store error types.

use thiserror::Error;

/// Errors from the pending-event store.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// No pooled connection could be checked out, or the pool failed to build.
    #[error("Connection pool error: {0}")]
    Connection(String),

    /// The `pending_events` table has not been provisioned.
    #[error("Event store is not ready")]
    NotReady,

    /// The database directory could not be created.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using DatabaseError.
pub type DatabaseResult<T> = Result<T, DatabaseError>;
