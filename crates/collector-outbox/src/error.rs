//! Outbox error types.
//!
//! Only construction can fail. Draining and dispatch log their failures
//! instead of returning them.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutboxError {
    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias using OutboxError.
pub type OutboxResult<T> = Result<T, OutboxError>;
