//! Producer error types.
//!
//! These never reach the host:
//! [`Producer::on_request_complete`](crate::Producer::on_request_complete) logs and
//! discards them.

use thiserror::Error;

/// Producer error type.
#[derive(Error, Debug)]
pub enum ProducerError {
    /// The event could not be appended.
    #[error("Database error: {0}")]
    Database(#[from] collector_database::DatabaseError),

    /// The event could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using ProducerError.
pub type ProducerResult<T> = Result<T, ProducerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use collector_database::DatabaseError;

    #[test]
    fn database_error_display() {
        let err: ProducerError = DatabaseError::NotReady.into();
        assert_eq!(err.to_string(), "Database error: Event store is not ready");
    }

    #[test]
    fn json_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{{{").unwrap_err();
        let err: ProducerError = serde_err.into();
        assert!(err.to_string().starts_with("JSON error:"));
    }
}
