//! Error types for configuration and paths.

use thiserror::Error;

/// Errors raised while loading, validating or saving collector settings.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A setting holds a value the pipeline cannot run with.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A URL setting does not parse.
    #[error("Invalid URL in {field}: {source}")]
    InvalidUrl {
        field: &'static str,
        source: url::ParseError,
    },

    /// The config file is not valid JSON for [`Config`](crate::Config).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base directory could not be resolved.
    #[error("Path error: {0}")]
    Path(String),
}

/// Result type alias using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
