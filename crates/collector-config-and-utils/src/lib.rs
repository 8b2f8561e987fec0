//! Configuration, paths, and logging setup for the pageview collector.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_BATCH_SIZE, DEFAULT_COLLECT_ENDPOINT, DEFAULT_DRAIN_INTERVAL_SECS,
    DEFAULT_LOG_LEVEL, DEFAULT_MAX_REDIRECTS, DEFAULT_SEND_TIMEOUT_MS,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
