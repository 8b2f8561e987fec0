//! Command implementations and wiring.

mod commands;
mod inflight;

pub use commands::{drain, provision, record, run, status, teardown, RecordArgs};
