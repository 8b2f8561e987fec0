//! SQLite pending-event store for the pageview collector.
//!
//! This crate provides:
//! - The `pending_events` schema and its migrations
//! - [`EventStore`]: append and atomic claim-and-remove
//! - [`DatabasePool`]: an r2d2 pool in WAL mode implementing [`EventStore`]
//!
//! Producers append from many threads at once, each through its own pooled
//! connection. A drain cycle claims every committed row inside one
//! `BEGIN IMMEDIATE` transaction and deletes exactly what it read, so two
//! consumers can never see the same row.

mod error;
mod migrations;
mod models;
mod pool;
pub mod queries;
mod store;

pub use error::{DatabaseError, DatabaseResult};
pub use migrations::{run_migrations, teardown_schema, CURRENT_VERSION};
pub use models::PendingEvent;
pub use pool::{DatabasePool, PoolConfig};
pub use store::EventStore;
