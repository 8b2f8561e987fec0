//! Batch dispatch for pending collect events.
//!
//! This crate provides:
//! - [`CollectEvent`]: the wire shape of one event
//! - [`EventBatch`]: an ordered chunk of claimed events
//! - [`HttpBatchSender`]: fire-and-forget POST of one chunk
//! - [`DrainWorker`]: periodic claim, decode, chunk, dispatch
//!
//! ```text
//! producers ──append──▶ EventStore ──claim_and_remove──▶ DrainWorker
//!                                                          │ chunks of ≤ batch_size
//!                                                          ▼
//!                                                   BatchDispatcher ──POST──▶ endpoint
//! ```

mod error;
mod event;
mod queue;
mod sender;
mod worker;

pub use error::{OutboxError, OutboxResult};
pub use event::{AnalyticsRecord, CollectEvent, EventEnvelope};
pub use queue::{chunk_events, decode_pending_events, ClaimedEvent, EventBatch, MAX_BATCH_SIZE};
pub use sender::{BatchDispatcher, HttpBatchSender, SenderConfig};
pub use worker::{DrainReport, DrainWorker, DrainWorkerConfig};
