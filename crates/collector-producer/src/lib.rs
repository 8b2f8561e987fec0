//! Request-completion hook for the pageview collector.
//!
//! [`Producer::on_request_complete`] runs once per finished request. For an
//! eligible request it builds a [`CollectEvent`](collector_outbox::CollectEvent)
//! and appends it to the pending-event store. It never blocks on the network
//! and never reports a failure back to the host.

mod error;
mod identity;
mod producer;
mod request;

pub use error::{ProducerError, ProducerResult};
pub use identity::{IdentityLookup, StaticIdentity};
pub use producer::Producer;
pub use request::{is_public_ip, join_site_url, sanitize_text, RequestInfo, UNKNOWN};
