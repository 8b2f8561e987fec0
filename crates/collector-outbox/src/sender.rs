//! Fire-and-forget delivery of event batches.

use crate::{EventBatch, OutboxResult};
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Hands a chunk of events to the remote sink.
///
/// Implementations must return without waiting for delivery and must never
/// surface a delivery failure to the caller.
pub trait BatchDispatcher: Send + Sync {
    fn dispatch(&self, batch: &EventBatch);
}

/// Sender configuration.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Collect endpoint that receives the JSON array.
    pub endpoint: String,
    /// Hard timeout for one send.
    pub timeout: Duration,
    /// Redirects followed before giving up.
    pub max_redirects: usize,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://ai.clarity.ms/collect".to_string(),
            timeout: Duration::from_secs(1),
            max_redirects: 5,
        }
    }
}

/// POSTs each batch on a detached task with a short timeout and no retry.
pub struct HttpBatchSender {
    config: SenderConfig,
    client: Client,
}

impl HttpBatchSender {
    /// Create a new sender.
    pub fn new(config: SenderConfig) -> OutboxResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .redirect(Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { config, client })
    }

    /// Start sending `batch` and return the handle of the detached send.
    ///
    /// Returns `None` when the batch was dropped: it failed to serialize or
    /// there is no tokio runtime to run the send on.
    pub fn submit(&self, batch: &EventBatch) -> Option<JoinHandle<()>> {
        let body = match batch.to_wire_body() {
            Ok(body) => body,
            Err(e) => {
                warn!(batch = batch.index, error = %e, "Failed to serialize batch, dropping");
                return None;
            }
        };

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(batch = batch.index, "No async runtime available, dropping batch");
                return None;
            }
        };

        let request = self
            .client
            .post(&self.config.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        let index = batch.index;
        let events = batch.len();

        debug!(
            url = %self.config.endpoint,
            batch = index,
            events,
            "Sending batch"
        );

        Some(runtime.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(batch = index, events, "Batch accepted");
                }
                Ok(response) => {
                    debug!(batch = index, status = %response.status(), "Batch rejected");
                }
                Err(e) => {
                    debug!(batch = index, error = %e, "Batch send failed");
                }
            }
        }))
    }
}

impl BatchDispatcher for HttpBatchSender {
    fn dispatch(&self, batch: &EventBatch) {
        // Detached: the outcome is deliberately never observed.
        let _ = self.submit(batch);
    }
}
