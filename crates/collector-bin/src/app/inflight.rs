//! Dispatcher that remembers its detached sends so the process can give
//! them a bounded chance to finish before exiting.

use collector_outbox::{BatchDispatcher, EventBatch, HttpBatchSender};
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct InflightSender {
    sender: HttpBatchSender,
    inflight: Mutex<Vec<JoinHandle<()>>>,
}

impl InflightSender {
    pub fn new(sender: HttpBatchSender) -> Self {
        Self {
            sender,
            inflight: Mutex::new(Vec::new()),
        }
    }

    /// Wait up to `limit` for outstanding sends.
    pub async fn settle(&self, limit: Duration) {
        let handles = {
            let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *inflight)
        };
        if handles.is_empty() {
            return;
        }

        let pending = handles.len();
        let waited = tokio::time::timeout(limit, async {
            for handle in handles {
                let _ = handle.await;
            }
        })
        .await;

        if waited.is_err() {
            debug!(pending, "Exiting with sends still in flight");
        }
    }
}

impl BatchDispatcher for InflightSender {
    fn dispatch(&self, batch: &EventBatch) {
        let Some(handle) = self.sender.submit(batch) else {
            return;
        };

        let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        inflight.retain(|h| !h.is_finished());
        inflight.push(handle);
    }
}
