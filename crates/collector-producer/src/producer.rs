//! Builds and buffers one collect event per eligible request.

use crate::{join_site_url, IdentityLookup, ProducerResult, RequestInfo};
use chrono::Utc;
use collector_config_and_utils::Config;
use collector_database::EventStore;
use collector_outbox::{AnalyticsRecord, CollectEvent, EventEnvelope};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

/// Request-completion hook.
///
/// Shared across the host's request threads. Each call appends at most one
/// row through its own pooled connection and never touches the network.
pub struct Producer {
    store: Arc<dyn EventStore>,
    identity: Arc<dyn IdentityLookup>,
    site_url: String,
    client_version: String,
}

impl Producer {
    pub fn new(
        store: Arc<dyn EventStore>,
        identity: Arc<dyn IdentityLookup>,
        site_url: impl Into<String>,
        client_version: impl Into<String>,
    ) -> Self {
        Self {
            store,
            identity,
            site_url: site_url.into(),
            client_version: client_version.into(),
        }
    }

    /// Create a producer whose identity, site URL and version come from `config`.
    pub fn from_config(store: Arc<dyn EventStore>, config: &Config) -> Self {
        Self::new(
            store,
            Arc::new(config.clone()),
            config.site_url.clone(),
            config.client_version.clone(),
        )
    }

    /// Record the completed request if it is eligible.
    ///
    /// Infallible from the host's point of view: errors are logged at debug
    /// and dropped, and a panic below this point is caught here.
    pub fn on_request_complete(&self, request: &RequestInfo) {
        match panic::catch_unwind(AssertUnwindSafe(|| self.record(request))) {
            Ok(Ok(Some(id))) => debug!(id, "Collect event buffered"),
            Ok(Ok(None)) => {}
            Ok(Err(e)) => debug!(error = %e, "Collect event discarded"),
            Err(_) => debug!("Collect event production panicked"),
        }
    }

    /// Record the completed request, returning the appended row id.
    ///
    /// Returns `Ok(None)` for requests that are not recorded: anything but
    /// `GET`, administrative requests, and any request while the project or
    /// site identifier is missing.
    pub fn record(&self, request: &RequestInfo) -> ProducerResult<Option<i64>> {
        if request.method != "GET" || request.is_admin {
            return Ok(None);
        }

        let Some(project_id) = non_empty(self.identity.project_id()) else {
            return Ok(None);
        };
        if non_empty(self.identity.site_id()).is_none() {
            return Ok(None);
        }

        let event = self.build_event(request, project_id, Utc::now().timestamp());
        let payload = event.to_payload()?;
        let id = self.store.append(&payload)?;
        Ok(Some(id))
    }

    /// Build the event for `request` at unix time `time`.
    pub fn build_event(
        &self,
        request: &RequestInfo,
        project_id: String,
        time: i64,
    ) -> CollectEvent {
        CollectEvent {
            envelope: EventEnvelope {
                project_id,
                session_id: request.session_token.clone().unwrap_or_default(),
                version: self.client_version.clone(),
            },
            analytics: AnalyticsRecord {
                time,
                ip: request.client_ip(),
                ua: request.user_agent(),
                url: join_site_url(&self.site_url, &request.request_uri),
                method: request.method.clone(),
                response_content_type: request.response_content_type(),
            },
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
