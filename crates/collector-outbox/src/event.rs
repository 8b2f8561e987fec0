//! Wire shape of one collect event.

use serde::{Deserialize, Serialize};

/// Identifies who produced the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub project_id: String,
    pub session_id: String,
    pub version: String,
}

/// Per-request analytics captured at the end of the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    /// Unix seconds.
    pub time: i64,
    pub ip: String,
    pub ua: String,
    pub url: String,
    pub method: String,
    pub response_content_type: String,
}

/// One event as stored in a pending row and as sent on the wire.
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectEvent {
    pub envelope: EventEnvelope,
    pub analytics: AnalyticsRecord,
}

impl CollectEvent {
    /// Serialize for storage in the pending-event table.
    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a stored payload.
    ///
    /// Anything that is not an object with both `envelope` and `analytics`
    /// fails here, including valid JSON of another shape. The drain worker
    /// drops such rows.
    pub fn from_payload(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}
