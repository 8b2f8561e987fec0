//! Database model types.

use chrono::{DateTime, Utc};

/// One queued, not-yet-delivered event row.
///
/// Rows are never updated in place: created by one append, destroyed by
/// one claim-and-remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent {
    /// Store-assigned id, strictly increasing and never reused.
    pub id: i64,
    /// Opaque serialized event body.
    pub payload: String,
    /// Informational only.
    pub created_at: DateTime<Utc>,
}
