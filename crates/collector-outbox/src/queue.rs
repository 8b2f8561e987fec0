//! Decoding and chunking of claimed rows.

use crate::CollectEvent;
use collector_database::PendingEvent;
use tracing::warn;

/// Default maximum events per batch.
pub const MAX_BATCH_SIZE: usize = 50;

/// A decoded event together with the id of the row it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedEvent {
    pub id: i64,
    pub event: CollectEvent,
}

/// A chunk of events sent as one wire payload.
#[derive(Debug, Clone)]
pub struct EventBatch {
    /// Position of this chunk within its drain cycle.
    pub index: usize,
    /// Events in ascending id order.
    pub events: Vec<ClaimedEvent>,
}

impl EventBatch {
    /// Get the row ids in this batch.
    pub fn event_ids(&self) -> Vec<i64> {
        self.events.iter().map(|e| e.id).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Serialize the chunk as a single JSON array of events.
    pub fn to_wire_body(&self) -> serde_json::Result<Vec<u8>> {
        let events: Vec<&CollectEvent> = self.events.iter().map(|e| &e.event).collect();
        serde_json::to_vec(&events)
    }
}

/// Decode claimed rows, dropping any whose payload does not parse.
///
/// Returns the decoded events in input order and the number dropped. The
/// rows are already gone from the store, so a dropped row is lost for good.
pub fn decode_pending_events(rows: Vec<PendingEvent>) -> (Vec<ClaimedEvent>, usize) {
    let mut events = Vec::with_capacity(rows.len());
    let mut dropped = 0;

    for row in rows {
        match CollectEvent::from_payload(&row.payload) {
            Ok(event) => events.push(ClaimedEvent { id: row.id, event }),
            Err(e) => {
                dropped += 1;
                warn!(id = row.id, error = %e, "Dropping malformed pending event");
            }
        }
    }

    (events, dropped)
}

/// Split events into batches of at most `batch_size`, preserving order.
///
/// A `batch_size` of zero is treated as one.
pub fn chunk_events(events: Vec<ClaimedEvent>, batch_size: usize) -> Vec<EventBatch> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(events.len().div_ceil(batch_size));
    let mut events = events.into_iter().peekable();

    while events.peek().is_some() {
        let chunk: Vec<ClaimedEvent> = events.by_ref().take(batch_size).collect();
        batches.push(EventBatch {
            index: batches.len(),
            events: chunk,
        });
    }

    batches
}
