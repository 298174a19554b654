use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::db::{Event, EventRepository};
use crate::error::AppResult;

/// The payload pushed to connected clients when an event enters its
/// reminder window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReminderPayload {
    pub event_id: i64,
    pub message: String,
}

impl ReminderPayload {
    pub fn for_event(event: &Event) -> Self {
        Self {
            event_id: event.id,
            message: format!("\"{}\" starts within the hour", event.title),
        }
    }
}

/// Delivery seam between the dispatcher and whatever carries payloads to
/// clients. Implemented by `SessionHub` in production and by a recording
/// sink in tests. Publishing is fire-and-forget; implementations swallow
/// per-session failures.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, payload: &ReminderPayload);
}

/// Marks events notified and pushes their reminder to the sink.
pub struct ReminderDispatcher<'a> {
    pool: &'a SqlitePool,
    sink: &'a dyn NotificationSink,
}

impl<'a> ReminderDispatcher<'a> {
    pub fn new(pool: &'a SqlitePool, sink: &'a dyn NotificationSink) -> Self {
        Self { pool, sink }
    }

    /// Dispatch one reminder. The flag is flipped before publishing so an
    /// overlapping tick (or a tick racing an API write) can never produce a
    /// duplicate: whoever loses the flip publishes nothing. Returns whether a
    /// payload was published.
    ///
    /// The flip and the publish are deliberately not atomic as a pair. If the
    /// process dies between them the reminder is lost, which is the accepted
    /// side of the at-most-once tradeoff.
    pub async fn dispatch(&self, event: &Event) -> AppResult<bool> {
        if !EventRepository::mark_notified(self.pool, event.id).await? {
            // Already notified by another tick, or deleted since the scan.
            tracing::debug!("Skipping reminder for event {}: already handled", event.id);
            return Ok(false);
        }

        let payload = ReminderPayload::for_event(event);
        tracing::info!("Publishing reminder for event {} ({})", event.id, event.title);
        self.sink.publish(&payload).await;
        Ok(true)
    }
}
