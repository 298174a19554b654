use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::db::{Event, EventRepository};
use crate::error::AppResult;
use crate::services::notifications::{NotificationSink, ReminderDispatcher};
use crate::AppState;

/// Finds events that have entered their reminder window.
///
/// The filter is kept in two layers on purpose: a broad store query bounded by
/// `now + lead`, then a precise in-memory gate on each candidate. The store
/// query is a superset filter; the gate is the authoritative check and guards
/// against any skew between the two.
pub struct ReminderScanner;

impl ReminderScanner {
    pub async fn scan(
        pool: &SqlitePool,
        now: NaiveDateTime,
        lead: chrono::Duration,
    ) -> AppResult<Vec<Event>> {
        let candidates = EventRepository::find_due_unnotified(pool, now + lead).await?;
        Ok(candidates
            .into_iter()
            .filter(|event| now >= event.start_date - lead)
            .collect())
    }
}

/// One scheduler tick: scan for in-window events and dispatch each of them.
///
/// A dispatch failure for one event is logged and skipped; its flag stays
/// false so it is retried on the next tick. Events whose `start_date` is long
/// past (e.g. the server was down) still qualify; a late reminder is accepted
/// degraded behavior rather than an error. Returns how many reminders were
/// published.
pub async fn run_tick(
    pool: &SqlitePool,
    sink: &dyn NotificationSink,
    now: NaiveDateTime,
    lead: chrono::Duration,
) -> AppResult<usize> {
    let due = ReminderScanner::scan(pool, now, lead).await?;
    let dispatcher = ReminderDispatcher::new(pool, sink);

    let mut published = 0usize;
    for event in &due {
        match dispatcher.dispatch(event).await {
            Ok(true) => published += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(
                    "Failed to dispatch reminder for event {}: {:?}; retrying next tick",
                    event.id,
                    e
                );
            }
        }
    }

    Ok(published)
}

/// Owned handle to the background reminder loop, constructed once at boot.
///
/// The loop is the only writer of `message_status`. Shutdown is cooperative:
/// the broadcast signal stops future ticks but an in-flight tick runs to
/// completion before the task exits.
pub struct ReminderScheduler {
    handle: tokio::task::JoinHandle<()>,
}

impl ReminderScheduler {
    pub fn start(state: Arc<AppState>, mut shutdown: broadcast::Receiver<()>) -> Self {
        let handle = tokio::spawn(async move {
            let tick = Duration::from_secs(state.config.scheduler.tick_interval_seconds);
            let lead = chrono::Duration::minutes(state.config.scheduler.lead_minutes as i64);

            tracing::info!(
                "Reminder scheduler started (tick {}s, lead {}m)",
                tick.as_secs(),
                state.config.scheduler.lead_minutes
            );

            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        tracing::info!("Reminder scheduler shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(tick) => {}
                }

                let now = Utc::now().naive_utc();
                match run_tick(&state.db, state.hub.as_ref(), now, lead).await {
                    Ok(0) => tracing::debug!("Reminder tick: nothing due"),
                    Ok(n) => tracing::info!("Reminder tick published {} reminder(s)", n),
                    // Never fatal: a failed tick (store down, bad row) leaves
                    // flags untouched and the next tick retries.
                    Err(e) => tracing::warn!("Reminder tick failed: {:?}", e),
                }
            }
        });

        Self { handle }
    }

    /// Await the loop after the shutdown signal has been broadcast.
    pub async fn stop(self) {
        if let Err(e) = self.handle.await {
            tracing::warn!("Reminder scheduler task join failed: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, EventInput};
    use crate::services::notifications::test_support::RecordingSink;
    use chrono::Datelike;

    fn input_starting_at(title: &str, start: NaiveDateTime) -> EventInput {
        EventInput {
            title: title.to_string(),
            year: start.year(),
            month: start.month(),
            start_date: start,
            end_date: start + chrono::Duration::minutes(15),
            description: String::new(),
            participants: vec!["a".to_string(), "b".to_string()],
        }
    }

    fn lead() -> chrono::Duration {
        chrono::Duration::hours(1)
    }

    #[tokio::test]
    async fn tick_notifies_event_inside_window() {
        let pool = test_pool().await;
        let sink = RecordingSink::default();
        let now = Utc::now().naive_utc();

        let event = EventRepository::create(
            &pool,
            &input_starting_at("Standup", now + chrono::Duration::minutes(30)),
        )
        .await
        .unwrap();

        let published = run_tick(&pool, &sink, now, lead()).await.unwrap();
        assert_eq!(published, 1);

        let payloads = sink.published.lock().await;
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].event_id, event.id);
        assert!(payloads[0].message.contains("Standup"));

        let stored = EventRepository::get(&pool, event.id).await.unwrap().unwrap();
        assert!(stored.message_status);
    }

    #[tokio::test]
    async fn tick_leaves_far_future_event_alone() {
        let pool = test_pool().await;
        let sink = RecordingSink::default();
        let now = Utc::now().naive_utc();

        let event = EventRepository::create(
            &pool,
            &input_starting_at("Planning", now + chrono::Duration::hours(2)),
        )
        .await
        .unwrap();

        let published = run_tick(&pool, &sink, now, lead()).await.unwrap();
        assert_eq!(published, 0);
        assert!(sink.published.lock().await.is_empty());

        let stored = EventRepository::get(&pool, event.id).await.unwrap().unwrap();
        assert!(!stored.message_status);
    }

    #[tokio::test]
    async fn stale_event_still_gets_one_late_reminder() {
        let pool = test_pool().await;
        let sink = RecordingSink::default();
        let now = Utc::now().naive_utc();

        // Started two days ago and never scanned, e.g. the server was down.
        EventRepository::create(
            &pool,
            &input_starting_at("Missed", now - chrono::Duration::days(2)),
        )
        .await
        .unwrap();

        let published = run_tick(&pool, &sink, now, lead()).await.unwrap();
        assert_eq!(published, 1);
    }

    #[tokio::test]
    async fn consecutive_ticks_are_idempotent() {
        let pool = test_pool().await;
        let sink = RecordingSink::default();
        let now = Utc::now().naive_utc();

        EventRepository::create(
            &pool,
            &input_starting_at("Standup", now + chrono::Duration::minutes(30)),
        )
        .await
        .unwrap();

        assert_eq!(run_tick(&pool, &sink, now, lead()).await.unwrap(), 1);
        assert_eq!(run_tick(&pool, &sink, now, lead()).await.unwrap(), 0);
        assert_eq!(sink.published.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn event_entering_window_on_a_later_tick_is_picked_up() {
        let pool = test_pool().await;
        let sink = RecordingSink::default();
        let now = Utc::now().naive_utc();

        EventRepository::create(
            &pool,
            &input_starting_at("Review", now + chrono::Duration::minutes(90)),
        )
        .await
        .unwrap();

        assert_eq!(run_tick(&pool, &sink, now, lead()).await.unwrap(), 0);

        // Half an hour later the event is 60 minutes out: in window.
        let later = now + chrono::Duration::minutes(30);
        assert_eq!(run_tick(&pool, &sink, later, lead()).await.unwrap(), 1);
    }
}
