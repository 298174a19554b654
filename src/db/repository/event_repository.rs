use chrono::NaiveDateTime;
use sqlx::SqlitePool;

use crate::db::models::{Event, EventInput, EventRow};
use crate::error::{AppError, AppResult};

const EVENT_COLUMNS: &str =
    "id, title, year, month, start_date, end_date, description, participants, message_status";

/// Repository for the `events` table.
///
/// The scheduler never holds on to rows between ticks: API requests may delete
/// or replace any row at any time, so every tick goes back through these
/// queries. `mark_notified` is written so that a concurrent delete is a silent
/// no-op rather than an error.
pub struct EventRepository;

impl EventRepository {
    /// Insert a new event with `message_status = false`.
    pub async fn create(pool: &SqlitePool, input: &EventInput) -> AppResult<Event> {
        input.validate()?;
        let participants = input.participants_json()?;

        let row = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            INSERT INTO events (title, year, month, start_date, end_date, description, participants, message_status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {EVENT_COLUMNS}
            "#,
        ))
        .bind(&input.title)
        .bind(input.year as i64)
        .bind(input.month as i64)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(&input.description)
        .bind(participants)
        .bind(false)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        row.into_event()
    }

    /// Full replace of the mutable fields. `message_status` is deliberately
    /// left alone so an update cannot re-arm an already-sent reminder.
    pub async fn update(pool: &SqlitePool, id: i64, input: &EventInput) -> AppResult<Event> {
        input.validate()?;
        let participants = input.participants_json()?;

        let row = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            UPDATE events
            SET title = ?, year = ?, month = ?, start_date = ?, end_date = ?, description = ?, participants = ?
            WHERE id = ?
            RETURNING {EVENT_COLUMNS}
            "#,
        ))
        .bind(&input.title)
        .bind(input.year as i64)
        .bind(input.month as i64)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(&input.description)
        .bind(participants)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        match row {
            Some(row) => row.into_event(),
            None => Err(AppError::NotFound(format!("Event {} not found", id))),
        }
    }

    /// Idempotent delete: removing a missing id is not an error.
    pub async fn delete(pool: &SqlitePool, id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }

    pub async fn get(pool: &SqlitePool, id: i64) -> AppResult<Option<Event>> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        row.map(EventRow::into_event).transpose()
    }

    /// All events in the given year/month, in insertion order.
    pub async fn list_by_period(pool: &SqlitePool, year: i32, month: u32) -> AppResult<Vec<Event>> {
        if !(1..=12).contains(&month) {
            return Err(AppError::Validation(
                "Month must be between 1 and 12".to_string(),
            ));
        }

        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE year = ? AND month = ? ORDER BY id"
        ))
        .bind(year as i64)
        .bind(month as i64)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        rows.into_iter().map(EventRow::into_event).collect()
    }

    /// Broad scan filter: unnotified events starting at or before `horizon`.
    ///
    /// Callers pass `now + lead` as the horizon; the precise in-window gate is
    /// applied by the scanner afterwards, so this set is a superset of what
    /// actually gets notified on a tick.
    pub async fn find_due_unnotified(
        pool: &SqlitePool,
        horizon: NaiveDateTime,
    ) -> AppResult<Vec<Event>> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS} FROM events
            WHERE message_status = 0 AND start_date <= ?
            ORDER BY start_date
            "#
        ))
        .bind(horizon)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        rows.into_iter().map(EventRow::into_event).collect()
    }

    /// Flip `message_status` to true, once. Returns whether this call did the
    /// flip: false when the row is already notified or no longer exists, which
    /// lets a concurrent delete race resolve as a no-op.
    pub async fn mark_notified(pool: &SqlitePool, id: i64) -> AppResult<bool> {
        let result = sqlx::query("UPDATE events SET message_status = 1 WHERE id = ? AND message_status = 0")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
