use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{AppError, AppResult};

/// A calendar event row as stored in SQLite.
///
/// `participants` is kept as the raw JSON string written at insert time and is
/// only deserialized at the read boundary (see [`EventRow::into_event`]).
/// `year`/`month` are denormalized from `start_date` and serve as the coarse
/// query key for period listings.
#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub id: i64,
    pub title: String,
    pub year: i64,
    pub month: i64,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub description: String,
    pub participants: String,
    pub message_status: bool,
}

/// A calendar event as exposed over the API, with participants materialized
/// as a native list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub year: i32,
    pub month: u32,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub description: String,
    pub participants: Vec<String>,
    /// False at creation; flipped to true exactly once when the one-hour
    /// reminder has been dispatched. Never reset.
    pub message_status: bool,
}

impl EventRow {
    pub fn into_event(self) -> AppResult<Event> {
        let participants: Vec<String> = serde_json::from_str(&self.participants)?;
        Ok(Event {
            id: self.id,
            title: self.title,
            year: self.year as i32,
            month: self.month as u32,
            start_date: self.start_date,
            end_date: self.end_date,
            description: self.description,
            participants,
            message_status: self.message_status,
        })
    }
}

/// Client-supplied fields for creating or fully replacing an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventInput {
    pub title: String,
    pub year: i32,
    pub month: u32,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub description: String,
    pub participants: Vec<String>,
}

impl EventInput {
    /// Check the write-side invariants: month range, date ordering, and the
    /// denormalized year/month matching `start_date`.
    pub fn validate(&self) -> AppResult<()> {
        if !(1..=12).contains(&self.month) {
            return Err(AppError::Validation(
                "Month must be between 1 and 12".to_string(),
            ));
        }
        if self.start_date > self.end_date {
            return Err(AppError::Validation(
                "start_date must not be after end_date".to_string(),
            ));
        }
        if self.year != self.start_date.year() || self.month != self.start_date.month() {
            return Err(AppError::Validation(
                "year and month must match start_date".to_string(),
            ));
        }
        Ok(())
    }

    pub fn participants_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string(&self.participants)?)
    }
}
