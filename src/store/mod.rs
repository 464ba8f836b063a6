//! Persistence of events, synthesized details and dated updates.
//!
//! [`EventStore`] is the contract the pipeline needs from the relational store;
//! [`postgres::PgStore`] implements it over `sqlx`.

#[cfg(test)]
pub mod memory;
pub mod postgres;

use crate::error::StoreError;
use crate::models::{EventDetails, EventRecord, EventUpdate};

pub trait EventStore {
    /// Load an event's query and title.
    ///
    /// Fails with [`StoreError::NotFound`] for unknown ids and
    /// [`StoreError::MissingQuery`] when the query is blank.
    async fn fetch_event(&self, event_id: i64) -> Result<EventRecord, StoreError>;

    /// Upsert the details row for `event_id`.
    ///
    /// A new row gets identical `created_at` and `updated_at`; an existing row has
    /// its content replaced and only `updated_at` advanced.
    async fn save_event_details(&self, event_id: i64, details: &EventDetails) -> Result<(), StoreError>;

    /// Touch the parent event's `last_updated`.
    async fn update_event_timestamp(&self, event_id: i64) -> Result<(), StoreError>;

    /// Upsert dated updates, one row per `(event_id, date)`.
    async fn save_event_updates(&self, event_id: i64, updates: &[EventUpdate]) -> Result<(), StoreError>;
}

/// Shared validation for a fetched `events` row.
pub(crate) fn event_record(
    event_id: i64,
    query: Option<String>,
    title: Option<String>,
) -> Result<EventRecord, StoreError> {
    let query = query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or(StoreError::MissingQuery(event_id))?;
    Ok(EventRecord {
        event_id,
        query,
        title: title.unwrap_or_default(),
    })
}
