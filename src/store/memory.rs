//! In-memory [`EventStore`] for tests.

use super::{EventStore, event_record};
use crate::error::StoreError;
use crate::models::{EventDetails, EventRecord, EventUpdate};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone)]
pub struct StoredDetails {
    pub details: EventDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    events: Mutex<HashMap<i64, (Option<String>, Option<String>)>>,
    details: Mutex<HashMap<i64, StoredDetails>>,
    last_updated: Mutex<HashMap<i64, DateTime<Utc>>>,
    updates: Mutex<HashMap<(i64, String), EventUpdate>>,
    fail_timestamps: AtomicBool,
}

impl MemoryStore {
    pub fn with_event(self, event_id: i64, query: &str, title: &str) -> Self {
        self.events
            .lock()
            .unwrap()
            .insert(event_id, (Some(query.to_string()), Some(title.to_string())));
        self
    }

    pub fn details(&self, event_id: i64) -> Option<StoredDetails> {
        self.details.lock().unwrap().get(&event_id).cloned()
    }

    pub fn last_updated(&self, event_id: i64) -> Option<DateTime<Utc>> {
        self.last_updated.lock().unwrap().get(&event_id).copied()
    }

    pub fn updates(&self, event_id: i64) -> Vec<EventUpdate> {
        let mut updates: Vec<_> = self
            .updates
            .lock()
            .unwrap()
            .iter()
            .filter(|((id, _), _)| *id == event_id)
            .map(|(_, u)| u.clone())
            .collect();
        updates.sort_by(|a, b| a.date.cmp(&b.date));
        updates
    }

    /// Make every timestamp touch fail as if the row had vanished.
    pub fn failing_timestamps(self) -> Self {
        self.fail_timestamps.store(true, Ordering::SeqCst);
        self
    }
}

impl EventStore for MemoryStore {
    async fn fetch_event(&self, event_id: i64) -> Result<EventRecord, StoreError> {
        let row = self.events.lock().unwrap().get(&event_id).cloned();
        let (query, title) = row.ok_or(StoreError::NotFound(event_id))?;
        event_record(event_id, query, title)
    }

    async fn save_event_details(&self, event_id: i64, details: &EventDetails) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut rows = self.details.lock().unwrap();
        match rows.get_mut(&event_id) {
            Some(row) => {
                row.details = details.clone();
                row.updated_at = now;
            }
            None => {
                rows.insert(
                    event_id,
                    StoredDetails {
                        details: details.clone(),
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
        }
        Ok(())
    }

    async fn update_event_timestamp(&self, event_id: i64) -> Result<(), StoreError> {
        if self.fail_timestamps.load(Ordering::SeqCst)
            || !self.events.lock().unwrap().contains_key(&event_id)
        {
            return Err(StoreError::NotFound(event_id));
        }
        self.last_updated.lock().unwrap().insert(event_id, Utc::now());
        Ok(())
    }

    async fn save_event_updates(&self, event_id: i64, updates: &[EventUpdate]) -> Result<(), StoreError> {
        let mut rows = self.updates.lock().unwrap();
        for update in updates {
            rows.insert((event_id, update.date.clone()), update.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn details(location: &str) -> EventDetails {
        EventDetails {
            location: location.to_string(),
            ..EventDetails::default()
        }
    }

    #[tokio::test]
    async fn test_first_save_inserts_with_equal_timestamps() {
        let store = MemoryStore::default().with_event(1, "q", "t");
        store.save_event_details(1, &details("Detroit")).await.unwrap();
        let row = store.details(1).unwrap();
        assert_eq!(row.created_at, row.updated_at);
        assert_eq!(row.details.location, "Detroit");
    }

    #[tokio::test]
    async fn test_repeat_save_updates_content_and_advances_updated_at() {
        let store = MemoryStore::default().with_event(1, "q", "t");
        store.save_event_details(1, &details("Detroit")).await.unwrap();
        let first = store.details(1).unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        store.save_event_details(1, &details("Dearborn")).await.unwrap();
        let second = store.details(1).unwrap();

        assert_eq!(second.details.location, "Dearborn");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
    }

    #[tokio::test]
    async fn test_fetch_unknown_event() {
        let store = MemoryStore::default();
        assert!(matches!(store.fetch_event(9).await, Err(StoreError::NotFound(9))));
    }

    #[tokio::test]
    async fn test_updates_upsert_per_date() {
        let store = MemoryStore::default().with_event(1, "q", "t");
        let update = |date: &str, title: &str| EventUpdate {
            date: date.into(),
            title: title.into(),
            description: String::new(),
        };
        store.save_event_updates(1, &[update("2024-01-01", "a")]).await.unwrap();
        store
            .save_event_updates(1, &[update("2024-01-01", "b"), update("2024-02-01", "c")])
            .await
            .unwrap();
        let updates = store.updates(1);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].title, "b");
    }
}
