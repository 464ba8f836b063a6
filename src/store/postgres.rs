//! Postgres-backed [`EventStore`].

use super::{EventStore, event_record};
use crate::error::StoreError;
use crate::models::{EventDetails, EventRecord, EventUpdate};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use std::time::Duration;
use tracing::{debug, info, instrument};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a small pool to `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    #[instrument(level = "info", skip(self))]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        MIGRATOR.run(&self.pool).await?;
        info!("Migrations applied");
        Ok(())
    }
}

impl EventStore for PgStore {
    #[instrument(level = "info", skip(self))]
    async fn fetch_event(&self, event_id: i64) -> Result<EventRecord, StoreError> {
        let row: Option<(Option<String>, Option<String>)> =
            sqlx::query_as("SELECT query, title FROM events WHERE event_id = $1")
                .bind(event_id)
                .fetch_optional(&self.pool)
                .await?;

        let (query, title) = row.ok_or(StoreError::NotFound(event_id))?;
        event_record(event_id, query, title)
    }

    /// Single-statement upsert; a conflicting row keeps its `created_at`.
    #[instrument(level = "info", skip(self, details))]
    async fn save_event_details(&self, event_id: i64, details: &EventDetails) -> Result<(), StoreError> {
        let now: DateTime<Utc> = Utc::now();
        let inserted: bool = sqlx::query_scalar(
            "INSERT INTO event_details \
                 (event_id, location, details, accused, victims, timeline, sources, images, \
                  created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9) \
             ON CONFLICT (event_id) DO UPDATE SET \
                 location = EXCLUDED.location, \
                 details = EXCLUDED.details, \
                 accused = EXCLUDED.accused, \
                 victims = EXCLUDED.victims, \
                 timeline = EXCLUDED.timeline, \
                 sources = EXCLUDED.sources, \
                 images = EXCLUDED.images, \
                 updated_at = EXCLUDED.updated_at \
             RETURNING (xmax = 0)",
        )
        .bind(event_id)
        .bind(&details.location)
        .bind(&details.details)
        .bind(Json(&details.accused))
        .bind(Json(&details.victims))
        .bind(Json(&details.timeline))
        .bind(Json(&details.sources))
        .bind(Json(&details.images))
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        debug!(inserted, "Saved event details");
        Ok(())
    }

    #[instrument(level = "info", skip(self))]
    async fn update_event_timestamp(&self, event_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE events SET last_updated = $2 WHERE event_id = $1")
            .bind(event_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(event_id));
        }
        Ok(())
    }

    #[instrument(level = "info", skip(self, updates), fields(count = updates.len()))]
    async fn save_event_updates(&self, event_id: i64, updates: &[EventUpdate]) -> Result<(), StoreError> {
        // All or nothing: a failed row rolls back the batch.
        let mut tx = self.pool.begin().await?;
        for update in updates {
            sqlx::query(
                "INSERT INTO event_updates (event_id, date, title, description) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (event_id, date) \
                 DO UPDATE SET title = EXCLUDED.title, description = EXCLUDED.description",
            )
            .bind(event_id)
            .bind(&update.date)
            .bind(&update.title)
            .bind(&update.description)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
