//! Repository for the `events` table.

use sqlx::PgPool;

use accesspulse_core::types::DbId;

use crate::models::event::Event;

/// Column list for `events` queries.
const COLUMNS: &str = "id, event_type, source_entity_type, source_entity_id, payload, created_at";

/// Provides insert/list operations for durable platform events.
pub struct EventRepo;

impl EventRepo {
    /// Insert an event row, returning the generated ID.
    pub async fn insert(
        pool: &PgPool,
        event_type: &str,
        source_entity_type: Option<&str>,
        source_entity_id: Option<DbId>,
        payload: &serde_json::Value,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO events (event_type, source_entity_type, source_entity_id, payload) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(event_type)
        .bind(source_entity_type)
        .bind(source_entity_id)
        .bind(payload)
        .fetch_one(pool)
        .await
    }

    /// Most recent events, newest first.
    pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<Event>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM events ORDER BY created_at DESC LIMIT $1"
        );
        sqlx::query_as::<_, Event>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
