//! PostgreSQL event store.
//!
//! Optimistic locking is a conditional insert: the first event of an append
//! is only written when the stream's max version equals the expected version.
//! The `(aggregate_id, version)` primary key rejects any racing transaction
//! that passed the same check, so READ COMMITTED is sufficient.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::EventType;

use super::{EventStore, EventStoreError, NewEvent, StoredEvent};

/// Postgres error code for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Event Store backed by the `events` table
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Create a new PgEventStore with a database pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the first event of an append, guarded by the expected version
    async fn insert_first(
        tx: &mut Transaction<'_, Postgres>,
        aggregate_id: Uuid,
        expected_version: i64,
        event: &NewEvent,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO events (
                aggregate_id, version, aggregate_type,
                event_type, event_data, occurred_at
            )
            SELECT $1, $2, $3, $4, $5, $6
            WHERE (
                SELECT COALESCE(MAX(version), 0) FROM events WHERE aggregate_id = $1
            ) = $7
            "#,
        )
        .bind(aggregate_id)
        .bind(expected_version + 1)
        .bind(event.aggregate_type().as_str())
        .bind(event.event_type.as_str())
        .bind(&event.event_data)
        .bind(event.occurred_at)
        .bind(expected_version)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_next(
        tx: &mut Transaction<'_, Postgres>,
        aggregate_id: Uuid,
        version: i64,
        event: &NewEvent,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO events (
                aggregate_id, version, aggregate_type,
                event_type, event_data, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(aggregate_id)
        .bind(version)
        .bind(event.aggregate_type().as_str())
        .bind(event.event_type.as_str())
        .bind(&event.event_data)
        .bind(event.occurred_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn conflict(&self, aggregate_id: Uuid, expected: i64) -> EventStoreError {
        match self.current_version(aggregate_id).await {
            Ok(actual) => EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual,
            },
            Err(e) => e,
        }
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db_error) => db_error.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn append(
        &self,
        aggregate_id: Uuid,
        events: Vec<NewEvent>,
        expected_version: i64,
    ) -> Result<(), EventStoreError> {
        let Some((first, rest)) = events.split_first() else {
            return Ok(());
        };

        let mut tx = self.pool.begin().await?;

        match Self::insert_first(&mut tx, aggregate_id, expected_version, first).await {
            Ok(1) => {}
            Ok(_) => {
                tx.rollback().await?;
                return Err(self.conflict(aggregate_id, expected_version).await);
            }
            Err(e) if is_unique_violation(&e) => {
                drop(tx);
                return Err(self.conflict(aggregate_id, expected_version).await);
            }
            Err(e) => return Err(e.into()),
        }

        for (offset, event) in rest.iter().enumerate() {
            let version = expected_version + offset as i64 + 2;
            if let Err(e) = Self::insert_next(&mut tx, aggregate_id, version, event).await {
                if is_unique_violation(&e) {
                    drop(tx);
                    return Err(self.conflict(aggregate_id, expected_version).await);
                }
                return Err(e.into());
            }
        }

        tx.commit().await?;

        tracing::debug!(
            aggregate_id = %aggregate_id,
            appended = events.len(),
            version = expected_version + events.len() as i64,
            "Appended events"
        );

        Ok(())
    }

    async fn get_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.get_events_from_version(aggregate_id, 1).await
    }

    async fn get_events_from_version(
        &self,
        aggregate_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let events = sqlx::query_as::<_, StoredEvent>(
            r#"
            SELECT aggregate_id, aggregate_type, version, event_type, event_data, occurred_at
            FROM events
            WHERE aggregate_id = $1 AND version >= $2
            ORDER BY version ASC
            "#,
        )
        .bind(aggregate_id)
        .bind(from_version)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, EventStoreError> {
        let version: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(version), 0) FROM events WHERE aggregate_id = $1
            "#,
        )
        .bind(aggregate_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(version)
    }

    async fn find_aggregate_ids(
        &self,
        event_type: EventType,
        field: &str,
        value: &str,
    ) -> Result<Vec<Uuid>, EventStoreError> {
        tracing::debug!(
            event_type = %event_type,
            field,
            "Scanning event log for aggregate ids"
        );

        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT aggregate_id
            FROM events
            WHERE aggregate_type = $1 AND event_type = $2 AND event_data ->> $3 = $4
            ORDER BY aggregate_id
            "#,
        )
        .bind(event_type.aggregate_type().as_str())
        .bind(event_type.as_str())
        .bind(field)
        .bind(value)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
