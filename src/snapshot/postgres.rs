//! PostgreSQL snapshot store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::AggregateType;
use crate::event_store::EventStoreError;

use super::{Snapshot, SnapshotStore};

/// Snapshot store backed by the `snapshots` table
#[derive(Debug, Clone)]
pub struct PgSnapshotStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    aggregate_id: Uuid,
    aggregate_type: String,
    version: i64,
    data: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<SnapshotRow> for Snapshot {
    type Error = EventStoreError;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        let aggregate_type =
            row.aggregate_type
                .parse()
                .map_err(|_| EventStoreError::InvalidSnapshot {
                    aggregate_id: row.aggregate_id,
                    reason: format!("unknown aggregate type {}", row.aggregate_type),
                })?;

        Ok(Snapshot {
            aggregate_id: row.aggregate_id,
            aggregate_type,
            version: row.version,
            data: row.data,
            created_at: row.created_at,
        })
    }
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn save(&self, snapshot: Snapshot) -> Result<(), EventStoreError> {
        sqlx::query(
            r#"
            INSERT INTO snapshots (aggregate_id, aggregate_type, version, data, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (aggregate_id, aggregate_type, version)
            DO UPDATE SET data = EXCLUDED.data, created_at = EXCLUDED.created_at
            "#,
        )
        .bind(snapshot.aggregate_id)
        .bind(snapshot.aggregate_type.as_str())
        .bind(snapshot.version)
        .bind(&snapshot.data)
        .bind(snapshot.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_latest(
        &self,
        aggregate_id: Uuid,
        aggregate_type: AggregateType,
    ) -> Result<Option<Snapshot>, EventStoreError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT aggregate_id, aggregate_type, version, data, created_at
            FROM snapshots
            WHERE aggregate_id = $1 AND aggregate_type = $2
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(aggregate_id)
        .bind(aggregate_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Snapshot::try_from).transpose()
    }

    async fn load_by_version(
        &self,
        aggregate_id: Uuid,
        aggregate_type: AggregateType,
        version: i64,
    ) -> Result<Option<Snapshot>, EventStoreError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT aggregate_id, aggregate_type, version, data, created_at
            FROM snapshots
            WHERE aggregate_id = $1 AND aggregate_type = $2 AND version = $3
            "#,
        )
        .bind(aggregate_id)
        .bind(aggregate_type.as_str())
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Snapshot::try_from).transpose()
    }

    async fn exists(
        &self,
        aggregate_id: Uuid,
        aggregate_type: AggregateType,
    ) -> Result<bool, EventStoreError> {
        Ok(self
            .get_latest_version(aggregate_id, aggregate_type)
            .await?
            .is_some())
    }

    async fn get_latest_version(
        &self,
        aggregate_id: Uuid,
        aggregate_type: AggregateType,
    ) -> Result<Option<i64>, EventStoreError> {
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(version) FROM snapshots
            WHERE aggregate_id = $1 AND aggregate_type = $2
            "#,
        )
        .bind(aggregate_id)
        .bind(aggregate_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(version)
    }

    async fn remove_all(
        &self,
        aggregate_id: Uuid,
        aggregate_type: AggregateType,
    ) -> Result<u64, EventStoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM snapshots WHERE aggregate_id = $1 AND aggregate_type = $2
            "#,
        )
        .bind(aggregate_id)
        .bind(aggregate_type.as_str())
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            aggregate_id = %aggregate_id,
            aggregate_type = %aggregate_type,
            removed = result.rows_affected(),
            "Removed snapshots"
        );

        Ok(result.rows_affected())
    }
}
