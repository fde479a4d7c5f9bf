use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventStoreError, Result, Version,
    store::{EventStore, validate_append},
};

const UNIQUE_SEQUENCE_CONSTRAINT: &str = "unique_aggregate_sequence";

/// PostgreSQL-backed event store.
///
/// The unique `(aggregate_id, sequence)` constraint is the final arbiter of
/// optimistic concurrency: two transactions that both pass the version check
/// cannot both insert the same sequence number.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and returns a store over a fresh pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;
        let sequence: i64 = row.try_get("sequence")?;

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            sequence: sequence as u64,
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
            metadata,
        })
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    #[tracing::instrument(skip(self, events), fields(count = events.len()))]
    async fn append(
        &self,
        aggregate_id: AggregateId,
        expected_version: Version,
        events: Vec<EventEnvelope>,
    ) -> Result<Version> {
        validate_append(aggregate_id, expected_version, &events)?;

        let mut tx = self.pool.begin().await?;

        let stored: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&mut *tx)
                .await?;
        let actual = Version::new(stored as u64);

        if actual != expected_version {
            metrics::counter!("event_store_concurrency_conflicts").increment(1);
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        let mut version = expected_version;
        for event in &events {
            let metadata_json = serde_json::to_value(&event.metadata)?;

            let inserted = sqlx::query(
                r#"
                INSERT INTO events (id, event_type, aggregate_id, aggregate_type, sequence, timestamp, payload, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(event.event_id.as_uuid())
            .bind(&event.event_type)
            .bind(event.aggregate_id.as_uuid())
            .bind(&event.aggregate_type)
            .bind(event.sequence as i64)
            .bind(event.timestamp)
            .bind(&event.payload)
            .bind(metadata_json)
            .execute(&mut *tx)
            .await;

            if let Err(e) = inserted {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some(UNIQUE_SEQUENCE_CONSTRAINT)
                {
                    // A concurrent writer got this sequence first; report what it stored.
                    tx.rollback().await?;
                    let actual = self.current_version(aggregate_id).await?;
                    metrics::counter!("event_store_concurrency_conflicts").increment(1);
                    tracing::warn!(%actual, "sequence taken by a concurrent append");
                    return Err(EventStoreError::ConcurrencyConflict {
                        aggregate_id,
                        expected: expected_version,
                        actual,
                    });
                }
                return Err(EventStoreError::Database(e));
            }

            version = event.resulting_version();
        }

        tx.commit().await?;
        metrics::counter!("event_store_events_appended").increment(events.len() as u64);
        Ok(version)
    }

    async fn load_events(&self, aggregate_id: AggregateId) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, aggregate_id, aggregate_type, sequence, timestamp, payload, metadata
            FROM events
            WHERE aggregate_id = $1
            ORDER BY sequence ASC
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn current_version(&self, aggregate_id: AggregateId) -> Result<Version> {
        let stored: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(Version::new(stored as u64))
    }

    async fn load_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, aggregate_id, aggregate_type, sequence, timestamp, payload, metadata
            FROM events
            WHERE event_type = $1
            ORDER BY timestamp ASC, sequence ASC
            "#,
        )
        .bind(event_type)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }
}
