//! PostgreSQL-backed [`NotificationStore`] and [`EvaluationStore`].
//!
//! Reads are batched with `incident_key = ANY($1)`; writes are single
//! atomic upserts, so concurrent workers never produce duplicate rows.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::config::PostgresConfig;
use relay_core::traits::{EvaluationStore, NotificationStore};
use relay_core::{
    ConclusionAssessment, Delivery, DescriptionAssessment, Evaluation, EvaluationRecord,
    NotificationRecord, RecordKey, SyncError,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::error::StoreError;

// ── Rows ─────────────────────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    incident_key: String,
    assignee: String,
    channel_id: String,
    message_id: String,
    created_at: DateTime<Utc>,
    last_notification: DateTime<Utc>,
}

impl From<NotificationRow> for NotificationRecord {
    fn from(row: NotificationRow) -> Self {
        Self {
            incident_key: row.incident_key,
            assignee: row.assignee,
            channel_id: row.channel_id,
            message_id: row.message_id,
            created_at: row.created_at,
            last_notification: row.last_notification,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EvaluationRow {
    incident_key: String,
    source_updated_at: DateTime<Utc>,
    description_result: Json<DescriptionAssessment>,
    conclusion_result: Option<Json<ConclusionAssessment>>,
    evaluated_at: DateTime<Utc>,
}

impl From<EvaluationRow> for EvaluationRecord {
    fn from(row: EvaluationRow) -> Self {
        Self {
            incident_key: row.incident_key,
            source_updated_at: row.source_updated_at,
            evaluation: Evaluation {
                description: row.description_result.0,
                conclusion: row.conclusion_result.map(|c| c.0),
            },
            evaluated_at: row.evaluated_at,
        }
    }
}

const NOTIFICATION_COLUMNS: &str =
    "incident_key, assignee, channel_id, message_id, created_at, last_notification";

// ── Store ────────────────────────────────────────────────────────────

/// Notification and evaluation records in PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and apply pending migrations. Either failure is fatal to the
    /// caller.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        if !config.is_configured() {
            return Err(StoreError::NotConfigured("PG_USERNAME not set".into()));
        }
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string())
            .await?;
        info!(host = %config.host, database = %config.database, "PostgreSQL connected");

        sqlx::migrate!("../../migrations").run(&pool).await?;
        info!("database migrations applied");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn fetch_notifications(
        &self,
        keys: &[String],
    ) -> Result<Vec<NotificationRecord>, StoreError> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notification_records WHERE incident_key = ANY($1)"
        ))
        .bind(keys)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(NotificationRecord::from).collect())
    }

    pub async fn record_delivery(&self, delivery: &Delivery) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO notification_records
                 (incident_key, assignee, channel_id, message_id, created_at, last_notification)
             VALUES ($1, $2, $3, $4, now(), now())
             ON CONFLICT (incident_key, assignee) DO UPDATE SET
                 channel_id = EXCLUDED.channel_id,
                 message_id = EXCLUDED.message_id,
                 last_notification = now()",
        )
        .bind(&delivery.incident_key)
        .bind(&delivery.assignee)
        .bind(&delivery.channel_id)
        .bind(&delivery.message_id)
        .execute(&self.pool)
        .await?;
        debug!(record = %delivery.key(), message_id = %delivery.message_id, "notification record upserted");
        Ok(())
    }

    pub async fn remove_notification(&self, key: &RecordKey) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM notification_records WHERE incident_key = $1 AND assignee = $2")
                .bind(&key.incident_key)
                .bind(&key.assignee)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn all_notifications(&self) -> Result<Vec<NotificationRecord>, StoreError> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notification_records ORDER BY incident_key, assignee"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(NotificationRecord::from).collect())
    }

    pub async fn fetch_evaluations(
        &self,
        keys: &[String],
    ) -> Result<Vec<EvaluationRecord>, StoreError> {
        let rows = sqlx::query_as::<_, EvaluationRow>(
            "SELECT incident_key, source_updated_at, description_result, conclusion_result, evaluated_at
             FROM evaluation_records WHERE incident_key = ANY($1)",
        )
        .bind(keys)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(EvaluationRecord::from).collect())
    }

    pub async fn record_evaluation(&self, record: &EvaluationRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO evaluation_records
                 (incident_key, source_updated_at, description_result, conclusion_result, evaluated_at)
             VALUES ($1, $2, $3, $4, now())
             ON CONFLICT (incident_key) DO UPDATE SET
                 source_updated_at = EXCLUDED.source_updated_at,
                 description_result = EXCLUDED.description_result,
                 conclusion_result = EXCLUDED.conclusion_result,
                 evaluated_at = now()",
        )
        .bind(&record.incident_key)
        .bind(record.source_updated_at)
        .bind(Json(&record.evaluation.description))
        .bind(record.evaluation.conclusion.as_ref().map(Json))
        .execute(&self.pool)
        .await?;
        debug!(incident = %record.incident_key, "evaluation record upserted");
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn load_notifications(
        &self,
        keys: &[String],
    ) -> Result<HashMap<RecordKey, NotificationRecord>, SyncError> {
        let records = self.fetch_notifications(keys).await?;
        Ok(records.into_iter().map(|r| (r.key(), r)).collect())
    }

    async fn upsert_notification(&self, delivery: &Delivery) -> Result<(), SyncError> {
        Ok(self.record_delivery(delivery).await?)
    }

    async fn delete_notification(&self, key: &RecordKey) -> Result<bool, SyncError> {
        Ok(self.remove_notification(key).await?)
    }

    async fn list_notifications(&self) -> Result<Vec<NotificationRecord>, SyncError> {
        Ok(self.all_notifications().await?)
    }
}

#[async_trait]
impl EvaluationStore for PgStore {
    async fn load_evaluations(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, EvaluationRecord>, SyncError> {
        let records = self.fetch_evaluations(keys).await?;
        Ok(records
            .into_iter()
            .map(|r| (r.incident_key.clone(), r))
            .collect())
    }

    async fn upsert_evaluation(&self, record: &EvaluationRecord) -> Result<(), SyncError> {
        Ok(self.record_evaluation(record).await?)
    }
}
