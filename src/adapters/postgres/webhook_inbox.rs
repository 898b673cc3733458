//! PostgreSQL webhook inbox.
//!
//! The primary key on `event_id` makes `save` insert-if-absent even when
//! the provider delivers the same event to two workers at once.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookEventStatus};

use super::rows::{db_error, WebhookEventRow};

pub struct PostgresWebhookInbox {
    pool: PgPool,
}

impl PostgresWebhookInbox {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookEventRepository for PostgresWebhookInbox {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        let row: Option<WebhookEventRow> =
            sqlx::query_as("SELECT * FROM webhook_events WHERE event_id = $1")
                .bind(event_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to fetch webhook event", e))?;
        row.map(WebhookEventRecord::try_from).transpose()
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_events (
                event_id, event_type, subscription_ref, received_at, processed_at,
                status, error_message, attempts, payload
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(&record.event_id)
        .bind(&record.event_type)
        .bind(&record.subscription_ref)
        .bind(record.received_at.as_datetime())
        .bind(record.processed_at.map(|t| *t.as_datetime()))
        .bind(record.status.as_str())
        .bind(&record.error_message)
        .bind(record.attempts as i32)
        .bind(&record.payload)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to save webhook event", e))?;

        if result.rows_affected() == 1 {
            Ok(SaveResult::Inserted)
        } else {
            Ok(SaveResult::AlreadyExists)
        }
    }

    async fn mark_result(
        &self,
        event_id: &str,
        status: WebhookEventStatus,
        error_message: Option<String>,
        processed_at: Timestamp,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_events SET
                status = $2,
                error_message = $3,
                processed_at = $4,
                attempts = attempts + 1
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .bind(status.as_str())
        .bind(error_message)
        .bind(processed_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update webhook event", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::NotFound,
                format!("webhook event {}", event_id),
            ));
        }
        Ok(())
    }

    async fn list_retryable(
        &self,
        max_attempts: u32,
        limit: u32,
    ) -> Result<Vec<WebhookEventRecord>, DomainError> {
        let rows: Vec<WebhookEventRow> = sqlx::query_as(
            r#"
            SELECT * FROM webhook_events
            WHERE status IN ('received', 'deferred', 'failed') AND attempts < $1
            ORDER BY received_at
            LIMIT $2
            "#,
        )
        .bind(max_attempts as i32)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list retryable webhook events", e))?;
        rows.into_iter().map(WebhookEventRecord::try_from).collect()
    }

    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM webhook_events WHERE received_at < $1")
            .bind(timestamp.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete webhook events", e))?;
        Ok(result.rows_affected())
    }
}
