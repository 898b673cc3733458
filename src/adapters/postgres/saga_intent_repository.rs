//! PostgreSQL implementation of SagaIntentRepository.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::domain::subscription::{IntentKey, SagaIntent};
use crate::ports::SagaIntentRepository;

use super::entitlement_store::PostgresEntitlementStore;
use super::rows::{db_error, SagaIntentRow};

#[async_trait]
impl SagaIntentRepository for PostgresEntitlementStore {
    async fn find_intent(&self, key: &IntentKey) -> Result<Option<SagaIntent>, DomainError> {
        let row: Option<SagaIntentRow> = sqlx::query_as("SELECT * FROM saga_intents WHERE key = $1")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to fetch saga intent", e))?;
        row.map(SagaIntent::try_from).transpose()
    }

    async fn insert_intent_if_absent(
        &self,
        intent: SagaIntent,
    ) -> Result<SagaIntent, DomainError> {
        let row: Option<SagaIntentRow> = sqlx::query_as(
            r#"
            INSERT INTO saga_intents (
                key, email, plan_id, external_customer_id, external_subscription_id,
                client_secret, created_at, expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (key) DO UPDATE SET
                email = EXCLUDED.email,
                plan_id = EXCLUDED.plan_id,
                external_customer_id = EXCLUDED.external_customer_id,
                external_subscription_id = EXCLUDED.external_subscription_id,
                client_secret = EXCLUDED.client_secret,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at
            WHERE saga_intents.expires_at <= EXCLUDED.created_at
            RETURNING *
            "#,
        )
        .bind(intent.key.as_str())
        .bind(intent.email.as_str())
        .bind(intent.plan_id.as_str())
        .bind(&intent.external_customer_id)
        .bind(&intent.external_subscription_id)
        .bind(&intent.client_secret)
        .bind(intent.created_at.as_datetime())
        .bind(intent.expires_at.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to save saga intent", e))?;

        match row {
            Some(row) => row.try_into(),
            // An unexpired intent holds the key.
            None => self.find_intent(&intent.key).await?.ok_or_else(|| {
                DomainError::new(ErrorCode::DatabaseError, "saga intent vanished")
            }),
        }
    }

    async fn find_intent_by_external_subscription(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<SagaIntent>, DomainError> {
        let row: Option<SagaIntentRow> = sqlx::query_as(
            "SELECT * FROM saga_intents WHERE external_subscription_id = $1 LIMIT 1",
        )
        .bind(external_subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to fetch saga intent", e))?;
        row.map(SagaIntent::try_from).transpose()
    }

    async fn delete_expired_intents(&self, now: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM saga_intents WHERE expires_at <= $1")
            .bind(now.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to purge saga intents", e))?;
        Ok(result.rows_affected())
    }
}
