//! In-memory webhook inbox.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookEventStatus};

/// Webhook inbox backed by a map keyed on event id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWebhookInbox {
    records: Arc<RwLock<HashMap<String, WebhookEventRecord>>>,
}

impl InMemoryWebhookInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl WebhookEventRepository for InMemoryWebhookInbox {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        Ok(self.records.read().await.get(event_id).cloned())
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.event_id) {
            Ok(SaveResult::AlreadyExists)
        } else {
            records.insert(record.event_id.clone(), record);
            Ok(SaveResult::Inserted)
        }
    }

    async fn mark_result(
        &self,
        event_id: &str,
        status: WebhookEventStatus,
        error_message: Option<String>,
        processed_at: Timestamp,
    ) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(event_id).ok_or_else(|| {
            DomainError::new(ErrorCode::NotFound, format!("webhook event {}", event_id))
        })?;
        record.status = status;
        record.error_message = error_message;
        record.processed_at = Some(processed_at);
        record.attempts += 1;
        Ok(())
    }

    async fn list_retryable(
        &self,
        max_attempts: u32,
        limit: u32,
    ) -> Result<Vec<WebhookEventRecord>, DomainError> {
        let records = self.records.read().await;
        let mut retryable: Vec<WebhookEventRecord> = records
            .values()
            .filter(|r| r.is_retryable(max_attempts))
            .cloned()
            .collect();
        retryable.sort_by_key(|r| r.received_at);
        retryable.truncate(limit as usize);
        Ok(retryable)
    }

    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| !r.received_at.is_before(&timestamp));
        Ok((before - records.len()) as u64)
    }
}
