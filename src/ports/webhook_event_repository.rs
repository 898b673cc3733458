//! WebhookEventRepository port - the durable webhook inbox.
//!
//! Every verified provider event is recorded here before it is processed,
//! keyed on the provider's event id. The endpoint acknowledges once the
//! record exists, so a processing failure never makes the provider resend
//! an event we already hold; operators re-run deferred and failed records
//! instead.
//!
//! Providers deliver at least once, so `save` must be insert-if-absent and
//! every consumer must tolerate seeing the same event twice.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{DomainError, Timestamp, ValidationError};

/// Processing state of an inbox record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventStatus {
    /// Stored, not processed yet.
    Received,
    /// Changed local state.
    Applied,
    /// Processed, nothing to change (stale, duplicate, unhandled kind).
    Ignored,
    /// Could not be applied yet, e.g. the subscription is not known locally.
    Deferred,
    /// Processing failed.
    Failed,
}

impl WebhookEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventStatus::Received => "received",
            WebhookEventStatus::Applied => "applied",
            WebhookEventStatus::Ignored => "ignored",
            WebhookEventStatus::Deferred => "deferred",
            WebhookEventStatus::Failed => "failed",
        }
    }

    /// Returns true once the event needs no further processing.
    pub fn is_settled(&self) -> bool {
        matches!(self, WebhookEventStatus::Applied | WebhookEventStatus::Ignored)
    }
}

impl fmt::Display for WebhookEventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookEventStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(WebhookEventStatus::Received),
            "applied" => Ok(WebhookEventStatus::Applied),
            "ignored" => Ok(WebhookEventStatus::Ignored),
            "deferred" => Ok(WebhookEventStatus::Deferred),
            "failed" => Ok(WebhookEventStatus::Failed),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown webhook event status '{}'", other),
            )),
        }
    }
}

/// Record of a received webhook event.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEventRecord {
    /// Provider event ID (evt_xxx format).
    pub event_id: String,

    /// Provider event type (e.g., "customer.subscription.updated").
    pub event_type: String,

    /// External subscription the event targets, when it could be read.
    pub subscription_ref: Option<String>,

    pub received_at: Timestamp,

    /// Last processing attempt.
    pub processed_at: Option<Timestamp>,

    pub status: WebhookEventStatus,

    /// Reason for ignoring, deferring or failing.
    pub error_message: Option<String>,

    /// Number of processing attempts so far.
    pub attempts: u32,

    /// Original event payload for reprocessing and debugging.
    pub payload: serde_json::Value,
}

impl WebhookEventRecord {
    /// Creates a freshly received record.
    pub fn received(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        subscription_ref: Option<String>,
        payload: serde_json::Value,
        received_at: Timestamp,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            subscription_ref,
            received_at,
            processed_at: None,
            status: WebhookEventStatus::Received,
            error_message: None,
            attempts: 0,
            payload,
        }
    }

    /// Returns true if another processing attempt is allowed.
    pub fn is_retryable(&self, max_attempts: u32) -> bool {
        !self.status.is_settled() && self.attempts < max_attempts
    }
}

/// Result of attempting to save a webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// Record was inserted (first time seeing this event).
    Inserted,
    /// Record already exists (duplicate delivery).
    AlreadyExists,
}

/// Port for the webhook inbox.
///
/// Implementations should use database constraints (PRIMARY KEY on event_id)
/// to prevent race conditions during concurrent webhook processing.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Find a previously received event by its provider event ID.
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError>;

    /// Insert-if-absent by event id.
    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError>;

    /// Records the outcome of one processing attempt and bumps `attempts`.
    async fn mark_result(
        &self,
        event_id: &str,
        status: WebhookEventStatus,
        error_message: Option<String>,
        processed_at: Timestamp,
    ) -> Result<(), DomainError>;

    /// Deferred, failed or still-received records below `max_attempts`,
    /// oldest first.
    async fn list_retryable(
        &self,
        max_attempts: u32,
        limit: u32,
    ) -> Result<Vec<WebhookEventRecord>, DomainError>;

    /// Delete records received before the timestamp. Returns the count.
    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError>;
}
