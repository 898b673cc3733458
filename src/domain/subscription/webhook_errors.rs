//! Webhook error types for payment-provider webhook handling.
//!
//! Errors before the event is durably recorded decide the HTTP answer the
//! provider sees. Errors after recording are kept on the inbox record and the
//! provider still gets a 200.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Errors that occur during webhook processing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    /// Webhook signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Webhook timestamp is outside the replay window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Signature timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Failed to parse webhook payload or signature header.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Required metadata field missing from the event object.
    #[error("Missing metadata: {0}")]
    MissingMetadata(&'static str),

    /// Required field missing from the event object.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// No local subscription and the event cannot create one.
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    /// Metadata names a plan the catalog does not know.
    #[error("Unknown plan: {0}")]
    UnknownPlan(String),

    /// The user already owns a different live subscription.
    #[error("User already has a live subscription")]
    DuplicateSubscription,

    /// Optimistic-lock retries exhausted for this event.
    #[error("Reconciliation conflict on {external_subscription_id} after {attempts} attempts")]
    ReconciliationConflict {
        external_subscription_id: String,
        attempts: u32,
    },

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),
}

impl WebhookError {
    /// Returns true if the signature check rejected the delivery.
    pub fn is_signature_failure(&self) -> bool {
        matches!(
            self,
            WebhookError::InvalidSignature
                | WebhookError::TimestampOutOfRange
                | WebhookError::InvalidTimestamp
        )
    }

    /// Returns true if a later reprocessing attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::Database(_)
                | WebhookError::SubscriptionNotFound(_) // event may precede its subscription.created
                | WebhookError::ReconciliationConflict { .. }
        )
    }

    /// Stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange
            | WebhookError::InvalidTimestamp => "WEBHOOK_SIGNATURE_INVALID",
            WebhookError::ParseError(_)
            | WebhookError::MissingMetadata(_)
            | WebhookError::MissingField(_) => "VALIDATION_FAILED",
            WebhookError::SubscriptionNotFound(_) => "SUBSCRIPTION_NOT_FOUND",
            WebhookError::UnknownPlan(_) => "PLAN_NOT_FOUND",
            WebhookError::DuplicateSubscription => "DUPLICATE_SUBSCRIPTION",
            WebhookError::ReconciliationConflict { .. } => "RECONCILIATION_CONFLICT",
            WebhookError::Database(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status for errors raised before the event is recorded.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange
            | WebhookError::InvalidTimestamp
            | WebhookError::ParseError(_)
            | WebhookError::MissingMetadata(_)
            | WebhookError::MissingField(_) => StatusCode::BAD_REQUEST,
            // The provider retries on 5xx, which is what we want when the
            // inbox write itself failed.
            WebhookError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::OK,
        }
    }
}

impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::DuplicateSubscription => WebhookError::DuplicateSubscription,
            _ => WebhookError::Database(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_failures_share_one_code() {
        for err in [
            WebhookError::InvalidSignature,
            WebhookError::TimestampOutOfRange,
            WebhookError::InvalidTimestamp,
        ] {
            assert!(err.is_signature_failure());
            assert_eq!(err.code(), "WEBHOOK_SIGNATURE_INVALID");
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn conflict_is_retryable_but_answered_with_ok() {
        let err = WebhookError::ReconciliationConflict {
            external_subscription_id: "sub_1".into(),
            attempts: 3,
        };
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::OK);
        assert_eq!(
            err.to_string(),
            "Reconciliation conflict on sub_1 after 3 attempts"
        );
    }

    #[test]
    fn database_error_asks_provider_to_retry() {
        let err = WebhookError::Database("pool timed out".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_retryable());
    }

    #[test]
    fn malformed_payload_is_bad_request_and_final() {
        let err = WebhookError::ParseError("expected value".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_retryable());
    }
}
