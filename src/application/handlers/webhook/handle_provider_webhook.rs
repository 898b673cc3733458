//! HandleProviderWebhookHandler - Verifies, records and reconciles one
//! provider webhook delivery.
//!
//! Errors returned from `handle` happen before the event is recorded and
//! decide the HTTP answer. Once the inbox holds the event, processing
//! outcomes live on the record and the delivery is acknowledged.

use std::sync::Arc;

use super::reconciler::{EventDisposition, SubscriptionReconciler};
use crate::domain::subscription::{WebhookError, WebhookVerifier};
use crate::ports::{
    Clock, SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookEventStatus,
};

/// Command to handle a provider webhook.
#[derive(Debug, Clone)]
pub struct HandleProviderWebhookCommand {
    /// Raw request body, exactly as signed.
    pub payload: Vec<u8>,
    /// `Payment-Signature` header value.
    pub signature: String,
}

/// Result of an acknowledged delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleProviderWebhookResult {
    pub event_id: String,
    pub status: WebhookEventStatus,
    pub detail: Option<String>,
    /// The event was already in the inbox.
    pub duplicate: bool,
}

pub struct HandleProviderWebhookHandler {
    verifier: WebhookVerifier,
    inbox: Arc<dyn WebhookEventRepository>,
    reconciler: Arc<SubscriptionReconciler>,
    clock: Arc<dyn Clock>,
    max_deliveries: u32,
}

impl HandleProviderWebhookHandler {
    pub fn new(
        verifier: WebhookVerifier,
        inbox: Arc<dyn WebhookEventRepository>,
        reconciler: Arc<SubscriptionReconciler>,
        clock: Arc<dyn Clock>,
        max_deliveries: u32,
    ) -> Self {
        Self {
            verifier,
            inbox,
            reconciler,
            clock,
            max_deliveries,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandleProviderWebhookCommand,
    ) -> Result<HandleProviderWebhookResult, WebhookError> {
        let now = self.clock.now();

        // 1. Verify signature and parse the envelope
        let event = self
            .verifier
            .verify_and_parse_at(&cmd.payload, &cmd.signature, now.as_unix_secs())
            .map_err(|e| {
                if e.is_signature_failure() {
                    tracing::warn!("Webhook signature rejected: {}", e);
                } else {
                    tracing::warn!("Webhook payload rejected: {}", e);
                }
                e
            })?;
        let payload: serde_json::Value = serde_json::from_slice(&cmd.payload)
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        // 2. Record before processing
        let record = WebhookEventRecord::received(
            event.id.clone(),
            event.event_type.clone(),
            event.subscription_ref(),
            payload,
            now,
        );
        let duplicate = match self.inbox.save(record).await? {
            SaveResult::Inserted => false,
            SaveResult::AlreadyExists => {
                let existing = self.inbox.find_by_event_id(&event.id).await?;
                if let Some(existing) = existing {
                    if !existing.is_retryable(self.max_deliveries) {
                        tracing::debug!(
                            event_id = %event.id,
                            status = %existing.status,
                            "Duplicate webhook delivery acknowledged"
                        );
                        return Ok(HandleProviderWebhookResult {
                            event_id: existing.event_id,
                            status: existing.status,
                            detail: existing.error_message,
                            duplicate: true,
                        });
                    }
                }
                true
            }
        };

        // 3. Reconcile and store the outcome
        let EventDisposition { status, detail } = self.reconciler.process(&event).await;
        if let Err(e) = self
            .inbox
            .mark_result(&event.id, status, detail.clone(), self.clock.now())
            .await
        {
            tracing::error!(event_id = %event.id, "Failed to record webhook outcome: {}", e);
        }

        Ok(HandleProviderWebhookResult {
            event_id: event.id,
            status,
            detail,
            duplicate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_support::{Harness, WEBHOOK_SECRET};
    use crate::domain::foundation::Timestamp;
    use crate::domain::subscription::{sign_payload, SubscriptionStatus};
    use crate::ports::SubscriptionRepository;
    use secrecy::SecretString;
    use serde_json::json;

    fn handler(h: &Harness) -> HandleProviderWebhookHandler {
        let reconciler = Arc::new(SubscriptionReconciler::new(
            h.store.clone(),
            h.catalog.clone(),
            h.notifier.clone(),
            5,
        ));
        HandleProviderWebhookHandler::new(
            WebhookVerifier::new(SecretString::new(WEBHOOK_SECRET.to_string())),
            h.inbox.clone(),
            reconciler,
            h.clock.clone(),
            10,
        )
    }

    fn subscription_event(id: &str, event_type: &str, status: &str, at: Timestamp) -> String {
        json!({
            "id": id,
            "type": event_type,
            "created": at.as_unix_secs(),
            "data": {"object": {
                "id": "sub_1",
                "customer": "cus_1",
                "status": status,
                "current_period_end": at.add_days(30).as_unix_secs(),
                "metadata": {"email": "ada@example.com", "plan_id": "premium"}
            }}
        })
        .to_string()
    }

    fn signed(h: &Harness, payload: &str) -> HandleProviderWebhookCommand {
        HandleProviderWebhookCommand {
            payload: payload.as_bytes().to_vec(),
            signature: sign_payload(WEBHOOK_SECRET, h.now().as_unix_secs(), payload),
        }
    }

    #[tokio::test]
    async fn verified_event_is_recorded_and_applied() {
        let h = Harness::new();
        let payload = subscription_event(
            "evt_1",
            "customer.subscription.created",
            "active",
            h.now(),
        );

        let result = handler(&h).handle(signed(&h, &payload)).await.unwrap();

        assert_eq!(result.status, WebhookEventStatus::Applied);
        assert!(!result.duplicate);
        let record = h.inbox.find_by_event_id("evt_1").await.unwrap().unwrap();
        assert_eq!(record.status, WebhookEventStatus::Applied);
        assert_eq!(record.attempts, 1);
        let sub = h
            .store
            .find_subscription_by_external_id("sub_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn tampered_payload_is_rejected_and_not_recorded() {
        let h = Harness::new();
        let payload = subscription_event(
            "evt_1",
            "customer.subscription.created",
            "active",
            h.now(),
        );
        let mut cmd = signed(&h, &payload);
        cmd.payload = payload.replace("premium", "basic").into_bytes();

        let err = handler(&h).handle(cmd).await.unwrap_err();

        assert_eq!(err, WebhookError::InvalidSignature);
        assert!(h.inbox.is_empty().await);
        assert_eq!(h.store.subscription_count().await, 0);
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let h = Harness::new();
        let payload = subscription_event(
            "evt_1",
            "customer.subscription.created",
            "active",
            h.now(),
        );
        let cmd = HandleProviderWebhookCommand {
            payload: payload.as_bytes().to_vec(),
            signature: sign_payload("whsec_other", h.now().as_unix_secs(), &payload),
        };

        assert!(handler(&h).handle(cmd).await.unwrap_err().is_signature_failure());
    }

    #[tokio::test]
    async fn stale_signature_timestamp_is_rejected() {
        let h = Harness::new();
        let payload = subscription_event(
            "evt_1",
            "customer.subscription.created",
            "active",
            h.now(),
        );
        let cmd = signed(&h, &payload);
        h.clock.advance_secs(301);

        assert_eq!(
            handler(&h).handle(cmd).await.unwrap_err(),
            WebhookError::TimestampOutOfRange
        );
    }

    #[tokio::test]
    async fn duplicate_delivery_is_not_reprocessed() {
        let h = Harness::new();
        let handler = handler(&h);
        let payload = subscription_event(
            "evt_1",
            "customer.subscription.created",
            "active",
            h.now(),
        );

        handler.handle(signed(&h, &payload)).await.unwrap();
        let again = handler.handle(signed(&h, &payload)).await.unwrap();

        assert!(again.duplicate);
        assert_eq!(again.status, WebhookEventStatus::Applied);
        let record = h.inbox.find_by_event_id("evt_1").await.unwrap().unwrap();
        assert_eq!(record.attempts, 1);
    }

    #[tokio::test]
    async fn malformed_object_is_recorded_as_failed() {
        let h = Harness::new();
        let payload = json!({
            "id": "evt_bad",
            "type": "customer.subscription.updated",
            "created": h.now().as_unix_secs(),
            "data": {"object": {"unexpected": true}}
        })
        .to_string();

        let result = handler(&h).handle(signed(&h, &payload)).await.unwrap();

        assert_eq!(result.status, WebhookEventStatus::Failed);
        assert!(result.detail.is_some());
    }

    #[tokio::test]
    async fn unhandled_event_type_is_ignored() {
        let h = Harness::new();
        let payload = json!({
            "id": "evt_other",
            "type": "charge.refunded",
            "created": h.now().as_unix_secs(),
            "data": {"object": {}}
        })
        .to_string();

        let result = handler(&h).handle(signed(&h, &payload)).await.unwrap();
        assert_eq!(result.status, WebhookEventStatus::Ignored);
    }

    #[tokio::test]
    async fn out_of_order_deliveries_converge() {
        let h = Harness::new();
        let handler = handler(&h);
        let t0 = h.now();

        let cancelled = subscription_event(
            "evt_2",
            "customer.subscription.deleted",
            "canceled",
            t0.plus_secs(60),
        );
        let created = subscription_event(
            "evt_1",
            "customer.subscription.created",
            "active",
            t0,
        );

        handler.handle(signed(&h, &cancelled)).await.unwrap();
        let late = handler.handle(signed(&h, &created)).await.unwrap();

        assert_eq!(late.status, WebhookEventStatus::Ignored);
        let sub = h
            .store
            .find_subscription_by_external_id("sub_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Cancelled);
    }
}
