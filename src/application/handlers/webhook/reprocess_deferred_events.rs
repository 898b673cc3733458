//! ReprocessDeferredEventsHandler - Re-runs inbox records that did not settle.
//!
//! Deferred events usually arrived before anything that could create their
//! subscription; once that has happened, a re-run applies them normally.

use std::sync::Arc;

use super::reconciler::{EventDisposition, SubscriptionReconciler};
use crate::domain::foundation::DomainError;
use crate::domain::subscription::ProviderEvent;
use crate::ports::{Clock, WebhookEventRepository, WebhookEventStatus};

/// Counts per final status of one reprocessing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReprocessSummary {
    pub examined: usize,
    pub applied: usize,
    pub ignored: usize,
    pub deferred: usize,
    pub failed: usize,
}

impl ReprocessSummary {
    fn count(&mut self, status: WebhookEventStatus) {
        match status {
            WebhookEventStatus::Applied => self.applied += 1,
            WebhookEventStatus::Ignored => self.ignored += 1,
            WebhookEventStatus::Deferred | WebhookEventStatus::Received => self.deferred += 1,
            WebhookEventStatus::Failed => self.failed += 1,
        }
    }
}

pub struct ReprocessDeferredEventsHandler {
    inbox: Arc<dyn WebhookEventRepository>,
    reconciler: Arc<SubscriptionReconciler>,
    clock: Arc<dyn Clock>,
    max_deliveries: u32,
}

impl ReprocessDeferredEventsHandler {
    pub fn new(
        inbox: Arc<dyn WebhookEventRepository>,
        reconciler: Arc<SubscriptionReconciler>,
        clock: Arc<dyn Clock>,
        max_deliveries: u32,
    ) -> Self {
        Self {
            inbox,
            reconciler,
            clock,
            max_deliveries,
        }
    }

    /// Re-runs up to `limit` unsettled records, oldest first.
    pub async fn handle(&self, limit: u32) -> Result<ReprocessSummary, DomainError> {
        let records = self
            .inbox
            .list_retryable(self.max_deliveries, limit)
            .await?;
        let mut summary = ReprocessSummary::default();

        for record in records {
            summary.examined += 1;
            let disposition = match serde_json::from_value::<ProviderEvent>(record.payload.clone()) {
                Ok(event) => self.reconciler.process(&event).await,
                Err(e) => EventDisposition {
                    status: WebhookEventStatus::Failed,
                    detail: Some(format!("stored payload unreadable: {}", e)),
                },
            };
            summary.count(disposition.status);
            self.inbox
                .mark_result(
                    &record.event_id,
                    disposition.status,
                    disposition.detail,
                    self.clock.now(),
                )
                .await?;
        }

        tracing::info!(
            examined = summary.examined,
            applied = summary.applied,
            deferred = summary.deferred,
            failed = summary.failed,
            "Webhook reprocessing pass finished"
        );
        Ok(summary)
    }
}
