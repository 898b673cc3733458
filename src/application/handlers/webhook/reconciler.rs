//! SubscriptionReconciler - Folds provider events into subscription rows.
//!
//! Each change is a read-decide-CAS loop bounded by `max_attempts`. Unknown
//! subscriptions are materialized from event metadata, falling back to the
//! saga intent for the same provider subscription; with neither, the event
//! is deferred until something that can create the row arrives.

use std::sync::Arc;

use crate::domain::account::{Email, User};
use crate::domain::foundation::{PlanId, UserId};
use crate::domain::subscription::{
    decide, Decision, IgnoreReason, NewSubscription, ProviderEvent, Subscription,
    SubscriptionChange, SubscriptionStatus, WebhookError,
};
use crate::ports::{
    CasOutcome, EntitlementStore, MaterializeOutcome, Notification, Notifier, PlanCatalog,
    WebhookEventStatus,
};

/// What reconciling one change did.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// First sighting of the subscription; a row was created.
    Created(Subscription),
    /// A transition was written.
    Applied {
        subscription: Subscription,
        revoked_licenses: u64,
    },
    /// Nothing to do: stale, duplicate or not a valid transition.
    Ignored(String),
    /// Not enough information to create the row yet.
    Deferred(String),
}

impl ReconcileOutcome {
    pub fn status(&self) -> WebhookEventStatus {
        match self {
            ReconcileOutcome::Created(_) | ReconcileOutcome::Applied { .. } => {
                WebhookEventStatus::Applied
            }
            ReconcileOutcome::Ignored(_) => WebhookEventStatus::Ignored,
            ReconcileOutcome::Deferred(_) => WebhookEventStatus::Deferred,
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            ReconcileOutcome::Ignored(reason) | ReconcileOutcome::Deferred(reason) => {
                Some(reason.clone())
            }
            _ => None,
        }
    }
}

/// Final state of one processing attempt, as stored on the inbox record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDisposition {
    pub status: WebhookEventStatus,
    pub detail: Option<String>,
}

pub struct SubscriptionReconciler {
    store: Arc<dyn EntitlementStore>,
    catalog: Arc<dyn PlanCatalog>,
    notifier: Arc<dyn Notifier>,
    max_attempts: u32,
}

impl SubscriptionReconciler {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        catalog: Arc<dyn PlanCatalog>,
        notifier: Arc<dyn Notifier>,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            catalog,
            notifier,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Decodes and reconciles a verified event. Never fails: errors are
    /// folded into the disposition so one bad event cannot affect others.
    pub async fn process(&self, event: &ProviderEvent) -> EventDisposition {
        let change = match event.to_change() {
            Ok(Some(change)) => change,
            Ok(None) => {
                return EventDisposition {
                    status: WebhookEventStatus::Ignored,
                    detail: Some(format!("unhandled event type {}", event.event_type)),
                }
            }
            Err(e) => {
                tracing::warn!(event_id = %event.id, "Malformed webhook event: {}", e);
                return EventDisposition {
                    status: WebhookEventStatus::Failed,
                    detail: Some(e.to_string()),
                };
            }
        };

        match self.reconcile(&change).await {
            Ok(outcome) => {
                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    subscription_id = %change.external_subscription_id,
                    status = %outcome.status(),
                    "Webhook event reconciled"
                );
                EventDisposition {
                    status: outcome.status(),
                    detail: outcome.detail(),
                }
            }
            Err(e) => {
                if matches!(e, WebhookError::ReconciliationConflict { .. }) {
                    tracing::error!(event_id = %event.id, "Webhook reconciliation gave up: {}", e);
                } else {
                    tracing::warn!(event_id = %event.id, "Webhook reconciliation failed: {}", e);
                }
                EventDisposition {
                    status: WebhookEventStatus::Failed,
                    detail: Some(e.to_string()),
                }
            }
        }
    }

    /// Applies one change with last-writer-wins ordering.
    pub async fn reconcile(
        &self,
        change: &SubscriptionChange,
    ) -> Result<ReconcileOutcome, WebhookError> {
        let external_id = change.external_subscription_id.as_str();

        for attempt in 1..=self.max_attempts {
            let Some(current) = self.store.find_subscription_by_external_id(external_id).await?
            else {
                match self.materialize(change).await? {
                    Some(outcome) => return Ok(outcome),
                    // lost the insert race; apply on top of the winner
                    None => continue,
                }
            };

            let transition = match decide(&current, change) {
                Decision::Ignore(reason) => {
                    tracing::debug!(
                        subscription_id = external_id,
                        "Ignoring webhook change: {}",
                        reason.describe()
                    );
                    return Ok(ReconcileOutcome::Ignored(reason.describe()));
                }
                Decision::Apply(transition) => transition,
            };

            let current_revision = self
                .catalog
                .find(&current.plan_id)
                .map(|plan| plan.current_terms().revision)
                .unwrap_or(current.plan_revision);
            let mut next = current.clone();
            let revokes = match next.apply_transition(transition, change.occurred_at, current_revision)
            {
                Ok(revokes) => revokes,
                Err(e) => return Ok(ReconcileOutcome::Ignored(e.message())),
            };

            // A lapse and its license revocation commit together.
            let (outcome, revoked_licenses) = if revokes {
                self.store
                    .compare_and_set_revoking_licenses(&next, current.version)
                    .await?
            } else {
                let outcome = self
                    .store
                    .compare_and_set_subscription(&next, current.version)
                    .await?;
                (outcome, 0)
            };

            match outcome {
                CasOutcome::Applied(stored) => {
                    self.after_transition(&current, &stored, revokes, revoked_licenses)
                        .await?;
                    return Ok(ReconcileOutcome::Applied {
                        subscription: stored,
                        revoked_licenses,
                    });
                }
                CasOutcome::Conflict => {
                    tracing::debug!(
                        subscription_id = external_id,
                        attempt,
                        "Subscription version moved, retrying"
                    );
                }
            }
        }

        Err(WebhookError::ReconciliationConflict {
            external_subscription_id: external_id.to_string(),
            attempts: self.max_attempts,
        })
    }

    /// Creates the row for an unseen subscription. `None` means another
    /// writer created it first.
    async fn materialize(
        &self,
        change: &SubscriptionChange,
    ) -> Result<Option<ReconcileOutcome>, WebhookError> {
        let external_id = change.external_subscription_id.as_str();
        let intent = self
            .store
            .find_intent_by_external_subscription(external_id)
            .await?;

        let email = match (&change.metadata.email, &intent) {
            (Some(raw), _) => {
                Email::parse(raw).map_err(|e| WebhookError::ParseError(e.to_string()))?
            }
            (None, Some(intent)) => intent.email.clone(),
            (None, None) => {
                return Ok(Some(ReconcileOutcome::Deferred(format!(
                    "subscription {} is unknown and the event carries no signup metadata",
                    external_id
                ))))
            }
        };
        let plan_id = match (&change.metadata.plan_id, &intent) {
            (Some(raw), _) => {
                PlanId::new(raw.as_str()).map_err(|_| WebhookError::UnknownPlan(raw.clone()))?
            }
            (None, Some(intent)) => intent.plan_id.clone(),
            (None, None) => return Err(WebhookError::MissingMetadata("plan_id")),
        };
        let plan = self
            .catalog
            .find(&plan_id)
            .ok_or_else(|| WebhookError::UnknownPlan(plan_id.to_string()))?;
        let external_customer_id = change
            .external_customer_id
            .clone()
            .or_else(|| intent.map(|i| i.external_customer_id))
            .ok_or(WebhookError::MissingField("customer"))?;

        let Some(status) = change.signal.initial_status() else {
            return Ok(Some(ReconcileOutcome::Ignored(
                IgnoreReason::UnmappedStatus.describe(),
            )));
        };

        let (user_id, placeholder) = match self.store.find_user_by_email(&email).await? {
            Some(user) => (*user.id(), None),
            None => {
                let user = User::placeholder(email, change.metadata.name.clone(), change.occurred_at);
                (*user.id(), Some(user))
            }
        };

        let subscription = Subscription::materialize(
            NewSubscription {
                user_id,
                plan_id,
                plan_revision: plan.current_terms().revision,
                external_subscription_id: external_id.to_string(),
                external_customer_id,
                status,
                current_period_end: change.signal.period_end().unwrap_or(change.occurred_at),
            },
            change.occurred_at,
        );

        match self
            .store
            .materialize_from_event(placeholder, subscription)
            .await?
        {
            MaterializeOutcome::Created(created) => {
                tracing::info!(
                    subscription_id = external_id,
                    user_id = %created.user_id,
                    status = %created.status,
                    "Subscription materialized from webhook"
                );
                Ok(Some(ReconcileOutcome::Created(created)))
            }
            MaterializeOutcome::Exists(_) => Ok(None),
            MaterializeOutcome::LiveSubscriptionExists => Err(WebhookError::DuplicateSubscription),
        }
    }

    /// User notices for a written transition.
    async fn after_transition(
        &self,
        before: &Subscription,
        after: &Subscription,
        revokes: bool,
        revoked: u64,
    ) -> Result<(), WebhookError> {
        if revokes {
            tracing::info!(
                user_id = %after.user_id,
                revoked,
                status = %after.status,
                "Download licenses revoked"
            );
        }

        let notice = match (before.status, after.status) {
            (from, SubscriptionStatus::PastDue) if from != SubscriptionStatus::PastDue => {
                Some(NoticeKind::PaymentFailed)
            }
            (_, SubscriptionStatus::Cancelled) => Some(NoticeKind::Ended),
            _ => None,
        };
        if let Some(kind) = notice {
            self.notify(&after.user_id, kind).await?;
        }
        Ok(())
    }

    async fn notify(&self, user_id: &UserId, kind: NoticeKind) -> Result<(), WebhookError> {
        let Some(user) = self.store.find_user(user_id).await? else {
            return Ok(());
        };
        let email = user.email().as_str().to_string();
        let notification = match kind {
            NoticeKind::PaymentFailed => Notification::PaymentFailed { email },
            NoticeKind::Ended => Notification::SubscriptionEnded { email },
        };
        if !self.notifier.send(notification).await {
            tracing::warn!(user_id = %user_id, "Subscription notice not delivered");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum NoticeKind {
    PaymentFailed,
    Ended,
}
