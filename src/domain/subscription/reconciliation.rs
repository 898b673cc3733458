//! Folding provider events into local subscription state.
//!
//! Decisions are last-writer-wins by event time: an event older than the
//! row's `updated_at` is ignored, whatever order deliveries arrive in.
//! Applying a decision never moves `updated_at` backwards, so replaying any
//! already-applied event is a no-op.

use super::provider_event::EventMetadata;
use super::{ProviderStatus, Subscription, SubscriptionError, SubscriptionStatus};
use crate::domain::foundation::Timestamp;

/// What a provider event says about a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSignal {
    /// Full status snapshot from `subscription.created` / `subscription.updated`.
    Snapshot {
        status: ProviderStatus,
        period_end: Option<Timestamp>,
    },
    /// `subscription.deleted`.
    Deleted,
    /// `invoice.payment_failed`.
    PaymentFailed,
    /// `invoice.paid`: payment recovered or period renewed.
    PaymentSucceeded { period_end: Option<Timestamp> },
}

impl ProviderSignal {
    /// Status a row should start in when this signal is the first thing
    /// seen for a subscription. `None` when the signal cannot create a row.
    pub fn initial_status(&self) -> Option<SubscriptionStatus> {
        match self {
            ProviderSignal::Snapshot { status, .. } => status.to_local(),
            ProviderSignal::Deleted => Some(SubscriptionStatus::Cancelled),
            ProviderSignal::PaymentFailed => Some(SubscriptionStatus::PastDue),
            ProviderSignal::PaymentSucceeded { .. } => Some(SubscriptionStatus::Active),
        }
    }

    /// Period end carried by the signal, if any.
    pub fn period_end(&self) -> Option<Timestamp> {
        match self {
            ProviderSignal::Snapshot { period_end, .. }
            | ProviderSignal::PaymentSucceeded { period_end } => *period_end,
            _ => None,
        }
    }
}

/// A decoded provider event targeting one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionChange {
    pub external_subscription_id: String,
    pub external_customer_id: Option<String>,
    pub occurred_at: Timestamp,
    pub signal: ProviderSignal,
    pub metadata: EventMetadata,
}

/// A state change to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Activate { period_end: Option<Timestamp> },
    Renew { period_end: Timestamp },
    MarkPastDue,
    Cancel,
}

/// Why an event left the row untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Older than the row's last update.
    Stale,
    /// Row already reflects the event.
    NoChange,
    /// The state machine forbids the implied transition.
    InvalidTransition {
        from: SubscriptionStatus,
        to: SubscriptionStatus,
    },
    /// Provider status has no local counterpart.
    UnmappedStatus,
}

impl IgnoreReason {
    pub fn describe(&self) -> String {
        match self {
            IgnoreReason::Stale => "stale event".to_string(),
            IgnoreReason::NoChange => "already applied".to_string(),
            IgnoreReason::InvalidTransition { from, to } => {
                format!("invalid transition {} -> {}", from, to)
            }
            IgnoreReason::UnmappedStatus => "unmapped provider status".to_string(),
        }
    }
}

/// Outcome of comparing an event against the current row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Apply(Transition),
    Ignore(IgnoreReason),
}

/// Decides what `change` does to `subscription`.
pub fn decide(subscription: &Subscription, change: &SubscriptionChange) -> Decision {
    if change.occurred_at.is_before(&subscription.updated_at) {
        return Decision::Ignore(IgnoreReason::Stale);
    }

    match &change.signal {
        ProviderSignal::Deleted => on_cancelled(subscription),
        ProviderSignal::PaymentFailed => on_payment_failed(subscription),
        ProviderSignal::PaymentSucceeded { period_end } => on_paid(subscription, *period_end),
        ProviderSignal::Snapshot { status, period_end } => match status.to_local() {
            Some(SubscriptionStatus::Active) => on_paid(subscription, *period_end),
            Some(SubscriptionStatus::PastDue) => on_payment_failed(subscription),
            Some(SubscriptionStatus::Cancelled) => on_cancelled(subscription),
            Some(SubscriptionStatus::Pending) => {
                if subscription.status == SubscriptionStatus::Pending {
                    Decision::Ignore(IgnoreReason::NoChange)
                } else {
                    invalid(subscription, SubscriptionStatus::Pending)
                }
            }
            Some(SubscriptionStatus::Expired) | None => {
                Decision::Ignore(IgnoreReason::UnmappedStatus)
            }
        },
    }
}

fn on_cancelled(subscription: &Subscription) -> Decision {
    if subscription.status == SubscriptionStatus::Cancelled {
        Decision::Ignore(IgnoreReason::NoChange)
    } else {
        Decision::Apply(Transition::Cancel)
    }
}

fn on_payment_failed(subscription: &Subscription) -> Decision {
    match subscription.status {
        SubscriptionStatus::Pending | SubscriptionStatus::Active => {
            Decision::Apply(Transition::MarkPastDue)
        }
        SubscriptionStatus::PastDue => Decision::Ignore(IgnoreReason::NoChange),
        _ => invalid(subscription, SubscriptionStatus::PastDue),
    }
}

fn on_paid(subscription: &Subscription, period_end: Option<Timestamp>) -> Decision {
    match subscription.status {
        SubscriptionStatus::Pending | SubscriptionStatus::PastDue | SubscriptionStatus::Expired => {
            Decision::Apply(Transition::Activate { period_end })
        }
        SubscriptionStatus::Active => match period_end {
            Some(end) if end.is_after(&subscription.current_period_end) => {
                Decision::Apply(Transition::Renew { period_end: end })
            }
            _ => Decision::Ignore(IgnoreReason::NoChange),
        },
        SubscriptionStatus::Cancelled => invalid(subscription, SubscriptionStatus::Active),
    }
}

fn invalid(subscription: &Subscription, to: SubscriptionStatus) -> Decision {
    Decision::Ignore(IgnoreReason::InvalidTransition {
        from: subscription.status,
        to,
    })
}

impl Subscription {
    /// Applies a decided transition stamped with the event time.
    ///
    /// `current_revision` is the plan's newest terms revision, adopted on
    /// renewal. Returns true if the change must revoke download licenses.
    pub fn apply_transition(
        &mut self,
        transition: Transition,
        at: Timestamp,
        current_revision: u32,
    ) -> Result<bool, SubscriptionError> {
        let before = self.status;
        match transition {
            Transition::Activate { period_end } => self.activate(period_end, at)?,
            Transition::Renew { period_end } => self.renew(period_end, current_revision, at)?,
            Transition::MarkPastDue => self.mark_past_due(at)?,
            Transition::Cancel => self.cancel(at)?,
        }
        Ok(before.revokes_on(&self.status))
    }
}
