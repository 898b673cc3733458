//! Subscription aggregate entity.
//!
//! A local mirror of one provider subscription. Rows are keyed on the
//! provider's subscription id and the local id is derived from it, so the
//! signup saga and the webhook reconciler materialize the same row no matter
//! which of them commits first.
//!
//! # Invariants
//!
//! - `external_subscription_id` is unique
//! - At most one live (pending, active, past due) subscription per user,
//!   enforced by the store at insert time
//! - Status transitions follow [`SubscriptionStatus`] rules
//! - `version` is the optimistic-lock counter read from the store; writers
//!   compare-and-set against it and the store bumps it

use crate::domain::foundation::{PlanId, StateMachine, SubscriptionId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

use super::{SubscriptionError, SubscriptionStatus};

/// Subscription aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Local identifier, derived from `external_subscription_id`.
    pub id: SubscriptionId,

    /// Owning account.
    pub user_id: UserId,

    /// Subscribed plan.
    pub plan_id: PlanId,

    /// Plan terms revision this subscription is billed and limited by.
    pub plan_revision: u32,

    /// Provider subscription id.
    pub external_subscription_id: String,

    /// Provider customer id.
    pub external_customer_id: String,

    /// Current lifecycle status.
    pub status: SubscriptionStatus,

    /// End of the paid period.
    pub current_period_end: Timestamp,

    pub created_at: Timestamp,

    /// Last write, by event time for provider-driven changes.
    pub updated_at: Timestamp,

    /// Optimistic-lock counter.
    pub version: u64,
}

/// Everything needed to create a subscription row.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub plan_revision: u32,
    pub external_subscription_id: String,
    pub external_customer_id: String,
    pub status: SubscriptionStatus,
    pub current_period_end: Timestamp,
}

impl Subscription {
    /// Builds a first-version row for a provider subscription.
    pub fn materialize(new: NewSubscription, at: Timestamp) -> Self {
        Self {
            id: SubscriptionId::for_external(&new.external_subscription_id),
            user_id: new.user_id,
            plan_id: new.plan_id,
            plan_revision: new.plan_revision,
            external_subscription_id: new.external_subscription_id,
            external_customer_id: new.external_customer_id,
            status: new.status,
            current_period_end: new.current_period_end,
            created_at: at,
            updated_at: at,
            version: 1,
        }
    }

    /// Returns true if the user may stream.
    pub fn has_access(&self) -> bool {
        self.status.has_access()
    }

    /// Returns true once an accessing subscription is past its paid period
    /// plus `grace_secs` with no renewal recorded.
    pub fn is_lapsed(&self, now: Timestamp, grace_secs: u64) -> bool {
        self.status.has_access() && now.is_after(&self.current_period_end.plus_secs(grace_secs))
    }

    /// Payment confirmed: pending, past due or lapsed becomes active.
    pub fn activate(
        &mut self,
        period_end: Option<Timestamp>,
        at: Timestamp,
    ) -> Result<(), SubscriptionError> {
        if self.status == SubscriptionStatus::Active {
            return Err(SubscriptionError::invalid_state(self.status.as_str(), "activate"));
        }
        self.transition(SubscriptionStatus::Active, "activate", at)?;
        if let Some(end) = period_end {
            self.advance_period_end(end);
        }
        Ok(())
    }

    /// A new billing period began. Adopts `revision` (forward only).
    pub fn renew(
        &mut self,
        period_end: Timestamp,
        revision: u32,
        at: Timestamp,
    ) -> Result<(), SubscriptionError> {
        if !period_end.is_after(&self.current_period_end) {
            return Err(SubscriptionError::validation(
                "current_period_end",
                "renewal must extend the paid period",
            ));
        }
        self.transition(SubscriptionStatus::Active, "renew", at)?;
        self.current_period_end = period_end;
        self.plan_revision = self.plan_revision.max(revision);
        Ok(())
    }

    /// A payment attempt failed.
    pub fn mark_past_due(&mut self, at: Timestamp) -> Result<(), SubscriptionError> {
        self.transition(SubscriptionStatus::PastDue, "mark past due", at)
    }

    /// Terminated at the provider.
    pub fn cancel(&mut self, at: Timestamp) -> Result<(), SubscriptionError> {
        self.transition(SubscriptionStatus::Cancelled, "cancel", at)
    }

    /// Local lapse check found the period over.
    pub fn expire(&mut self, at: Timestamp) -> Result<(), SubscriptionError> {
        self.transition(SubscriptionStatus::Expired, "expire", at)
    }

    fn advance_period_end(&mut self, end: Timestamp) {
        if end.is_after(&self.current_period_end) {
            self.current_period_end = end;
        }
    }

    fn transition(
        &mut self,
        target: SubscriptionStatus,
        action: &str,
        at: Timestamp,
    ) -> Result<(), SubscriptionError> {
        self.status = self
            .status
            .transition_to(target)
            .map_err(|_| SubscriptionError::invalid_state(self.status.as_str(), action))?;
        if at.is_after(&self.updated_at) {
            self.updated_at = at;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    // Construction tests

    #[test]
    fn materialize_derives_id_from_external_id() {
        let sub = Subscription::materialize(new_subscription(UserId::new(), "sub_42"), Timestamp::now());
        assert_eq!(sub.id, SubscriptionId::for_external("sub_42"));
        assert_eq!(sub.version, 1);
        assert_eq!(sub.created_at, sub.updated_at);
    }

    // Transition tests

    #[test]
    fn activate_moves_pending_to_active_and_extends_period() {
        let mut sub = subscription_with_status(SubscriptionStatus::Pending);
        let later = sub.current_period_end.add_days(30);
        sub.activate(Some(later), Timestamp::now()).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.current_period_end, later);
    }

    #[test]
    fn activate_never_shortens_period() {
        let mut sub = subscription_with_status(SubscriptionStatus::PastDue);
        let original = sub.current_period_end;
        sub.activate(Some(original.minus_days(5)), Timestamp::now()).unwrap();
        assert_eq!(sub.current_period_end, original);
    }

    #[test]
    fn activate_rejects_already_active() {
        let mut sub = subscription_with_status(SubscriptionStatus::Active);
        assert!(matches!(
            sub.activate(None, Timestamp::now()),
            Err(SubscriptionError::InvalidState { .. })
        ));
    }

    #[test]
    fn renew_extends_period_and_adopts_newer_revision() {
        let mut sub = subscription_with_status(SubscriptionStatus::Active);
        let next = sub.current_period_end.add_days(30);
        sub.renew(next, 3, Timestamp::now()).unwrap();
        assert_eq!(sub.current_period_end, next);
        assert_eq!(sub.plan_revision, 3);
    }

    #[test]
    fn renew_never_moves_revision_backwards() {
        let mut sub = subscription_with_status(SubscriptionStatus::Active);
        sub.plan_revision = 4;
        let next = sub.current_period_end.add_days(30);
        sub.renew(next, 2, Timestamp::now()).unwrap();
        assert_eq!(sub.plan_revision, 4);
    }

    #[test]
    fn renew_requires_later_period_end() {
        let mut sub = subscription_with_status(SubscriptionStatus::Active);
        let same = sub.current_period_end;
        assert!(sub.renew(same, 1, Timestamp::now()).is_err());
    }

    #[test]
    fn cancelled_subscription_cannot_be_marked_past_due() {
        let mut sub = subscription_with_status(SubscriptionStatus::Cancelled);
        assert!(sub.mark_past_due(Timestamp::now()).is_err());
        assert_eq!(sub.status, SubscriptionStatus::Cancelled);
    }

    #[test]
    fn transition_keeps_updated_at_monotonic() {
        let mut sub = subscription_with_status(SubscriptionStatus::Active);
        let before = sub.updated_at;
        sub.mark_past_due(before.minus_secs(60)).unwrap();
        assert_eq!(sub.updated_at, before);
    }

    // Lapse tests

    #[test]
    fn is_lapsed_only_after_grace() {
        let mut sub = subscription_with_status(SubscriptionStatus::Active);
        sub.current_period_end = Timestamp::now().minus_secs(100);
        assert!(sub.is_lapsed(Timestamp::now(), 10));
        assert!(!sub.is_lapsed(Timestamp::now(), 3_600));
    }

    #[test]
    fn cancelled_subscription_is_never_lapsed() {
        let mut sub = subscription_with_status(SubscriptionStatus::Cancelled);
        sub.current_period_end = Timestamp::now().minus_days(10);
        assert!(!sub.is_lapsed(Timestamp::now(), 0));
    }
}
