//! GetMySubscriptionHandler - Query handler for the caller's subscription.

use std::sync::Arc;

use super::EntitlementResolver;
use crate::domain::entitlement::EntitlementError;
use crate::domain::foundation::{PlanId, Timestamp, UserId};
use crate::domain::subscription::SubscriptionStatus;

/// Query for a user's subscription.
#[derive(Debug, Clone)]
pub struct GetMySubscriptionQuery {
    pub user_id: UserId,
}

/// Summary returned to the subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MySubscriptionView {
    /// True while the user may stream.
    pub is_subscribed: bool,
    pub plan_id: Option<PlanId>,
    pub status: Option<SubscriptionStatus>,
    pub current_period_end: Option<Timestamp>,
}

pub struct GetMySubscriptionHandler {
    resolver: Arc<EntitlementResolver>,
}

impl GetMySubscriptionHandler {
    pub fn new(resolver: Arc<EntitlementResolver>) -> Self {
        Self { resolver }
    }

    pub async fn handle(
        &self,
        query: GetMySubscriptionQuery,
    ) -> Result<MySubscriptionView, EntitlementError> {
        let view = match self.resolver.current_subscription(&query.user_id).await? {
            Some(sub) => MySubscriptionView {
                is_subscribed: sub.has_access(),
                plan_id: Some(sub.plan_id),
                status: Some(sub.status),
                current_period_end: Some(sub.current_period_end),
            },
            None => MySubscriptionView {
                is_subscribed: false,
                plan_id: None,
                status: None,
                current_period_end: None,
            },
        };
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_support::Harness;

    fn handler(h: &Harness) -> GetMySubscriptionHandler {
        GetMySubscriptionHandler::new(Arc::new(EntitlementResolver::new(
            h.store.clone(),
            h.catalog.clone(),
            h.clock.clone(),
            h.entitlement.expiry_grace_secs,
        )))
    }

    #[tokio::test]
    async fn past_due_still_counts_as_subscribed() {
        let h = Harness::new();
        let user_id = h
            .subscriber("ada@example.com", "premium", SubscriptionStatus::PastDue)
            .await;

        let view = handler(&h)
            .handle(GetMySubscriptionQuery { user_id })
            .await
            .unwrap();

        assert!(view.is_subscribed);
        assert_eq!(view.plan_id.unwrap().as_str(), "premium");
        assert_eq!(view.status, Some(SubscriptionStatus::PastDue));
    }

    #[tokio::test]
    async fn cancelled_subscription_is_reported_but_not_subscribed() {
        let h = Harness::new();
        let user_id = h
            .subscriber("ada@example.com", "basic", SubscriptionStatus::Cancelled)
            .await;

        let view = handler(&h)
            .handle(GetMySubscriptionQuery { user_id })
            .await
            .unwrap();

        assert!(!view.is_subscribed);
        assert_eq!(view.status, Some(SubscriptionStatus::Cancelled));
    }

    #[tokio::test]
    async fn unknown_user_has_empty_view() {
        let h = Harness::new();
        let view = handler(&h)
            .handle(GetMySubscriptionQuery {
                user_id: UserId::new(),
            })
            .await
            .unwrap();

        assert!(!view.is_subscribed);
        assert!(view.plan_id.is_none());
    }
}
