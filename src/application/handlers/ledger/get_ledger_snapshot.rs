//! GetLedgerSnapshotHandler - Query handler for the admin revenue ledger.

use std::sync::Arc;

use crate::domain::foundation::DomainError;
use crate::domain::ledger::{build_snapshot, LedgerSnapshot};
use crate::ports::{Clock, PlanCatalog, SubscriptionRepository};

const MAX_CHURN_WINDOW_DAYS: i64 = 366;

/// Query for a ledger snapshot.
///
/// This is an admin-only query; callers check the role.
#[derive(Debug, Clone)]
pub struct GetLedgerSnapshotQuery {
    pub churn_window_days: i64,
}

impl Default for GetLedgerSnapshotQuery {
    fn default() -> Self {
        Self {
            churn_window_days: 30,
        }
    }
}

pub struct GetLedgerSnapshotHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    catalog: Arc<dyn PlanCatalog>,
    clock: Arc<dyn Clock>,
}

impl GetLedgerSnapshotHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        catalog: Arc<dyn PlanCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            subscriptions,
            catalog,
            clock,
        }
    }

    pub async fn handle(&self, query: GetLedgerSnapshotQuery) -> Result<LedgerSnapshot, DomainError> {
        if !(1..=MAX_CHURN_WINDOW_DAYS).contains(&query.churn_window_days) {
            return Err(DomainError::validation(
                "churn_window_days",
                format!("must be between 1 and {}", MAX_CHURN_WINDOW_DAYS),
            ));
        }
        let subscriptions = self.subscriptions.list_subscriptions().await?;
        let plans = self.catalog.list();
        Ok(build_snapshot(
            &subscriptions,
            &plans,
            self.clock.now(),
            query.churn_window_days,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_support::Harness;
    use crate::domain::foundation::ErrorCode;
    use crate::domain::subscription::SubscriptionStatus;

    fn handler(h: &Harness) -> GetLedgerSnapshotHandler {
        GetLedgerSnapshotHandler::new(h.store.clone(), h.catalog.clone(), h.clock.clone())
    }

    #[tokio::test]
    async fn counts_live_subscriptions_by_plan() {
        let h = Harness::new();
        h.subscriber("a@example.com", "premium", SubscriptionStatus::Active)
            .await;
        h.subscriber("b@example.com", "premium", SubscriptionStatus::PastDue)
            .await;
        h.subscriber("c@example.com", "basic", SubscriptionStatus::Active)
            .await;

        let snapshot = handler(&h)
            .handle(GetLedgerSnapshotQuery::default())
            .await
            .unwrap();

        assert_eq!(snapshot.active_count, 2);
        assert_eq!(snapshot.past_due_count, 1);
        let premium = snapshot
            .by_plan
            .iter()
            .find(|l| l.plan_id.as_str() == "premium")
            .unwrap();
        assert_eq!(premium.active, 1);
        assert_eq!(premium.past_due, 1);
        assert_eq!(premium.monthly_revenue_minor, 999);
    }

    #[tokio::test]
    async fn window_out_of_range_is_rejected() {
        let h = Harness::new();
        let err = handler(&h)
            .handle(GetLedgerSnapshotQuery {
                churn_window_days: 0,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }
}
