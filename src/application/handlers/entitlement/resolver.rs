//! EntitlementResolver - Derives what a user may do from their current
//! subscription, expiring lapsed subscriptions on read.

use std::sync::Arc;

use crate::domain::entitlement::{Entitlement, EntitlementError};
use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::domain::subscription::{Subscription, SubscriptionStatus};
use crate::ports::{CasOutcome, Clock, EntitlementStore, PlanCatalog};

const EXPIRE_ATTEMPTS: u32 = 3;

pub struct EntitlementResolver {
    store: Arc<dyn EntitlementStore>,
    catalog: Arc<dyn PlanCatalog>,
    clock: Arc<dyn Clock>,
    expiry_grace_secs: u64,
}

impl EntitlementResolver {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        catalog: Arc<dyn PlanCatalog>,
        clock: Arc<dyn Clock>,
        expiry_grace_secs: u64,
    ) -> Self {
        Self {
            store,
            catalog,
            clock,
            expiry_grace_secs,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// The user's current subscription, expired first if its paid period
    /// and grace have passed.
    pub async fn current_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        match self.store.find_current_subscription(user_id).await? {
            Some(sub) => Ok(Some(self.expire_if_lapsed(sub, self.clock.now()).await?)),
            None => Ok(None),
        }
    }

    /// The entitlement granted by the user's current subscription.
    pub async fn resolve(&self, user_id: &UserId) -> Result<Entitlement, EntitlementError> {
        let subscription = self
            .current_subscription(user_id)
            .await?
            .ok_or(EntitlementError::NotSubscribed)?;
        let plan = self.catalog.find(&subscription.plan_id).ok_or_else(|| {
            tracing::error!(
                plan_id = %subscription.plan_id,
                subscription_id = %subscription.id,
                "Subscription bound to a plan missing from the catalog"
            );
            EntitlementError::Infrastructure(format!(
                "plan {} missing from catalog",
                subscription.plan_id
            ))
        })?;
        let terms = plan.terms_for(subscription.plan_revision).clone();
        Ok(Entitlement::new(subscription, terms))
    }

    /// Persists ACTIVE/PAST_DUE to EXPIRED once the period has lapsed.
    ///
    /// The transition is stamped at the lapse instant rather than `now`, so a
    /// renewal event issued after the period ended still wins.
    async fn expire_if_lapsed(
        &self,
        subscription: Subscription,
        now: Timestamp,
    ) -> Result<Subscription, DomainError> {
        let mut current = subscription;

        for attempt in 1..=EXPIRE_ATTEMPTS {
            if !current.is_lapsed(now, self.expiry_grace_secs) {
                return Ok(current);
            }
            let lapsed_at = current.current_period_end.plus_secs(self.expiry_grace_secs);
            let revokes = current.status.revokes_on(&SubscriptionStatus::Expired);
            let mut next = current.clone();
            if next.expire(lapsed_at).is_err() {
                return Ok(current);
            }

            let (outcome, revoked) = if revokes {
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
                    tracing::info!(
                        subscription_id = %stored.id,
                        user_id = %stored.user_id,
                        revoked,
                        "Lapsed subscription expired"
                    );
                    return Ok(stored);
                }
                CasOutcome::Conflict => {
                    tracing::debug!(attempt, subscription_id = %current.id, "Expiry raced a writer");
                    match self
                        .store
                        .find_subscription_by_external_id(&current.external_subscription_id)
                        .await?
                    {
                        Some(fresh) => current = fresh,
                        None => return Ok(current),
                    }
                }
            }
        }

        // Report the lapse even though another writer keeps winning; the
        // next read persists it.
        if current.is_lapsed(now, self.expiry_grace_secs) {
            tracing::warn!(subscription_id = %current.id, "Could not persist expiry");
            current.status = SubscriptionStatus::Expired;
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_support::Harness;
    use crate::domain::entitlement::{DownloadLicense, LicenseStatus};
    use crate::domain::foundation::EpisodeId;
    use crate::ports::{LicenseRepository, SubscriptionRepository};

    fn resolver(h: &Harness) -> EntitlementResolver {
        EntitlementResolver::new(
            h.store.clone(),
            h.catalog.clone(),
            h.clock.clone(),
            h.entitlement.expiry_grace_secs,
        )
    }

    #[tokio::test]
    async fn active_subscription_resolves_plan_terms() {
        let h = Harness::new();
        let user_id = h
            .subscriber("ada@example.com", "premium", SubscriptionStatus::Active)
            .await;

        let entitlement = resolver(&h).resolve(&user_id).await.unwrap();

        assert_eq!(entitlement.terms.device_limit, 4);
        assert!(entitlement.require_active().is_ok());
    }

    #[tokio::test]
    async fn user_without_subscription_is_not_subscribed() {
        let h = Harness::new();
        assert_eq!(
            resolver(&h).resolve(&UserId::new()).await.unwrap_err(),
            EntitlementError::NotSubscribed
        );
    }

    #[tokio::test]
    async fn lapsed_subscription_expires_and_revokes_licenses() {
        let h = Harness::new();
        let user_id = h
            .subscriber("ada@example.com", "premium", SubscriptionStatus::Active)
            .await;
        let (license, _) = DownloadLicense::issue(
            user_id,
            EpisodeId::new("ep-1").unwrap(),
            600,
            h.now(),
        );
        assert!(h.store.issue_license(&license, 2, h.now()).await.unwrap());

        h.clock
            .advance_secs(30 * 86_400 + h.entitlement.expiry_grace_secs + 1);
        let sub = resolver(&h)
            .current_subscription(&user_id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Expired);
        assert_eq!(
            sub.updated_at,
            sub.current_period_end.plus_secs(h.entitlement.expiry_grace_secs)
        );
        let stored = h
            .store
            .find_subscription_by_external_id(&sub.external_subscription_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Expired);
        let licenses = h.store.list_licenses(&user_id).await.unwrap();
        assert_eq!(licenses[0].status, LicenseStatus::Revoked);
    }

    #[tokio::test]
    async fn grace_period_keeps_access() {
        let h = Harness::new();
        let user_id = h
            .subscriber("ada@example.com", "premium", SubscriptionStatus::Active)
            .await;
        h.clock.advance_secs(30 * 86_400 + 60);

        let sub = resolver(&h)
            .current_subscription(&user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn persistent_conflicts_still_report_expiry() {
        let h = Harness::new();
        let user_id = h
            .subscriber("ada@example.com", "premium", SubscriptionStatus::Active)
            .await;
        h.clock.advance_secs(31 * 86_400);
        h.store.force_cas_conflicts(EXPIRE_ATTEMPTS).await;

        let sub = resolver(&h)
            .current_subscription(&user_id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Expired);
        let stored = h
            .store
            .find_subscription_by_external_id(&sub.external_subscription_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);
    }
}
