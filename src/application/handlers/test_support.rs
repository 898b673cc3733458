//! Shared wiring for handler tests.

use std::sync::Arc;

use crate::adapters::{
    InMemoryEntitlementStore, InMemoryWebhookInbox, JwtTokenService, ManualClock,
    MockPaymentProvider, RecordingNotifier, StaticPlanCatalog,
};
use crate::config::{AuthConfig, EntitlementConfig, PaymentConfig};
use crate::domain::account::{Email, User};
use crate::domain::catalog::fixtures::plan;
use crate::domain::foundation::{DomainError, PlanId, Timestamp, UserId};
use crate::domain::subscription::{NewSubscription, Subscription, SubscriptionStatus};
use crate::ports::PasswordHasher;

use super::super::RetryPolicy;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Reversible stand-in for Argon2 so tests stay fast.
pub struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash(&self, password: &str) -> Result<String, DomainError> {
        Ok(format!("plain:{}", password))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, DomainError> {
        Ok(hash == format!("plain:{}", password))
    }
}

pub struct Harness {
    pub store: Arc<InMemoryEntitlementStore>,
    pub inbox: Arc<InMemoryWebhookInbox>,
    pub provider: Arc<MockPaymentProvider>,
    pub catalog: Arc<StaticPlanCatalog>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub tokens: Arc<JwtTokenService>,
    pub hasher: Arc<PlainHasher>,
    pub entitlement: EntitlementConfig,
}

impl Harness {
    /// Catalog: `basic` (1 device, no offline) and `premium` (4 devices,
    /// 2 offline downloads).
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(Timestamp::now()));
        let catalog = StaticPlanCatalog::new(vec![
            plan("basic", 1, false, 0),
            plan("premium", 4, true, 2),
        ])
        .unwrap();
        Self {
            store: Arc::new(InMemoryEntitlementStore::new()),
            inbox: Arc::new(InMemoryWebhookInbox::new()),
            provider: Arc::new(MockPaymentProvider::new()),
            catalog: Arc::new(catalog),
            tokens: Arc::new(JwtTokenService::new(
                &AuthConfig::new("test-signing-secret"),
                clock.clone(),
            )),
            clock,
            notifier: Arc::new(RecordingNotifier::new()),
            hasher: Arc::new(PlainHasher),
            entitlement: EntitlementConfig::default(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let mut config = PaymentConfig::new("sk_test_x", WEBHOOK_SECRET);
        config.initial_backoff_ms = 1;
        config.max_attempts = 3;
        RetryPolicy::from_config(&config)
    }

    pub fn now(&self) -> Timestamp {
        crate::ports::Clock::now(self.clock.as_ref())
    }

    /// Seeds a credentialed user with a subscription in `status` on `plan_id`.
    pub async fn subscriber(&self, email: &str, plan_id: &str, status: SubscriptionStatus) -> UserId {
        let now = self.now();
        let user = User::register(
            Email::parse(email).unwrap(),
            "Viewer",
            "plain:correct-horse".to_string(),
            now,
        )
        .unwrap();
        let user_id = *user.id();
        self.store.seed_user(user).await;
        let subscription = Subscription::materialize(
            NewSubscription {
                user_id,
                plan_id: PlanId::new(plan_id).unwrap(),
                plan_revision: 1,
                external_subscription_id: format!("sub_{}", user_id),
                external_customer_id: format!("cus_{}", user_id),
                status,
                current_period_end: now.add_days(30),
            },
            now,
        );
        self.store.seed_subscription(subscription).await;
        user_id
    }
}
