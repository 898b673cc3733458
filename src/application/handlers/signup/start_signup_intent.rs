//! StartSignupIntentHandler - First phase of the signup saga.
//!
//! Creates the provider customer and a subscription awaiting payment
//! confirmation, then records a saga intent so retries with the same key get
//! the same provider objects back. No local user or subscription is written
//! here; finalize or the reconciler does that.

use std::sync::Arc;

use super::{provider_failure, require_non_empty, signup_metadata};
use crate::application::RetryPolicy;
use crate::domain::account::Email;
use crate::domain::foundation::PlanId;
use crate::domain::subscription::{IntentKey, SagaIntent, SubscriptionError};
use crate::ports::{
    Clock, CreateCustomerRequest, CreateSubscriptionRequest, EntitlementStore, PaymentProvider,
    PlanCatalog,
};

/// Command to start a signup.
#[derive(Debug, Clone)]
pub struct StartSignupIntentCommand {
    pub email: String,
    pub name: String,
    pub plan_id: String,
    pub payment_method_id: String,
    /// Caller-supplied key; derived from email and plan when absent.
    pub idempotency_key: Option<String>,
}

/// Provider objects the client confirms payment against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartSignupIntentResult {
    pub subscription_id: String,
    pub customer_id: String,
    pub confirmation_token: String,
}

impl From<SagaIntent> for StartSignupIntentResult {
    fn from(intent: SagaIntent) -> Self {
        Self {
            subscription_id: intent.external_subscription_id,
            customer_id: intent.external_customer_id,
            confirmation_token: intent.client_secret,
        }
    }
}

/// Handler for the intent phase.
pub struct StartSignupIntentHandler {
    store: Arc<dyn EntitlementStore>,
    catalog: Arc<dyn PlanCatalog>,
    payment_provider: Arc<dyn PaymentProvider>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    intent_ttl_secs: u64,
}

impl StartSignupIntentHandler {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        catalog: Arc<dyn PlanCatalog>,
        payment_provider: Arc<dyn PaymentProvider>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
        intent_ttl_secs: u64,
    ) -> Self {
        Self {
            store,
            catalog,
            payment_provider,
            clock,
            retry,
            intent_ttl_secs,
        }
    }

    pub async fn handle(
        &self,
        cmd: StartSignupIntentCommand,
    ) -> Result<StartSignupIntentResult, SubscriptionError> {
        // 1. Validate input
        let email = Email::parse(&cmd.email)?;
        let name = require_non_empty("name", &cmd.name)?;
        let payment_method_id = require_non_empty("payment_method_id", &cmd.payment_method_id)?;
        let plan_id = PlanId::new(cmd.plan_id.trim())?;
        let plan = self
            .catalog
            .find_active(&plan_id)
            .ok_or_else(|| SubscriptionError::PlanNotFound(plan_id.clone()))?;

        let key = match cmd.idempotency_key.as_deref() {
            Some(raw) => IntentKey::from_client(raw)?,
            None => IntentKey::derive(&email, &plan_id),
        };

        let now = self.clock.now();
        if let Err(e) = self.store.delete_expired_intents(now).await {
            tracing::warn!("Failed to purge expired saga intents: {}", e);
        }

        // 2. A live intent for the key is returned as-is
        if let Some(existing) = self.store.find_intent(&key).await? {
            if !existing.is_expired(now) {
                ensure_same_signup(&existing, &email, &plan_id)?;
                tracing::debug!(
                    subscription_id = %existing.external_subscription_id,
                    "Resuming signup intent"
                );
                return Ok(existing.into());
            }
        }

        // 3. One live subscription per account
        if let Some(user) = self.store.find_user_by_email(&email).await? {
            if self.store.find_live_subscription(user.id()).await?.is_some() {
                return Err(SubscriptionError::DuplicateSubscription);
            }
        }

        // 4. Provider objects, keyed so a retried attempt reuses them
        let customer_request = CreateCustomerRequest {
            email: email.as_str().to_string(),
            name: name.clone(),
            payment_method_id,
            idempotency_key: key.provider_key("customer"),
        };
        let customer = self
            .retry
            .run("create_customer", || {
                self.payment_provider
                    .create_customer(customer_request.clone())
            })
            .await
            .map_err(provider_failure)?;

        let subscription_request = CreateSubscriptionRequest {
            customer_id: customer.id.clone(),
            price_id: plan.provider_price_id.clone(),
            metadata: signup_metadata(&email, &plan_id, Some(&name)),
            idempotency_key: key.provider_key("subscription"),
        };
        let subscription = self
            .retry
            .run("create_subscription", || {
                self.payment_provider
                    .create_subscription(subscription_request.clone())
            })
            .await
            .map_err(provider_failure)?;

        // 5. Record the intent; a concurrent winner's intent is returned instead
        let intent = SagaIntent {
            key,
            email: email.clone(),
            plan_id: plan_id.clone(),
            external_customer_id: customer.id,
            external_subscription_id: subscription.id,
            client_secret: subscription.client_secret.unwrap_or_default(),
            created_at: now,
            expires_at: now.plus_secs(self.intent_ttl_secs),
        };
        let stored = self.store.insert_intent_if_absent(intent).await?;
        ensure_same_signup(&stored, &email, &plan_id)?;

        tracing::info!(
            subscription_id = %stored.external_subscription_id,
            plan_id = %plan_id,
            "Signup intent created"
        );

        Ok(stored.into())
    }
}

fn ensure_same_signup(
    intent: &SagaIntent,
    email: &Email,
    plan_id: &PlanId,
) -> Result<(), SubscriptionError> {
    if intent.matches(email, plan_id) {
        Ok(())
    } else {
        Err(SubscriptionError::validation(
            "idempotency_key",
            "key was already used for a different signup",
        ))
    }
}
