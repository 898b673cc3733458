//! CreateCheckoutSessionHandler - Hosted checkout for an existing account.
//!
//! The session carries the account email and plan as metadata; the
//! subscription it produces is materialized by the webhook reconciler.

use std::sync::Arc;

use super::{provider_failure, signup_metadata};
use crate::application::RetryPolicy;
use crate::domain::account::Email;
use crate::domain::foundation::{AuthenticatedUser, PlanId};
use crate::domain::subscription::SubscriptionError;
use crate::ports::{CreateCheckoutRequest, EntitlementStore, PaymentProvider, PlanCatalog};

/// Command to create a checkout session.
#[derive(Debug, Clone)]
pub struct CreateCheckoutSessionCommand {
    pub user: AuthenticatedUser,
    pub plan_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCheckoutSessionResult {
    pub session_id: String,
    pub checkout_url: String,
    /// Unix seconds.
    pub expires_at: i64,
}

pub struct CreateCheckoutSessionHandler {
    store: Arc<dyn EntitlementStore>,
    catalog: Arc<dyn PlanCatalog>,
    payment_provider: Arc<dyn PaymentProvider>,
    retry: RetryPolicy,
}

impl CreateCheckoutSessionHandler {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        catalog: Arc<dyn PlanCatalog>,
        payment_provider: Arc<dyn PaymentProvider>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            catalog,
            payment_provider,
            retry,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateCheckoutSessionCommand,
    ) -> Result<CreateCheckoutSessionResult, SubscriptionError> {
        let plan_id = PlanId::new(cmd.plan_id.trim())?;
        let plan = self
            .catalog
            .find_active(&plan_id)
            .ok_or_else(|| SubscriptionError::PlanNotFound(plan_id.clone()))?;
        let success_url = redirect_url("success_url", &cmd.success_url)?;
        let cancel_url = redirect_url("cancel_url", &cmd.cancel_url)?;

        if self
            .store
            .find_live_subscription(&cmd.user.id)
            .await?
            .is_some()
        {
            return Err(SubscriptionError::DuplicateSubscription);
        }

        let email = Email::parse(&cmd.user.email)?;
        let request = CreateCheckoutRequest {
            email: email.as_str().to_string(),
            price_id: plan.provider_price_id.clone(),
            success_url,
            cancel_url,
            metadata: signup_metadata(&email, &plan_id, None),
        };
        let session = self
            .retry
            .run("create_checkout_session", || {
                self.payment_provider.create_checkout_session(request.clone())
            })
            .await
            .map_err(provider_failure)?;

        tracing::info!(
            user_id = %cmd.user.id,
            plan_id = %plan_id,
            session_id = %session.id,
            "Checkout session created"
        );

        Ok(CreateCheckoutSessionResult {
            session_id: session.id,
            checkout_url: session.url,
            expires_at: session.expires_at,
        })
    }
}

fn redirect_url(field: &str, raw: &str) -> Result<String, SubscriptionError> {
    let url = raw.trim();
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(url.to_string())
    } else {
        Err(SubscriptionError::validation(field, "must be an http(s) URL"))
    }
}
