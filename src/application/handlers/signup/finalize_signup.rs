//! FinalizeSignupHandler - Second phase of the signup saga.
//!
//! Confirms with the provider that the first payment cleared, then creates
//! the account and its active subscription in one commit. Finalize commutes
//! with the webhook reconciler: whichever writes the subscription row first,
//! the other finds it and converges on it. Rows finalize creates are stamped
//! with the provider's creation time, so events ordered after it on the
//! provider's clock still apply.

use std::sync::Arc;

use super::{provider_failure, require_non_empty};
use crate::application::RetryPolicy;
use crate::domain::account::{validate_password, Email, User};
use crate::domain::foundation::{AuthenticatedUser, PlanId, Timestamp, UserId};
use crate::domain::subscription::{
    NewSubscription, Subscription, SubscriptionError, SubscriptionStatus,
};
use crate::ports::{
    CasOutcome, Clock, EntitlementStore, Notification, Notifier, PasswordHasher, PaymentProvider,
    PlanCatalog, SessionTokens, SignupCommit, SignupCommitOutcome, TokenService,
};

/// Attempts at promoting a pending row before giving up.
const PROMOTE_ATTEMPTS: u32 = 3;

/// Command to finalize a signup after payment confirmation.
#[derive(Debug, Clone)]
pub struct FinalizeSignupCommand {
    pub email: String,
    pub password: String,
    pub name: String,
    pub plan_id: String,
    /// Provider subscription id returned by the intent phase.
    pub subscription_id: String,
    /// Provider customer id returned by the intent phase.
    pub customer_id: String,
}

/// Result of a successful finalize.
#[derive(Debug, Clone)]
pub struct FinalizeSignupResult {
    pub user_id: UserId,
    pub subscription: Subscription,
    pub tokens: SessionTokens,
}

/// Handler for the finalize phase.
pub struct FinalizeSignupHandler {
    store: Arc<dyn EntitlementStore>,
    catalog: Arc<dyn PlanCatalog>,
    payment_provider: Arc<dyn PaymentProvider>,
    password_hasher: Arc<dyn PasswordHasher>,
    token_service: Arc<dyn TokenService>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl FinalizeSignupHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        catalog: Arc<dyn PlanCatalog>,
        payment_provider: Arc<dyn PaymentProvider>,
        password_hasher: Arc<dyn PasswordHasher>,
        token_service: Arc<dyn TokenService>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            catalog,
            payment_provider,
            password_hasher,
            token_service,
            notifier,
            clock,
            retry,
        }
    }

    pub async fn handle(
        &self,
        cmd: FinalizeSignupCommand,
    ) -> Result<FinalizeSignupResult, SubscriptionError> {
        // 1. Validate input
        let email = Email::parse(&cmd.email)?;
        validate_password(&cmd.password)?;
        let name = require_non_empty("name", &cmd.name)?;
        let subscription_id = require_non_empty("subscription_id", &cmd.subscription_id)?;
        let customer_id = require_non_empty("customer_id", &cmd.customer_id)?;
        let plan_id = PlanId::new(cmd.plan_id.trim())?;
        let plan = self
            .catalog
            .find(&plan_id)
            .ok_or_else(|| SubscriptionError::PlanNotFound(plan_id.clone()))?;

        // 2. The provider must report the first payment as cleared
        let provider_subscription = self
            .retry
            .run("get_subscription", || {
                self.payment_provider.get_subscription(&subscription_id)
            })
            .await
            .map_err(provider_failure)?
            .ok_or_else(|| SubscriptionError::payment_not_confirmed("not_found"))?;

        if provider_subscription.customer_id != customer_id {
            return Err(SubscriptionError::payment_not_confirmed("customer_mismatch"));
        }
        if let Some(signed_up_as) = provider_subscription.metadata.get("email") {
            if Email::parse(signed_up_as).ok().as_ref() != Some(&email) {
                return Err(SubscriptionError::validation(
                    "email",
                    "does not match the email the signup was started with",
                ));
            }
        }
        if !provider_subscription.status.is_payable() {
            return Err(SubscriptionError::payment_not_confirmed(
                provider_subscription.status.as_str(),
            ));
        }
        let period_end = provider_subscription.period_end().ok_or_else(|| {
            SubscriptionError::infrastructure("provider returned an invalid period end")
        })?;
        let opened_at = provider_subscription.created_at().ok_or_else(|| {
            SubscriptionError::infrastructure("provider returned an invalid creation time")
        })?;

        // 3. Resolve the account the subscription will belong to
        let now = self.clock.now();
        let mut user = self.resolve_user(email, name, &cmd.password, now).await?;

        // 4. Single commit: user, active subscription, intent removal
        let subscription = Subscription::materialize(
            NewSubscription {
                user_id: *user.id(),
                plan_id,
                plan_revision: plan.current_terms().revision,
                external_subscription_id: subscription_id,
                external_customer_id: customer_id,
                status: SubscriptionStatus::Active,
                current_period_end: period_end,
            },
            opened_at,
        );

        let mut adopted_stored_account = false;
        let (subscription, created) = loop {
            let commit = SignupCommit {
                user: user.clone(),
                subscription: subscription.clone(),
            };
            match self.store.commit_signup(commit).await? {
                SignupCommitOutcome::Committed(subscription) => break (subscription, true),
                SignupCommitOutcome::SubscriptionExists(existing) => {
                    if existing.user_id != *user.id() {
                        return Err(SubscriptionError::validation(
                            "subscription_id",
                            "belongs to another account",
                        ));
                    }
                    break (self.promote_pending(existing, period_end, opened_at).await?, false);
                }
                SignupCommitOutcome::LiveSubscriptionExists => {
                    return Err(SubscriptionError::DuplicateSubscription)
                }
                SignupCommitOutcome::AccountTaken(stored) => {
                    // Credentials were stored by someone else after resolve_user ran.
                    if adopted_stored_account || !self.password_matches(&stored, &cmd.password)? {
                        tracing::warn!(user_id = %stored.id(), "Finalize lost the account to another signup");
                        return Err(SubscriptionError::EmailAlreadyRegistered);
                    }
                    adopted_stored_account = true;
                    user = stored;
                }
            }
        };

        // 5. Session for the new account
        let identity = AuthenticatedUser::new(*user.id(), user.email().as_str(), user.role());
        let tokens = self
            .token_service
            .issue_session(&identity, now)
            .map_err(|e| SubscriptionError::infrastructure(e.to_string()))?;

        if created {
            tracing::info!(
                user_id = %user.id(),
                subscription_id = %subscription.external_subscription_id,
                "Signup finalized"
            );
            let welcome = Notification::Welcome {
                email: user.email().as_str().to_string(),
                display_name: user.display_name().to_string(),
            };
            if !self.notifier.send(welcome).await {
                tracing::warn!(user_id = %user.id(), "Welcome notification not delivered");
            }
        }

        Ok(FinalizeSignupResult {
            user_id: *user.id(),
            subscription,
            tokens,
        })
    }

    /// New account, placeholder taking credentials, or an existing account
    /// proving it owns the email.
    async fn resolve_user(
        &self,
        email: Email,
        name: String,
        password: &str,
        now: Timestamp,
    ) -> Result<User, SubscriptionError> {
        match self.store.find_user_by_email(&email).await? {
            None => {
                let hash = self.password_hasher.hash(password)?;
                Ok(User::register(email, name, hash, now)?)
            }
            Some(mut placeholder) if placeholder.is_placeholder() => {
                let hash = self.password_hasher.hash(password)?;
                placeholder.activate(name, hash)?;
                Ok(placeholder)
            }
            Some(existing) => {
                if self.password_matches(&existing, password)? {
                    Ok(existing)
                } else {
                    Err(SubscriptionError::EmailAlreadyRegistered)
                }
            }
        }
    }

    fn password_matches(&self, user: &User, password: &str) -> Result<bool, SubscriptionError> {
        match user.password_hash() {
            Some(hash) => Ok(self.password_hasher.verify(password, hash)?),
            None => Ok(false),
        }
    }

    /// Activates a row the reconciler created as pending. Rows in any other
    /// status are returned unchanged. The activation stays on the provider's
    /// clock, at the row's last event time.
    async fn promote_pending(
        &self,
        mut current: Subscription,
        period_end: Timestamp,
        opened_at: Timestamp,
    ) -> Result<Subscription, SubscriptionError> {
        for _ in 0..PROMOTE_ATTEMPTS {
            if current.status != SubscriptionStatus::Pending {
                return Ok(current);
            }
            let expected = current.version;
            let mut next = current.clone();
            next.activate(Some(period_end), current.updated_at.max(opened_at))?;
            match self
                .store
                .compare_and_set_subscription(&next, expected)
                .await?
            {
                CasOutcome::Applied(stored) => return Ok(stored),
                CasOutcome::Conflict => {
                    current = self
                        .store
                        .find_subscription_by_external_id(&current.external_subscription_id)
                        .await?
                        .ok_or(SubscriptionError::NotFound)?;
                }
            }
        }
        Err(SubscriptionError::ReconciliationConflict {
            subscription_id: current.id,
            attempts: PROMOTE_ATTEMPTS,
        })
    }
}
