//! Signup handlers.
//!
//! ## Commands
//! - Starting a signup intent (provider customer + pending subscription)
//! - Finalizing a confirmed signup (local user + subscription, session tokens)
//! - Creating a checkout session for an existing account
//! - Purging expired saga intents

mod create_checkout_session;
mod finalize_signup;
mod purge_expired_intents;
mod start_signup_intent;

pub use create_checkout_session::{
    CreateCheckoutSessionCommand, CreateCheckoutSessionHandler, CreateCheckoutSessionResult,
};
pub use finalize_signup::{FinalizeSignupCommand, FinalizeSignupHandler, FinalizeSignupResult};
pub use purge_expired_intents::PurgeExpiredIntentsHandler;
pub use start_signup_intent::{
    StartSignupIntentCommand, StartSignupIntentHandler, StartSignupIntentResult,
};

use std::collections::BTreeMap;

use crate::domain::account::Email;
use crate::domain::foundation::PlanId;
use crate::domain::subscription::SubscriptionError;
use crate::ports::PaymentError;

/// Maps a provider failure that survived the retry policy.
pub(crate) fn provider_failure(err: PaymentError) -> SubscriptionError {
    if err.retryable {
        SubscriptionError::PaymentProviderUnavailable(err.message)
    } else {
        SubscriptionError::PaymentRejected(err.message)
    }
}

/// Metadata copied onto provider objects so webhooks can materialize the
/// subscription without the saga.
pub(crate) fn signup_metadata(
    email: &Email,
    plan_id: &PlanId,
    name: Option<&str>,
) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    metadata.insert("email".to_string(), email.as_str().to_string());
    metadata.insert("plan_id".to_string(), plan_id.as_str().to_string());
    if let Some(name) = name {
        metadata.insert("name".to_string(), name.to_string());
    }
    metadata
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<String, SubscriptionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SubscriptionError::validation(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}
