//! Subscription module - lifecycle of the local subscription mirror.
//!
//! # Module Structure
//!
//! - `aggregate` - Subscription aggregate
//! - `status` - SubscriptionStatus state machine
//! - `provider_status` - provider statuses and their local mapping
//! - `provider_event` - webhook event envelope
//! - `reconciliation` - last-writer-wins event folding
//! - `saga_intent` - signup correlation record
//! - `webhook_verifier` - HMAC signature checks
//! - `errors` / `webhook_errors` - error types

mod aggregate;
mod errors;
mod provider_event;
mod provider_status;
mod reconciliation;
mod saga_intent;
mod status;
mod webhook_errors;
mod webhook_verifier;

pub use aggregate::{NewSubscription, Subscription};
pub use errors::SubscriptionError;
pub use provider_event::{EventMetadata, ProviderEvent, ProviderEventData, ProviderEventKind};
pub use provider_status::ProviderStatus;
pub use reconciliation::{
    decide, Decision, IgnoreReason, ProviderSignal, SubscriptionChange, Transition,
};
pub use saga_intent::{IntentKey, SagaIntent};
pub use status::SubscriptionStatus;
pub use webhook_errors::WebhookError;
pub use webhook_verifier::{sign_payload, SignatureHeader, WebhookVerifier};

#[cfg(test)]
pub(crate) use aggregate::fixtures;
#[cfg(test)]
pub(crate) use provider_event::ProviderEventBuilder;
