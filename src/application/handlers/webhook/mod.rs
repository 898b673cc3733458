//! Webhook handlers.
//!
//! ## Commands
//! - Handling a signed provider webhook delivery
//! - Reprocessing deferred or failed inbox records

mod handle_provider_webhook;
mod reconciler;
mod reprocess_deferred_events;

pub use handle_provider_webhook::{
    HandleProviderWebhookCommand, HandleProviderWebhookHandler, HandleProviderWebhookResult,
};
pub use reconciler::{EventDisposition, ReconcileOutcome, SubscriptionReconciler};
pub use reprocess_deferred_events::{ReprocessDeferredEventsHandler, ReprocessSummary};
