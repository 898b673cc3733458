//! Notifier port.
//!
//! Outbound user messages are delivered by an external collaborator. The
//! contract is deliberately lossy: `send` reports whether the message left,
//! and callers never fail an operation because a notification did not.

use async_trait::async_trait;

/// A message to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Signup finalized.
    Welcome { email: String, display_name: String },
    /// A renewal payment failed; access continues while past due.
    PaymentFailed { email: String },
    /// The subscription ended and offline downloads were revoked.
    SubscriptionEnded { email: String },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Welcome { .. } => "welcome",
            Notification::PaymentFailed { .. } => "payment_failed",
            Notification::SubscriptionEnded { .. } => "subscription_ended",
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            Notification::Welcome { email, .. }
            | Notification::PaymentFailed { email }
            | Notification::SubscriptionEnded { email } => email,
        }
    }
}

/// Delivers notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns true if the message was handed off for delivery.
    async fn send(&self, notification: Notification) -> bool;
}
