//! Notifier adapters.
//!
//! Delivery itself belongs to an external mail service; the adapters here
//! hand messages to the log or keep them for assertions.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::ports::{Notification, Notifier};

/// Writes each notification to the structured log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send(&self, notification: Notification) -> bool {
        tracing::info!(
            kind = notification.kind(),
            recipient = notification.recipient(),
            "Notification queued"
        );
        true
    }
}

/// Keeps every notification in memory; optionally reports failure.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose deliveries always fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: Notification) -> bool {
        if self.fail {
            return false;
        }
        match self.sent.lock() {
            Ok(mut sent) => sent.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_notifier_keeps_messages() {
        let notifier = RecordingNotifier::new();
        let message = Notification::SubscriptionEnded {
            email: "viewer@example.com".to_string(),
        };

        assert!(notifier.send(message.clone()).await);
        assert_eq!(notifier.sent(), vec![message]);
    }

    #[tokio::test]
    async fn failing_notifier_reports_not_sent() {
        let notifier = RecordingNotifier::failing();
        let sent = notifier
            .send(Notification::PaymentFailed {
                email: "viewer@example.com".to_string(),
            })
            .await;

        assert!(!sent);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn logging_notifier_always_hands_off() {
        assert!(
            LoggingNotifier
                .send(Notification::Welcome {
                    email: "viewer@example.com".to_string(),
                    display_name: "Viewer".to_string(),
                })
                .await
        );
    }
}
