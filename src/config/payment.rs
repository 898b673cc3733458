//! Payment provider configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;

/// Upper bound for `max_attempts`.
const MAX_ATTEMPTS_CEILING: u32 = 10;

/// Payment provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Provider secret API key
    pub api_key: SecretString,

    /// Webhook signing secret
    pub webhook_secret: SecretString,

    /// Provider REST base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Attempts per provider call, first try included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt, doubled after each retry
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl PaymentConfig {
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            webhook_secret: SecretString::new(webhook_secret.into()),
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }

    /// Check if using test mode keys
    pub fn is_test_mode(&self) -> bool {
        self.api_key.expose_secret().starts_with("sk_test_")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Validate payment configuration
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        let key = self.api_key.expose_secret();
        let secret = self.webhook_secret.expose_secret();
        if key.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__API_KEY"));
        }
        if secret.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__WEBHOOK_SECRET"));
        }
        if !key.starts_with("sk_") {
            return Err(ValidationError::InvalidPaymentKey);
        }
        if !secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidWebhookSecret);
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 120 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS_CEILING {
            return Err(ValidationError::InvalidAttempts {
                max: MAX_ATTEMPTS_CEILING,
            });
        }
        if *environment == Environment::Production && !self.api_base_url.starts_with("https://") {
            return Err(ValidationError::PaymentUrlMustBeHttps);
        }
        Ok(())
    }
}

fn default_api_base_url() -> String {
    "https://api.stripe.com/v1".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}
