//! Entitlement timing configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Windows governing licenses, saga intents and lazy expiry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EntitlementConfig {
    /// How long an issued license may wait for redemption
    #[serde(default = "default_license_issue_ttl")]
    pub license_issue_ttl_secs: u64,

    /// Offline playback window opened by redemption
    #[serde(default = "default_offline_window")]
    pub offline_window_secs: u64,

    /// Lifetime of a signup saga intent
    #[serde(default = "default_saga_intent_ttl")]
    pub saga_intent_ttl_secs: u64,

    /// Slack after the paid period before a subscription is expired locally
    #[serde(default = "default_expiry_grace")]
    pub expiry_grace_secs: u64,
}

impl EntitlementConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.license_issue_ttl_secs == 0 {
            return Err(ValidationError::InvalidWindow("license_issue_ttl_secs"));
        }
        if self.offline_window_secs == 0 {
            return Err(ValidationError::InvalidWindow("offline_window_secs"));
        }
        if self.saga_intent_ttl_secs < 60 {
            return Err(ValidationError::InvalidWindow("saga_intent_ttl_secs"));
        }
        Ok(())
    }
}

impl Default for EntitlementConfig {
    fn default() -> Self {
        Self {
            license_issue_ttl_secs: default_license_issue_ttl(),
            offline_window_secs: default_offline_window(),
            saga_intent_ttl_secs: default_saga_intent_ttl(),
            expiry_grace_secs: default_expiry_grace(),
        }
    }
}

fn default_license_issue_ttl() -> u64 {
    10 * 60
}

fn default_offline_window() -> u64 {
    48 * 3600
}

fn default_saga_intent_ttl() -> u64 {
    60 * 60
}

fn default_expiry_grace() -> u64 {
    6 * 3600
}
