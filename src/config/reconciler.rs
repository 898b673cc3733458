//! Webhook reconciler configuration

use serde::Deserialize;

use super::error::ValidationError;

const MAX_ATTEMPTS_CEILING: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReconcilerConfig {
    /// Compare-and-set attempts per event before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Processing attempts per inbox record before reprocessing skips it
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: u32,
}

impl ReconcilerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for attempts in [self.max_attempts, self.max_deliveries] {
            if attempts == 0 || attempts > MAX_ATTEMPTS_CEILING {
                return Err(ValidationError::InvalidAttempts {
                    max: MAX_ATTEMPTS_CEILING,
                });
            }
        }
        Ok(())
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            max_deliveries: default_max_deliveries(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_max_deliveries() -> u32 {
    10
}
