//! Signup saga correlation record.
//!
//! Written by the intent phase after the provider objects exist, read back
//! by retried intent calls, and deleted by finalize in the same commit that
//! creates the local rows.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::domain::account::Email;
use crate::domain::foundation::{PlanId, Timestamp, ValidationError};

/// Key correlating retries of one signup attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentKey(String);

impl IntentKey {
    /// Accepts a caller-supplied idempotency key.
    pub fn from_client(raw: &str) -> Result<Self, ValidationError> {
        let key = raw.trim();
        if key.len() < 8 || key.len() > 255 {
            return Err(ValidationError::out_of_range(
                "idempotency_key",
                8,
                255,
                key.len() as i64,
            ));
        }
        if !key.chars().all(|c| c.is_ascii_graphic()) {
            return Err(ValidationError::invalid_format(
                "idempotency_key",
                "must be printable ASCII without spaces",
            ));
        }
        Ok(Self(format!("client:{}", key)))
    }

    /// Derives the key used when the caller supplies none.
    pub fn derive(email: &Email, plan_id: &PlanId) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(email.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(plan_id.as_str().as_bytes());
        Self(format!("derived:{}", hex::encode(hasher.finalize())))
    }

    /// Rebuilds a key read from storage.
    pub fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix for provider-side idempotency keys of this attempt.
    pub fn provider_key(&self, object: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        format!("{}-{}", object, &hex::encode(hasher.finalize())[..32])
    }
}

impl fmt::Display for IntentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provider objects created by the intent phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaIntent {
    pub key: IntentKey,
    pub email: Email,
    pub plan_id: PlanId,
    pub external_customer_id: String,
    pub external_subscription_id: String,
    /// Secret the client uses to confirm the payment.
    pub client_secret: String,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl SagaIntent {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        !now.is_before(&self.expires_at)
    }

    /// Returns true if a retry with these inputs belongs to this intent.
    pub fn matches(&self, email: &Email, plan_id: &PlanId) -> bool {
        &self.email == email && &self.plan_id == plan_id
    }
}
