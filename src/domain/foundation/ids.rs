//! Strongly-typed identifier value objects.
//!
//! Most ids are random UUIDs. `UserId` and `SubscriptionId` can also be
//! derived deterministically (UUID v5) from the natural keys they are unique
//! on, so independent writers that materialize the same row agree on its id.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

/// Namespace for ids derived from normalized email addresses.
const USER_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a9e_4b7d_4c11_9a3e_51d0_7e2b_c401);

/// Namespace for ids derived from payment-provider subscription ids.
const SUBSCRIPTION_NAMESPACE: Uuid = Uuid::from_u128(0x0d84_b3f2_91ac_4e6f_8b52_c7e1_a4f9_3d02);

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an id from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a user account.
    UserId
);

uuid_id!(
    /// Unique identifier for a local subscription row.
    SubscriptionId
);

uuid_id!(
    /// Unique identifier for a registered playback device.
    DeviceId
);

uuid_id!(
    /// Unique identifier for a download license.
    LicenseId
);

impl UserId {
    /// Derives the id for an account from its normalized email.
    pub fn for_email(normalized_email: &str) -> Self {
        Self(Uuid::new_v5(&USER_NAMESPACE, normalized_email.as_bytes()))
    }
}

impl SubscriptionId {
    /// Derives the local id for a provider subscription.
    pub fn for_external(external_subscription_id: &str) -> Self {
        Self(Uuid::new_v5(
            &SUBSCRIPTION_NAMESPACE,
            external_subscription_id.as_bytes(),
        ))
    }
}

/// Catalog identifier of a plan, e.g. `"premium-monthly"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlanId(String);

impl PlanId {
    /// Creates a PlanId, rejecting empty or non-slug values.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_field("plan_id"));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::invalid_format(
                "plan_id",
                "only letters, digits, '-' and '_' are allowed",
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PlanId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PlanId::new(value)
    }
}

impl From<PlanId> for String {
    fn from(id: PlanId) -> Self {
        id.0
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an episode in the content library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpisodeId(String);

impl EpisodeId {
    /// Creates an EpisodeId, rejecting empty values.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::empty_field("episode_id"));
        }
        Ok(Self(id.trim().to_string()))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_are_unique() {
        assert_ne!(DeviceId::new(), DeviceId::new());
        assert_ne!(LicenseId::new(), LicenseId::new());
    }

    #[test]
    fn id_parses_from_display() {
        let id = SubscriptionId::new();
        let parsed: SubscriptionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn derived_user_id_is_stable_per_email() {
        assert_eq!(
            UserId::for_email("viewer@example.com"),
            UserId::for_email("viewer@example.com")
        );
        assert_ne!(
            UserId::for_email("viewer@example.com"),
            UserId::for_email("other@example.com")
        );
    }

    #[test]
    fn derived_subscription_id_is_stable_per_external_id() {
        assert_eq!(
            SubscriptionId::for_external("sub_123"),
            SubscriptionId::for_external("sub_123")
        );
        assert_ne!(
            SubscriptionId::for_external("sub_123"),
            SubscriptionId::for_external("sub_124")
        );
    }

    #[test]
    fn plan_id_rejects_empty_and_spaces() {
        assert!(PlanId::new("  ").is_err());
        assert!(PlanId::new("premium monthly").is_err());
        assert_eq!(PlanId::new(" premium ").unwrap().as_str(), "premium");
    }

    #[test]
    fn plan_id_deserializes_with_validation() {
        let ok: PlanId = serde_json::from_str("\"basic\"").unwrap();
        assert_eq!(ok.as_str(), "basic");
        assert!(serde_json::from_str::<PlanId>("\"\"").is_err());
    }

    #[test]
    fn episode_id_rejects_empty() {
        assert!(EpisodeId::new("").is_err());
        assert_eq!(EpisodeId::new("ep-1").unwrap().as_str(), "ep-1");
    }
}
