//! Subscription status as reported by the payment provider.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::SubscriptionStatus;

/// Provider-side subscription status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Incomplete,
    IncompleteExpired,
    Trialing,
    Active,
    PastDue,
    Unpaid,
    Canceled,
    Paused,
    #[serde(other)]
    Unknown,
}

impl ProviderStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "incomplete" => Self::Incomplete,
            "incomplete_expired" => Self::IncompleteExpired,
            "trialing" => Self::Trialing,
            "active" => Self::Active,
            "past_due" => Self::PastDue,
            "unpaid" => Self::Unpaid,
            "canceled" | "cancelled" => Self::Canceled,
            "paused" => Self::Paused,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incomplete => "incomplete",
            Self::IncompleteExpired => "incomplete_expired",
            Self::Trialing => "trialing",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Unpaid => "unpaid",
            Self::Canceled => "canceled",
            Self::Paused => "paused",
            Self::Unknown => "unknown",
        }
    }

    /// Returns true when the first payment has cleared.
    pub fn is_payable(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }

    /// Local status mirroring this provider status, if any.
    pub fn to_local(&self) -> Option<SubscriptionStatus> {
        match self {
            Self::Incomplete => Some(SubscriptionStatus::Pending),
            Self::Trialing | Self::Active => Some(SubscriptionStatus::Active),
            Self::PastDue | Self::Unpaid => Some(SubscriptionStatus::PastDue),
            Self::Canceled | Self::IncompleteExpired => Some(SubscriptionStatus::Cancelled),
            Self::Paused | Self::Unknown => None,
        }
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_and_trialing_are_payable() {
        assert!(ProviderStatus::Active.is_payable());
        assert!(ProviderStatus::Trialing.is_payable());
        assert!(!ProviderStatus::Incomplete.is_payable());
        assert!(!ProviderStatus::PastDue.is_payable());
    }

    #[test]
    fn provider_statuses_map_to_local_statuses() {
        assert_eq!(
            ProviderStatus::Incomplete.to_local(),
            Some(SubscriptionStatus::Pending)
        );
        assert_eq!(ProviderStatus::Unpaid.to_local(), Some(SubscriptionStatus::PastDue));
        assert_eq!(
            ProviderStatus::IncompleteExpired.to_local(),
            Some(SubscriptionStatus::Cancelled)
        );
        assert_eq!(ProviderStatus::Paused.to_local(), None);
    }

    #[test]
    fn both_cancel_spellings_parse() {
        assert_eq!(ProviderStatus::parse("canceled"), ProviderStatus::Canceled);
        assert_eq!(ProviderStatus::parse("cancelled"), ProviderStatus::Canceled);
        assert_eq!(ProviderStatus::parse("weird"), ProviderStatus::Unknown);
    }

    #[test]
    fn unknown_status_deserializes_to_unknown() {
        let status: ProviderStatus = serde_json::from_str("\"something_new\"").unwrap();
        assert_eq!(status, ProviderStatus::Unknown);
    }
}
