//! Subscription status state machine.
//!
//! Defines all subscription states and the transitions the saga, the webhook
//! reconciler and the lazy expiry check are allowed to make.

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Local subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Created at the provider, first payment not yet confirmed.
    Pending,

    /// Paid and in good standing.
    Active,

    /// Renewal payment failed; provider is retrying.
    /// Streaming continues, new entitlements are refused.
    PastDue,

    /// Terminated at the provider.
    Cancelled,

    /// Period ended locally without a renewal event.
    Expired,
}

impl SubscriptionStatus {
    /// Returns true if the user may stream under this status.
    pub fn has_access(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::PastDue)
    }

    /// Returns true if new devices and licenses may be granted.
    pub fn allows_new_entitlements(&self) -> bool {
        matches!(self, SubscriptionStatus::Active)
    }

    /// Returns true if the subscription still occupies the user's single
    /// live-subscription slot.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Pending | SubscriptionStatus::Active | SubscriptionStatus::PastDue
        )
    }

    /// Returns true if leaving `self` for `target` must revoke licenses.
    pub fn revokes_on(&self, target: &SubscriptionStatus) -> bool {
        self.has_access()
            && matches!(
                target,
                SubscriptionStatus::Cancelled | SubscriptionStatus::Expired
            )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubscriptionStatus::Pending),
            "active" => Ok(SubscriptionStatus::Active),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            "expired" => Ok(SubscriptionStatus::Expired),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown subscription status '{}'", other),
            )),
        }
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // From PENDING
            (Pending, Active)
                | (Pending, PastDue)
                | (Pending, Cancelled)
            // From ACTIVE
                | (Active, Active) // Renewal
                | (Active, PastDue)
                | (Active, Cancelled)
                | (Active, Expired)
            // From PAST_DUE
                | (PastDue, Active)
                | (PastDue, Cancelled)
                | (PastDue, Expired)
            // From EXPIRED (late renewal or provider-side deletion)
                | (Expired, Active)
                | (Expired, Cancelled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Pending => vec![Active, PastDue, Cancelled],
            Active => vec![Active, PastDue, Cancelled, Expired],
            PastDue => vec![Active, Cancelled, Expired],
            Cancelled => vec![],
            Expired => vec![Active, Cancelled],
        }
    }
}
