//! Entitlement derived from a subscription and its plan terms.

use super::EntitlementError;
use crate::domain::catalog::PlanTerms;
use crate::domain::subscription::Subscription;

/// What the user's current subscription allows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entitlement {
    pub subscription: Subscription,
    pub terms: PlanTerms,
}

impl Entitlement {
    pub fn new(subscription: Subscription, terms: PlanTerms) -> Self {
        Self {
            subscription,
            terms,
        }
    }

    /// Fails unless new devices and licenses may be granted.
    pub fn require_active(&self) -> Result<(), EntitlementError> {
        if self.subscription.status.allows_new_entitlements() {
            Ok(())
        } else {
            Err(EntitlementError::NotSubscribed)
        }
    }

    /// Checks that one more device fits.
    pub fn check_device_capacity(&self, registered: u32) -> Result<(), EntitlementError> {
        if registered >= self.terms.device_limit {
            return Err(EntitlementError::DeviceLimitExceeded {
                limit: self.terms.device_limit,
            });
        }
        Ok(())
    }

    /// Checks that one more offline download fits.
    pub fn check_download_quota(&self, slots_in_use: u32) -> Result<(), EntitlementError> {
        if !self.terms.offline_allowed {
            return Err(EntitlementError::OfflineNotAllowed);
        }
        if slots_in_use >= self.terms.max_offline_downloads {
            return Err(EntitlementError::DownloadQuotaExceeded {
                limit: self.terms.max_offline_downloads,
            });
        }
        Ok(())
    }
}
