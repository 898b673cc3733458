//! Plan reference data.
//!
//! A plan's commercial terms are versioned. Revisions only move forward: a
//! subscription stays bound to the revision it started on until its next
//! renewal, when it adopts the plan's current revision.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{PlanId, ValidationError};

/// How often a plan bills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    Monthly,
    Yearly,
}

impl BillingPeriod {
    /// Number of months covered by one billing cycle.
    pub fn months(&self) -> i64 {
        match self {
            BillingPeriod::Monthly => 1,
            BillingPeriod::Yearly => 12,
        }
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BillingPeriod::Monthly => f.write_str("monthly"),
            BillingPeriod::Yearly => f.write_str("yearly"),
        }
    }
}

/// One revision of a plan's price and limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTerms {
    pub revision: u32,
    /// Price per billing period in minor currency units.
    pub price_minor: i64,
    pub currency: String,
    pub device_limit: u32,
    pub offline_allowed: bool,
    pub max_offline_downloads: u32,
}

/// A subscribable plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    pub billing_period: BillingPeriod,
    /// Price identifier at the payment provider.
    pub provider_price_id: String,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Terms revisions, oldest first.
    pub terms: Vec<PlanTerms>,
}

fn default_active() -> bool {
    true
}

impl Plan {
    /// Checks structural invariants of the plan definition.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::empty_field("name"));
        }
        if self.provider_price_id.trim().is_empty() {
            return Err(ValidationError::empty_field("provider_price_id"));
        }
        if self.terms.is_empty() {
            return Err(ValidationError::empty_field("terms"));
        }

        let mut previous: Option<u32> = None;
        for terms in &self.terms {
            if let Some(prev) = previous {
                if terms.revision <= prev {
                    return Err(ValidationError::invalid_format(
                        "terms",
                        format!(
                            "revision {} must be greater than revision {}",
                            terms.revision, prev
                        ),
                    ));
                }
            }
            if terms.price_minor < 0 {
                return Err(ValidationError::out_of_range(
                    "price_minor",
                    0,
                    i64::MAX,
                    terms.price_minor,
                ));
            }
            if terms.currency.len() != 3 || !terms.currency.chars().all(|c| c.is_ascii_uppercase())
            {
                return Err(ValidationError::invalid_format(
                    "currency",
                    "expected a three-letter ISO code",
                ));
            }
            previous = Some(terms.revision);
        }
        Ok(())
    }

    /// The revision offered to new subscriptions.
    pub fn current_terms(&self) -> &PlanTerms {
        // validate() guarantees at least one revision
        &self.terms[self.terms.len() - 1]
    }

    /// Terms in force for a subscription bound to `revision`.
    ///
    /// Falls back to the newest revision not later than `revision`, and to
    /// the oldest revision if the requested one predates them all.
    pub fn terms_for(&self, revision: u32) -> &PlanTerms {
        self.terms
            .iter()
            .rev()
            .find(|t| t.revision <= revision)
            .unwrap_or(&self.terms[0])
    }

    /// Monthly recurring revenue contributed by one subscription on `revision`.
    pub fn monthly_revenue_minor(&self, revision: u32) -> i64 {
        self.terms_for(revision).price_minor / self.billing_period.months()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A monthly plan with a single revision.
    pub fn plan(id: &str, device_limit: u32, offline: bool, max_downloads: u32) -> Plan {
        Plan {
            id: PlanId::new(id).unwrap(),
            name: format!("{} plan", id),
            billing_period: BillingPeriod::Monthly,
            provider_price_id: format!("price_{}", id),
            active: true,
            terms: vec![PlanTerms {
                revision: 1,
                price_minor: 999,
                currency: "USD".to_string(),
                device_limit,
                offline_allowed: offline,
                max_offline_downloads: max_downloads,
            }],
        }
    }
}
