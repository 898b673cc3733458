//! Plan catalog domain types.

mod plan;

pub use plan::{BillingPeriod, Plan, PlanTerms};

#[cfg(test)]
pub(crate) use plan::fixtures;
