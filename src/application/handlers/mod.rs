//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations over the
//! ports, grouped by the part of the lifecycle they drive.

pub mod catalog;
pub mod entitlement;
pub mod ledger;
pub mod signup;
pub mod webhook;

#[cfg(test)]
pub(crate) mod test_support;
