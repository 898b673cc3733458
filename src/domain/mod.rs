//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (ids, timestamps, errors, state machine)
//! - `catalog` - Plans and their versioned terms
//! - `account` - User accounts
//! - `subscription` - Subscription lifecycle, saga intents, webhook reconciliation
//! - `entitlement` - Devices, download licenses and quota checks
//! - `ledger` - Read-only revenue and churn projections

pub mod account;
pub mod catalog;
pub mod entitlement;
pub mod foundation;
pub mod ledger;
pub mod subscription;
