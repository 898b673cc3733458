//! Reelpass - subscription signup and entitlements for a video platform.
//!
//! Couples account creation with payment-provider subscription creation
//! through an idempotent two-phase signup, reconciles provider webhooks into
//! local subscription state, and gates device registration and offline
//! download licenses on the resulting entitlement.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
