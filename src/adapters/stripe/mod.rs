//! Stripe payment provider adapters.

mod client;
mod mock;
mod wire;

pub use client::StripePaymentAdapter;
pub use mock::{MethodCall, MockPaymentProvider};
