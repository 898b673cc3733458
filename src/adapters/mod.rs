//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `memory` - In-memory store, webhook inbox and manual clock
//! - `postgres` - sqlx-backed store and webhook inbox
//! - `stripe` - Payment provider REST client and a scriptable mock
//! - `catalog` - YAML plan catalog
//! - `auth` - Argon2 password hashing and JWT tokens
//! - `notify` - Notification sinks
//! - `http` - axum REST surface

pub mod auth;
pub mod catalog;
pub mod http;
pub mod memory;
pub mod notify;
pub mod postgres;
pub mod stripe;

pub use auth::{Argon2PasswordHasher, JwtTokenService};
pub use catalog::StaticPlanCatalog;
pub use memory::{InMemoryEntitlementStore, InMemoryWebhookInbox, ManualClock};
pub use notify::{LoggingNotifier, RecordingNotifier};
pub use postgres::{PostgresEntitlementStore, PostgresWebhookInbox};
pub use stripe::{MockPaymentProvider, StripePaymentAdapter};
