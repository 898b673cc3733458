//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresEntitlementStore` - users, subscriptions, saga intents, devices
//!   and download licenses
//! - `PostgresWebhookInbox` - durable webhook inbox
//!
//! Schema lives in `migrations/` and is applied by [`run_migrations`].

mod device_repository;
mod entitlement_store;
mod license_repository;
mod rows;
mod saga_intent_repository;
mod webhook_inbox;

pub use entitlement_store::PostgresEntitlementStore;
pub use webhook_inbox::PostgresWebhookInbox;

use sqlx::PgPool;

/// Applies the embedded migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
