//! In-memory adapters for tests and local runs.

mod clock;
mod store;
mod webhook_inbox;

pub use clock::ManualClock;
pub use store::InMemoryEntitlementStore;
pub use webhook_inbox::InMemoryWebhookInbox;
