//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Following CQRS, it separates command handlers (write) from query handlers (read).

pub mod handlers;
mod retry;

pub use handlers::catalog::{ListPlansHandler, ListPlansQuery};
pub use handlers::entitlement::{
    DeregisterDeviceCommand, DeregisterDeviceHandler, EntitlementResolver,
    GetMySubscriptionHandler, GetMySubscriptionQuery, IssueDownloadLicenseCommand,
    IssueDownloadLicenseHandler, ListDevicesHandler, ListDevicesQuery,
    RedeemDownloadLicenseCommand, RedeemDownloadLicenseHandler, RegisterDeviceCommand,
    RegisterDeviceHandler, RevokeAllLicensesCommand, RevokeAllLicensesHandler,
};
pub use handlers::ledger::{GetLedgerSnapshotHandler, GetLedgerSnapshotQuery};
pub use handlers::signup::{
    CreateCheckoutSessionCommand, CreateCheckoutSessionHandler, FinalizeSignupCommand,
    FinalizeSignupHandler, PurgeExpiredIntentsHandler, StartSignupIntentCommand,
    StartSignupIntentHandler,
};
pub use handlers::webhook::{
    HandleProviderWebhookCommand, HandleProviderWebhookHandler, ReprocessDeferredEventsHandler,
    SubscriptionReconciler,
};
pub use retry::RetryPolicy;
