//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `EntitlementStore` - Users, subscriptions, devices, licenses, saga intents
//! - `WebhookEventRepository` - Durable webhook inbox
//! - `PlanCatalog` - Static plan reference data
//!
//! ## External Service Ports
//!
//! - `PaymentProvider` - Customers, subscriptions and checkout at the provider
//! - `Notifier` - Outbound user messages
//!
//! ## Security Ports
//!
//! - `PasswordHasher` - One-way credential hashing
//! - `TokenService` - Access tokens and media grants

mod clock;
mod entitlement_store;
mod notifier;
mod password_hasher;
mod payment_provider;
mod plan_catalog;
mod token_service;
mod webhook_event_repository;

pub use clock::{Clock, SystemClock};
pub use entitlement_store::{
    CasOutcome, DeviceRegistration, DeviceRepository, EntitlementStore, LicenseRepository,
    MaterializeOutcome, RedeemRequest, SagaIntentRepository, SignupCommit, SignupCommitOutcome,
    SubscriptionRepository, UserRepository,
};
pub use notifier::{Notification, Notifier};
pub use password_hasher::PasswordHasher;
pub use payment_provider::{
    CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, CreateSubscriptionRequest,
    Customer, PaymentError, PaymentErrorCode, PaymentProvider, ProviderSubscription,
};
pub use plan_catalog::PlanCatalog;
pub use token_service::{MediaGrant, SessionTokens, TokenService};
pub use webhook_event_repository::{
    SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookEventStatus,
};
