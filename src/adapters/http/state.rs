//! Shared application state.

use std::sync::Arc;

use crate::application::handlers::catalog::ListPlansHandler;
use crate::application::handlers::entitlement::{
    DeregisterDeviceHandler, EntitlementResolver, GetMySubscriptionHandler,
    IssueDownloadLicenseHandler, ListDevicesHandler, RedeemDownloadLicenseHandler,
    RegisterDeviceHandler, RevokeAllLicensesHandler,
};
use crate::application::handlers::ledger::GetLedgerSnapshotHandler;
use crate::application::handlers::signup::{
    CreateCheckoutSessionHandler, FinalizeSignupHandler, PurgeExpiredIntentsHandler,
    StartSignupIntentHandler,
};
use crate::application::handlers::webhook::{
    HandleProviderWebhookHandler, ReprocessDeferredEventsHandler, SubscriptionReconciler,
};
use crate::application::RetryPolicy;
use crate::config::{EntitlementConfig, ReconcilerConfig};
use crate::domain::subscription::WebhookVerifier;
use crate::ports::{
    Clock, DeviceRepository, EntitlementStore, LicenseRepository, Notifier, PasswordHasher,
    PaymentProvider, PlanCatalog, SagaIntentRepository, SubscriptionRepository, TokenService,
    WebhookEventRepository,
};

/// One store viewed through each of its narrow ports.
#[derive(Clone)]
pub struct Repositories {
    pub store: Arc<dyn EntitlementStore>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub intents: Arc<dyn SagaIntentRepository>,
    pub devices: Arc<dyn DeviceRepository>,
    pub licenses: Arc<dyn LicenseRepository>,
}

impl Repositories {
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: EntitlementStore + 'static,
    {
        Self {
            store: store.clone(),
            subscriptions: store.clone(),
            intents: store.clone(),
            devices: store.clone(),
            licenses: store,
        }
    }
}

/// Shared application state containing all dependencies.
///
/// Cloned for each request; every dependency is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub repositories: Repositories,
    pub inbox: Arc<dyn WebhookEventRepository>,
    pub catalog: Arc<dyn PlanCatalog>,
    pub payment_provider: Arc<dyn PaymentProvider>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub token_service: Arc<dyn TokenService>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub webhook_verifier: WebhookVerifier,
    pub retry: RetryPolicy,
    pub entitlement: EntitlementConfig,
    pub reconciler: ReconcilerConfig,
    resolver: Arc<EntitlementResolver>,
    subscription_reconciler: Arc<SubscriptionReconciler>,
}

/// Dependencies [`AppState`] is assembled from.
pub struct AppDependencies {
    pub repositories: Repositories,
    pub inbox: Arc<dyn WebhookEventRepository>,
    pub catalog: Arc<dyn PlanCatalog>,
    pub payment_provider: Arc<dyn PaymentProvider>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub token_service: Arc<dyn TokenService>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub webhook_verifier: WebhookVerifier,
    pub retry: RetryPolicy,
    pub entitlement: EntitlementConfig,
    pub reconciler: ReconcilerConfig,
}

impl AppState {
    pub fn new(deps: AppDependencies) -> Self {
        let resolver = Arc::new(EntitlementResolver::new(
            deps.repositories.store.clone(),
            deps.catalog.clone(),
            deps.clock.clone(),
            deps.entitlement.expiry_grace_secs,
        ));
        let subscription_reconciler = Arc::new(SubscriptionReconciler::new(
            deps.repositories.store.clone(),
            deps.catalog.clone(),
            deps.notifier.clone(),
            deps.reconciler.max_attempts,
        ));
        Self {
            repositories: deps.repositories,
            inbox: deps.inbox,
            catalog: deps.catalog,
            payment_provider: deps.payment_provider,
            password_hasher: deps.password_hasher,
            token_service: deps.token_service,
            notifier: deps.notifier,
            clock: deps.clock,
            webhook_verifier: deps.webhook_verifier,
            retry: deps.retry,
            entitlement: deps.entitlement,
            reconciler: deps.reconciler,
            resolver,
            subscription_reconciler,
        }
    }

    // ── Signup ──────────────────────────────────────────────────────────────

    pub fn start_signup_intent_handler(&self) -> StartSignupIntentHandler {
        StartSignupIntentHandler::new(
            self.repositories.store.clone(),
            self.catalog.clone(),
            self.payment_provider.clone(),
            self.clock.clone(),
            self.retry,
            self.entitlement.saga_intent_ttl_secs,
        )
    }

    pub fn finalize_signup_handler(&self) -> FinalizeSignupHandler {
        FinalizeSignupHandler::new(
            self.repositories.store.clone(),
            self.catalog.clone(),
            self.payment_provider.clone(),
            self.password_hasher.clone(),
            self.token_service.clone(),
            self.notifier.clone(),
            self.clock.clone(),
            self.retry,
        )
    }

    pub fn checkout_session_handler(&self) -> CreateCheckoutSessionHandler {
        CreateCheckoutSessionHandler::new(
            self.repositories.store.clone(),
            self.catalog.clone(),
            self.payment_provider.clone(),
            self.retry,
        )
    }

    pub fn purge_intents_handler(&self) -> PurgeExpiredIntentsHandler {
        PurgeExpiredIntentsHandler::new(self.repositories.intents.clone(), self.clock.clone())
    }

    // ── Webhooks ────────────────────────────────────────────────────────────

    pub fn webhook_handler(&self) -> HandleProviderWebhookHandler {
        HandleProviderWebhookHandler::new(
            self.webhook_verifier.clone(),
            self.inbox.clone(),
            self.subscription_reconciler.clone(),
            self.clock.clone(),
            self.reconciler.max_deliveries,
        )
    }

    pub fn reprocess_handler(&self) -> ReprocessDeferredEventsHandler {
        ReprocessDeferredEventsHandler::new(
            self.inbox.clone(),
            self.subscription_reconciler.clone(),
            self.clock.clone(),
            self.reconciler.max_deliveries,
        )
    }

    // ── Entitlements ────────────────────────────────────────────────────────

    pub fn my_subscription_handler(&self) -> GetMySubscriptionHandler {
        GetMySubscriptionHandler::new(self.resolver.clone())
    }

    pub fn register_device_handler(&self) -> RegisterDeviceHandler {
        RegisterDeviceHandler::new(self.resolver.clone(), self.repositories.devices.clone())
    }

    pub fn list_devices_handler(&self) -> ListDevicesHandler {
        ListDevicesHandler::new(self.repositories.devices.clone())
    }

    pub fn deregister_device_handler(&self) -> DeregisterDeviceHandler {
        DeregisterDeviceHandler::new(self.repositories.devices.clone())
    }

    pub fn issue_license_handler(&self) -> IssueDownloadLicenseHandler {
        IssueDownloadLicenseHandler::new(
            self.resolver.clone(),
            self.repositories.licenses.clone(),
            self.entitlement.license_issue_ttl_secs,
        )
    }

    pub fn redeem_license_handler(&self) -> RedeemDownloadLicenseHandler {
        RedeemDownloadLicenseHandler::new(
            self.resolver.clone(),
            self.repositories.licenses.clone(),
            self.token_service.clone(),
            self.entitlement.offline_window_secs,
        )
    }

    pub fn revoke_licenses_handler(&self) -> RevokeAllLicensesHandler {
        RevokeAllLicensesHandler::new(self.repositories.licenses.clone())
    }

    // ── Catalog and ledger ──────────────────────────────────────────────────

    pub fn list_plans_handler(&self) -> ListPlansHandler {
        ListPlansHandler::new(self.catalog.clone())
    }

    pub fn ledger_handler(&self) -> GetLedgerSnapshotHandler {
        GetLedgerSnapshotHandler::new(
            self.repositories.subscriptions.clone(),
            self.catalog.clone(),
            self.clock.clone(),
        )
    }
}
