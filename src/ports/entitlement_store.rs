//! Entitlement store port.
//!
//! The store exclusively owns persisted users, subscriptions, devices,
//! download licenses and saga intents. Callers never overwrite a row
//! blindly: subscriptions change through compare-and-set on `version`, and
//! every quota-bound write is a single atomic operation that re-checks the
//! quota under the owning user's lock.
//!
//! The port is split per aggregate so handlers can depend on the narrowest
//! contract, with [`EntitlementStore`] tying them together for adapters that
//! implement everything against one database.

use async_trait::async_trait;

use crate::domain::account::{Email, User};
use crate::domain::entitlement::{Device, DownloadLicense, EntitlementError};
use crate::domain::foundation::{DeviceId, DomainError, Timestamp, UserId};
use crate::domain::subscription::{IntentKey, SagaIntent, Subscription};

/// Account lookups.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, DomainError>;

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, DomainError>;
}

/// Everything finalize writes in one transaction.
#[derive(Debug, Clone)]
pub struct SignupCommit {
    /// Inserted if absent. A stored placeholder takes its credentials. A
    /// stored credentialed account must hold the same password hash, or the
    /// commit is refused with [`SignupCommitOutcome::AccountTaken`].
    pub user: User,
    /// Inserted unless a row for its external id already exists.
    pub subscription: Subscription,
}

/// Outcome of [`SubscriptionRepository::commit_signup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignupCommitOutcome {
    /// User and subscription written, saga intent deleted.
    Committed(Subscription),
    /// A row for the external id already existed and is returned unchanged.
    /// The user upsert and intent delete were still committed.
    SubscriptionExists(Subscription),
    /// The user owns a different live subscription. Nothing was written.
    LiveSubscriptionExists,
    /// The email's account already holds other credentials, typically set by
    /// a concurrent finalize. Nothing was written; carries the stored account.
    AccountTaken(User),
}

/// Outcome of [`SubscriptionRepository::materialize_from_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeOutcome {
    Created(Subscription),
    /// Another writer created the row first.
    Exists(Subscription),
    /// The user owns a different live subscription. Nothing was written.
    LiveSubscriptionExists,
}

/// Outcome of [`SubscriptionRepository::compare_and_set_subscription`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
    /// Written; carries the stored row with its bumped version.
    Applied(Subscription),
    /// The stored version moved on. Re-read and retry.
    Conflict,
}

/// Subscription persistence.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn find_subscription_by_external_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError>;

    /// The user's pending, active or past-due subscription, if any.
    async fn find_live_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError>;

    /// The user's live subscription, else their most recently updated one.
    async fn find_current_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError>;

    /// All subscriptions, for ledger projections.
    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, DomainError>;

    /// Atomically upserts the user, inserts the subscription and deletes the
    /// saga intent for the same external subscription.
    async fn commit_signup(&self, commit: SignupCommit)
        -> Result<SignupCommitOutcome, DomainError>;

    /// Inserts `placeholder` if no user owns its email, then inserts the
    /// subscription unless a row for its external id exists.
    async fn materialize_from_event(
        &self,
        placeholder: Option<User>,
        subscription: Subscription,
    ) -> Result<MaterializeOutcome, DomainError>;

    /// Writes `subscription` if the stored version still equals
    /// `expected_version`, storing it as `expected_version + 1`.
    async fn compare_and_set_subscription(
        &self,
        subscription: &Subscription,
        expected_version: u64,
    ) -> Result<CasOutcome, DomainError>;

    /// Compare-and-set that, when applied, revokes every issued or redeemed
    /// license of the subscription's user in the same transaction. Returns
    /// the number revoked, zero on conflict.
    async fn compare_and_set_revoking_licenses(
        &self,
        subscription: &Subscription,
        expected_version: u64,
    ) -> Result<(CasOutcome, u64), DomainError>;
}

/// Saga intent persistence.
#[async_trait]
pub trait SagaIntentRepository: Send + Sync {
    async fn find_intent(&self, key: &IntentKey) -> Result<Option<SagaIntent>, DomainError>;

    /// Inserts `intent` unless an unexpired intent holds the key, and returns
    /// whichever intent is stored afterwards. An expired holder is replaced.
    async fn insert_intent_if_absent(&self, intent: SagaIntent)
        -> Result<SagaIntent, DomainError>;

    async fn find_intent_by_external_subscription(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<SagaIntent>, DomainError>;

    /// Deletes intents whose deadline is at or before `now`.
    async fn delete_expired_intents(&self, now: Timestamp) -> Result<u64, DomainError>;
}

/// Outcome of [`DeviceRepository::register_device`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceRegistration {
    /// New identifier stored.
    Registered(Device),
    /// Identifier already known; `last_active_at` refreshed.
    Touched(Device),
    /// A new identifier would exceed the limit.
    LimitReached,
}

/// Device persistence.
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Registers or refreshes a device, counting against `limit` only when
    /// the identifier is new to the user.
    async fn register_device(
        &self,
        device: Device,
        limit: u32,
    ) -> Result<DeviceRegistration, DomainError>;

    async fn list_devices(&self, user_id: &UserId) -> Result<Vec<Device>, DomainError>;

    async fn find_device(
        &self,
        user_id: &UserId,
        device_id: &DeviceId,
    ) -> Result<Option<Device>, DomainError>;

    /// Deletes the device and revokes licenses redeemed on it in one
    /// transaction. Returns the number revoked, or `None` if the user has no
    /// such device.
    async fn remove_device(
        &self,
        user_id: &UserId,
        device_id: &DeviceId,
    ) -> Result<Option<u64>, DomainError>;
}

/// Inputs of an atomic redemption.
#[derive(Debug, Clone)]
pub struct RedeemRequest {
    pub user_id: UserId,
    pub token_digest: String,
    pub device_id: DeviceId,
    pub quota: u32,
    pub offline_window_secs: u64,
    pub now: Timestamp,
}

/// Download license persistence.
#[async_trait]
pub trait LicenseRepository: Send + Sync {
    /// Stores an issued license if the user's offline slots in use at `now`
    /// are below `quota`. Returns false when the quota is full.
    async fn issue_license(
        &self,
        license: &DownloadLicense,
        quota: u32,
        now: Timestamp,
    ) -> Result<bool, DomainError>;

    /// Redeems the user's license with the given digest under the user's
    /// lock. A license found expired is persisted as such before
    /// `TokenExpired` is returned.
    async fn redeem_license(
        &self,
        request: RedeemRequest,
    ) -> Result<DownloadLicense, EntitlementError>;

    async fn list_licenses(&self, user_id: &UserId) -> Result<Vec<DownloadLicense>, DomainError>;

    /// Revokes every issued or redeemed license of the user. Returns the
    /// number revoked.
    async fn revoke_licenses_for_user(&self, user_id: &UserId) -> Result<u64, DomainError>;
}

/// The full store contract.
pub trait EntitlementStore:
    UserRepository + SubscriptionRepository + SagaIntentRepository + DeviceRepository + LicenseRepository
{
}

impl<T> EntitlementStore for T where
    T: UserRepository
        + SubscriptionRepository
        + SagaIntentRepository
        + DeviceRepository
        + LicenseRepository
{
}
