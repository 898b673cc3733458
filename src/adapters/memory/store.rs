//! In-memory entitlement store.
//!
//! One async lock guards all state, so every multi-row operation is atomic
//! the same way a Postgres transaction is. Useful for tests and local runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::account::{Email, User};
use crate::domain::entitlement::{
    offline_slots_in_use, Device, DownloadLicense, EntitlementError, LicenseStatus, RedeemOutcome,
};
use crate::domain::foundation::{
    DeviceId, DomainError, ErrorCode, LicenseId, Timestamp, UserId,
};
use crate::domain::subscription::{IntentKey, SagaIntent, Subscription};
use crate::ports::{
    CasOutcome, DeviceRegistration, DeviceRepository, LicenseRepository, MaterializeOutcome,
    RedeemRequest, SagaIntentRepository, SignupCommit, SignupCommitOutcome,
    SubscriptionRepository, UserRepository,
};

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, User>,
    /// Keyed on external subscription id.
    subscriptions: HashMap<String, Subscription>,
    intents: HashMap<IntentKey, SagaIntent>,
    devices: HashMap<DeviceId, Device>,
    licenses: HashMap<LicenseId, DownloadLicense>,
    /// Compare-and-set calls still to be answered with a conflict.
    forced_conflicts: u32,
}

impl State {
    fn user_by_email(&self, email: &Email) -> Option<&User> {
        self.users.values().find(|u| u.email() == email)
    }

    fn live_subscription(&self, user_id: &UserId) -> Option<&Subscription> {
        self.subscriptions
            .values()
            .find(|s| &s.user_id == user_id && s.status.is_live())
    }

    fn has_other_live(&self, subscription: &Subscription) -> bool {
        subscription.status.is_live()
            && self.live_subscription(&subscription.user_id).is_some_and(|live| {
                live.external_subscription_id != subscription.external_subscription_id
            })
    }

    /// Insert-if-absent for users; a placeholder takes the credentials of an
    /// incoming credentialed account.
    fn upsert_user(&mut self, user: User) {
        match self.users.get(user.id()) {
            None => {
                self.users.insert(*user.id(), user);
            }
            Some(existing) if existing.is_placeholder() && !user.is_placeholder() => {
                self.users.insert(*user.id(), user);
            }
            Some(_) => {}
        }
    }

    /// The stored account for `user`'s email when it holds credentials other
    /// than `user`'s.
    fn conflicting_account(&self, user: &User) -> Option<User> {
        self.user_by_email(user.email())
            .filter(|stored| !stored.is_placeholder() && stored.password_hash() != user.password_hash())
            .cloned()
    }

    fn compare_and_set(
        &mut self,
        subscription: &Subscription,
        expected_version: u64,
    ) -> Result<CasOutcome, DomainError> {
        if self.forced_conflicts > 0 {
            self.forced_conflicts -= 1;
            return Ok(CasOutcome::Conflict);
        }
        let Some(stored) = self
            .subscriptions
            .get(&subscription.external_subscription_id)
        else {
            return Ok(CasOutcome::Conflict);
        };
        if stored.version != expected_version {
            return Ok(CasOutcome::Conflict);
        }
        if self.has_other_live(subscription) {
            return Err(DomainError::new(
                ErrorCode::DuplicateSubscription,
                "user already owns a live subscription",
            ));
        }
        let mut next = subscription.clone();
        next.version = expected_version + 1;
        self.subscriptions
            .insert(next.external_subscription_id.clone(), next.clone());
        Ok(CasOutcome::Applied(next))
    }

    fn revoke_licenses(&mut self, user_id: &UserId) -> u64 {
        let mut revoked = 0;
        for license in self.licenses.values_mut() {
            if &license.user_id == user_id && license.revoke() {
                revoked += 1;
            }
        }
        revoked
    }

    fn slots_in_use(&self, user_id: &UserId, now: Timestamp) -> u32 {
        offline_slots_in_use(self.licenses.values().filter(|l| &l.user_id == user_id), now)
    }
}

/// Entitlement store backed by process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEntitlementStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryEntitlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next `count` compare-and-set calls with a conflict.
    pub async fn force_cas_conflicts(&self, count: u32) {
        self.state.write().await.forced_conflicts = count;
    }

    /// Number of stored users.
    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }

    /// Number of stored subscriptions.
    pub async fn subscription_count(&self) -> usize {
        self.state.read().await.subscriptions.len()
    }

    /// Stores a subscription as-is, bypassing every check.
    pub async fn seed_subscription(&self, subscription: Subscription) {
        self.state
            .write()
            .await
            .subscriptions
            .insert(subscription.external_subscription_id.clone(), subscription);
    }

    /// Stores a user as-is.
    pub async fn seed_user(&self, user: User) {
        self.state.write().await.users.insert(*user.id(), user);
    }
}

#[async_trait]
impl UserRepository for InMemoryEntitlementStore {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        Ok(self.state.read().await.users.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, DomainError> {
        Ok(self.state.read().await.user_by_email(email).cloned())
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryEntitlementStore {
    async fn find_subscription_by_external_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .state
            .read()
            .await
            .subscriptions
            .get(external_subscription_id)
            .cloned())
    }

    async fn find_live_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self.state.read().await.live_subscription(user_id).cloned())
    }

    async fn find_current_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        let state = self.state.read().await;
        if let Some(live) = state.live_subscription(user_id) {
            return Ok(Some(live.clone()));
        }
        Ok(state
            .subscriptions
            .values()
            .filter(|s| &s.user_id == user_id)
            .max_by_key(|s| s.updated_at)
            .cloned())
    }

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, DomainError> {
        Ok(self.state.read().await.subscriptions.values().cloned().collect())
    }

    async fn commit_signup(
        &self,
        commit: SignupCommit,
    ) -> Result<SignupCommitOutcome, DomainError> {
        let mut state = self.state.write().await;
        let external_id = commit.subscription.external_subscription_id.clone();

        if let Some(stored) = state.conflicting_account(&commit.user) {
            return Ok(SignupCommitOutcome::AccountTaken(stored));
        }

        if let Some(existing) = state.subscriptions.get(&external_id).cloned() {
            state.upsert_user(commit.user);
            state
                .intents
                .retain(|_, i| i.external_subscription_id != external_id);
            return Ok(SignupCommitOutcome::SubscriptionExists(existing));
        }
        if state.has_other_live(&commit.subscription) {
            return Ok(SignupCommitOutcome::LiveSubscriptionExists);
        }

        state.upsert_user(commit.user);
        state
            .subscriptions
            .insert(external_id.clone(), commit.subscription.clone());
        state
            .intents
            .retain(|_, i| i.external_subscription_id != external_id);
        Ok(SignupCommitOutcome::Committed(commit.subscription))
    }

    async fn materialize_from_event(
        &self,
        placeholder: Option<User>,
        subscription: Subscription,
    ) -> Result<MaterializeOutcome, DomainError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .subscriptions
            .get(&subscription.external_subscription_id)
        {
            return Ok(MaterializeOutcome::Exists(existing.clone()));
        }
        if state.has_other_live(&subscription) {
            return Ok(MaterializeOutcome::LiveSubscriptionExists);
        }
        if let Some(user) = placeholder {
            state.upsert_user(user);
        }
        state.subscriptions.insert(
            subscription.external_subscription_id.clone(),
            subscription.clone(),
        );
        Ok(MaterializeOutcome::Created(subscription))
    }

    async fn compare_and_set_subscription(
        &self,
        subscription: &Subscription,
        expected_version: u64,
    ) -> Result<CasOutcome, DomainError> {
        self.state
            .write()
            .await
            .compare_and_set(subscription, expected_version)
    }

    async fn compare_and_set_revoking_licenses(
        &self,
        subscription: &Subscription,
        expected_version: u64,
    ) -> Result<(CasOutcome, u64), DomainError> {
        let mut state = self.state.write().await;
        let outcome = state.compare_and_set(subscription, expected_version)?;
        let revoked = match outcome {
            CasOutcome::Applied(_) => state.revoke_licenses(&subscription.user_id),
            CasOutcome::Conflict => 0,
        };
        Ok((outcome, revoked))
    }
}

#[async_trait]
impl SagaIntentRepository for InMemoryEntitlementStore {
    async fn find_intent(&self, key: &IntentKey) -> Result<Option<SagaIntent>, DomainError> {
        Ok(self.state.read().await.intents.get(key).cloned())
    }

    async fn insert_intent_if_absent(
        &self,
        intent: SagaIntent,
    ) -> Result<SagaIntent, DomainError> {
        let mut state = self.state.write().await;
        match state.intents.get(&intent.key) {
            Some(existing) if !existing.is_expired(intent.created_at) => Ok(existing.clone()),
            _ => {
                state.intents.insert(intent.key.clone(), intent.clone());
                Ok(intent)
            }
        }
    }

    async fn find_intent_by_external_subscription(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<SagaIntent>, DomainError> {
        Ok(self
            .state
            .read()
            .await
            .intents
            .values()
            .find(|i| i.external_subscription_id == external_subscription_id)
            .cloned())
    }

    async fn delete_expired_intents(&self, now: Timestamp) -> Result<u64, DomainError> {
        let mut state = self.state.write().await;
        let before = state.intents.len();
        state.intents.retain(|_, i| !i.is_expired(now));
        Ok((before - state.intents.len()) as u64)
    }
}

#[async_trait]
impl DeviceRepository for InMemoryEntitlementStore {
    async fn register_device(
        &self,
        device: Device,
        limit: u32,
    ) -> Result<DeviceRegistration, DomainError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.devices.values_mut().find(|d| {
            d.user_id == device.user_id && d.device_identifier == device.device_identifier
        }) {
            existing.touch(device.last_active_at);
            return Ok(DeviceRegistration::Touched(existing.clone()));
        }
        let registered = state
            .devices
            .values()
            .filter(|d| d.user_id == device.user_id)
            .count() as u32;
        if registered >= limit {
            return Ok(DeviceRegistration::LimitReached);
        }
        state.devices.insert(device.id, device.clone());
        Ok(DeviceRegistration::Registered(device))
    }

    async fn list_devices(&self, user_id: &UserId) -> Result<Vec<Device>, DomainError> {
        let state = self.state.read().await;
        let mut devices: Vec<Device> = state
            .devices
            .values()
            .filter(|d| &d.user_id == user_id)
            .cloned()
            .collect();
        devices.sort_by_key(|d| d.registered_at);
        Ok(devices)
    }

    async fn find_device(
        &self,
        user_id: &UserId,
        device_id: &DeviceId,
    ) -> Result<Option<Device>, DomainError> {
        Ok(self
            .state
            .read()
            .await
            .devices
            .get(device_id)
            .filter(|d| &d.user_id == user_id)
            .cloned())
    }

    async fn remove_device(
        &self,
        user_id: &UserId,
        device_id: &DeviceId,
    ) -> Result<Option<u64>, DomainError> {
        let mut state = self.state.write().await;
        if !state
            .devices
            .get(device_id)
            .is_some_and(|d| &d.user_id == user_id)
        {
            return Ok(None);
        }
        state.devices.remove(device_id);
        let mut revoked = 0;
        for license in state.licenses.values_mut() {
            if license.device_id.as_ref() == Some(device_id)
                && license.status == LicenseStatus::Redeemed
                && license.revoke()
            {
                revoked += 1;
            }
        }
        Ok(Some(revoked))
    }
}

#[async_trait]
impl LicenseRepository for InMemoryEntitlementStore {
    async fn issue_license(
        &self,
        license: &DownloadLicense,
        quota: u32,
        now: Timestamp,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        if state.slots_in_use(&license.user_id, now) >= quota {
            return Ok(false);
        }
        state.licenses.insert(license.id, license.clone());
        Ok(true)
    }

    async fn redeem_license(
        &self,
        request: RedeemRequest,
    ) -> Result<DownloadLicense, EntitlementError> {
        let mut state = self.state.write().await;
        let license_id = state
            .licenses
            .values()
            .find(|l| l.token_digest == request.token_digest && l.user_id == request.user_id)
            .map(|l| l.id)
            .ok_or(EntitlementError::LicenseNotFound)?;
        if !state
            .devices
            .get(&request.device_id)
            .is_some_and(|d| d.user_id == request.user_id)
        {
            return Err(EntitlementError::DeviceNotRegistered);
        }

        let slots = state.slots_in_use(&request.user_id, request.now);
        let license = state
            .licenses
            .get_mut(&license_id)
            .ok_or(EntitlementError::LicenseNotFound)?;
        match license.redeem_within_quota(
            request.device_id,
            slots,
            request.quota,
            request.offline_window_secs,
            request.now,
        )? {
            RedeemOutcome::Redeemed => Ok(license.clone()),
            RedeemOutcome::ExpiredNow => Err(EntitlementError::TokenExpired),
        }
    }

    async fn list_licenses(&self, user_id: &UserId) -> Result<Vec<DownloadLicense>, DomainError> {
        let state = self.state.read().await;
        let mut licenses: Vec<DownloadLicense> = state
            .licenses
            .values()
            .filter(|l| &l.user_id == user_id)
            .cloned()
            .collect();
        licenses.sort_by_key(|l| l.issued_at);
        Ok(licenses)
    }

    async fn revoke_licenses_for_user(&self, user_id: &UserId) -> Result<u64, DomainError> {
        Ok(self.state.write().await.revoke_licenses(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entitlement::Platform;
    use crate::domain::foundation::EpisodeId;
    use crate::domain::subscription::fixtures::new_subscription;
    use crate::domain::subscription::SubscriptionStatus;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    fn subscription_for(user: &User, ext: &str, status: SubscriptionStatus) -> Subscription {
        let mut new = new_subscription(*user.id(), ext);
        new.status = status;
        Subscription::materialize(new, Timestamp::now())
    }

    fn registered(address: &str) -> User {
        User::register(email(address), "Viewer", "hash".to_string(), Timestamp::now()).unwrap()
    }

    #[tokio::test]
    async fn commit_signup_is_idempotent_per_external_id() {
        let store = InMemoryEntitlementStore::new();
        let user = registered("a@example.com");
        let sub = subscription_for(&user, "sub_1", SubscriptionStatus::Active);
        let commit = SignupCommit {
            user: user.clone(),
            subscription: sub.clone(),
        };

        assert_eq!(
            store.commit_signup(commit.clone()).await.unwrap(),
            SignupCommitOutcome::Committed(sub.clone())
        );
        assert_eq!(
            store.commit_signup(commit).await.unwrap(),
            SignupCommitOutcome::SubscriptionExists(sub)
        );
        assert_eq!(store.user_count().await, 1);
        assert_eq!(store.subscription_count().await, 1);
    }

    #[tokio::test]
    async fn commit_signup_refuses_account_with_other_credentials() {
        let store = InMemoryEntitlementStore::new();
        let owner = registered("a@example.com");
        store.seed_user(owner.clone()).await;
        let rival =
            User::register(email("a@example.com"), "Rival", "other".to_string(), Timestamp::now())
                .unwrap();

        let outcome = store
            .commit_signup(SignupCommit {
                user: rival.clone(),
                subscription: subscription_for(&rival, "sub_1", SubscriptionStatus::Active),
            })
            .await
            .unwrap();

        assert_eq!(outcome, SignupCommitOutcome::AccountTaken(owner));
        assert_eq!(store.subscription_count().await, 0);
    }

    #[tokio::test]
    async fn commit_signup_rejects_second_live_subscription() {
        let store = InMemoryEntitlementStore::new();
        let user = registered("a@example.com");
        store
            .seed_subscription(subscription_for(&user, "sub_1", SubscriptionStatus::PastDue))
            .await;

        let outcome = store
            .commit_signup(SignupCommit {
                user: user.clone(),
                subscription: subscription_for(&user, "sub_2", SubscriptionStatus::Active),
            })
            .await
            .unwrap();

        assert_eq!(outcome, SignupCommitOutcome::LiveSubscriptionExists);
        assert_eq!(store.subscription_count().await, 1);
    }

    #[tokio::test]
    async fn placeholder_takes_credentials_but_full_account_is_kept() {
        let store = InMemoryEntitlementStore::new();
        let address = email("a@example.com");
        let placeholder = User::placeholder(address.clone(), None, Timestamp::now());
        store.seed_user(placeholder.clone()).await;

        let user = registered("a@example.com");
        store
            .commit_signup(SignupCommit {
                user: user.clone(),
                subscription: subscription_for(&user, "sub_1", SubscriptionStatus::Active),
            })
            .await
            .unwrap();

        let stored = store.find_user_by_email(&address).await.unwrap().unwrap();
        assert!(!stored.is_placeholder());
        assert_eq!(stored.password_hash(), Some("hash"));
    }

    #[tokio::test]
    async fn cas_rejects_stale_version() {
        let store = InMemoryEntitlementStore::new();
        let user = registered("a@example.com");
        let sub = subscription_for(&user, "sub_1", SubscriptionStatus::Active);
        store.seed_subscription(sub.clone()).await;

        let mut changed = sub.clone();
        changed.mark_past_due(Timestamp::now()).unwrap();

        let applied = store.compare_and_set_subscription(&changed, 1).await.unwrap();
        assert!(matches!(applied, CasOutcome::Applied(ref s) if s.version == 2));
        assert_eq!(
            store.compare_and_set_subscription(&changed, 1).await.unwrap(),
            CasOutcome::Conflict
        );
    }

    #[tokio::test]
    async fn forced_conflicts_are_consumed() {
        let store = InMemoryEntitlementStore::new();
        let user = registered("a@example.com");
        let sub = subscription_for(&user, "sub_1", SubscriptionStatus::Active);
        store.seed_subscription(sub.clone()).await;
        store.force_cas_conflicts(1).await;

        assert_eq!(
            store.compare_and_set_subscription(&sub, 1).await.unwrap(),
            CasOutcome::Conflict
        );
        assert!(matches!(
            store.compare_and_set_subscription(&sub, 1).await.unwrap(),
            CasOutcome::Applied(_)
        ));
    }

    #[tokio::test]
    async fn revoking_cas_revokes_only_when_the_write_lands() {
        let store = InMemoryEntitlementStore::new();
        let user = registered("a@example.com");
        let sub = subscription_for(&user, "sub_1", SubscriptionStatus::Active);
        store.seed_subscription(sub.clone()).await;
        let now = Timestamp::now();
        let (license, _token) =
            DownloadLicense::issue(*user.id(), EpisodeId::new("ep-1").unwrap(), 600, now);
        store.issue_license(&license, 2, now).await.unwrap();

        let mut cancelled = sub.clone();
        cancelled.cancel(now.plus_secs(1)).unwrap();

        store.force_cas_conflicts(1).await;
        let (outcome, revoked) = store
            .compare_and_set_revoking_licenses(&cancelled, 1)
            .await
            .unwrap();
        assert_eq!(outcome, CasOutcome::Conflict);
        assert_eq!(revoked, 0);
        assert_eq!(
            store.list_licenses(user.id()).await.unwrap()[0].status,
            LicenseStatus::Issued
        );

        let (outcome, revoked) = store
            .compare_and_set_revoking_licenses(&cancelled, 1)
            .await
            .unwrap();
        assert!(matches!(outcome, CasOutcome::Applied(ref s) if s.version == 2));
        assert_eq!(revoked, 1);
        assert_eq!(
            store.list_licenses(user.id()).await.unwrap()[0].status,
            LicenseStatus::Revoked
        );
    }

    #[tokio::test]
    async fn device_limit_counts_distinct_identifiers_only() {
        let store = InMemoryEntitlementStore::new();
        let user = UserId::new();
        let now = Timestamp::now();
        for id in ["tv-1", "phone-1"] {
            let device = Device::register(user, Platform::Tv, id, now).unwrap();
            assert!(matches!(
                store.register_device(device, 2).await.unwrap(),
                DeviceRegistration::Registered(_)
            ));
        }

        let again = Device::register(user, Platform::Tv, "tv-1", now.plus_secs(5)).unwrap();
        assert!(matches!(
            store.register_device(again, 2).await.unwrap(),
            DeviceRegistration::Touched(d) if d.last_active_at == now.plus_secs(5)
        ));

        let third = Device::register(user, Platform::Web, "web-1", now).unwrap();
        assert_eq!(
            store.register_device(third, 2).await.unwrap(),
            DeviceRegistration::LimitReached
        );
    }

    #[tokio::test]
    async fn redeem_requires_own_device_and_license() {
        let store = InMemoryEntitlementStore::new();
        let user = UserId::new();
        let now = Timestamp::now();
        let device = Device::register(user, Platform::Ios, "ipad", now).unwrap();
        store.register_device(device.clone(), 4).await.unwrap();
        let (license, token) =
            DownloadLicense::issue(user, EpisodeId::new("ep-1").unwrap(), 600, now);
        assert!(store.issue_license(&license, 2, now).await.unwrap());

        let request = |user_id: UserId, device_id: DeviceId| RedeemRequest {
            user_id,
            token_digest: token.digest(),
            device_id,
            quota: 2,
            offline_window_secs: 3600,
            now,
        };

        assert_eq!(
            store.redeem_license(request(UserId::new(), device.id)).await,
            Err(EntitlementError::LicenseNotFound)
        );
        assert_eq!(
            store.redeem_license(request(user, DeviceId::new())).await,
            Err(EntitlementError::DeviceNotRegistered)
        );
        let redeemed = store.redeem_license(request(user, device.id)).await.unwrap();
        assert_eq!(redeemed.status, LicenseStatus::Redeemed);
        assert_eq!(
            store.redeem_license(request(user, device.id)).await,
            Err(EntitlementError::TokenAlreadyRedeemed)
        );
    }

    #[tokio::test]
    async fn expired_redemption_is_persisted() {
        let store = InMemoryEntitlementStore::new();
        let user = UserId::new();
        let now = Timestamp::now();
        let device = Device::register(user, Platform::Ios, "ipad", now).unwrap();
        store.register_device(device.clone(), 4).await.unwrap();
        let (license, token) =
            DownloadLicense::issue(user, EpisodeId::new("ep-1").unwrap(), 600, now);
        store.issue_license(&license, 2, now).await.unwrap();

        let result = store
            .redeem_license(RedeemRequest {
                user_id: user,
                token_digest: token.digest(),
                device_id: device.id,
                quota: 2,
                offline_window_secs: 3600,
                now: now.plus_secs(600),
            })
            .await;

        assert_eq!(result, Err(EntitlementError::TokenExpired));
        let stored = store.list_licenses(&user).await.unwrap();
        assert_eq!(stored[0].status, LicenseStatus::Expired);
    }

    #[tokio::test]
    async fn removing_device_revokes_its_redeemed_licenses() {
        let store = InMemoryEntitlementStore::new();
        let user = UserId::new();
        let now = Timestamp::now();
        let device = Device::register(user, Platform::Android, "pixel", now).unwrap();
        store.register_device(device.clone(), 4).await.unwrap();
        let (license, token) =
            DownloadLicense::issue(user, EpisodeId::new("ep-1").unwrap(), 600, now);
        store.issue_license(&license, 2, now).await.unwrap();
        store
            .redeem_license(RedeemRequest {
                user_id: user,
                token_digest: token.digest(),
                device_id: device.id,
                quota: 2,
                offline_window_secs: 3600,
                now,
            })
            .await
            .unwrap();

        assert_eq!(store.remove_device(&user, &device.id).await.unwrap(), Some(1));
        assert_eq!(store.remove_device(&user, &device.id).await.unwrap(), None);
        let stored = store.list_licenses(&user).await.unwrap();
        assert_eq!(stored[0].status, LicenseStatus::Revoked);
    }

    #[tokio::test]
    async fn expired_intent_is_replaced() {
        let store = InMemoryEntitlementStore::new();
        let address = email("a@example.com");
        let plan = crate::domain::foundation::PlanId::new("premium").unwrap();
        let now = Timestamp::now();
        let intent = |sub: &str, at: Timestamp| SagaIntent {
            key: IntentKey::derive(&address, &plan),
            email: address.clone(),
            plan_id: plan.clone(),
            external_customer_id: "cus_1".to_string(),
            external_subscription_id: sub.to_string(),
            client_secret: "secret".to_string(),
            created_at: at,
            expires_at: at.plus_secs(60),
        };

        let first = store.insert_intent_if_absent(intent("sub_1", now)).await.unwrap();
        let racing = store.insert_intent_if_absent(intent("sub_2", now)).await.unwrap();
        assert_eq!(racing, first);

        let later = now.plus_secs(120);
        let replaced = store.insert_intent_if_absent(intent("sub_3", later)).await.unwrap();
        assert_eq!(replaced.external_subscription_id, "sub_3");
        assert_eq!(store.delete_expired_intents(later.plus_secs(60)).await.unwrap(), 1);
    }
}
