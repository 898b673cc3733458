//! RegisterDeviceHandler - Binds a playback device to the caller's account.
//!
//! Idempotent on the device identifier: a known identifier only refreshes
//! `last_active_at` and never counts against the plan's device limit.

use std::sync::Arc;

use super::EntitlementResolver;
use crate::domain::entitlement::{Device, EntitlementError, Platform};
use crate::domain::foundation::UserId;
use crate::ports::{DeviceRegistration, DeviceRepository};

/// Command to register a device.
#[derive(Debug, Clone)]
pub struct RegisterDeviceCommand {
    pub user_id: UserId,
    pub platform: String,
    pub device_identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterDeviceResult {
    pub device: Device,
    /// False when the identifier was already registered.
    pub newly_registered: bool,
}

pub struct RegisterDeviceHandler {
    resolver: Arc<EntitlementResolver>,
    devices: Arc<dyn DeviceRepository>,
}

impl RegisterDeviceHandler {
    pub fn new(resolver: Arc<EntitlementResolver>, devices: Arc<dyn DeviceRepository>) -> Self {
        Self { resolver, devices }
    }

    pub async fn handle(
        &self,
        cmd: RegisterDeviceCommand,
    ) -> Result<RegisterDeviceResult, EntitlementError> {
        // 1. Validate input
        let platform = Platform::parse(&cmd.platform)?;
        let device = Device::register(
            cmd.user_id,
            platform,
            &cmd.device_identifier,
            self.resolver.now(),
        )?;

        // 2. Resolve entitlement
        let entitlement = self.resolver.resolve(&cmd.user_id).await?;
        if !entitlement.subscription.has_access() {
            return Err(EntitlementError::NotSubscribed);
        }
        // Past-due accounts may refresh known devices but not add new ones.
        let limit = match entitlement.require_active() {
            Ok(()) => entitlement.terms.device_limit,
            Err(_) => 0,
        };

        // 3. Register under the user's lock
        match self.devices.register_device(device, limit).await? {
            DeviceRegistration::Registered(device) => {
                tracing::info!(
                    user_id = %cmd.user_id,
                    device_id = %device.id,
                    platform = device.platform.as_str(),
                    "Device registered"
                );
                Ok(RegisterDeviceResult {
                    device,
                    newly_registered: true,
                })
            }
            DeviceRegistration::Touched(device) => Ok(RegisterDeviceResult {
                device,
                newly_registered: false,
            }),
            DeviceRegistration::LimitReached => {
                entitlement.require_active()?;
                tracing::info!(user_id = %cmd.user_id, limit, "Device limit reached");
                Err(EntitlementError::DeviceLimitExceeded { limit })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_support::Harness;
    use crate::domain::subscription::SubscriptionStatus;
    use crate::ports::SubscriptionRepository;

    fn handler(h: &Harness) -> RegisterDeviceHandler {
        let resolver = Arc::new(EntitlementResolver::new(
            h.store.clone(),
            h.catalog.clone(),
            h.clock.clone(),
            h.entitlement.expiry_grace_secs,
        ));
        RegisterDeviceHandler::new(resolver, h.store.clone())
    }

    fn command(user_id: UserId, identifier: &str) -> RegisterDeviceCommand {
        RegisterDeviceCommand {
            user_id,
            platform: "ios".to_string(),
            device_identifier: identifier.to_string(),
        }
    }

    #[tokio::test]
    async fn fifth_distinct_device_exceeds_limit_of_four() {
        let h = Harness::new();
        let user_id = h
            .subscriber("ada@example.com", "premium", SubscriptionStatus::Active)
            .await;
        let handler = handler(&h);

        for i in 0..4 {
            let result = handler
                .handle(command(user_id, &format!("device-{}", i)))
                .await
                .unwrap();
            assert!(result.newly_registered);
        }

        assert_eq!(
            handler.handle(command(user_id, "device-4")).await.unwrap_err(),
            EntitlementError::DeviceLimitExceeded { limit: 4 }
        );
    }

    #[tokio::test]
    async fn re_registration_never_counts() {
        let h = Harness::new();
        let user_id = h
            .subscriber("ada@example.com", "basic", SubscriptionStatus::Active)
            .await;
        let handler = handler(&h);

        let first = handler.handle(command(user_id, "tv-1")).await.unwrap();
        h.clock.advance_secs(120);
        let again = handler.handle(command(user_id, "tv-1")).await.unwrap();

        assert!(!again.newly_registered);
        assert_eq!(again.device.id, first.device.id);
        assert!(again.device.last_active_at.is_after(&first.device.last_active_at));
    }

    #[tokio::test]
    async fn past_due_can_refresh_but_not_add() {
        let h = Harness::new();
        let user_id = h
            .subscriber("ada@example.com", "premium", SubscriptionStatus::Active)
            .await;
        let handler = handler(&h);
        handler.handle(command(user_id, "phone")).await.unwrap();

        let mut sub = h
            .store
            .find_subscription_by_external_id(&format!("sub_{}", user_id))
            .await
            .unwrap()
            .unwrap();
        sub.status = SubscriptionStatus::PastDue;
        h.store.seed_subscription(sub).await;

        assert!(handler.handle(command(user_id, "phone")).await.is_ok());
        assert_eq!(
            handler.handle(command(user_id, "tablet")).await.unwrap_err(),
            EntitlementError::NotSubscribed
        );
    }

    #[tokio::test]
    async fn cancelled_account_cannot_register() {
        let h = Harness::new();
        let user_id = h
            .subscriber("ada@example.com", "premium", SubscriptionStatus::Cancelled)
            .await;

        assert_eq!(
            handler(&h).handle(command(user_id, "phone")).await.unwrap_err(),
            EntitlementError::NotSubscribed
        );
    }

    #[tokio::test]
    async fn unknown_platform_is_rejected() {
        let h = Harness::new();
        let mut cmd = command(UserId::new(), "phone");
        cmd.platform = "fridge".to_string();

        assert!(matches!(
            handler(&h).handle(cmd).await,
            Err(EntitlementError::ValidationFailed { .. })
        ));
    }
}
