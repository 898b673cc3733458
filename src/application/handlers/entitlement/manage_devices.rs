//! ListDevicesHandler and DeregisterDeviceHandler - The explicit device
//! eviction path.

use std::sync::Arc;

use crate::domain::entitlement::{Device, EntitlementError};
use crate::domain::foundation::{DeviceId, UserId};
use crate::ports::DeviceRepository;

/// Query for a user's registered devices.
#[derive(Debug, Clone)]
pub struct ListDevicesQuery {
    pub user_id: UserId,
}

pub struct ListDevicesHandler {
    devices: Arc<dyn DeviceRepository>,
}

impl ListDevicesHandler {
    pub fn new(devices: Arc<dyn DeviceRepository>) -> Self {
        Self { devices }
    }

    /// Devices in registration order.
    pub async fn handle(&self, query: ListDevicesQuery) -> Result<Vec<Device>, EntitlementError> {
        Ok(self.devices.list_devices(&query.user_id).await?)
    }
}

/// Command to remove one of the caller's devices.
#[derive(Debug, Clone)]
pub struct DeregisterDeviceCommand {
    pub user_id: UserId,
    pub device_id: DeviceId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeregisterDeviceResult {
    /// Licenses redeemed on the device that were revoked with it.
    pub revoked_licenses: u64,
}

pub struct DeregisterDeviceHandler {
    devices: Arc<dyn DeviceRepository>,
}

impl DeregisterDeviceHandler {
    pub fn new(devices: Arc<dyn DeviceRepository>) -> Self {
        Self { devices }
    }

    pub async fn handle(
        &self,
        cmd: DeregisterDeviceCommand,
    ) -> Result<DeregisterDeviceResult, EntitlementError> {
        let revoked_licenses = self
            .devices
            .remove_device(&cmd.user_id, &cmd.device_id)
            .await?
            .ok_or(EntitlementError::DeviceNotFound)?;

        tracing::info!(
            user_id = %cmd.user_id,
            device_id = %cmd.device_id,
            revoked_licenses,
            "Device deregistered"
        );
        Ok(DeregisterDeviceResult { revoked_licenses })
    }
}
