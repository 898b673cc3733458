//! HTTP DTOs for subscription status, device and download endpoints.

use serde::{Deserialize, Serialize};

use crate::application::handlers::entitlement::{
    IssueDownloadLicenseResult, MySubscriptionView, RedeemDownloadLicenseResult,
};
use crate::domain::entitlement::Device;
use crate::domain::subscription::SubscriptionStatus;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceRequest {
    pub platform: String,
    pub device_identifier: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueLicenseRequest {
    pub episode_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemLicenseRequest {
    pub token: String,
    pub device_id: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MySubscriptionResponse {
    pub is_subscribed: bool,
    pub plan_id: Option<String>,
    pub status: Option<SubscriptionStatus>,
    /// ISO 8601.
    pub current_period_end: Option<String>,
}

impl From<MySubscriptionView> for MySubscriptionResponse {
    fn from(view: MySubscriptionView) -> Self {
        Self {
            is_subscribed: view.is_subscribed,
            plan_id: view.plan_id.map(|p| p.to_string()),
            status: view.status,
            current_period_end: view
                .current_period_end
                .map(|t| t.as_datetime().to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceResponse {
    pub id: String,
    pub platform: String,
    pub device_identifier: String,
    pub registered_at: String,
    pub last_active_at: String,
}

impl From<Device> for DeviceResponse {
    fn from(device: Device) -> Self {
        Self {
            id: device.id.to_string(),
            platform: device.platform.as_str().to_string(),
            device_identifier: device.device_identifier,
            registered_at: device.registered_at.as_datetime().to_rfc3339(),
            last_active_at: device.last_active_at.as_datetime().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceListResponse {
    pub devices: Vec<DeviceResponse>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeregisterDeviceResponse {
    pub revoked_licenses: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueLicenseResponse {
    pub license_id: String,
    /// Shown once; only its digest is stored.
    pub token: String,
    pub expires_at: String,
}

impl From<IssueDownloadLicenseResult> for IssueLicenseResponse {
    fn from(result: IssueDownloadLicenseResult) -> Self {
        Self {
            license_id: result.license_id.to_string(),
            token: result.token,
            expires_at: result.expires_at.as_datetime().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemLicenseResponse {
    pub license_id: String,
    pub media_grant: String,
    pub expires_at: String,
}

impl From<RedeemDownloadLicenseResult> for RedeemLicenseResponse {
    fn from(result: RedeemDownloadLicenseResult) -> Self {
        Self {
            license_id: result.license_id.to_string(),
            media_grant: result.media_grant,
            expires_at: result.expires_at.as_datetime().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RevokeLicensesResponse {
    pub revoked: u64,
}
