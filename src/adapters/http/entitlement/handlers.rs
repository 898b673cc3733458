//! HTTP handlers for subscription status, devices and downloads.
//!
//! The caller's identity always comes from [`RequireAuth`]; request bodies
//! never name a user.

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::handlers::entitlement::{
    DeregisterDeviceCommand, GetMySubscriptionQuery, IssueDownloadLicenseCommand,
    ListDevicesQuery, RedeemDownloadLicenseCommand, RegisterDeviceCommand,
    RevokeAllLicensesCommand,
};
use crate::domain::entitlement::EntitlementError;
use crate::domain::foundation::DeviceId;

use super::dto::{
    DeregisterDeviceResponse, DeviceListResponse, DeviceResponse, IssueLicenseRequest,
    IssueLicenseResponse, MySubscriptionResponse, RedeemLicenseRequest, RedeemLicenseResponse,
    RegisterDeviceRequest, RevokeLicensesResponse,
};
use crate::adapters::http::error::EntitlementApiError;
use crate::adapters::http::middleware::RequireAuth;
use crate::adapters::http::state::AppState;

// ════════════════════════════════════════════════════════════════════════════════
// Subscription status
// ════════════════════════════════════════════════════════════════════════════════

/// GET /subscriptions/me
pub async fn get_my_subscription(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let view = state
        .my_subscription_handler()
        .handle(GetMySubscriptionQuery { user_id: user.id })
        .await?;
    Ok(Json(MySubscriptionResponse::from(view)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Devices
// ════════════════════════════════════════════════════════════════════════════════

/// POST /devices
///
/// 201 for a new device, 200 when a known device was refreshed.
pub async fn register_device(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<RegisterDeviceRequest>,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let cmd = RegisterDeviceCommand {
        user_id: user.id,
        platform: request.platform,
        device_identifier: request.device_identifier,
    };
    let result = state.register_device_handler().handle(cmd).await?;

    let status = if result.newly_registered {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(DeviceResponse::from(result.device))))
}

/// GET /devices
pub async fn list_devices(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let devices = state
        .list_devices_handler()
        .handle(ListDevicesQuery { user_id: user.id })
        .await?;
    Ok(Json(DeviceListResponse {
        devices: devices.into_iter().map(DeviceResponse::from).collect(),
    }))
}

/// DELETE /devices/:id
pub async fn deregister_device(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(device_id): Path<String>,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let device_id: DeviceId = device_id
        .parse()
        .map_err(|_| EntitlementError::validation("device_id", "not a valid device id"))?;

    let result = state
        .deregister_device_handler()
        .handle(DeregisterDeviceCommand {
            user_id: user.id,
            device_id,
        })
        .await?;
    Ok(Json(DeregisterDeviceResponse {
        revoked_licenses: result.revoked_licenses,
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Downloads
// ════════════════════════════════════════════════════════════════════════════════

/// POST /downloads/licenses
pub async fn issue_license(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<IssueLicenseRequest>,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let result = state
        .issue_license_handler()
        .handle(IssueDownloadLicenseCommand {
            user_id: user.id,
            episode_id: request.episode_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(IssueLicenseResponse::from(result))))
}

/// POST /downloads/redeem
pub async fn redeem_license(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<RedeemLicenseRequest>,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let result = state
        .redeem_license_handler()
        .handle(RedeemDownloadLicenseCommand {
            user_id: user.id,
            token: request.token,
            device_id: request.device_id,
        })
        .await?;
    Ok(Json(RedeemLicenseResponse::from(result)))
}

/// DELETE /downloads/licenses
///
/// Revokes every license the caller holds, e.g. after a lost device.
pub async fn revoke_all_licenses(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let revoked = state
        .revoke_licenses_handler()
        .handle(RevokeAllLicensesCommand { user_id: user.id })
        .await?;
    Ok(Json(RevokeLicensesResponse { revoked }))
}
