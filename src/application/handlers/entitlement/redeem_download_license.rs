//! RedeemDownloadLicenseHandler - Binds an issued license to a device and
//! returns a signed playback grant.
//!
//! Redemption is single-use. The store performs the status check, the device
//! check and the quota re-check under the user's lock, so two concurrent
//! redemptions of the same token cannot both succeed.

use std::sync::Arc;

use super::EntitlementResolver;
use crate::domain::entitlement::{EntitlementError, LicenseToken};
use crate::domain::foundation::{DeviceId, LicenseId, Timestamp, UserId};
use crate::ports::{LicenseRepository, MediaGrant, RedeemRequest, TokenService};

/// Command to redeem a license token on a device.
#[derive(Debug, Clone)]
pub struct RedeemDownloadLicenseCommand {
    pub user_id: UserId,
    pub token: String,
    pub device_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemDownloadLicenseResult {
    pub license_id: LicenseId,
    pub media_grant: String,
    /// End of the offline playback window.
    pub expires_at: Timestamp,
}

pub struct RedeemDownloadLicenseHandler {
    resolver: Arc<EntitlementResolver>,
    licenses: Arc<dyn LicenseRepository>,
    token_service: Arc<dyn TokenService>,
    offline_window_secs: u64,
}

impl RedeemDownloadLicenseHandler {
    pub fn new(
        resolver: Arc<EntitlementResolver>,
        licenses: Arc<dyn LicenseRepository>,
        token_service: Arc<dyn TokenService>,
        offline_window_secs: u64,
    ) -> Self {
        Self {
            resolver,
            licenses,
            token_service,
            offline_window_secs,
        }
    }

    pub async fn handle(
        &self,
        cmd: RedeemDownloadLicenseCommand,
    ) -> Result<RedeemDownloadLicenseResult, EntitlementError> {
        // 1. Validate input
        let token = LicenseToken::from_presented(&cmd.token)?;
        let device_id: DeviceId = cmd
            .device_id
            .trim()
            .parse()
            .map_err(|_| EntitlementError::validation("device_id", "must be a UUID"))?;

        // 2. Entitlement
        let entitlement = self.resolver.resolve(&cmd.user_id).await?;
        entitlement.require_active()?;
        let now = self.resolver.now();

        // 3. Atomic redemption
        let license = self
            .licenses
            .redeem_license(RedeemRequest {
                user_id: cmd.user_id,
                token_digest: token.digest(),
                device_id,
                quota: entitlement.terms.max_offline_downloads,
                offline_window_secs: self.offline_window_secs,
                now,
            })
            .await
            .map_err(|e| {
                tracing::info!(user_id = %cmd.user_id, code = e.code(), "License redemption refused");
                e
            })?;

        // 4. Sign the playback grant
        let media_grant = self
            .token_service
            .issue_media_grant(
                &MediaGrant {
                    license_id: license.id,
                    user_id: license.user_id,
                    episode_id: license.episode_id.clone(),
                    device_id,
                    expires_at: license.expires_at,
                },
                now,
            )
            .map_err(|e| {
                tracing::error!(license_id = %license.id, "Failed to sign media grant: {}", e);
                EntitlementError::Infrastructure(e.to_string())
            })?;

        tracing::info!(
            user_id = %cmd.user_id,
            license_id = %license.id,
            device_id = %device_id,
            "Download license redeemed"
        );

        Ok(RedeemDownloadLicenseResult {
            license_id: license.id,
            media_grant,
            expires_at: license.expires_at,
        })
    }
}
