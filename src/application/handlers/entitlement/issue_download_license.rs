//! IssueDownloadLicenseHandler - Issues a single-use offline download token.

use std::sync::Arc;

use super::EntitlementResolver;
use crate::domain::entitlement::{offline_slots_in_use, DownloadLicense, EntitlementError};
use crate::domain::foundation::{EpisodeId, LicenseId, Timestamp, UserId};
use crate::ports::LicenseRepository;

/// Command to issue a license.
#[derive(Debug, Clone)]
pub struct IssueDownloadLicenseCommand {
    pub user_id: UserId,
    pub episode_id: String,
}

/// The plaintext token is only ever returned here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDownloadLicenseResult {
    pub license_id: LicenseId,
    pub token: String,
    /// Redemption deadline.
    pub expires_at: Timestamp,
}

pub struct IssueDownloadLicenseHandler {
    resolver: Arc<EntitlementResolver>,
    licenses: Arc<dyn LicenseRepository>,
    issue_ttl_secs: u64,
}

impl IssueDownloadLicenseHandler {
    pub fn new(
        resolver: Arc<EntitlementResolver>,
        licenses: Arc<dyn LicenseRepository>,
        issue_ttl_secs: u64,
    ) -> Self {
        Self {
            resolver,
            licenses,
            issue_ttl_secs,
        }
    }

    pub async fn handle(
        &self,
        cmd: IssueDownloadLicenseCommand,
    ) -> Result<IssueDownloadLicenseResult, EntitlementError> {
        let episode_id = EpisodeId::new(cmd.episode_id.trim())?;

        // 1. Entitlement and fast quota check
        let entitlement = self.resolver.resolve(&cmd.user_id).await?;
        entitlement.require_active()?;
        let now = self.resolver.now();
        let existing = self.licenses.list_licenses(&cmd.user_id).await?;
        entitlement.check_download_quota(offline_slots_in_use(&existing, now))?;

        // 2. Store, re-checking the quota atomically
        let quota = entitlement.terms.max_offline_downloads;
        let (license, token) =
            DownloadLicense::issue(cmd.user_id, episode_id, self.issue_ttl_secs, now);
        if !self.licenses.issue_license(&license, quota, now).await? {
            return Err(EntitlementError::DownloadQuotaExceeded { limit: quota });
        }

        tracing::info!(
            user_id = %cmd.user_id,
            license_id = %license.id,
            episode_id = %license.episode_id,
            "Download license issued"
        );

        Ok(IssueDownloadLicenseResult {
            license_id: license.id,
            token: token.expose().to_string(),
            expires_at: license.expires_at,
        })
    }
}
