//! RevokeAllLicensesHandler - Withdraws every outstanding download license
//! of a user.

use std::sync::Arc;

use crate::domain::entitlement::EntitlementError;
use crate::domain::foundation::UserId;
use crate::ports::LicenseRepository;

#[derive(Debug, Clone)]
pub struct RevokeAllLicensesCommand {
    pub user_id: UserId,
}

pub struct RevokeAllLicensesHandler {
    licenses: Arc<dyn LicenseRepository>,
}

impl RevokeAllLicensesHandler {
    pub fn new(licenses: Arc<dyn LicenseRepository>) -> Self {
        Self { licenses }
    }

    /// Returns the number of licenses revoked.
    pub async fn handle(&self, cmd: RevokeAllLicensesCommand) -> Result<u64, EntitlementError> {
        let revoked = self.licenses.revoke_licenses_for_user(&cmd.user_id).await?;
        tracing::info!(user_id = %cmd.user_id, revoked, "Download licenses revoked");
        Ok(revoked)
    }
}
