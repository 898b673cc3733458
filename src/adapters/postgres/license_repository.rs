//! PostgreSQL implementation of LicenseRepository.
//!
//! Issue and redeem lock the user's row so the offline quota check and the
//! write that consumes a slot happen as one step.

use async_trait::async_trait;
use sqlx::{PgExecutor, Postgres, Transaction};

use crate::domain::entitlement::{DownloadLicense, EntitlementError, RedeemOutcome};
use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::ports::{LicenseRepository, RedeemRequest};

use super::entitlement_store::{lock_user, PostgresEntitlementStore};
use super::rows::{db_error, LicenseRow};

async fn slots_in_use(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &UserId,
    now: Timestamp,
) -> Result<u32, DomainError> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM download_licenses
        WHERE user_id = $1 AND status = 'redeemed' AND expires_at > $2
        "#,
    )
    .bind(user_id.as_uuid())
    .bind(now.as_datetime())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| db_error("Failed to count offline slots", e))?;
    Ok(u32::try_from(count).unwrap_or(u32::MAX))
}

#[async_trait]
impl LicenseRepository for PostgresEntitlementStore {
    async fn issue_license(
        &self,
        license: &DownloadLicense,
        quota: u32,
        now: Timestamp,
    ) -> Result<bool, DomainError> {
        let mut tx = self.begin().await?;
        lock_user(&mut tx, &license.user_id).await?;

        if slots_in_use(&mut tx, &license.user_id, now).await? >= quota {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO download_licenses (
                id, user_id, episode_id, token_digest, device_id, status,
                issued_at, expires_at, redeemed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(license.id.as_uuid())
        .bind(license.user_id.as_uuid())
        .bind(license.episode_id.as_str())
        .bind(&license.token_digest)
        .bind(license.device_id.map(|d| *d.as_uuid()))
        .bind(license.status.as_str())
        .bind(license.issued_at.as_datetime())
        .bind(license.expires_at.as_datetime())
        .bind(license.redeemed_at.map(|t| *t.as_datetime()))
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to insert license", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit license", e))?;
        Ok(true)
    }

    async fn redeem_license(
        &self,
        request: RedeemRequest,
    ) -> Result<DownloadLicense, EntitlementError> {
        let mut tx = self.begin().await?;
        lock_user(&mut tx, &request.user_id).await?;

        let row: Option<LicenseRow> = sqlx::query_as(
            "SELECT * FROM download_licenses WHERE user_id = $1 AND token_digest = $2 FOR UPDATE",
        )
        .bind(request.user_id.as_uuid())
        .bind(&request.token_digest)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to fetch license", e))?;
        let mut license = DownloadLicense::try_from(row.ok_or(EntitlementError::LicenseNotFound)?)?;

        let (device_known,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM devices WHERE id = $1 AND user_id = $2)")
                .bind(request.device_id.as_uuid())
                .bind(request.user_id.as_uuid())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| db_error("Failed to check device", e))?;
        if !device_known {
            return Err(EntitlementError::DeviceNotRegistered);
        }

        let slots = slots_in_use(&mut tx, &request.user_id, request.now).await?;
        let outcome = license.redeem_within_quota(
            request.device_id,
            slots,
            request.quota,
            request.offline_window_secs,
            request.now,
        )?;

        sqlx::query(
            r#"
            UPDATE download_licenses SET
                status = $2, device_id = $3, expires_at = $4, redeemed_at = $5
            WHERE id = $1
            "#,
        )
        .bind(license.id.as_uuid())
        .bind(license.status.as_str())
        .bind(license.device_id.map(|d| *d.as_uuid()))
        .bind(license.expires_at.as_datetime())
        .bind(license.redeemed_at.map(|t| *t.as_datetime()))
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to update license", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit redemption", e))?;

        match outcome {
            RedeemOutcome::Redeemed => Ok(license),
            RedeemOutcome::ExpiredNow => Err(EntitlementError::TokenExpired),
        }
    }

    async fn list_licenses(&self, user_id: &UserId) -> Result<Vec<DownloadLicense>, DomainError> {
        let rows: Vec<LicenseRow> =
            sqlx::query_as("SELECT * FROM download_licenses WHERE user_id = $1 ORDER BY issued_at")
                .bind(user_id.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_error("Failed to list licenses", e))?;
        rows.into_iter().map(DownloadLicense::try_from).collect()
    }

    async fn revoke_licenses_for_user(&self, user_id: &UserId) -> Result<u64, DomainError> {
        revoke_user_licenses(&self.pool, user_id).await
    }
}

/// Revokes the user's issued and redeemed licenses.
pub(super) async fn revoke_user_licenses<'e, E>(
    executor: E,
    user_id: &UserId,
) -> Result<u64, DomainError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE download_licenses SET status = 'revoked'
        WHERE user_id = $1 AND status IN ('issued', 'redeemed')
        "#,
    )
    .bind(user_id.as_uuid())
    .execute(executor)
    .await
    .map_err(|e| db_error("Failed to revoke licenses", e))?;
    Ok(result.rows_affected())
}
