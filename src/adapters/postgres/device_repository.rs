//! PostgreSQL implementation of DeviceRepository.

use async_trait::async_trait;

use crate::domain::entitlement::Device;
use crate::domain::foundation::{DeviceId, DomainError, UserId};
use crate::ports::{DeviceRegistration, DeviceRepository};

use super::entitlement_store::{lock_user, PostgresEntitlementStore};
use super::rows::{db_error, DeviceRow};

#[async_trait]
impl DeviceRepository for PostgresEntitlementStore {
    async fn register_device(
        &self,
        device: Device,
        limit: u32,
    ) -> Result<DeviceRegistration, DomainError> {
        let mut tx = self.begin().await?;
        lock_user(&mut tx, &device.user_id).await?;

        let touched: Option<DeviceRow> = sqlx::query_as(
            r#"
            UPDATE devices SET last_active_at = $3
            WHERE user_id = $1 AND device_identifier = $2
            RETURNING *
            "#,
        )
        .bind(device.user_id.as_uuid())
        .bind(&device.device_identifier)
        .bind(device.last_active_at.as_datetime())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to touch device", e))?;

        if let Some(row) = touched {
            tx.commit()
                .await
                .map_err(|e| db_error("Failed to commit device", e))?;
            return Ok(DeviceRegistration::Touched(row.try_into()?));
        }

        let (registered,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM devices WHERE user_id = $1")
            .bind(device.user_id.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to count devices", e))?;
        if registered >= i64::from(limit) {
            return Ok(DeviceRegistration::LimitReached);
        }

        sqlx::query(
            r#"
            INSERT INTO devices (id, user_id, platform, device_identifier, registered_at, last_active_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(device.id.as_uuid())
        .bind(device.user_id.as_uuid())
        .bind(device.platform.as_str())
        .bind(&device.device_identifier)
        .bind(device.registered_at.as_datetime())
        .bind(device.last_active_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to insert device", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit device", e))?;
        Ok(DeviceRegistration::Registered(device))
    }

    async fn list_devices(&self, user_id: &UserId) -> Result<Vec<Device>, DomainError> {
        let rows: Vec<DeviceRow> =
            sqlx::query_as("SELECT * FROM devices WHERE user_id = $1 ORDER BY registered_at")
                .bind(user_id.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_error("Failed to list devices", e))?;
        rows.into_iter().map(Device::try_from).collect()
    }

    async fn find_device(
        &self,
        user_id: &UserId,
        device_id: &DeviceId,
    ) -> Result<Option<Device>, DomainError> {
        let row: Option<DeviceRow> =
            sqlx::query_as("SELECT * FROM devices WHERE id = $1 AND user_id = $2")
                .bind(device_id.as_uuid())
                .bind(user_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to fetch device", e))?;
        row.map(Device::try_from).transpose()
    }

    async fn remove_device(
        &self,
        user_id: &UserId,
        device_id: &DeviceId,
    ) -> Result<Option<u64>, DomainError> {
        let mut tx = self.begin().await?;
        lock_user(&mut tx, user_id).await?;

        let deleted = sqlx::query("DELETE FROM devices WHERE id = $1 AND user_id = $2")
            .bind(device_id.as_uuid())
            .bind(user_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to delete device", e))?;
        if deleted.rows_affected() == 0 {
            return Ok(None);
        }

        let revoked = sqlx::query(
            r#"
            UPDATE download_licenses SET status = 'revoked'
            WHERE user_id = $1 AND device_id = $2 AND status = 'redeemed'
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(device_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to revoke device licenses", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit device removal", e))?;
        Ok(Some(revoked.rows_affected()))
    }
}
