//! Row types and conversions shared by the Postgres adapters.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::account::{Email, User, UserStatus};
use crate::domain::entitlement::{Device, DownloadLicense, Platform};
use crate::domain::foundation::{
    DeviceId, DomainError, EpisodeId, ErrorCode, LicenseId, PlanId, SubscriptionId, Timestamp,
    UserId,
};
use crate::domain::subscription::{IntentKey, SagaIntent, Subscription};
use crate::ports::WebhookEventRecord;

/// Statuses that occupy a user's single live-subscription slot.
pub(super) const LIVE_STATUSES: [&str; 3] = ["pending", "active", "past_due"];

pub(super) const ONE_LIVE_PER_USER: &str = "subscriptions_one_live_per_user";

pub(super) fn db_error(context: &str, err: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, err))
}

/// Returns true if `err` violated the named unique constraint or index.
pub(super) fn violates(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.constraint() == Some(constraint))
}

fn corrupt(field: &str, detail: impl std::fmt::Display) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Invalid stored {}: {}", field, detail),
    )
}

fn ts(dt: DateTime<Utc>) -> Timestamp {
    Timestamp::from_datetime(dt)
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct UserRow {
    id: Uuid,
    email: String,
    display_name: String,
    password_hash: Option<String>,
    role: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = DomainError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let status = match row.status.as_str() {
            "pending" => UserStatus::Pending,
            "active" => UserStatus::Active,
            other => return Err(corrupt("user status", other)),
        };
        Ok(User::reconstitute(
            UserId::from_uuid(row.id),
            Email::parse(&row.email).map_err(|e| corrupt("email", e))?,
            row.display_name,
            row.password_hash,
            row.role.parse().map_err(|e| corrupt("role", e))?,
            status,
            ts(row.created_at),
        ))
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct SubscriptionRow {
    id: Uuid,
    user_id: Uuid,
    plan_id: String,
    plan_revision: i32,
    external_subscription_id: String,
    external_customer_id: String,
    status: String,
    current_period_end: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            plan_id: PlanId::new(row.plan_id).map_err(|e| corrupt("plan_id", e))?,
            plan_revision: u32::try_from(row.plan_revision)
                .map_err(|e| corrupt("plan_revision", e))?,
            external_subscription_id: row.external_subscription_id,
            external_customer_id: row.external_customer_id,
            status: row.status.parse().map_err(|e| corrupt("status", e))?,
            current_period_end: ts(row.current_period_end),
            created_at: ts(row.created_at),
            updated_at: ts(row.updated_at),
            version: u64::try_from(row.version).map_err(|e| corrupt("version", e))?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct SagaIntentRow {
    key: String,
    email: String,
    plan_id: String,
    external_customer_id: String,
    external_subscription_id: String,
    client_secret: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<SagaIntentRow> for SagaIntent {
    type Error = DomainError;

    fn try_from(row: SagaIntentRow) -> Result<Self, Self::Error> {
        Ok(SagaIntent {
            key: IntentKey::from_stored(row.key),
            email: Email::parse(&row.email).map_err(|e| corrupt("email", e))?,
            plan_id: PlanId::new(row.plan_id).map_err(|e| corrupt("plan_id", e))?,
            external_customer_id: row.external_customer_id,
            external_subscription_id: row.external_subscription_id,
            client_secret: row.client_secret,
            created_at: ts(row.created_at),
            expires_at: ts(row.expires_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct DeviceRow {
    id: Uuid,
    user_id: Uuid,
    platform: String,
    device_identifier: String,
    registered_at: DateTime<Utc>,
    last_active_at: DateTime<Utc>,
}

impl TryFrom<DeviceRow> for Device {
    type Error = DomainError;

    fn try_from(row: DeviceRow) -> Result<Self, Self::Error> {
        Ok(Device {
            id: DeviceId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            platform: Platform::parse(&row.platform).map_err(|e| corrupt("platform", e))?,
            device_identifier: row.device_identifier,
            registered_at: ts(row.registered_at),
            last_active_at: ts(row.last_active_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct LicenseRow {
    id: Uuid,
    user_id: Uuid,
    episode_id: String,
    token_digest: String,
    device_id: Option<Uuid>,
    status: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    redeemed_at: Option<DateTime<Utc>>,
}

impl TryFrom<LicenseRow> for DownloadLicense {
    type Error = DomainError;

    fn try_from(row: LicenseRow) -> Result<Self, Self::Error> {
        Ok(DownloadLicense {
            id: LicenseId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            episode_id: EpisodeId::new(row.episode_id).map_err(|e| corrupt("episode_id", e))?,
            token_digest: row.token_digest,
            device_id: row.device_id.map(DeviceId::from_uuid),
            status: row.status.parse().map_err(|e| corrupt("license status", e))?,
            issued_at: ts(row.issued_at),
            expires_at: ts(row.expires_at),
            redeemed_at: row.redeemed_at.map(ts),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct WebhookEventRow {
    event_id: String,
    event_type: String,
    subscription_ref: Option<String>,
    received_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    status: String,
    error_message: Option<String>,
    attempts: i32,
    payload: serde_json::Value,
}

impl TryFrom<WebhookEventRow> for WebhookEventRecord {
    type Error = DomainError;

    fn try_from(row: WebhookEventRow) -> Result<Self, Self::Error> {
        Ok(WebhookEventRecord {
            event_id: row.event_id,
            event_type: row.event_type,
            subscription_ref: row.subscription_ref,
            received_at: ts(row.received_at),
            processed_at: row.processed_at.map(ts),
            status: row.status.parse().map_err(|e| corrupt("webhook status", e))?,
            error_message: row.error_message,
            attempts: u32::try_from(row.attempts).map_err(|e| corrupt("attempts", e))?,
            payload: row.payload,
        })
    }
}
