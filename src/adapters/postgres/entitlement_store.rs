//! PostgreSQL implementation of the user and subscription repositories.
//!
//! Multi-row writes run in one transaction. The user's row is locked with
//! `FOR UPDATE` before any check that spans the user's rows, and the
//! one-live-subscription rule is backed by a partial unique index so a
//! concurrent writer that slips past the check still fails.

use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};

use crate::domain::account::{Email, User};
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::domain::subscription::Subscription;
use crate::ports::{
    CasOutcome, MaterializeOutcome, SignupCommit, SignupCommitOutcome, SubscriptionRepository,
    UserRepository,
};

use super::license_repository::revoke_user_licenses;
use super::rows::{db_error, violates, SubscriptionRow, UserRow, LIVE_STATUSES, ONE_LIVE_PER_USER};

/// Entitlement store backed by PostgreSQL.
///
/// Implements every repository of the entitlement store port; the saga
/// intent, device and license parts live in sibling modules.
#[derive(Clone)]
pub struct PostgresEntitlementStore {
    pub(super) pool: PgPool,
}

impl PostgresEntitlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub(super) async fn begin(&self) -> Result<Transaction<'static, Postgres>, DomainError> {
        self.pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to start transaction", e))
    }
}

/// Locks the user's row for the rest of the transaction.
pub(super) async fn lock_user(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &UserId,
) -> Result<(), DomainError> {
    sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| db_error("Failed to lock user", e))?;
    Ok(())
}

/// Insert-if-absent; a stored placeholder takes the credentials of an
/// incoming credentialed account.
async fn upsert_user(tx: &mut Transaction<'_, Postgres>, user: &User) -> Result<(), DomainError> {
    sqlx::query(
        r#"
        INSERT INTO users (id, email, display_name, password_hash, role, status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (id) DO UPDATE SET
            display_name = EXCLUDED.display_name,
            password_hash = EXCLUDED.password_hash,
            status = EXCLUDED.status
        WHERE users.password_hash IS NULL AND EXCLUDED.password_hash IS NOT NULL
        "#,
    )
    .bind(user.id().as_uuid())
    .bind(user.email().as_str())
    .bind(user.display_name())
    .bind(user.password_hash())
    .bind(user.role().as_str())
    .bind(user.status().as_str())
    .bind(user.created_at().as_datetime())
    .execute(&mut **tx)
    .await
    .map_err(|e| db_error("Failed to save user", e))?;
    Ok(())
}

/// The user's row, locked for the rest of the transaction.
async fn find_user_for_update(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &UserId,
) -> Result<Option<User>, DomainError> {
    let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| db_error("Failed to lock user", e))?;
    row.map(User::try_from).transpose()
}

async fn find_by_external_id_for_update(
    tx: &mut Transaction<'_, Postgres>,
    external_subscription_id: &str,
) -> Result<Option<Subscription>, DomainError> {
    let row: Option<SubscriptionRow> = sqlx::query_as(
        "SELECT * FROM subscriptions WHERE external_subscription_id = $1 FOR UPDATE",
    )
    .bind(external_subscription_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| db_error("Failed to fetch subscription", e))?;
    row.map(Subscription::try_from).transpose()
}

/// Returns true if the user owns a live subscription other than `subscription`.
async fn has_other_live(
    tx: &mut Transaction<'_, Postgres>,
    subscription: &Subscription,
) -> Result<bool, DomainError> {
    if !subscription.status.is_live() {
        return Ok(false);
    }
    let found: Option<(uuid::Uuid,)> = sqlx::query_as(
        r#"
        SELECT id FROM subscriptions
        WHERE user_id = $1 AND status = ANY($2) AND external_subscription_id <> $3
        LIMIT 1
        "#,
    )
    .bind(subscription.user_id.as_uuid())
    .bind(&LIVE_STATUSES[..])
    .bind(&subscription.external_subscription_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| db_error("Failed to check live subscriptions", e))?;
    Ok(found.is_some())
}

/// Inserts the subscription unless its external id is taken. Returns false
/// when the row already existed.
async fn insert_subscription(
    tx: &mut Transaction<'_, Postgres>,
    subscription: &Subscription,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO subscriptions (
            id, user_id, plan_id, plan_revision, external_subscription_id,
            external_customer_id, status, current_period_end, created_at, updated_at, version
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (external_subscription_id) DO NOTHING
        "#,
    )
    .bind(subscription.id.as_uuid())
    .bind(subscription.user_id.as_uuid())
    .bind(subscription.plan_id.as_str())
    .bind(subscription.plan_revision as i32)
    .bind(&subscription.external_subscription_id)
    .bind(&subscription.external_customer_id)
    .bind(subscription.status.as_str())
    .bind(subscription.current_period_end.as_datetime())
    .bind(subscription.created_at.as_datetime())
    .bind(subscription.updated_at.as_datetime())
    .bind(subscription.version as i64)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected() == 1)
}

async fn delete_intents_for(
    tx: &mut Transaction<'_, Postgres>,
    external_subscription_id: &str,
) -> Result<(), DomainError> {
    sqlx::query("DELETE FROM saga_intents WHERE external_subscription_id = $1")
        .bind(external_subscription_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| db_error("Failed to delete saga intent", e))?;
    Ok(())
}

/// `UPDATE ... WHERE version = $n`; bumps the version when it matches.
async fn update_if_version<'e, E>(
    executor: E,
    subscription: &Subscription,
    expected_version: u64,
) -> Result<CasOutcome, DomainError>
where
    E: PgExecutor<'e>,
{
    let row: Option<SubscriptionRow> = sqlx::query_as(
        r#"
        UPDATE subscriptions SET
            plan_id = $3,
            plan_revision = $4,
            external_customer_id = $5,
            status = $6,
            current_period_end = $7,
            updated_at = $8,
            version = version + 1
        WHERE external_subscription_id = $1 AND version = $2
        RETURNING *
        "#,
    )
    .bind(&subscription.external_subscription_id)
    .bind(expected_version as i64)
    .bind(subscription.plan_id.as_str())
    .bind(subscription.plan_revision as i32)
    .bind(&subscription.external_customer_id)
    .bind(subscription.status.as_str())
    .bind(subscription.current_period_end.as_datetime())
    .bind(subscription.updated_at.as_datetime())
    .fetch_optional(executor)
    .await
    .map_err(|e| {
        if violates(&e, ONE_LIVE_PER_USER) {
            return DomainError::new(
                ErrorCode::DuplicateSubscription,
                "user already owns a live subscription",
            );
        }
        db_error("Failed to update subscription", e)
    })?;

    match row {
        Some(row) => Ok(CasOutcome::Applied(row.try_into()?)),
        None => Ok(CasOutcome::Conflict),
    }
}

async fn commit(tx: Transaction<'_, Postgres>) -> Result<(), DomainError> {
    tx.commit()
        .await
        .map_err(|e| db_error("Failed to commit transaction", e))
}

#[async_trait]
impl UserRepository for PostgresEntitlementStore {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to fetch user", e))?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to fetch user", e))?;
        row.map(User::try_from).transpose()
    }
}

#[async_trait]
impl SubscriptionRepository for PostgresEntitlementStore {
    async fn find_subscription_by_external_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> =
            sqlx::query_as("SELECT * FROM subscriptions WHERE external_subscription_id = $1")
                .bind(external_subscription_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to fetch subscription", e))?;
        row.map(Subscription::try_from).transpose()
    }

    async fn find_live_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(
            "SELECT * FROM subscriptions WHERE user_id = $1 AND status = ANY($2) LIMIT 1",
        )
        .bind(user_id.as_uuid())
        .bind(&LIVE_STATUSES[..])
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to fetch live subscription", e))?;
        row.map(Subscription::try_from).transpose()
    }

    async fn find_current_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(
            r#"
            SELECT * FROM subscriptions
            WHERE user_id = $1
            ORDER BY (status = ANY($2)) DESC, updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(&LIVE_STATUSES[..])
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to fetch subscription", e))?;
        row.map(Subscription::try_from).transpose()
    }

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, DomainError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as("SELECT * FROM subscriptions")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list subscriptions", e))?;
        rows.into_iter().map(Subscription::try_from).collect()
    }

    async fn commit_signup(
        &self,
        commit_request: SignupCommit,
    ) -> Result<SignupCommitOutcome, DomainError> {
        let SignupCommit { user, subscription } = commit_request;
        let external_id = subscription.external_subscription_id.clone();
        let mut tx = self.begin().await?;

        // The upsert waits on a concurrent inserter, so the locked read below
        // sees whichever credentials won.
        upsert_user(&mut tx, &user).await?;
        let stored = find_user_for_update(&mut tx, user.id())
            .await?
            .ok_or_else(|| DomainError::new(ErrorCode::DatabaseError, "user vanished"))?;
        if stored.password_hash() != user.password_hash() {
            return Ok(SignupCommitOutcome::AccountTaken(stored));
        }

        if let Some(existing) = find_by_external_id_for_update(&mut tx, &external_id).await? {
            delete_intents_for(&mut tx, &external_id).await?;
            commit(tx).await?;
            return Ok(SignupCommitOutcome::SubscriptionExists(existing));
        }
        if has_other_live(&mut tx, &subscription).await? {
            return Ok(SignupCommitOutcome::LiveSubscriptionExists);
        }

        match insert_subscription(&mut tx, &subscription).await {
            Ok(true) => {}
            Ok(false) => {
                // A webhook materialized the row after our check.
                let existing = find_by_external_id_for_update(&mut tx, &external_id)
                    .await?
                    .ok_or_else(|| {
                        DomainError::new(ErrorCode::DatabaseError, "subscription vanished")
                    })?;
                delete_intents_for(&mut tx, &external_id).await?;
                commit(tx).await?;
                return Ok(SignupCommitOutcome::SubscriptionExists(existing));
            }
            Err(e) if violates(&e, ONE_LIVE_PER_USER) => {
                return Ok(SignupCommitOutcome::LiveSubscriptionExists)
            }
            Err(e) => return Err(db_error("Failed to insert subscription", e)),
        }

        delete_intents_for(&mut tx, &external_id).await?;
        commit(tx).await?;
        Ok(SignupCommitOutcome::Committed(subscription))
    }

    async fn materialize_from_event(
        &self,
        placeholder: Option<User>,
        subscription: Subscription,
    ) -> Result<MaterializeOutcome, DomainError> {
        let mut tx = self.begin().await?;

        if let Some(user) = &placeholder {
            upsert_user(&mut tx, user).await?;
        }
        lock_user(&mut tx, &subscription.user_id).await?;

        if let Some(existing) =
            find_by_external_id_for_update(&mut tx, &subscription.external_subscription_id).await?
        {
            return Ok(MaterializeOutcome::Exists(existing));
        }
        if has_other_live(&mut tx, &subscription).await? {
            return Ok(MaterializeOutcome::LiveSubscriptionExists);
        }

        match insert_subscription(&mut tx, &subscription).await {
            Ok(true) => {
                commit(tx).await?;
                Ok(MaterializeOutcome::Created(subscription))
            }
            Ok(false) => {
                let existing = find_by_external_id_for_update(
                    &mut tx,
                    &subscription.external_subscription_id,
                )
                .await?
                .ok_or_else(|| {
                    DomainError::new(ErrorCode::DatabaseError, "subscription vanished")
                })?;
                Ok(MaterializeOutcome::Exists(existing))
            }
            Err(e) if violates(&e, ONE_LIVE_PER_USER) => {
                Ok(MaterializeOutcome::LiveSubscriptionExists)
            }
            Err(e) => Err(db_error("Failed to insert subscription", e)),
        }
    }

    async fn compare_and_set_subscription(
        &self,
        subscription: &Subscription,
        expected_version: u64,
    ) -> Result<CasOutcome, DomainError> {
        update_if_version(&self.pool, subscription, expected_version).await
    }

    async fn compare_and_set_revoking_licenses(
        &self,
        subscription: &Subscription,
        expected_version: u64,
    ) -> Result<(CasOutcome, u64), DomainError> {
        let mut tx = self.begin().await?;
        lock_user(&mut tx, &subscription.user_id).await?;

        let outcome = update_if_version(&mut *tx, subscription, expected_version).await?;
        if outcome == CasOutcome::Conflict {
            return Ok((outcome, 0));
        }
        let revoked = revoke_user_licenses(&mut *tx, &subscription.user_id).await?;
        commit(tx).await?;
        Ok((outcome, revoked))
    }
}

