//! HTTP handlers for the plan list and operator endpoints.

use axum::extract::{Json, Query, State};
use axum::response::IntoResponse;

use crate::application::handlers::catalog::ListPlansQuery;
use crate::application::handlers::ledger::GetLedgerSnapshotQuery;

use super::dto::{
    LedgerParams, LedgerResponse, PlanListResponse, PlanResponse, PlansParams, PurgeResponse,
    ReprocessParams, ReprocessResponse,
};
use crate::adapters::http::error::DomainApiError;
use crate::adapters::http::middleware::RequireAdmin;
use crate::adapters::http::state::AppState;

const DEFAULT_REPROCESS_LIMIT: u32 = 100;
const MAX_REPROCESS_LIMIT: u32 = 1_000;

/// GET /plans
pub async fn list_plans(
    State(state): State<AppState>,
    Query(params): Query<PlansParams>,
) -> impl IntoResponse {
    let plans = state.list_plans_handler().handle(ListPlansQuery {
        include_retired: params.include_retired,
    });
    Json(PlanListResponse {
        plans: plans.iter().map(PlanResponse::from).collect(),
    })
}

/// GET /admin/ledger (admin only)
pub async fn get_ledger(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(params): Query<LedgerParams>,
) -> Result<impl IntoResponse, DomainApiError> {
    let mut query = GetLedgerSnapshotQuery::default();
    if let Some(days) = params.churn_window_days {
        query.churn_window_days = days;
    }

    let snapshot = state.ledger_handler().handle(query).await?;
    tracing::debug!(admin_id = %admin.id, "Ledger snapshot served");
    Ok(Json(LedgerResponse::from(snapshot)))
}

/// POST /admin/webhooks/reprocess (admin only)
pub async fn reprocess_webhooks(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(params): Query<ReprocessParams>,
) -> Result<impl IntoResponse, DomainApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_REPROCESS_LIMIT)
        .clamp(1, MAX_REPROCESS_LIMIT);

    let summary = state.reprocess_handler().handle(limit).await?;
    tracing::info!(admin_id = %admin.id, examined = summary.examined, "Webhook reprocess requested");
    Ok(Json(ReprocessResponse::from(summary)))
}

/// POST /admin/saga-intents/purge (admin only)
pub async fn purge_saga_intents(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<impl IntoResponse, DomainApiError> {
    let purged = state.purge_intents_handler().handle().await?;
    tracing::info!(admin_id = %admin.id, purged, "Saga intent purge requested");
    Ok(Json(PurgeResponse { purged }))
}
