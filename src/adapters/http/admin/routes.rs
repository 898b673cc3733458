use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{get_ledger, list_plans, purge_saga_intents, reprocess_webhooks};
use crate::adapters::http::state::AppState;

/// Plan listing, public.
pub fn catalog_routes() -> Router<AppState> {
    Router::new().route("/plans", get(list_plans))
}

/// Operator endpoints. Each handler requires the admin role.
///
/// - `GET /admin/ledger?churnWindowDays=30`
/// - `POST /admin/webhooks/reprocess?limit=100`
/// - `POST /admin/saga-intents/purge`
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/ledger", get(get_ledger))
        .route("/admin/webhooks/reprocess", post(reprocess_webhooks))
        .route("/admin/saga-intents/purge", post(purge_saga_intents))
}
