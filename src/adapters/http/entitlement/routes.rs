//! Router for subscription status, device and download endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};

use super::handlers::{
    deregister_device, get_my_subscription, issue_license, list_devices, redeem_license,
    register_device, revoke_all_licenses,
};
use crate::adapters::http::state::AppState;

/// All routes require authentication.
///
/// - `GET /subscriptions/me`
/// - `GET /devices`, `POST /devices`, `DELETE /devices/:id`
/// - `POST /downloads/licenses`, `DELETE /downloads/licenses`
/// - `POST /downloads/redeem`
pub fn entitlement_routes() -> Router<AppState> {
    Router::new()
        .route("/subscriptions/me", get(get_my_subscription))
        .route("/devices", get(list_devices).post(register_device))
        .route("/devices/:id", delete(deregister_device))
        .route(
            "/downloads/licenses",
            post(issue_license).delete(revoke_all_licenses),
        )
        .route("/downloads/redeem", post(redeem_license))
}
