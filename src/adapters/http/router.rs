//! Top-level router and middleware stack.

use std::time::Duration;

use axum::http::HeaderValue;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::admin::{admin_routes, catalog_routes};
use super::entitlement::entitlement_routes;
use super::middleware::auth_middleware;
use super::signup::signup_routes;
use super::state::AppState;
use super::webhook::webhook_routes;
use crate::config::ServerConfig;

/// Builds the application router.
///
/// # Routes
/// - `GET /health` (outside the middleware stack)
/// - signup: `/auth/signup-subscription/*`, `/subscriptions/checkout-session`
/// - entitlements: `/subscriptions/me`, `/devices`, `/downloads/*`
/// - webhooks: `/webhooks/payment-provider`
/// - catalog and operator: `/plans`, `/admin/*`
pub fn app_router(state: AppState, server: &ServerConfig) -> Router {
    let api = Router::new()
        .merge(signup_routes())
        .merge(entitlement_routes())
        .merge(catalog_routes())
        .merge(admin_routes())
        .route_layer(from_fn_with_state(
            state.token_service.clone(),
            auth_middleware,
        ));

    // Outermost first
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&server.cors_origins_list()))
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.request_timeout_secs,
        )));

    Router::new()
        .merge(api)
        .merge(webhook_routes())
        .layer(middleware)
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_accepts_configured_origins() {
        // Builds without panicking for both shapes
        let _ = cors_layer(&[]);
        let _ = cors_layer(&["https://app.example.com".to_string(), "bad\norigin".to_string()]);
    }
}
