//! Router for signup endpoints.

use axum::{routing::post, Router};

use super::handlers::{create_checkout_session, finalize_signup, start_signup_intent};
use crate::adapters::http::state::AppState;

/// # Routes
///
/// ## Public
/// - `POST /auth/signup-subscription/intent`
/// - `POST /auth/signup-subscription/finalize`
///
/// ## Authenticated
/// - `POST /subscriptions/checkout-session`
pub fn signup_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup-subscription/intent", post(start_signup_intent))
        .route("/auth/signup-subscription/finalize", post(finalize_signup))
        .route("/subscriptions/checkout-session", post(create_checkout_session))
}
