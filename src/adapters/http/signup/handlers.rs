//! HTTP handlers for signup endpoints.

use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use crate::application::handlers::signup::{
    CreateCheckoutSessionCommand, FinalizeSignupCommand, StartSignupIntentCommand,
};

use super::dto::{
    CheckoutSessionRequest, CheckoutSessionResponse, FinalizeSignupRequest,
    FinalizeSignupResponse, SignupIntentRequest, SignupIntentResponse,
};
use crate::adapters::http::error::SubscriptionApiError;
use crate::adapters::http::middleware::RequireAuth;
use crate::adapters::http::state::AppState;

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// POST /auth/signup-subscription/intent
pub async fn start_signup_intent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SignupIntentRequest>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let header_key = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let cmd = StartSignupIntentCommand {
        email: request.email,
        name: request.name,
        plan_id: request.plan_id,
        payment_method_id: request.payment_method_id,
        idempotency_key: request.idempotency_key.or(header_key),
    };

    let result = state.start_signup_intent_handler().handle(cmd).await?;
    Ok((StatusCode::OK, Json(SignupIntentResponse::from(result))))
}

/// POST /auth/signup-subscription/finalize
pub async fn finalize_signup(
    State(state): State<AppState>,
    Json(request): Json<FinalizeSignupRequest>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let cmd = FinalizeSignupCommand {
        email: request.email,
        password: request.password,
        name: request.name,
        plan_id: request.plan_id,
        subscription_id: request.subscription_id,
        customer_id: request.customer_id,
    };

    let result = state.finalize_signup_handler().handle(cmd).await?;
    Ok((StatusCode::OK, Json(FinalizeSignupResponse::from(result))))
}

/// POST /subscriptions/checkout-session
pub async fn create_checkout_session(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<CheckoutSessionRequest>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let cmd = CreateCheckoutSessionCommand {
        user,
        plan_id: request.plan_id,
        success_url: request.success_url,
        cancel_url: request.cancel_url,
    };

    let result = state.checkout_session_handler().handle(cmd).await?;
    Ok((StatusCode::OK, Json(CheckoutSessionResponse::from(result))))
}
