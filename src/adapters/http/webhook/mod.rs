//! Payment-provider webhook endpoint.
//!
//! No user authentication; deliveries are authenticated by signature. Once
//! the event is durably recorded the endpoint answers 200, whatever the
//! reconciliation outcome, so the provider stops retrying. Deferred and
//! failed events are picked up by the reprocess job.

use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::{routing::post, Router};
use serde::Serialize;

use crate::application::handlers::webhook::{
    HandleProviderWebhookCommand, HandleProviderWebhookResult,
};
use crate::domain::subscription::WebhookError;
use crate::ports::WebhookEventStatus;

use super::error::WebhookApiError;
use super::state::AppState;

const SIGNATURE_HEADER: &str = "Payment-Signature";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAckResponse {
    pub event_id: String,
    pub status: WebhookEventStatus,
    pub duplicate: bool,
}

impl From<HandleProviderWebhookResult> for WebhookAckResponse {
    fn from(result: HandleProviderWebhookResult) -> Self {
        Self {
            event_id: result.event_id,
            status: result.status,
            duplicate: result.duplicate,
        }
    }
}

/// POST /webhooks/payment-provider
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Webhook delivery without {} header", SIGNATURE_HEADER);
            WebhookError::InvalidSignature
        })?;

    let cmd = HandleProviderWebhookCommand {
        payload: body.to_vec(),
        signature: signature.to_string(),
    };
    let result = state.webhook_handler().handle(cmd).await?;

    Ok(Json(WebhookAckResponse::from(result)))
}

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/webhooks/payment-provider", post(handle_payment_webhook))
}
