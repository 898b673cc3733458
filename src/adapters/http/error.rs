//! Error responses.
//!
//! Every module error maps to an HTTP status and a stable code in exactly one
//! `IntoResponse` impl. Bodies are always `{"code": "...", "message": "..."}`.
//! Server-side failures are logged here and answered with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::entitlement::EntitlementError;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::subscription::{SubscriptionError, WebhookError};

/// JSON error body.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

pub(crate) fn error_response(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(code, message))).into_response()
}

fn internal(code: &str, detail: &str) -> Response {
    tracing::error!(code, "Request failed: {}", detail);
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        code,
        "An internal error occurred",
    )
}

// ════════════════════════════════════════════════════════════════════════════════
// Signup and subscription errors
// ════════════════════════════════════════════════════════════════════════════════

/// API error for signup and subscription endpoints.
#[derive(Debug)]
pub struct SubscriptionApiError(pub SubscriptionError);

impl From<SubscriptionError> for SubscriptionApiError {
    fn from(err: SubscriptionError) -> Self {
        Self(err)
    }
}

impl IntoResponse for SubscriptionApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SubscriptionError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            SubscriptionError::PlanNotFound(_) | SubscriptionError::NotFound => {
                StatusCode::NOT_FOUND
            }
            SubscriptionError::DuplicateSubscription
            | SubscriptionError::EmailAlreadyRegistered
            | SubscriptionError::PaymentNotConfirmed { .. }
            | SubscriptionError::InvalidState { .. } => StatusCode::CONFLICT,
            SubscriptionError::PaymentRejected(_) => StatusCode::PAYMENT_REQUIRED,
            SubscriptionError::PaymentProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            SubscriptionError::ReconciliationConflict { .. }
            | SubscriptionError::Infrastructure(_) => {
                return internal(self.0.code(), &self.0.message());
            }
        };
        error_response(status, self.0.code(), self.0.message())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Entitlement errors
// ════════════════════════════════════════════════════════════════════════════════

/// API error for device and download endpoints.
#[derive(Debug)]
pub struct EntitlementApiError(pub EntitlementError);

impl From<EntitlementError> for EntitlementApiError {
    fn from(err: EntitlementError) -> Self {
        Self(err)
    }
}

impl IntoResponse for EntitlementApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EntitlementError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            EntitlementError::NotSubscribed | EntitlementError::OfflineNotAllowed => {
                StatusCode::FORBIDDEN
            }
            EntitlementError::DeviceNotFound
            | EntitlementError::DeviceNotRegistered
            | EntitlementError::LicenseNotFound => StatusCode::NOT_FOUND,
            EntitlementError::DeviceLimitExceeded { .. }
            | EntitlementError::DownloadQuotaExceeded { .. }
            | EntitlementError::TokenAlreadyRedeemed => StatusCode::CONFLICT,
            EntitlementError::TokenExpired | EntitlementError::LicenseRevoked => StatusCode::GONE,
            EntitlementError::Infrastructure(detail) => {
                return internal(self.0.code(), detail);
            }
        };
        error_response(status, self.0.code(), self.0.to_string())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook errors
// ════════════════════════════════════════════════════════════════════════════════

/// API error for the webhook endpoint. Only raised before the event is
/// recorded.
#[derive(Debug)]
pub struct WebhookApiError(pub WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        if status.is_server_error() {
            return internal(self.0.code(), &self.0.to_string());
        }
        error_response(status, self.0.code(), self.0.to_string())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Port errors surfaced directly (operator endpoints)
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct DomainApiError(pub DomainError);

impl From<DomainError> for DomainApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for DomainApiError {
    fn into_response(self) -> Response {
        match self.0.code {
            ErrorCode::ValidationFailed => {
                error_response(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", self.0.message)
            }
            ErrorCode::Unauthorized => {
                error_response(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.0.message)
            }
            ErrorCode::Forbidden => {
                error_response(StatusCode::FORBIDDEN, "FORBIDDEN", self.0.message)
            }
            _ => internal("INTERNAL_ERROR", &self.0.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::PlanId;

    fn status_of(response: impl IntoResponse) -> StatusCode {
        response.into_response().status()
    }

    #[test]
    fn subscription_errors_map_to_documented_statuses() {
        let cases = [
            (SubscriptionError::validation("email", "bad"), StatusCode::BAD_REQUEST),
            (
                SubscriptionError::PlanNotFound(PlanId::new("gold").unwrap()),
                StatusCode::NOT_FOUND,
            ),
            (SubscriptionError::DuplicateSubscription, StatusCode::CONFLICT),
            (SubscriptionError::EmailAlreadyRegistered, StatusCode::CONFLICT),
            (SubscriptionError::payment_not_confirmed("incomplete"), StatusCode::CONFLICT),
            (
                SubscriptionError::PaymentProviderUnavailable("timeout".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (SubscriptionError::infrastructure("db"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(status_of(SubscriptionApiError(err)), expected);
        }
    }

    #[test]
    fn entitlement_errors_map_to_documented_statuses() {
        let cases = [
            (EntitlementError::NotSubscribed, StatusCode::FORBIDDEN),
            (EntitlementError::OfflineNotAllowed, StatusCode::FORBIDDEN),
            (EntitlementError::DeviceLimitExceeded { limit: 4 }, StatusCode::CONFLICT),
            (EntitlementError::DownloadQuotaExceeded { limit: 2 }, StatusCode::CONFLICT),
            (EntitlementError::TokenAlreadyRedeemed, StatusCode::CONFLICT),
            (EntitlementError::TokenExpired, StatusCode::GONE),
            (EntitlementError::LicenseRevoked, StatusCode::GONE),
            (EntitlementError::LicenseNotFound, StatusCode::NOT_FOUND),
            (EntitlementError::DeviceNotRegistered, StatusCode::NOT_FOUND),
        ];
        for (err, expected) in cases {
            assert_eq!(status_of(EntitlementApiError(err)), expected);
        }
    }

    #[test]
    fn webhook_signature_failure_is_bad_request() {
        assert_eq!(
            status_of(WebhookApiError(WebhookError::InvalidSignature)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(WebhookApiError(WebhookError::Database("down".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn domain_validation_is_bad_request() {
        assert_eq!(
            status_of(DomainApiError(DomainError::validation("limit", "too big"))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(DomainApiError(DomainError::database("gone"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
