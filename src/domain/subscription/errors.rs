//! Subscription-specific error types.
//!
//! Errors raised by the signup saga, checkout and subscription queries.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | ValidationFailed | 400 |
//! | PlanNotFound | 404 |
//! | NotFound | 404 |
//! | DuplicateSubscription | 409 |
//! | EmailAlreadyRegistered | 409 |
//! | PaymentNotConfirmed | 409 |
//! | InvalidState | 409 |
//! | PaymentRejected | 402 |
//! | PaymentProviderUnavailable | 503 |
//! | ReconciliationConflict | 500 |
//! | Infrastructure | 500 |

use crate::domain::foundation::{
    DomainError, ErrorCode, PlanId, SubscriptionId, ValidationError,
};

/// Subscription-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// Malformed input.
    ValidationFailed { field: String, message: String },

    /// The plan is unknown or no longer offered.
    PlanNotFound(PlanId),

    /// The user has no subscription.
    NotFound,

    /// The email already owns a live subscription.
    DuplicateSubscription,

    /// A different account owns this email.
    EmailAlreadyRegistered,

    /// The provider does not report the subscription as paid yet.
    PaymentNotConfirmed { provider_status: String },

    /// The provider refused the request permanently (card declined, bad price).
    PaymentRejected(String),

    /// The provider stayed unreachable after bounded retries.
    PaymentProviderUnavailable(String),

    /// A status change is not allowed from the current status.
    InvalidState { current: String, attempted: String },

    /// Optimistic-lock retries were exhausted.
    ReconciliationConflict {
        subscription_id: SubscriptionId,
        attempts: u32,
    },

    /// Infrastructure error.
    Infrastructure(String),
}

impl SubscriptionError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        SubscriptionError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn payment_not_confirmed(provider_status: impl Into<String>) -> Self {
        SubscriptionError::PaymentNotConfirmed {
            provider_status: provider_status.into(),
        }
    }

    pub fn invalid_state(current: impl Into<String>, attempted: impl Into<String>) -> Self {
        SubscriptionError::InvalidState {
            current: current.into(),
            attempted: attempted.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        SubscriptionError::Infrastructure(message.into())
    }

    /// Stable machine-readable code returned to clients.
    pub fn code(&self) -> &'static str {
        match self {
            SubscriptionError::ValidationFailed { .. } => "VALIDATION_FAILED",
            SubscriptionError::PlanNotFound(_) => "PLAN_NOT_FOUND",
            SubscriptionError::NotFound => "SUBSCRIPTION_NOT_FOUND",
            SubscriptionError::DuplicateSubscription => "DUPLICATE_SUBSCRIPTION",
            SubscriptionError::EmailAlreadyRegistered => "EMAIL_ALREADY_REGISTERED",
            SubscriptionError::PaymentNotConfirmed { .. } => "PAYMENT_NOT_CONFIRMED",
            SubscriptionError::PaymentRejected(_) => "PAYMENT_REJECTED",
            SubscriptionError::PaymentProviderUnavailable(_) => "PAYMENT_PROVIDER_UNAVAILABLE",
            SubscriptionError::InvalidState { .. } => "INVALID_STATE_TRANSITION",
            SubscriptionError::ReconciliationConflict { .. } => "RECONCILIATION_CONFLICT",
            SubscriptionError::Infrastructure(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns a human-readable message.
    pub fn message(&self) -> String {
        match self {
            SubscriptionError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            SubscriptionError::PlanNotFound(id) => format!("Plan not found: {}", id),
            SubscriptionError::NotFound => "No subscription found".to_string(),
            SubscriptionError::DuplicateSubscription => {
                "This email already has a pending or active subscription".to_string()
            }
            SubscriptionError::EmailAlreadyRegistered => {
                "An account with this email already exists".to_string()
            }
            SubscriptionError::PaymentNotConfirmed { provider_status } => format!(
                "Payment not confirmed yet (provider status: {})",
                provider_status
            ),
            SubscriptionError::PaymentRejected(reason) => {
                format!("Payment provider rejected the request: {}", reason)
            }
            SubscriptionError::PaymentProviderUnavailable(reason) => {
                format!("Payment provider unavailable: {}", reason)
            }
            SubscriptionError::InvalidState { current, attempted } => {
                format!("Cannot {} subscription in {} state", attempted, current)
            }
            SubscriptionError::ReconciliationConflict {
                subscription_id,
                attempts,
            } => format!(
                "Subscription {} kept changing concurrently after {} attempts",
                subscription_id, attempts
            ),
            SubscriptionError::Infrastructure(msg) => format!("Infrastructure error: {}", msg),
        }
    }

    /// Returns true if the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SubscriptionError::PaymentNotConfirmed { .. }
                | SubscriptionError::PaymentProviderUnavailable(_)
                | SubscriptionError::ReconciliationConflict { .. }
                | SubscriptionError::Infrastructure(_)
        )
    }
}

impl std::fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for SubscriptionError {}

impl From<DomainError> for SubscriptionError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => {
                let field = err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "request".to_string());
                SubscriptionError::validation(field, err.message)
            }
            ErrorCode::EmailAlreadyRegistered => SubscriptionError::EmailAlreadyRegistered,
            ErrorCode::DuplicateSubscription => SubscriptionError::DuplicateSubscription,
            ErrorCode::SubscriptionNotFound => SubscriptionError::NotFound,
            ErrorCode::InvalidStateTransition => {
                SubscriptionError::invalid_state("current", err.message)
            }
            _ => SubscriptionError::Infrastructure(err.to_string()),
        }
    }
}

impl From<ValidationError> for SubscriptionError {
    fn from(err: ValidationError) -> Self {
        SubscriptionError::validation(err.field().to_string(), err.to_string())
    }
}
