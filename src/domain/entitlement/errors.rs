//! Device and download entitlement errors.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | ValidationFailed | 400 |
//! | NotSubscribed | 403 |
//! | OfflineNotAllowed | 403 |
//! | DeviceNotFound / LicenseNotFound / DeviceNotRegistered | 404 |
//! | DeviceLimitExceeded / DownloadQuotaExceeded / TokenAlreadyRedeemed | 409 |
//! | TokenExpired / LicenseRevoked | 410 |
//! | Infrastructure | 500 |

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntitlementError {
    #[error("Validation failed for '{field}': {message}")]
    ValidationFailed { field: String, message: String },

    #[error("No active subscription")]
    NotSubscribed,

    #[error("Device limit of {limit} reached; remove a device first")]
    DeviceLimitExceeded { limit: u32 },

    #[error("Device not found")]
    DeviceNotFound,

    #[error("Device is not registered to this account")]
    DeviceNotRegistered,

    #[error("Plan does not allow offline downloads")]
    OfflineNotAllowed,

    #[error("Offline download quota of {limit} reached")]
    DownloadQuotaExceeded { limit: u32 },

    #[error("License not found")]
    LicenseNotFound,

    #[error("License token expired")]
    TokenExpired,

    #[error("License token already redeemed")]
    TokenAlreadyRedeemed,

    #[error("License was revoked")]
    LicenseRevoked,

    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl EntitlementError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EntitlementError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code returned to clients.
    pub fn code(&self) -> &'static str {
        match self {
            EntitlementError::ValidationFailed { .. } => "VALIDATION_FAILED",
            EntitlementError::NotSubscribed => "NOT_SUBSCRIBED",
            EntitlementError::DeviceLimitExceeded { .. } => "DEVICE_LIMIT_EXCEEDED",
            EntitlementError::DeviceNotFound => "DEVICE_NOT_FOUND",
            EntitlementError::DeviceNotRegistered => "DEVICE_NOT_REGISTERED",
            EntitlementError::OfflineNotAllowed => "OFFLINE_NOT_ALLOWED",
            EntitlementError::DownloadQuotaExceeded { .. } => "DOWNLOAD_QUOTA_EXCEEDED",
            EntitlementError::LicenseNotFound => "LICENSE_NOT_FOUND",
            EntitlementError::TokenExpired => "TOKEN_EXPIRED",
            EntitlementError::TokenAlreadyRedeemed => "TOKEN_ALREADY_REDEEMED",
            EntitlementError::LicenseRevoked => "LICENSE_REVOKED",
            EntitlementError::Infrastructure(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, EntitlementError::Infrastructure(_))
    }
}

impl From<ValidationError> for EntitlementError {
    fn from(err: ValidationError) -> Self {
        EntitlementError::validation(err.field().to_string(), err.to_string())
    }
}

impl From<DomainError> for EntitlementError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => EntitlementError::validation(
                err.details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "request".to_string()),
                err.message,
            ),
            _ => EntitlementError::Infrastructure(err.to_string()),
        }
    }
}
