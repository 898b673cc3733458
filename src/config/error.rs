//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    #[error("Plan catalog could not be loaded: {0}")]
    Catalog(String),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid listen address")]
    InvalidAddress,

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Payment API base URL must use HTTPS in production")]
    PaymentUrlMustBeHttps,

    #[error("Invalid payment API key format")]
    InvalidPaymentKey,

    #[error("Invalid webhook signing secret format")]
    InvalidWebhookSecret,

    #[error("Retry attempts must be between 1 and {max}")]
    InvalidAttempts { max: u32 },

    #[error("JWT secret must be at least {min} bytes")]
    JwtSecretTooShort { min: usize },

    #[error("Token TTL must be positive and refresh must outlive access")]
    InvalidTokenTtl,

    #[error("Invalid entitlement window: {0}")]
    InvalidWindow(&'static str),
}
