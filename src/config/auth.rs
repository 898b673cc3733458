//! Authentication configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// Minimum HS256 key length outside development.
const MIN_SECRET_BYTES: usize = 32;

/// Token signing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing key for access, refresh and media-grant tokens
    pub jwt_secret: SecretString,

    /// `iss` claim written and required
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Access token lifetime in seconds
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: u64,

    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: u64,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: SecretString::new(jwt_secret.into()),
            issuer: default_issuer(),
            access_ttl_secs: default_access_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
        }
    }

    /// Validate authentication configuration
    ///
    /// Short secrets are tolerated in development only.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        let secret = self.jwt_secret.expose_secret();
        if secret.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__JWT_SECRET"));
        }
        if *environment != Environment::Development && secret.len() < MIN_SECRET_BYTES {
            return Err(ValidationError::JwtSecretTooShort {
                min: MIN_SECRET_BYTES,
            });
        }
        if self.issuer.trim().is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__ISSUER"));
        }
        if self.access_ttl_secs == 0 || self.refresh_ttl_secs <= self.access_ttl_secs {
            return Err(ValidationError::InvalidTokenTtl);
        }
        Ok(())
    }
}

fn default_issuer() -> String {
    "reelpass".to_string()
}

fn default_access_ttl() -> u64 {
    15 * 60
}

fn default_refresh_ttl() -> u64 {
    30 * 24 * 3600
}
