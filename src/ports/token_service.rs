//! Token service port.
//!
//! Issues and validates the bearer tokens that carry request-scoped
//! identity, and signs media grants for redeemed download licenses.
//!
//! # Security Requirements
//!
//! Implementations MUST validate signature, issuer and expiry on every
//! token, and MUST reject a refresh token or media grant presented as an
//! access token.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    AuthError, AuthenticatedUser, DeviceId, EpisodeId, LicenseId, Timestamp, UserId,
};

/// Tokens returned after signup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Facts a media grant attests to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaGrant {
    pub license_id: LicenseId,
    pub user_id: UserId,
    pub episode_id: EpisodeId,
    pub device_id: DeviceId,
    /// End of the offline playback window.
    pub expires_at: Timestamp,
}

/// Issues and validates signed tokens.
pub trait TokenService: Send + Sync {
    /// Issue an access/refresh pair for `user`.
    fn issue_session(
        &self,
        user: &AuthenticatedUser,
        now: Timestamp,
    ) -> Result<SessionTokens, AuthError>;

    /// Validate an access token and return the identity it carries.
    fn validate_access(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;

    /// Sign a playback grant valid until `grant.expires_at`.
    fn issue_media_grant(&self, grant: &MediaGrant, now: Timestamp) -> Result<String, AuthError>;
}
