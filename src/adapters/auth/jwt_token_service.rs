//! HS256 JWT token service.
//!
//! Issues access and refresh tokens for signed-up users and playback grants
//! for redeemed download licenses. Every token carries a `typ` claim so one
//! kind can never be presented as another.
//!
//! Expiry is checked against the injected clock rather than wall time so the
//! whole service agrees on "now".

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::domain::foundation::{AuthError, AuthenticatedUser, Role, Timestamp, UserId};
use crate::ports::{Clock, MediaGrant, SessionTokens, TokenService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TokenKind {
    Access,
    Refresh,
    Media,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    email: String,
    role: Role,
    typ: TokenKind,
    iss: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct MediaGrantClaims {
    sub: String,
    lic: String,
    ep: String,
    dev: String,
    typ: TokenKind,
    iss: String,
    iat: i64,
    exp: i64,
}

/// JWT-backed `TokenService`.
pub struct JwtTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
    clock: Arc<dyn Clock>,
}

impl JwtTokenService {
    pub fn new(config: &AuthConfig, clock: Arc<dyn Clock>) -> Self {
        let secret = config.jwt_secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: config.issuer.clone(),
            access_ttl_secs: config.access_ttl_secs,
            refresh_ttl_secs: config.refresh_ttl_secs,
            clock,
        }
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::SigningFailed(e.to_string()))
    }

    fn session_claims(
        &self,
        user: &AuthenticatedUser,
        typ: TokenKind,
        now: Timestamp,
        ttl_secs: u64,
    ) -> SessionClaims {
        SessionClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            typ,
            iss: self.issuer.clone(),
            iat: now.as_unix_secs(),
            exp: now.plus_secs(ttl_secs).as_unix_secs(),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation
    }
}

impl TokenService for JwtTokenService {
    fn issue_session(
        &self,
        user: &AuthenticatedUser,
        now: Timestamp,
    ) -> Result<SessionTokens, AuthError> {
        let access = self.session_claims(user, TokenKind::Access, now, self.access_ttl_secs);
        let refresh = self.session_claims(user, TokenKind::Refresh, now, self.refresh_ttl_secs);

        Ok(SessionTokens {
            access_token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
            expires_in: self.access_ttl_secs,
        })
    }

    fn validate_access(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation())
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidIssuer => {
                    tracing::warn!("Invalid issuer in token");
                    AuthError::InvalidToken
                }
                _ => {
                    tracing::debug!("Token validation failed: {}", e);
                    AuthError::InvalidToken
                }
            })?;
        let claims = data.claims;

        if claims.typ != TokenKind::Access {
            return Err(AuthError::WrongTokenType);
        }
        if claims.exp <= self.clock.now().as_unix_secs() {
            return Err(AuthError::TokenExpired);
        }

        let id: UserId = claims.sub.parse().map_err(|_| AuthError::InvalidToken)?;
        Ok(AuthenticatedUser::new(id, claims.email, claims.role))
    }

    fn issue_media_grant(&self, grant: &MediaGrant, now: Timestamp) -> Result<String, AuthError> {
        self.sign(&MediaGrantClaims {
            sub: grant.user_id.to_string(),
            lic: grant.license_id.to_string(),
            ep: grant.episode_id.to_string(),
            dev: grant.device_id.to_string(),
            typ: TokenKind::Media,
            iss: self.issuer.clone(),
            iat: now.as_unix_secs(),
            exp: grant.expires_at.as_unix_secs(),
        })
    }
}
