//! HTTP middleware for axum.
//!
//! - `auth` - Bearer token validation and identity extractors

pub mod auth;

pub use auth::{auth_middleware, AuthRejection, AuthState, RequireAdmin, RequireAuth};
