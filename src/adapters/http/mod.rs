//! HTTP adapter - axum routes, DTOs and middleware.
//!
//! Handlers translate JSON into application commands and map module errors
//! to status codes in [`error`]. Identity comes from the Bearer token via
//! [`middleware::auth_middleware`].

pub mod admin;
pub mod entitlement;
pub mod error;
pub mod middleware;
pub mod router;
pub mod signup;
pub mod state;
pub mod webhook;

pub use error::ErrorResponse;
pub use router::app_router;
pub use state::{AppDependencies, AppState, Repositories};
