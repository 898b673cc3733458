//! Two-phase signup over HTTP.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use routes::signup_routes;
