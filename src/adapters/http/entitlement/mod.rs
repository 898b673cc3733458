pub mod dto;
pub mod handlers;
pub mod routes;

pub use routes::entitlement_routes;
