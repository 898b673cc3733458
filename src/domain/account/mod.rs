//! User accounts.

mod email;
mod user;

pub use email::Email;
pub use user::{validate_password, User, UserStatus, MIN_PASSWORD_LENGTH};
