//! Password hashing port.

use crate::domain::foundation::DomainError;

/// One-way password hashing.
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password into a self-describing string.
    fn hash(&self, password: &str) -> Result<String, DomainError>;

    /// Returns true if `password` matches `hash`. A malformed hash is an
    /// error, a mismatch is `Ok(false)`.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hasher_is_object_safe() {
        fn _accepts_dyn(_hasher: &dyn PasswordHasher) {}
    }
}
