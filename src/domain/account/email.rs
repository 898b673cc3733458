//! Normalized email address value object.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::ValidationError;

/// Lower-cased, trimmed email address.
///
/// Two spellings of the same mailbox compare equal, which keeps the unique
/// email constraint and derived user ids stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        let normalized = raw.as_ref().trim().to_lowercase();
        if normalized.is_empty() {
            return Err(ValidationError::empty_field("email"));
        }
        if normalized.len() > 254 {
            return Err(ValidationError::invalid_format("email", "too long"));
        }

        let (local, domain) = normalized
            .split_once('@')
            .ok_or_else(|| ValidationError::invalid_format("email", "missing @ symbol"))?;
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(ValidationError::invalid_format("email", "malformed address"));
        }
        if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
            return Err(ValidationError::invalid_format("email", "malformed domain"));
        }
        if normalized.chars().any(char::is_whitespace) {
            return Err(ValidationError::invalid_format("email", "contains whitespace"));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Email {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Email::parse(value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_trimmed_and_lowercased() {
        let email = Email::parse("  Viewer@Example.COM ").unwrap();
        assert_eq!(email.as_str(), "viewer@example.com");
    }

    #[test]
    fn email_without_at_is_rejected() {
        assert_eq!(
            Email::parse("viewer.example.com"),
            Err(ValidationError::invalid_format("email", "missing @ symbol"))
        );
    }

    #[test]
    fn email_with_bad_domain_is_rejected() {
        assert!(Email::parse("viewer@localhost").is_err());
        assert!(Email::parse("viewer@.com").is_err());
        assert!(Email::parse("viewer@a@b.com").is_err());
        assert!(Email::parse("@example.com").is_err());
    }

    #[test]
    fn email_with_inner_whitespace_is_rejected() {
        assert!(Email::parse("view er@example.com").is_err());
    }

    #[test]
    fn empty_email_is_rejected() {
        assert_eq!(Email::parse("   "), Err(ValidationError::empty_field("email")));
    }
}
