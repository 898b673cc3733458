//! User account entity.

use serde::{Deserialize, Serialize};

use super::Email;
use crate::domain::foundation::{Role, Timestamp, UserId, ValidationError};

/// Minimum accepted password length in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Whether the account can sign in yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// Placeholder created from webhook metadata; no credentials attached.
    Pending,
    /// Credentials attached; the account can sign in.
    Active,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Pending => "pending",
            UserStatus::Active => "active",
        }
    }
}

/// A platform account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    email: Email,
    display_name: String,
    password_hash: Option<String>,
    role: Role,
    status: UserStatus,
    created_at: Timestamp,
}

impl User {
    /// Creates a fully credentialed subscriber account.
    pub fn register(
        email: Email,
        display_name: impl Into<String>,
        password_hash: String,
        now: Timestamp,
    ) -> Result<Self, ValidationError> {
        let display_name = validate_display_name(display_name.into())?;
        Ok(Self {
            id: UserId::for_email(email.as_str()),
            email,
            display_name,
            password_hash: Some(password_hash),
            role: Role::Subscriber,
            status: UserStatus::Active,
            created_at: now,
        })
    }

    /// Creates a credential-less account for an email seen in a provider event.
    pub fn placeholder(email: Email, display_name: Option<String>, now: Timestamp) -> Self {
        let display_name = display_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| email.as_str().to_string());
        Self {
            id: UserId::for_email(email.as_str()),
            email,
            display_name,
            password_hash: None,
            role: Role::Subscriber,
            status: UserStatus::Pending,
            created_at: now,
        }
    }

    /// Reconstitutes a user from persistence.
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: UserId,
        email: Email,
        display_name: String,
        password_hash: Option<String>,
        role: Role,
        status: UserStatus,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            email,
            display_name,
            password_hash,
            role,
            status,
            created_at,
        }
    }

    /// Attaches credentials to a placeholder account.
    pub fn activate(
        &mut self,
        display_name: impl Into<String>,
        password_hash: String,
    ) -> Result<(), ValidationError> {
        if self.status == UserStatus::Active {
            return Err(ValidationError::invalid_format(
                "status",
                "account already has credentials",
            ));
        }
        self.display_name = validate_display_name(display_name.into())?;
        self.password_hash = Some(password_hash);
        self.status = UserStatus::Active;
        Ok(())
    }

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn password_hash(&self) -> Option<&str> {
        self.password_hash.as_deref()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn status(&self) -> UserStatus {
        self.status
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn is_placeholder(&self) -> bool {
        self.status == UserStatus::Pending
    }
}

fn validate_display_name(name: String) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::empty_field("name"));
    }
    if trimmed.chars().count() > 100 {
        return Err(ValidationError::out_of_range(
            "name",
            1,
            100,
            trimmed.chars().count() as i64,
        ));
    }
    Ok(trimmed.to_string())
}

/// Checks a plaintext password against the signup policy.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::out_of_range(
            "password",
            MIN_PASSWORD_LENGTH as i64,
            1024,
            length as i64,
        ));
    }
    if length > 1024 {
        return Err(ValidationError::out_of_range("password", 8, 1024, length as i64));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> Email {
        Email::parse("viewer@example.com").unwrap()
    }

    #[test]
    fn register_creates_active_subscriber() {
        let user = User::register(email(), "Viewer", "hash".into(), Timestamp::now()).unwrap();
        assert_eq!(user.status(), UserStatus::Active);
        assert_eq!(user.role(), Role::Subscriber);
        assert_eq!(user.password_hash(), Some("hash"));
        assert_eq!(*user.id(), UserId::for_email("viewer@example.com"));
    }

    #[test]
    fn register_rejects_blank_name() {
        assert!(User::register(email(), "  ", "hash".into(), Timestamp::now()).is_err());
    }

    #[test]
    fn placeholder_has_same_id_as_registered_user() {
        let now = Timestamp::now();
        let placeholder = User::placeholder(email(), None, now);
        let registered = User::register(email(), "Viewer", "hash".into(), now).unwrap();
        assert_eq!(placeholder.id(), registered.id());
        assert!(placeholder.is_placeholder());
        assert_eq!(placeholder.display_name(), "viewer@example.com");
    }

    #[test]
    fn activate_attaches_credentials_once() {
        let mut user = User::placeholder(email(), Some("V".into()), Timestamp::now());
        user.activate("Viewer", "hash".into()).unwrap();
        assert_eq!(user.status(), UserStatus::Active);
        assert_eq!(user.display_name(), "Viewer");
        assert!(user.activate("Viewer", "other".into()).is_err());
        assert_eq!(user.password_hash(), Some("hash"));
    }

    #[test]
    fn short_password_is_rejected() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
    }
}
