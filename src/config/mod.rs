//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `REELPASS` prefix and
//! nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use reelpass::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod auth;
mod catalog;
mod database;
mod entitlement;
mod error;
mod payment;
mod reconciler;
mod server;

pub use auth::AuthConfig;
pub use catalog::CatalogConfig;
pub use database::DatabaseConfig;
pub use entitlement::EntitlementConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use reconciler::ReconcilerConfig;
pub use server::{Environment, LogFormat, ServerConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, logging)
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL; the in-memory store is used when absent
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Payment provider credentials and retry policy
    pub payment: PaymentConfig,

    /// Token signing
    pub auth: AuthConfig,

    /// License and saga windows
    #[serde(default)]
    pub entitlement: EntitlementConfig,

    /// Webhook reconciliation limits
    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    /// Plan catalog source
    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `REELPASS` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// - `REELPASS__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `REELPASS__PAYMENT__API_KEY=...` -> `payment.api_key = ...`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("REELPASS")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        let environment = &self.server.environment;
        self.server.validate()?;
        if let Some(database) = &self.database {
            database.validate()?;
        }
        self.payment.validate(environment)?;
        self.auth.validate(environment)?;
        self.entitlement.validate()?;
        self.reconciler.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "REELPASS__PAYMENT__API_KEY",
        "REELPASS__PAYMENT__WEBHOOK_SECRET",
        "REELPASS__AUTH__JWT_SECRET",
        "REELPASS__DATABASE__URL",
        "REELPASS__SERVER__PORT",
        "REELPASS__SERVER__LOG_FORMAT",
        "REELPASS__ENTITLEMENT__OFFLINE_WINDOW_SECS",
    ];

    fn set_minimal_env() {
        env::set_var("REELPASS__PAYMENT__API_KEY", "sk_test_xxx");
        env::set_var("REELPASS__PAYMENT__WEBHOOK_SECRET", "whsec_xxx");
        env::set_var("REELPASS__AUTH__JWT_SECRET", "dev-secret");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_minimal_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("minimal config loads");
        assert!(config.database.is_none());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.entitlement, EntitlementConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nested_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("REELPASS__DATABASE__URL", "postgresql://test@localhost/test");
        env::set_var("REELPASS__SERVER__PORT", "3000");
        env::set_var("REELPASS__SERVER__LOG_FORMAT", "json");
        env::set_var("REELPASS__ENTITLEMENT__OFFLINE_WINDOW_SECS", "3600");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.database.is_some());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.log_format, LogFormat::Json);
        assert_eq!(config.entitlement.offline_window_secs, 3600);
    }

    #[test]
    fn test_missing_payment_section_fails() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("REELPASS__AUTH__JWT_SECRET", "dev-secret");
        let result = AppConfig::load();
        clear_env();

        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}
