//! # Provisioning Configuration
//!
//! Layered configuration loaded with the `config` crate. Later layers win:
//!
//! 1. Built-in defaults ([`ProvisioningConfig::default`])
//! 2. `config/provisioning.toml`
//! 3. `config/provisioning.<environment>.toml`
//! 4. `PROVISIONING__<SECTION>__<KEY>` environment variables
//!
//! The environment comes from `PROVISIONING_ENV`, then `APP_ENV`, and
//! defaults to `development`.
//!
//! ```rust,no_run
//! use provisioning_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let lease = manager.config().tasks.lease_duration();
//! # let _ = lease;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{DEFAULT_MAX_RETRIES, MAX_RETRY_BUDGET, MAX_TOKEN_TTL_SECONDS};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    pub database: DatabaseConfig,
    pub messaging: MessagingConfig,
    pub auth: AuthConfig,
    pub tasks: TaskConfig,
    pub backoff: BackoffConfig,
    pub web: WebConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    InMemory,
    Postgres,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::InMemory,
            url: "postgresql://localhost/provisioning_development".to_string(),
            max_connections: 10,
            acquire_timeout_seconds: 5,
            run_migrations: true,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagingBackend {
    InMemory,
    Pgmq,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MessagingConfig {
    pub backend: MessagingBackend,
    /// Create the per-task-type queues at startup (pgmq only)
    pub initialize_queues: bool,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            backend: MessagingBackend::InMemory,
            initialize_queues: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JwtAlgorithm {
    Hs256,
    Rs256,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub algorithm: JwtAlgorithm,
    /// Shared secret for HS256
    pub jwt_secret: String,
    /// PEM private key for RS256 (only needed to issue tokens)
    pub jwt_private_key: String,
    /// PEM public key for RS256
    pub jwt_public_key: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub token_ttl_seconds: u64,
    /// Clock skew tolerated when checking `exp`
    pub leeway_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            algorithm: JwtAlgorithm::Hs256,
            jwt_secret: String::new(),
            jwt_private_key: String::new(),
            jwt_public_key: String::new(),
            jwt_issuer: "provisioning-core".to_string(),
            jwt_audience: "provisioning-workers".to_string(),
            token_ttl_seconds: 3600,
            leeway_seconds: 30,
        }
    }
}

impl AuthConfig {
    /// HS256 configuration with the given secret and no clock leeway
    pub fn for_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: secret.into(),
            leeway_seconds: 0,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TaskConfig {
    pub default_max_retries: u32,
    /// How long a Processing task may go without a worker report
    pub lease_duration_seconds: u64,
    pub reconcile_interval_seconds: u64,
    pub reconcile_batch_size: usize,
    /// Attempts at an optimistic update before giving up as transient
    pub update_conflict_retries: u32,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            default_max_retries: DEFAULT_MAX_RETRIES,
            lease_duration_seconds: 300,
            reconcile_interval_seconds: 30,
            reconcile_batch_size: 100,
            update_conflict_retries: 5,
        }
    }
}

impl TaskConfig {
    pub fn lease_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(
            u32::try_from(self.lease_duration_seconds).unwrap_or(u32::MAX),
        ))
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_delay_seconds: u64,
    pub max_delay_seconds: u64,
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_seconds: 5,
            max_delay_seconds: 300,
            multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind_address: String,
    pub request_timeout_seconds: u64,
    pub cors_enabled: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_seconds: 30,
            cors_enabled: false,
        }
    }
}

impl WebConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_format: LogFormat,
    /// Overrides the environment default when set; `RUST_LOG` wins over both
    pub log_level: Option<String>,
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "provisioning-core".to_string(),
            log_format: LogFormat::Text,
            log_level: None,
            metrics_enabled: true,
        }
    }
}

impl ProvisioningConfig {
    /// Reject configurations that would fail at runtime
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.backend == StorageBackend::Postgres && self.database.url.trim().is_empty() {
            return Err(ConfigurationError::missing_required("database.url"));
        }
        if self.messaging.backend == MessagingBackend::Pgmq
            && self.database.backend != StorageBackend::Postgres
        {
            return Err(ConfigurationError::invalid_value(
                "messaging.backend",
                "pgmq requires the postgres storage backend",
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                "must be greater than 0",
            ));
        }

        if self.auth.enabled {
            match self.auth.algorithm {
                JwtAlgorithm::Hs256 if self.auth.jwt_secret.trim().is_empty() => {
                    return Err(ConfigurationError::missing_required("auth.jwt_secret"));
                }
                JwtAlgorithm::Rs256 if self.auth.jwt_public_key.trim().is_empty() => {
                    return Err(ConfigurationError::missing_required("auth.jwt_public_key"));
                }
                _ => {}
            }
        }
        if self.auth.token_ttl_seconds == 0 || self.auth.token_ttl_seconds > MAX_TOKEN_TTL_SECONDS {
            return Err(ConfigurationError::invalid_value(
                "auth.token_ttl_seconds",
                format!("must be between 1 and {MAX_TOKEN_TTL_SECONDS}"),
            ));
        }

        if self.tasks.default_max_retries > MAX_RETRY_BUDGET {
            return Err(ConfigurationError::invalid_value(
                "tasks.default_max_retries",
                format!("must not exceed {MAX_RETRY_BUDGET}"),
            ));
        }
        if self.tasks.lease_duration_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "tasks.lease_duration_seconds",
                "must be greater than 0",
            ));
        }
        if self.tasks.reconcile_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "tasks.reconcile_interval_seconds",
                "must be greater than 0",
            ));
        }
        if self.tasks.reconcile_batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "tasks.reconcile_batch_size",
                "must be greater than 0",
            ));
        }
        if self.tasks.update_conflict_retries == 0 {
            return Err(ConfigurationError::invalid_value(
                "tasks.update_conflict_retries",
                "must be greater than 0",
            ));
        }

        if self.backoff.multiplier < 1.0 || !self.backoff.multiplier.is_finite() {
            return Err(ConfigurationError::invalid_value(
                "backoff.multiplier",
                "must be a finite value >= 1.0",
            ));
        }
        if self.backoff.base_delay_seconds > self.backoff.max_delay_seconds {
            return Err(ConfigurationError::invalid_value(
                "backoff.base_delay_seconds",
                "must not exceed backoff.max_delay_seconds",
            ));
        }

        if self.web.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigurationError::invalid_value(
                "web.bind_address",
                format!("'{}' is not a socket address", self.web.bind_address),
            ));
        }

        Ok(())
    }
}
