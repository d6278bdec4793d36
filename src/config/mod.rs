//! # Reconciler Configuration
//!
//! Settings for the store connection, probe deadlines, reconcile delays, the
//! in-process task source and logging.
//!
//! ## Sources
//!
//! Values are layered, later sources winning:
//!
//! 1. Built-in defaults (`ReconcilerConfig::default()`)
//! 2. An optional configuration file (TOML, YAML or JSON, chosen by extension)
//! 3. Environment variables such as `TENANT_RECONCILER__DATABASE__URL`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tenant_reconciler::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load_from("config/reconciler.toml")?;
//! let delay = manager.config().reconcile.processing_delay_seconds;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::reconcile::{ERROR_DELAY_SECONDS, PROCESSING_DELAY_SECONDS};

pub use error::ConfigurationError;
pub use loader::ConfigManager;

/// Accepted values of `logging.format`
pub const LOG_FORMATS: [&str; 2] = ["pretty", "json"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub database: DatabaseConfig,
    pub probe: ProbeConfig,
    pub reconcile: ReconcileConfig,
    pub dispatcher: DispatcherConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/tenant_reconciler".to_string(),
            max_connections: 10,
            acquire_timeout_seconds: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

/// Per-step deadlines of the tenant probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub schema_timeout_ms: u64,
    pub groups_timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            schema_timeout_ms: 5000,
            groups_timeout_ms: 5000,
        }
    }
}

/// Delays handed back with `Processing` answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub processing_delay_seconds: u64,
    pub error_delay_seconds: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            processing_delay_seconds: PROCESSING_DELAY_SECONDS,
            error_delay_seconds: ERROR_DELAY_SECONDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub queue_capacity: usize,
    pub redeliver: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            redeliver: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl ReconcilerConfig {
    /// Validate configuration values for consistency and requirements
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "database.url",
                "database configuration",
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                "0",
                "pool size must be greater than 0",
            ));
        }

        let positive = [
            (
                "database.acquire_timeout_seconds",
                self.database.acquire_timeout_seconds,
            ),
            ("probe.schema_timeout_ms", self.probe.schema_timeout_ms),
            ("probe.groups_timeout_ms", self.probe.groups_timeout_ms),
            (
                "reconcile.processing_delay_seconds",
                self.reconcile.processing_delay_seconds,
            ),
            (
                "reconcile.error_delay_seconds",
                self.reconcile.error_delay_seconds,
            ),
            (
                "dispatcher.queue_capacity",
                self.dispatcher.queue_capacity as u64,
            ),
        ];
        if let Some((field, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigurationError::invalid_value(
                *field,
                "0",
                "value must be greater than 0",
            ));
        }

        if self.reconcile.processing_delay_seconds > self.reconcile.error_delay_seconds {
            return Err(ConfigurationError::invalid_value(
                "reconcile.processing_delay_seconds",
                self.reconcile.processing_delay_seconds.to_string(),
                "processing delay must not exceed the error delay",
            ));
        }

        if !LOG_FORMATS
            .iter()
            .any(|format| format.eq_ignore_ascii_case(&self.logging.format))
        {
            return Err(ConfigurationError::invalid_value(
                "logging.format",
                self.logging.format.clone(),
                "expected one of: pretty, json",
            ));
        }

        Ok(())
    }
}
