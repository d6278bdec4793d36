//! # Structured Logging Module
//!
//! Console logging for the reconciler, pretty or JSON, filtered by the
//! configured level unless `RUST_LOG` is set.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

use crate::config::LoggingConfig;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = build_filter(&config.level);

        let layer = if config.is_json() {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // Use try_init to avoid panic if global subscriber already set
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = std::process::id(),
            level = %config.level,
            format = %config.format,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// `RUST_LOG` wins over the configured level
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Log structured data for a tenant lifecycle decision
pub fn log_tenant_operation(
    operation: &str,
    task_id: Option<Uuid>,
    tenant_id: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        task_id = ?task_id,
        tenant_id = tenant_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 TENANT_OPERATION"
    );
}
