//! # Structured Logging Module
//!
//! Environment-aware structured logging for the orchestrator and its binaries.
//! Text output for local work, JSON lines for production log shipping.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogFormat, TelemetryConfig};
use crate::models::{TaskId, TaskType};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize logging from the process environment alone
pub fn init_structured_logging() {
    let environment = get_environment();
    init_with_config(&TelemetryConfig::default(), &environment);
}

/// Initialize logging once; later calls are no-ops.
///
/// Filter precedence: `RUST_LOG`, then `telemetry.log_level`, then the
/// environment default.
pub fn init_with_config(telemetry: &TelemetryConfig, environment: &str) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let default_level = telemetry
            .log_level
            .clone()
            .unwrap_or_else(|| get_log_level(environment).to_string());
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_level));

        let layer = match telemetry.log_format {
            LogFormat::Json => fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_filter(filter)
                .boxed(),
            LogFormat::Text => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed(),
        };

        // A global subscriber may already be installed by a test harness or embedding process
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
            return;
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            service = %telemetry.service_name,
            format = ?telemetry.log_format,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

fn get_environment() -> String {
    std::env::var("PROVISIONING_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Default filter for an environment
pub fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log a task lifecycle event with uniform fields
pub fn log_task_operation(
    operation: &str,
    task_id: &TaskId,
    task_type: Option<TaskType>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        task_id = %task_id,
        task_type = task_type.map(|t| t.as_str()),
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 TASK_OPERATION"
    );
}
