//! # Task Metrics
//!
//! The orchestrator records task lifecycle events through [`MetricsCollector`].
//! [`OpenTelemetryMetricsCollector`] exports them through the global
//! OpenTelemetry meter provider; exporter wiring is left to the embedding
//! process.
//!
//! Instruments:
//! - `provisioning.tasks.created.total` (task_type)
//! - `provisioning.tasks.completed.total` (task_type)
//! - `provisioning.tasks.failed.total` (task_type)
//! - `provisioning.tasks.retried.total` (task_type)
//! - `provisioning.tasks.cancelled.total` (task_type)
//! - `provisioning.callbacks.rejected.total` (reason)
//! - `provisioning.task.duration` histogram in ms (task_type, outcome)

mod in_memory;

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

use crate::models::TaskType;

pub use in_memory::{InMemoryMetricsCollector, MetricEvent};

pub trait MetricsCollector: Send + Sync + std::fmt::Debug {
    fn task_created(&self, task_type: TaskType);

    fn task_completed(&self, task_type: TaskType, duration: chrono::Duration);

    fn task_failed(&self, task_type: TaskType, duration: chrono::Duration);

    fn task_retried(&self, task_type: TaskType);

    fn task_cancelled(&self, task_type: TaskType);

    /// A worker callback refused for authentication or authorization reasons
    fn callback_rejected(&self, reason: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsCollector;

impl MetricsCollector for NoopMetricsCollector {
    fn task_created(&self, _task_type: TaskType) {}
    fn task_completed(&self, _task_type: TaskType, _duration: chrono::Duration) {}
    fn task_failed(&self, _task_type: TaskType, _duration: chrono::Duration) {}
    fn task_retried(&self, _task_type: TaskType) {}
    fn task_cancelled(&self, _task_type: TaskType) {}
    fn callback_rejected(&self, _reason: &str) {}
}

static PROVISIONING_METER: OnceLock<Meter> = OnceLock::new();

fn meter() -> &'static Meter {
    PROVISIONING_METER
        .get_or_init(|| opentelemetry::global::meter_provider().meter("provisioning-core"))
}

#[derive(Clone)]
pub struct OpenTelemetryMetricsCollector {
    created: Counter<u64>,
    completed: Counter<u64>,
    failed: Counter<u64>,
    retried: Counter<u64>,
    cancelled: Counter<u64>,
    callbacks_rejected: Counter<u64>,
    duration: Histogram<f64>,
}

impl std::fmt::Debug for OpenTelemetryMetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenTelemetryMetricsCollector")
            .field("meter", &"provisioning-core")
            .finish()
    }
}

impl Default for OpenTelemetryMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenTelemetryMetricsCollector {
    pub fn new() -> Self {
        let meter = meter();
        Self {
            created: meter
                .u64_counter("provisioning.tasks.created.total")
                .with_description("Total provisioning tasks created")
                .build(),
            completed: meter
                .u64_counter("provisioning.tasks.completed.total")
                .with_description("Total provisioning tasks completed")
                .build(),
            failed: meter
                .u64_counter("provisioning.tasks.failed.total")
                .with_description("Total provisioning tasks failed")
                .build(),
            retried: meter
                .u64_counter("provisioning.tasks.retried.total")
                .with_description("Total provisioning task retries")
                .build(),
            cancelled: meter
                .u64_counter("provisioning.tasks.cancelled.total")
                .with_description("Total provisioning tasks cancelled")
                .build(),
            callbacks_rejected: meter
                .u64_counter("provisioning.callbacks.rejected.total")
                .with_description("Total worker callbacks rejected by authentication")
                .build(),
            duration: meter
                .f64_histogram("provisioning.task.duration")
                .with_description("Time from task creation to terminal state in milliseconds")
                .with_unit("ms")
                .build(),
        }
    }

    fn type_label(task_type: TaskType) -> [KeyValue; 1] {
        [KeyValue::new("task_type", task_type.as_str())]
    }

    fn record_duration(&self, task_type: TaskType, duration: chrono::Duration, outcome: &'static str) {
        // Clock skew can make the duration negative; clamp
        let millis = duration.num_milliseconds().max(0) as f64;
        self.duration.record(
            millis,
            &[
                KeyValue::new("task_type", task_type.as_str()),
                KeyValue::new("outcome", outcome),
            ],
        );
    }
}

impl MetricsCollector for OpenTelemetryMetricsCollector {
    fn task_created(&self, task_type: TaskType) {
        self.created.add(1, &Self::type_label(task_type));
    }

    fn task_completed(&self, task_type: TaskType, duration: chrono::Duration) {
        self.completed.add(1, &Self::type_label(task_type));
        self.record_duration(task_type, duration, "completed");
    }

    fn task_failed(&self, task_type: TaskType, duration: chrono::Duration) {
        self.failed.add(1, &Self::type_label(task_type));
        self.record_duration(task_type, duration, "failed");
    }

    fn task_retried(&self, task_type: TaskType) {
        self.retried.add(1, &Self::type_label(task_type));
    }

    fn task_cancelled(&self, task_type: TaskType) {
        self.cancelled.add(1, &Self::type_label(task_type));
    }

    fn callback_rejected(&self, reason: &str) {
        self.callbacks_rejected
            .add(1, &[KeyValue::new("reason", reason.to_string())]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otel_collector_records_without_exporter() {
        // The global no-op provider accepts measurements
        let collector = OpenTelemetryMetricsCollector::new();
        collector.task_created(TaskType::TenantProvision);
        collector.task_completed(TaskType::TenantProvision, chrono::Duration::seconds(3));
        collector.task_failed(TaskType::FeatureUpdate, chrono::Duration::milliseconds(-5));
        collector.callback_rejected("expired_token");
    }
}
