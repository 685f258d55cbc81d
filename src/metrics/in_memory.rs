use parking_lot::Mutex;
use std::sync::Arc;

use super::MetricsCollector;
use crate::models::TaskType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricEvent {
    Created(TaskType),
    Completed(TaskType),
    Failed(TaskType),
    Retried(TaskType),
    Cancelled(TaskType),
    CallbackRejected(String),
}

/// Records every event in order; used by tests and local diagnostics
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetricsCollector {
    events: Arc<Mutex<Vec<MetricEvent>>>,
}

impl InMemoryMetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &MetricEvent) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }

    fn push(&self, event: MetricEvent) {
        self.events.lock().push(event);
    }
}

impl MetricsCollector for InMemoryMetricsCollector {
    fn task_created(&self, task_type: TaskType) {
        self.push(MetricEvent::Created(task_type));
    }

    fn task_completed(&self, task_type: TaskType, _duration: chrono::Duration) {
        self.push(MetricEvent::Completed(task_type));
    }

    fn task_failed(&self, task_type: TaskType, _duration: chrono::Duration) {
        self.push(MetricEvent::Failed(task_type));
    }

    fn task_retried(&self, task_type: TaskType) {
        self.push(MetricEvent::Retried(task_type));
    }

    fn task_cancelled(&self, task_type: TaskType) {
        self.push(MetricEvent::Cancelled(task_type));
    }

    fn callback_rejected(&self, reason: &str) {
        self.push(MetricEvent::CallbackRejected(reason.to_string()));
    }
}
