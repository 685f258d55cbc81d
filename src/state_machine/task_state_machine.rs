use chrono::{DateTime, Utc};

use super::{
    errors::{StateMachineError, StateMachineResult},
    events::TaskEvent,
    states::TaskStatus,
};
use crate::constants::PROGRESS_COMPLETE;
use crate::models::{ProvisionTask, TaskTransition};

/// Applies task events to an in-memory task record.
///
/// The machine never persists anything; the task tracker loads the record,
/// drives the machine, and writes the result back through the task store.
pub struct TaskStateMachine<'a> {
    task: &'a mut ProvisionTask,
}

impl<'a> TaskStateMachine<'a> {
    pub fn new(task: &'a mut ProvisionTask) -> Self {
        Self { task }
    }

    pub fn current_state(&self) -> TaskStatus {
        self.task.status
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: TaskStatus,
        event: &TaskEvent,
    ) -> StateMachineResult<TaskStatus> {
        let target = match (current_state, event) {
            (TaskStatus::Queued, TaskEvent::Start) => TaskStatus::Processing,
            // A second worker picking up a redelivered message
            (TaskStatus::Processing, TaskEvent::Start) => TaskStatus::Processing,
            (TaskStatus::Processing, TaskEvent::Progress) => TaskStatus::Processing,

            (TaskStatus::Processing, TaskEvent::Complete) => TaskStatus::Completed,

            (TaskStatus::Queued, TaskEvent::Fail(_)) => TaskStatus::Failed,
            (TaskStatus::Processing, TaskEvent::Fail(_)) => TaskStatus::Failed,

            (TaskStatus::Queued, TaskEvent::Cancel) => TaskStatus::Cancelled,
            (TaskStatus::Processing, TaskEvent::Cancel) => TaskStatus::Cancelled,

            (TaskStatus::Failed, TaskEvent::Retry) => TaskStatus::Queued,

            (from_state, _) => {
                return Err(StateMachineError::InvalidTransition {
                    from: from_state.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    /// Check guard conditions for the transition
    fn check_guards(
        &self,
        target_state: TaskStatus,
        event: &TaskEvent,
        worker_id: Option<&str>,
    ) -> StateMachineResult<()> {
        match (target_state, event) {
            (TaskStatus::Processing, TaskEvent::Start) if worker_id.is_none() => {
                Err(StateMachineError::GuardFailed {
                    reason: "moving a task to processing requires an authenticated worker"
                        .to_string(),
                })
            }
            (TaskStatus::Queued, TaskEvent::Retry) if !self.task.can_retry() => {
                Err(StateMachineError::GuardFailed {
                    reason: format!(
                        "retry budget exhausted ({}/{})",
                        self.task.retry_count, self.task.max_retries
                    ),
                })
            }
            _ => Ok(()),
        }
    }

    /// Apply an event, mutating the task and appending to its audit history
    pub fn transition(
        &mut self,
        event: TaskEvent,
        worker_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> StateMachineResult<TaskStatus> {
        let current_state = self.current_state();
        let target_state = Self::determine_target_state(current_state, &event)?;
        self.check_guards(target_state, &event, worker_id)?;

        let task = &mut *self.task;
        match &event {
            TaskEvent::Start => {
                task.worker_id = worker_id.map(str::to_string);
            }
            TaskEvent::Progress => {
                if let Some(worker) = worker_id {
                    task.worker_id = Some(worker.to_string());
                }
            }
            TaskEvent::Complete => {
                // The step in flight when the worker reports completion is done
                if let Some(step) = task.current_step.take() {
                    task.record_step(&step);
                }
                task.progress = PROGRESS_COMPLETE;
                task.lease_expires_at = None;
                task.cancellation_requested = false;
            }
            TaskEvent::Fail(message) => {
                task.error_message = Some(message.clone());
                task.lease_expires_at = None;
            }
            TaskEvent::Cancel => {
                task.lease_expires_at = None;
            }
            TaskEvent::Retry => {
                task.retry_count += 1;
                task.error_message = None;
                task.progress = 0;
                task.current_step = None;
                task.worker_id = None;
                task.lease_expires_at = None;
                task.cancellation_requested = false;
            }
        }

        task.status = target_state;
        task.updated_at = now;

        if current_state != target_state {
            task.history.push(TaskTransition {
                from_status: current_state,
                to_status: target_state,
                event: event.event_type().to_string(),
                worker_id: worker_id.map(str::to_string),
                detail: event.error_message().map(str::to_string),
                occurred_at: now,
            });
        }

        Ok(target_state)
    }
}
