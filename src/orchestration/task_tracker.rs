//! # Task Tracker
//!
//! Owns the lifecycle of every provisioning task. All mutations are
//! read-modify-write cycles against the [`TaskStore`]: load the row, run the
//! state machine on a copy, and write it back conditioned on the row version.
//! A version conflict reloads and re-evaluates, so concurrent callbacks from
//! redelivered messages settle on the last committed state without any lock.
//!
//! Late, duplicate and regressive callbacks are tolerated: they come back as
//! [`UpdateOutcome::Ignored`] with the stored task unchanged.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::TaskConfig;
use crate::constants::{events, LEASE_EXPIRED_MESSAGE, MAX_RETRY_BUDGET, PROGRESS_COMPLETE};
use crate::database::{StoreError, TaskStore};
use crate::error::{ProvisioningError, ProvisioningResult};
use crate::logging::log_task_operation;
use crate::models::{CorrelationId, NewTask, ProvisionTask, TaskId, TaskTransition};
use crate::state_machine::{StateMachineError, TaskEvent, TaskStateMachine, TaskStatus};

use super::types::{CancelOutcome, IgnoreReason, RetryOutcome, StatusUpdate, UpdateOutcome};

/// What a mutation closure decided after inspecting the loaded task
enum Mutation {
    Apply,
    Ignore(IgnoreReason),
}

#[derive(Debug, Clone)]
pub struct TaskTracker {
    store: Arc<dyn TaskStore>,
    default_max_retries: u32,
    lease_duration: Duration,
    conflict_retries: u32,
}

impl TaskTracker {
    pub fn new(store: Arc<dyn TaskStore>, config: &TaskConfig) -> Self {
        Self {
            store,
            default_max_retries: config.default_max_retries,
            lease_duration: config.lease_duration(),
            conflict_retries: config.update_conflict_retries.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    pub fn lease_duration(&self) -> Duration {
        self.lease_duration
    }

    /// Persist a new Queued task with progress 0
    pub async fn create_task(&self, new_task: NewTask) -> ProvisioningResult<ProvisionTask> {
        if new_task.initiated_by.trim().is_empty() {
            return Err(ProvisioningError::validation("initiated_by must not be blank"));
        }
        if let Some(max_retries) = new_task.max_retries {
            if max_retries > MAX_RETRY_BUDGET {
                return Err(ProvisioningError::validation(format!(
                    "max_retries {max_retries} exceeds the limit of {MAX_RETRY_BUDGET}"
                )));
            }
        }
        if new_task.payload.tenant_instance_id() != new_task.tenant_instance_id {
            return Err(ProvisioningError::validation(
                "payload targets a different tenant instance than the task",
            ));
        }

        let task = new_task.into_task(self.default_max_retries, Utc::now());
        let stored = self.store.insert(&task).await?;

        log_task_operation(
            events::TASK_CREATED,
            &stored.task_id,
            Some(stored.task_type),
            stored.status.as_str(),
            Some(&format!("max_retries={}", stored.max_retries)),
        );
        Ok(stored)
    }

    pub async fn get_task(&self, task_id: &TaskId) -> ProvisioningResult<ProvisionTask> {
        self.store
            .get(task_id)
            .await?
            .ok_or_else(|| ProvisioningError::TaskNotFound(task_id.clone()))
    }

    /// Apply a worker status report.
    ///
    /// Terminal tasks, regressive progress and exact repeats are ignored, as
    /// is a report at unchanged progress naming an already completed step.
    /// Reports of Completed, Failed or Cancelled follow the terminal rules of
    /// [`Self::mark_task_completed`] and [`Self::mark_task_failed`].
    pub async fn update_task_status(
        &self,
        task_id: &TaskId,
        update: StatusUpdate,
        worker_id: Option<&str>,
    ) -> ProvisioningResult<UpdateOutcome> {
        let progress = u8::try_from(update.progress)
            .ok()
            .filter(|progress| *progress <= PROGRESS_COMPLETE)
            .ok_or_else(|| {
                ProvisioningError::validation(format!(
                    "progress {} is outside 0..=100",
                    update.progress
                ))
            })?;
        if update.status == TaskStatus::Queued {
            return Err(ProvisioningError::validation(
                "a task cannot be moved back to queued by a status report; use retry",
            ));
        }
        let worker_id = worker_id.filter(|w| !w.trim().is_empty());
        if update.status == TaskStatus::Processing && worker_id.is_none() {
            return Err(ProvisioningError::authentication(
                "moving a task to processing requires an authenticated worker",
            ));
        }
        if update
            .current_step
            .as_deref()
            .is_some_and(|step| step.trim().is_empty())
        {
            return Err(ProvisioningError::validation("current_step must not be blank"));
        }

        let lease = self.lease_duration;
        let outcome = self
            .modify(task_id, |task, now| {
                if task.is_terminal() {
                    return Ok(Mutation::Ignore(IgnoreReason::TerminalState));
                }

                let event = TaskEvent::from_reported_status(
                    task.status,
                    update.status,
                    update.error_message.as_deref(),
                )
                .ok_or_else(|| {
                    ProvisioningError::validation(format!(
                        "status {} cannot be reported by a worker",
                        update.status
                    ))
                })?;

                match event {
                    TaskEvent::Start | TaskEvent::Progress => {
                        if progress < task.progress {
                            return Ok(Mutation::Ignore(IgnoreReason::RegressiveProgress));
                        }
                        let same_step = update.current_step.is_none()
                            || update.current_step == task.current_step;
                        if task.status == TaskStatus::Processing
                            && progress == task.progress
                        {
                            if same_step {
                                return Ok(Mutation::Ignore(IgnoreReason::Duplicate));
                            }
                            // A redelivered report naming a step already finished
                            // at this progress would rewind the worker
                            if update
                                .current_step
                                .as_ref()
                                .is_some_and(|step| task.steps_completed.contains(step))
                            {
                                return Ok(Mutation::Ignore(IgnoreReason::StaleStep));
                            }
                        }

                        apply_event(task, event, worker_id, now)?;
                        task.progress = progress;
                        if let Some(next) = &update.current_step {
                            // Moving on from a reported step finishes it
                            if let Some(previous) = task.current_step.take() {
                                if &previous != next {
                                    task.record_step(&previous);
                                }
                            }
                            task.current_step = Some(next.clone());
                        }
                        task.lease_expires_at = Some(now + lease);
                        Ok(Mutation::Apply)
                    }
                    TaskEvent::Fail(_) => {
                        apply_event(task, event, worker_id, now)?;
                        // Failure is recorded even when the reported progress lags
                        task.progress = task.progress.max(progress);
                        if update.current_step.is_some() {
                            task.current_step = update.current_step.clone();
                        }
                        Ok(Mutation::Apply)
                    }
                    TaskEvent::Complete | TaskEvent::Cancel => {
                        apply_event(task, event, worker_id, now)?;
                        Ok(Mutation::Apply)
                    }
                    TaskEvent::Retry => Err(ProvisioningError::validation(
                        "retry is not a worker status report",
                    )),
                }
            })
            .await?;

        let operation = match outcome.task().status {
            TaskStatus::Completed => events::TASK_COMPLETED,
            TaskStatus::Failed => events::TASK_FAILED,
            TaskStatus::Cancelled => events::TASK_CANCELLED,
            _ => events::TASK_STATUS_UPDATED,
        };
        log_outcome(operation, &outcome);
        Ok(outcome)
    }

    /// Append a finished step; a repeat of the last recorded step is ignored
    pub async fn add_completed_step(
        &self,
        task_id: &TaskId,
        step: &str,
        worker_id: Option<&str>,
    ) -> ProvisioningResult<UpdateOutcome> {
        let step = step.trim();
        if step.is_empty() {
            return Err(ProvisioningError::validation("step must not be blank"));
        }

        let lease = self.lease_duration;
        let outcome = self
            .modify(task_id, |task, now| {
                if task.is_terminal() {
                    return Ok(Mutation::Ignore(IgnoreReason::TerminalState));
                }
                if !task.record_step(step) {
                    return Ok(Mutation::Ignore(IgnoreReason::Duplicate));
                }

                if task.status == TaskStatus::Processing {
                    task.lease_expires_at = Some(now + lease);
                    if let Some(worker) = worker_id {
                        task.worker_id = Some(worker.to_string());
                    }
                }
                task.updated_at = now;
                Ok(Mutation::Apply)
            })
            .await?;

        log_outcome(events::TASK_STEP_COMPLETED, &outcome);
        Ok(outcome)
    }

    /// Processing → Completed with progress forced to 100
    pub async fn mark_task_completed(
        &self,
        task_id: &TaskId,
        worker_id: Option<&str>,
    ) -> ProvisioningResult<UpdateOutcome> {
        let outcome = self
            .modify(task_id, |task, now| {
                if task.is_terminal() {
                    return Ok(Mutation::Ignore(IgnoreReason::TerminalState));
                }
                apply_event(task, TaskEvent::Complete, worker_id, now)?;
                Ok(Mutation::Apply)
            })
            .await?;

        log_outcome(events::TASK_COMPLETED, &outcome);
        Ok(outcome)
    }

    /// Processing (or Queued) → Failed with the error recorded
    pub async fn mark_task_failed(
        &self,
        task_id: &TaskId,
        error_message: &str,
        worker_id: Option<&str>,
    ) -> ProvisioningResult<UpdateOutcome> {
        let error_message = error_message.trim();
        if error_message.is_empty() {
            return Err(ProvisioningError::validation("error_message must not be blank"));
        }

        let outcome = self
            .modify(task_id, |task, now| {
                if task.is_terminal() {
                    return Ok(Mutation::Ignore(IgnoreReason::TerminalState));
                }
                apply_event(
                    task,
                    TaskEvent::Fail(error_message.to_string()),
                    worker_id,
                    now,
                )?;
                Ok(Mutation::Apply)
            })
            .await?;

        log_outcome(events::TASK_FAILED, &outcome);
        Ok(outcome)
    }

    pub async fn can_retry_task(&self, task_id: &TaskId) -> ProvisioningResult<bool> {
        Ok(self.get_task(task_id).await?.can_retry())
    }

    /// Failed → Queued under a fresh correlation id.
    ///
    /// Returns the persisted task together with the Failed snapshot it
    /// replaced, so the caller can roll back if re-publishing fails.
    pub async fn retry_task(
        &self,
        task_id: &TaskId,
        correlation_id: CorrelationId,
    ) -> ProvisioningResult<RetryOutcome> {
        let mut previous: Option<ProvisionTask> = None;
        let outcome = self
            .modify(task_id, |task, now| {
                if !task.can_retry() {
                    let reason = if task.status != TaskStatus::Failed {
                        format!("task is {}", task.status)
                    } else {
                        format!(
                            "retry budget exhausted ({}/{})",
                            task.retry_count, task.max_retries
                        )
                    };
                    return Err(ProvisioningError::RetryNotEligible {
                        task_id: task.task_id.clone(),
                        reason,
                    });
                }

                previous = Some(task.clone());
                apply_event(task, TaskEvent::Retry, None, now)?;
                task.correlation_id = correlation_id.clone();
                Ok(Mutation::Apply)
            })
            .await?;

        let task = outcome.into_task();
        let previous = previous.ok_or_else(|| {
            ProvisioningError::transient(format!("retry of {task_id} left no prior snapshot"))
        })?;

        log_task_operation(
            events::TASK_RETRY_REQUESTED,
            &task.task_id,
            Some(task.task_type),
            task.status.as_str(),
            Some(&format!("retry {}/{}", task.retry_count, task.max_retries)),
        );
        Ok(RetryOutcome { previous, task })
    }

    /// Put a retried task back to the Failed snapshot it came from.
    ///
    /// Only applies while the task is still the Queued record produced by
    /// that retry; anything else means a worker or another retry moved it on.
    pub async fn rollback_retry(
        &self,
        task_id: &TaskId,
        previous: &ProvisionTask,
        reason: &str,
    ) -> ProvisioningResult<UpdateOutcome> {
        let outcome = self
            .modify(task_id, |task, now| {
                if task.status != TaskStatus::Queued
                    || task.retry_count != previous.retry_count + 1
                {
                    return Ok(Mutation::Ignore(IgnoreReason::Superseded));
                }

                task.status = TaskStatus::Failed;
                task.retry_count = previous.retry_count;
                task.error_message = previous.error_message.clone();
                task.progress = previous.progress;
                task.current_step = previous.current_step.clone();
                task.worker_id = previous.worker_id.clone();
                task.correlation_id = previous.correlation_id.clone();
                task.lease_expires_at = None;
                task.cancellation_requested = previous.cancellation_requested;
                task.updated_at = now;
                task.history.push(TaskTransition {
                    from_status: TaskStatus::Queued,
                    to_status: TaskStatus::Failed,
                    event: "retry_rolled_back".to_string(),
                    worker_id: None,
                    detail: Some(reason.to_string()),
                    occurred_at: now,
                });
                Ok(Mutation::Apply)
            })
            .await?;

        log_outcome(events::TASK_RETRY_ROLLED_BACK, &outcome);
        Ok(outcome)
    }

    /// Queued tasks are cancelled outright; Processing tasks are flagged and
    /// the worker acknowledges by reporting Cancelled.
    pub async fn cancel_task(&self, task_id: &TaskId) -> ProvisioningResult<CancelOutcome> {
        let outcome = self
            .modify(task_id, |task, now| match task.status {
                TaskStatus::Queued => {
                    apply_event(task, TaskEvent::Cancel, None, now)?;
                    Ok(Mutation::Apply)
                }
                TaskStatus::Processing if task.cancellation_requested => {
                    Ok(Mutation::Ignore(IgnoreReason::Duplicate))
                }
                TaskStatus::Processing => {
                    task.cancellation_requested = true;
                    task.updated_at = now;
                    Ok(Mutation::Apply)
                }
                status => Err(ProvisioningError::conflict(format!(
                    "task {} is already {status}",
                    task.task_id
                ))),
            })
            .await?;

        let task = outcome.into_task();
        if task.status == TaskStatus::Cancelled {
            log_task_operation(
                events::TASK_CANCELLED,
                &task.task_id,
                Some(task.task_type),
                task.status.as_str(),
                None,
            );
            Ok(CancelOutcome::Cancelled(task))
        } else {
            log_task_operation(
                events::TASK_CANCELLATION_REQUESTED,
                &task.task_id,
                Some(task.task_type),
                task.status.as_str(),
                task.worker_id.as_deref(),
            );
            Ok(CancelOutcome::CancellationRequested(task))
        }
    }

    /// Extend the lease of a Processing task
    pub async fn renew_lease(
        &self,
        task_id: &TaskId,
        worker_id: &str,
    ) -> ProvisioningResult<UpdateOutcome> {
        let lease = self.lease_duration;
        let outcome = self
            .modify(task_id, |task, now| match task.status {
                TaskStatus::Processing => {
                    task.lease_expires_at = Some(now + lease);
                    if task.worker_id.is_none() {
                        task.worker_id = Some(worker_id.to_string());
                    }
                    task.updated_at = now;
                    Ok(Mutation::Apply)
                }
                TaskStatus::Queued => Err(ProvisioningError::validation(format!(
                    "task {} has not been started; report processing before renewing the lease",
                    task.task_id
                ))),
                _ => Ok(Mutation::Ignore(IgnoreReason::TerminalState)),
            })
            .await?;

        if outcome.is_applied() {
            debug!(
                task_id = %task_id,
                worker_id = %worker_id,
                lease_expires_at = ?outcome.task().lease_expires_at,
                "💓 Lease renewed"
            );
        } else {
            log_outcome(events::TASK_LEASE_RENEWED, &outcome);
        }
        Ok(outcome)
    }

    /// Fail a Processing task whose lease ran out.
    ///
    /// Re-checks the lease against the freshly loaded row, so a heartbeat
    /// that landed after the expired-lease scan wins.
    pub async fn mark_lease_expired(&self, task_id: &TaskId) -> ProvisioningResult<UpdateOutcome> {
        let outcome = self
            .modify(task_id, |task, now| {
                if task.is_terminal() {
                    return Ok(Mutation::Ignore(IgnoreReason::TerminalState));
                }
                if !task.lease_expired(now) {
                    return Ok(Mutation::Ignore(IgnoreReason::LeaseNotExpired));
                }
                apply_event(
                    task,
                    TaskEvent::Fail(LEASE_EXPIRED_MESSAGE.to_string()),
                    None,
                    now,
                )?;
                Ok(Mutation::Apply)
            })
            .await?;

        log_outcome(events::TASK_LEASE_EXPIRED, &outcome);
        Ok(outcome)
    }

    pub async fn expired_leases(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> ProvisioningResult<Vec<ProvisionTask>> {
        Ok(self.store.find_expired_leases(now, limit).await?)
    }

    /// Optimistic read-modify-write loop.
    ///
    /// `mutate` runs against a fresh copy on every attempt and must be safe
    /// to re-run. An `Ignore` decision returns the stored task untouched.
    async fn modify<F>(&self, task_id: &TaskId, mut mutate: F) -> ProvisioningResult<UpdateOutcome>
    where
        F: FnMut(&mut ProvisionTask, DateTime<Utc>) -> ProvisioningResult<Mutation> + Send,
    {
        for attempt in 1..=self.conflict_retries {
            let current = self.get_task(task_id).await?;
            let mut candidate = current.clone();

            match mutate(&mut candidate, Utc::now())? {
                Mutation::Ignore(reason) => {
                    return Ok(UpdateOutcome::Ignored {
                        task: current,
                        reason,
                    })
                }
                Mutation::Apply => {}
            }

            match self.store.update(&candidate).await {
                Ok(stored) => return Ok(UpdateOutcome::Applied(stored)),
                Err(StoreError::VersionConflict { expected, .. }) => {
                    debug!(
                        task_id = %task_id,
                        attempt = attempt,
                        expected_version = expected,
                        "🔁 Concurrent task update detected, reloading"
                    );
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(
            task_id = %task_id,
            attempts = self.conflict_retries,
            "⚠️ Gave up on task update after repeated version conflicts"
        );
        Err(ProvisioningError::transient(format!(
            "task {task_id} kept changing concurrently; gave up after {} attempts",
            self.conflict_retries
        )))
    }
}

/// Drive the state machine, mapping its errors into the crate taxonomy
fn apply_event(
    task: &mut ProvisionTask,
    event: TaskEvent,
    worker_id: Option<&str>,
    now: DateTime<Utc>,
) -> ProvisioningResult<TaskStatus> {
    let task_id = task.task_id.clone();
    let from = task.status;
    let requested = event.event_type();
    TaskStateMachine::new(task)
        .transition(event, worker_id, now)
        .map_err(|err| match err {
            StateMachineError::InvalidTransition { .. } => ProvisioningError::InvalidTransition {
                task_id,
                from: from.to_string(),
                to: requested.to_string(),
            },
            StateMachineError::GuardFailed { reason } => ProvisioningError::Validation(reason),
        })
}

fn log_outcome(operation: &str, outcome: &UpdateOutcome) {
    let task = outcome.task();
    match outcome {
        UpdateOutcome::Applied(_) => log_task_operation(
            operation,
            &task.task_id,
            Some(task.task_type),
            task.status.as_str(),
            task.current_step.as_deref(),
        ),
        UpdateOutcome::Ignored { reason, .. } => debug!(
            operation = %events::TASK_UPDATE_IGNORED,
            requested = %operation,
            task_id = %task.task_id,
            status = %task.status,
            reason = reason.as_str(),
            "⏭️ Task update ignored"
        ),
    }
}
