//! # Provisioning Orchestrator
//!
//! Façade over the task tracker, message bus and tenant instance repository.
//!
//! Enqueue operations validate the target tenant instance, create the task,
//! publish it and return immediately; they never wait for a worker.
//! Provision and deprovision claim the instance with a compare-and-set on its
//! status before the task exists, so of two concurrent requests only one is
//! queued and the other gets a conflict. Worker
//! callbacks arrive with validated [`ServiceClaims`] and delegate to the
//! tracker once the claims are authorized for the task's type.
//!
//! ## Failure handling
//!
//! - Publish failure at enqueue marks the task Failed with the publish error
//!   and restores the tenant instance status, then reports a transient error.
//! - Publish failure on retry rolls the task back to its Failed snapshot, as
//!   does a retry whose tenant instance can no longer be claimed.
//! - Tenant instance status writes that follow a terminal callback are best
//!   effort: they are logged on failure and never fail the callback.

use axum::http::HeaderValue;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::{AuthError, ServiceClaims, ServiceTokenIssuer};
use crate::config::ProvisioningConfig;
use crate::database::TaskStore;
use crate::error::{ProvisioningError, ProvisioningResult};
use crate::messaging::{MessageBus, ProvisioningTaskMessage};
use crate::metrics::MetricsCollector;
use crate::models::{
    CorrelationId, DeploymentStatus, FeatureFlags, FeatureUpdatePayload,
    InvoiceGenerationPayload, NewTask, ProvisionTask, TaskId, TaskPayload, TaskTransition,
    TaskType, TenantDeprovisionPayload, TenantInstance, TenantInstanceRepository,
    TenantProvisionPayload,
};
use crate::state_machine::TaskStatus;

use super::backoff::BackoffCalculator;
use super::task_tracker::TaskTracker;
use super::types::{
    CancelOutcome, InvoiceRequest, ProvisionTenantRequest, ReconciliationReport, StatusUpdate,
    TaskCreationResponse, TaskStatusResponse, UpdateOutcome,
};

#[derive(Debug, Clone)]
pub struct ProvisioningOrchestrator {
    tracker: TaskTracker,
    bus: Arc<dyn MessageBus>,
    tenant_instances: Arc<dyn TenantInstanceRepository>,
    metrics: Arc<dyn MetricsCollector>,
    issuer: Arc<ServiceTokenIssuer>,
    backoff: BackoffCalculator,
    reconcile_batch_size: usize,
}

impl ProvisioningOrchestrator {
    pub fn new(
        tracker: TaskTracker,
        bus: Arc<dyn MessageBus>,
        tenant_instances: Arc<dyn TenantInstanceRepository>,
        metrics: Arc<dyn MetricsCollector>,
        issuer: Arc<ServiceTokenIssuer>,
        backoff: BackoffCalculator,
    ) -> Self {
        Self {
            tracker,
            bus,
            tenant_instances,
            metrics,
            issuer,
            backoff,
            reconcile_batch_size: 100,
        }
    }

    /// Wire the orchestrator from configuration and pre-built collaborators
    pub fn from_config(
        config: &ProvisioningConfig,
        store: Arc<dyn TaskStore>,
        bus: Arc<dyn MessageBus>,
        tenant_instances: Arc<dyn TenantInstanceRepository>,
        metrics: Arc<dyn MetricsCollector>,
    ) -> ProvisioningResult<Self> {
        let issuer = ServiceTokenIssuer::from_config(&config.auth)?;
        let tracker = TaskTracker::new(store, &config.tasks);

        info!(
            bus = bus.backend_name(),
            auth_enabled = issuer.is_enabled(),
            default_max_retries = config.tasks.default_max_retries,
            lease_seconds = config.tasks.lease_duration_seconds,
            "🚀 Provisioning orchestrator configured"
        );

        Ok(Self::new(
            tracker,
            bus,
            tenant_instances,
            metrics,
            Arc::new(issuer),
            BackoffCalculator::from_config(&config.backoff),
        )
        .with_reconcile_batch_size(config.tasks.reconcile_batch_size))
    }

    pub fn with_reconcile_batch_size(mut self, batch_size: usize) -> Self {
        self.reconcile_batch_size = batch_size.max(1);
        self
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    pub fn token_issuer(&self) -> &ServiceTokenIssuer {
        &self.issuer
    }

    pub fn bus_backend(&self) -> &'static str {
        self.bus.backend_name()
    }

    // =====================================================================
    // Enqueue operations
    // =====================================================================

    /// Allowed from Pending, Failed or Deprovisioned; moves the instance to Provisioning
    pub async fn provision_tenant(
        &self,
        request: ProvisionTenantRequest,
    ) -> ProvisioningResult<TaskCreationResponse> {
        if request.plan.trim().is_empty() {
            return Err(ProvisioningError::validation("plan must not be blank"));
        }
        if !is_plausible_email(&request.admin_email) {
            return Err(ProvisioningError::validation(format!(
                "admin_email '{}' is not a valid address",
                request.admin_email
            )));
        }
        validate_feature_keys(&request.features)?;

        let instance = self.load_instance(request.tenant_instance_id).await?;
        if !instance_admits(TaskType::TenantProvision, instance.status) {
            return Err(ProvisioningError::conflict(format!(
                "tenant instance {} is {}; provisioning requires pending, failed or deprovisioned",
                instance.id, instance.status
            )));
        }

        let payload = TaskPayload::TenantProvision(TenantProvisionPayload {
            tenant_id: instance.tenant_id,
            tenant_instance_id: instance.id,
            subdomain: instance.subdomain.clone(),
            region: instance.region.clone(),
            plan: request.plan,
            admin_email: request.admin_email,
            features: request.features,
        });

        self.enqueue(
            &instance,
            payload,
            &request.initiated_by,
            Some(DeploymentStatus::Provisioning),
        )
        .await
    }

    /// Refused while provisioning, deprovisioning or already deprovisioned
    pub async fn deprovision_tenant(
        &self,
        tenant_instance_id: Uuid,
        initiated_by: &str,
        retain_backups: bool,
    ) -> ProvisioningResult<TaskCreationResponse> {
        let instance = self.load_instance(tenant_instance_id).await?;
        if !instance_admits(TaskType::TenantDeprovision, instance.status) {
            return Err(ProvisioningError::conflict(format!(
                "tenant instance {} is {}; it cannot be deprovisioned now",
                instance.id, instance.status
            )));
        }

        let payload = TaskPayload::TenantDeprovision(TenantDeprovisionPayload {
            tenant_instance_id: instance.id,
            retain_backups,
        });

        self.enqueue(
            &instance,
            payload,
            initiated_by,
            Some(DeploymentStatus::Deprovisioning),
        )
        .await
    }

    /// Only for Active instances, with at least one named flag
    pub async fn update_tenant_features(
        &self,
        tenant_instance_id: Uuid,
        features: FeatureFlags,
        initiated_by: &str,
    ) -> ProvisioningResult<TaskCreationResponse> {
        if features.is_empty() {
            return Err(ProvisioningError::validation(
                "feature update must name at least one feature",
            ));
        }
        validate_feature_keys(&features)?;

        let instance = self.load_instance(tenant_instance_id).await?;
        if !instance_admits(TaskType::FeatureUpdate, instance.status) {
            return Err(ProvisioningError::conflict(format!(
                "tenant instance {} is {}; features can only change while active",
                instance.id, instance.status
            )));
        }

        let payload = TaskPayload::FeatureUpdate(FeatureUpdatePayload {
            tenant_instance_id: instance.id,
            features,
        });
        self.enqueue(&instance, payload, initiated_by, None).await
    }

    /// Refused for instances that were never provisioned or are gone
    pub async fn generate_invoice(
        &self,
        request: InvoiceRequest,
    ) -> ProvisioningResult<TaskCreationResponse> {
        if request.period_end < request.period_start {
            return Err(ProvisioningError::validation(format!(
                "invoice period ends ({}) before it starts ({})",
                request.period_end, request.period_start
            )));
        }

        let instance = self.load_instance(request.tenant_instance_id).await?;
        if !instance_admits(TaskType::InvoiceGeneration, instance.status) {
            return Err(ProvisioningError::conflict(format!(
                "tenant instance {} is {}; nothing to invoice",
                instance.id, instance.status
            )));
        }

        let payload = TaskPayload::InvoiceGeneration(InvoiceGenerationPayload {
            tenant_instance_id: instance.id,
            period_start: request.period_start,
            period_end: request.period_end,
        });
        self.enqueue(&instance, payload, &request.initiated_by, None)
            .await
    }

    // =====================================================================
    // Caller-facing task operations
    // =====================================================================

    pub async fn get_task_status(&self, task_id: &TaskId) -> ProvisioningResult<TaskStatusResponse> {
        let task = self.tracker.get_task(task_id).await?;
        Ok(TaskStatusResponse::from(&task))
    }

    pub async fn task_history(&self, task_id: &TaskId) -> ProvisioningResult<Vec<TaskTransition>> {
        Ok(self.tracker.get_task(task_id).await?.history)
    }

    pub async fn can_retry_task(&self, task_id: &TaskId) -> ProvisioningResult<bool> {
        self.tracker.can_retry_task(task_id).await
    }

    /// Requeue a Failed task under a fresh correlation id.
    ///
    /// The task is persisted as Queued first and then re-published with a
    /// backoff `notBefore`; if the publish fails the task goes back to Failed.
    /// Provision and deprovision retries must claim the tenant instance again,
    /// so a retry cannot race another request for the same instance.
    pub async fn retry_task(&self, task_id: &TaskId) -> ProvisioningResult<TaskStatusResponse> {
        let retry = self
            .tracker
            .retry_task(task_id, CorrelationId::generate())
            .await?;

        let released_status = match self.claim_for_retry(&retry.task).await {
            Ok(previous) => previous,
            Err(claim_error) => {
                warn!(
                    task_id = %task_id,
                    tenant_instance_id = %retry.task.tenant_instance_id,
                    error = %claim_error,
                    "⚠️ Retry refused by tenant instance state, rolling task back to failed"
                );
                self.rollback_failed_retry(task_id, &retry.previous, &claim_error.to_string())
                    .await;
                return Err(claim_error);
            }
        };

        let not_before = self
            .backoff
            .next_attempt_at(retry.task.retry_count, Utc::now());
        let message = ProvisioningTaskMessage::for_task(&retry.task).with_not_before(not_before);

        if let Err(publish_error) = self.bus.publish_provisioning_task(&message).await {
            error!(
                task_id = %task_id,
                correlation_id = %retry.task.correlation_id,
                error = %publish_error,
                "❌ Retry publish failed, rolling task back to failed"
            );
            self.rollback_failed_retry(task_id, &retry.previous, &publish_error.to_string())
                .await;
            if let Some(status) = released_status {
                self.set_instance_status(retry.task.tenant_instance_id, status)
                    .await;
            }
            return Err(publish_error.into());
        }

        self.metrics.task_retried(retry.task.task_type);

        info!(
            task_id = %task_id,
            retry_count = retry.task.retry_count,
            max_retries = retry.task.max_retries,
            not_before = %not_before,
            "🔄 Task requeued"
        );
        Ok(TaskStatusResponse::from(&retry.task))
    }

    /// Cancel outright while Queued; flag for the worker while Processing
    pub async fn cancel_task(&self, task_id: &TaskId) -> ProvisioningResult<TaskStatusResponse> {
        match self.tracker.cancel_task(task_id).await? {
            CancelOutcome::Cancelled(task) => {
                self.on_terminal(&task).await;
                Ok(TaskStatusResponse::from(&task))
            }
            CancelOutcome::CancellationRequested(task) => Ok(TaskStatusResponse::from(&task)),
        }
    }

    // =====================================================================
    // Worker callbacks
    // =====================================================================

    /// Validate a bearer token, recording rejections
    pub fn authenticate(&self, token: &str) -> ProvisioningResult<ServiceClaims> {
        self.issuer.validate_service_token(token).map_err(|e| {
            let reason = match &e {
                AuthError::TokenExpired => "expired_token",
                AuthError::ConfigurationError(_) => "auth_misconfigured",
                _ => "invalid_token",
            };
            self.metrics.callback_rejected(reason);
            warn!(reason = reason, error = %e, "🔒 Worker callback rejected");
            e.into()
        })
    }

    /// Authenticate an `Authorization` header value.
    ///
    /// With authentication disabled every caller gets the local wildcard claims.
    pub fn authenticate_header(
        &self,
        header: Option<&HeaderValue>,
    ) -> ProvisioningResult<ServiceClaims> {
        if !self.issuer.is_enabled() {
            return self.authenticate("");
        }

        let token = header
            .ok_or(AuthError::MissingAuthHeader)
            .and_then(ServiceTokenIssuer::extract_bearer_token)
            .map_err(|e| {
                self.metrics.callback_rejected("missing_credentials");
                warn!(error = %e, "🔒 Worker callback without usable credentials");
                ProvisioningError::from(e)
            })?;
        self.authenticate(token)
    }

    pub async fn update_task_status(
        &self,
        claims: &ServiceClaims,
        task_id: &TaskId,
        update: StatusUpdate,
    ) -> ProvisioningResult<UpdateOutcome> {
        self.authorize_callback(claims, task_id).await?;
        let outcome = self
            .tracker
            .update_task_status(task_id, update, Some(claims.service_id()))
            .await?;
        self.after_callback(&outcome).await;
        Ok(outcome)
    }

    pub async fn add_completed_step(
        &self,
        claims: &ServiceClaims,
        task_id: &TaskId,
        step: &str,
    ) -> ProvisioningResult<UpdateOutcome> {
        self.authorize_callback(claims, task_id).await?;
        self.tracker
            .add_completed_step(task_id, step, Some(claims.service_id()))
            .await
    }

    pub async fn mark_task_completed(
        &self,
        claims: &ServiceClaims,
        task_id: &TaskId,
    ) -> ProvisioningResult<UpdateOutcome> {
        self.authorize_callback(claims, task_id).await?;
        let outcome = self
            .tracker
            .mark_task_completed(task_id, Some(claims.service_id()))
            .await?;
        self.after_callback(&outcome).await;
        Ok(outcome)
    }

    pub async fn mark_task_failed(
        &self,
        claims: &ServiceClaims,
        task_id: &TaskId,
        error_message: &str,
    ) -> ProvisioningResult<UpdateOutcome> {
        self.authorize_callback(claims, task_id).await?;
        let outcome = self
            .tracker
            .mark_task_failed(task_id, error_message, Some(claims.service_id()))
            .await?;
        self.after_callback(&outcome).await;
        Ok(outcome)
    }

    pub async fn renew_lease(
        &self,
        claims: &ServiceClaims,
        task_id: &TaskId,
    ) -> ProvisioningResult<UpdateOutcome> {
        self.authorize_callback(claims, task_id).await?;
        self.tracker.renew_lease(task_id, claims.service_id()).await
    }

    // =====================================================================
    // Lease reconciliation
    // =====================================================================

    /// Fail every Processing task whose lease ran out, requeueing those with
    /// retry budget left. Per-task errors are collected, not propagated.
    pub async fn reconcile_expired_leases(&self) -> ProvisioningResult<ReconciliationReport> {
        let expired = self
            .tracker
            .expired_leases(Utc::now(), self.reconcile_batch_size)
            .await?;

        let mut report = ReconciliationReport {
            examined: expired.len(),
            ..ReconciliationReport::default()
        };

        for stale in expired {
            match self.tracker.mark_lease_expired(&stale.task_id).await {
                Ok(UpdateOutcome::Applied(failed)) => {
                    report.failed += 1;
                    warn!(
                        task_id = %failed.task_id,
                        worker_id = ?stale.worker_id,
                        lease_expires_at = ?stale.lease_expires_at,
                        "⏰ Worker lease expired, task failed"
                    );
                    self.on_terminal(&failed).await;

                    if failed.can_retry() {
                        match self.retry_task(&failed.task_id).await {
                            Ok(_) => report.requeued += 1,
                            Err(e) => report.errors.push(format!("{}: {e}", failed.task_id)),
                        }
                    } else {
                        report.exhausted += 1;
                    }
                }
                Ok(UpdateOutcome::Ignored { .. }) => report.skipped += 1,
                Err(e) => report.errors.push(format!("{}: {e}", stale.task_id)),
            }
        }

        if report.is_empty() {
            debug!("No expired leases found");
        } else {
            info!(
                examined = report.examined,
                failed = report.failed,
                requeued = report.requeued,
                exhausted = report.exhausted,
                skipped = report.skipped,
                errors = report.errors.len(),
                "🧹 Lease reconciliation pass finished"
            );
        }
        Ok(report)
    }

    // =====================================================================
    // Internals
    // =====================================================================

    async fn load_instance(&self, tenant_instance_id: Uuid) -> ProvisioningResult<TenantInstance> {
        self.tenant_instances
            .find(tenant_instance_id)
            .await?
            .ok_or(ProvisioningError::TenantInstanceNotFound(tenant_instance_id))
    }

    /// Move the instance out of the status it was validated in.
    ///
    /// Loses to any request that changed the status since it was read.
    async fn claim_instance(
        &self,
        instance: &TenantInstance,
        next: DeploymentStatus,
    ) -> ProvisioningResult<()> {
        if self
            .tenant_instances
            .transition_status(instance.id, instance.status, next)
            .await?
        {
            return Ok(());
        }
        warn!(
            tenant_instance_id = %instance.id,
            expected = %instance.status,
            next = %next,
            "🔒 Tenant instance claimed by a concurrent request"
        );
        Err(ProvisioningError::conflict(format!(
            "tenant instance {} is no longer {}; another request changed it",
            instance.id, instance.status
        )))
    }

    /// Re-validate and claim the instance for a retried provision or
    /// deprovision. Returns the status to restore if the retry is abandoned.
    async fn claim_for_retry(
        &self,
        task: &ProvisionTask,
    ) -> ProvisioningResult<Option<DeploymentStatus>> {
        let Some(next) = in_flight_status(task.task_type) else {
            return Ok(None);
        };
        let instance = self.load_instance(task.tenant_instance_id).await?;
        if !instance_admits(task.task_type, instance.status) {
            return Err(ProvisioningError::conflict(format!(
                "tenant instance {} is {}; {} cannot be retried now",
                instance.id, instance.status, task.task_type
            )));
        }
        self.claim_instance(&instance, next).await?;
        Ok(Some(instance.status))
    }

    async fn rollback_failed_retry(&self, task_id: &TaskId, previous: &ProvisionTask, reason: &str) {
        if let Err(rollback_error) = self.tracker.rollback_retry(task_id, previous, reason).await {
            error!(
                task_id = %task_id,
                error = %rollback_error,
                "❌ Rollback of abandoned retry did not apply"
            );
        }
    }

    /// Claim the instance, create, publish; undo on failure
    async fn enqueue(
        &self,
        instance: &TenantInstance,
        payload: TaskPayload,
        initiated_by: &str,
        instance_transition: Option<DeploymentStatus>,
    ) -> ProvisioningResult<TaskCreationResponse> {
        if let Some(next) = instance_transition {
            self.claim_instance(instance, next).await?;
        }

        let new_task = NewTask::new(TaskId::generate(), instance.id, payload)
            .with_initiated_by(initiated_by)
            .with_correlation_id(CorrelationId::generate());
        let task = match self.tracker.create_task(new_task).await {
            Ok(task) => task,
            Err(e) => {
                if instance_transition.is_some() {
                    self.set_instance_status(instance.id, instance.status).await;
                }
                return Err(e);
            }
        };
        self.metrics.task_created(task.task_type);

        let message = ProvisioningTaskMessage::for_task(&task);
        if let Err(publish_error) = self.bus.publish_provisioning_task(&message).await {
            error!(
                task_id = %task.task_id,
                subject = message.subject(),
                error = %publish_error,
                "❌ Failed to publish task"
            );
            self.abort_enqueue(
                &task,
                instance,
                instance_transition.map(|_| instance.status),
                &publish_error.to_string(),
            )
            .await;
            return Err(publish_error.into());
        }

        info!(
            task_id = %task.task_id,
            task_type = %task.task_type,
            tenant_instance_id = %instance.id,
            correlation_id = %task.correlation_id,
            subject = message.subject(),
            "📤 Task enqueued"
        );
        Ok(TaskCreationResponse::from(&task))
    }

    /// Record the enqueue failure on the task and put the instance back
    async fn abort_enqueue(
        &self,
        task: &ProvisionTask,
        instance: &TenantInstance,
        restore_status: Option<DeploymentStatus>,
        reason: &str,
    ) {
        match self
            .tracker
            .mark_task_failed(&task.task_id, &format!("enqueue failed: {reason}"), None)
            .await
        {
            Ok(outcome) if outcome.is_applied() => {
                let failed = outcome.task();
                self.metrics.task_failed(failed.task_type, failed.elapsed());
            }
            Ok(_) => {}
            Err(e) => error!(
                task_id = %task.task_id,
                error = %e,
                "❌ Could not record enqueue failure on task"
            ),
        }

        if let Some(status) = restore_status {
            self.set_instance_status(instance.id, status).await;
        }
    }

    async fn authorize_callback(
        &self,
        claims: &ServiceClaims,
        task_id: &TaskId,
    ) -> ProvisioningResult<()> {
        // Disabled auth hands out wildcard local claims for any task type
        if !self.issuer.is_enabled() {
            return Ok(());
        }

        let task = self.tracker.get_task(task_id).await?;
        claims.authorize_task_update(task.task_type).map_err(|e| {
            self.metrics.callback_rejected("insufficient_permissions");
            warn!(
                task_id = %task_id,
                service_id = %claims.service_id(),
                service_type = %claims.service_type,
                error = %e,
                "🔒 Worker callback not authorized for task"
            );
            ProvisioningError::from(e)
        })
    }

    async fn after_callback(&self, outcome: &UpdateOutcome) {
        if let UpdateOutcome::Applied(task) = outcome {
            if task.is_terminal() {
                self.on_terminal(task).await;
            }
        }
    }

    /// Metrics and the tenant instance's final status for a task that just went terminal
    async fn on_terminal(&self, task: &ProvisionTask) {
        let duration = task.elapsed();
        let instance_status = match task.status {
            TaskStatus::Completed => {
                self.metrics.task_completed(task.task_type, duration);
                match task.task_type {
                    TaskType::TenantProvision => Some(DeploymentStatus::Active),
                    TaskType::TenantDeprovision => Some(DeploymentStatus::Deprovisioned),
                    _ => None,
                }
            }
            TaskStatus::Failed => {
                self.metrics.task_failed(task.task_type, duration);
                match task.task_type {
                    TaskType::TenantProvision | TaskType::TenantDeprovision => {
                        Some(DeploymentStatus::Failed)
                    }
                    _ => None,
                }
            }
            TaskStatus::Cancelled => {
                self.metrics.task_cancelled(task.task_type);
                match task.task_type {
                    TaskType::TenantProvision => Some(DeploymentStatus::Failed),
                    TaskType::TenantDeprovision => Some(DeploymentStatus::Active),
                    _ => None,
                }
            }
            TaskStatus::Queued | TaskStatus::Processing => None,
        };

        if let Some(status) = instance_status {
            self.set_instance_status(task.tenant_instance_id, status)
                .await;
        }
    }

    async fn set_instance_status(&self, tenant_instance_id: Uuid, status: DeploymentStatus) {
        if let Err(e) = self
            .tenant_instances
            .update_status(tenant_instance_id, status)
            .await
        {
            warn!(
                tenant_instance_id = %tenant_instance_id,
                status = %status,
                error = %e,
                "⚠️ Could not update tenant instance status"
            );
        }
    }
}

/// Whether an instance in `status` may take a new task of this type
fn instance_admits(task_type: TaskType, status: DeploymentStatus) -> bool {
    match task_type {
        TaskType::TenantProvision => matches!(
            status,
            DeploymentStatus::Pending | DeploymentStatus::Failed | DeploymentStatus::Deprovisioned
        ),
        TaskType::TenantDeprovision => !matches!(
            status,
            DeploymentStatus::Provisioning
                | DeploymentStatus::Deprovisioning
                | DeploymentStatus::Deprovisioned
        ),
        TaskType::FeatureUpdate => status == DeploymentStatus::Active,
        TaskType::InvoiceGeneration => !matches!(
            status,
            DeploymentStatus::Pending | DeploymentStatus::Deprovisioned
        ),
    }
}

/// Instance status while a task of this type is queued or running
fn in_flight_status(task_type: TaskType) -> Option<DeploymentStatus> {
    match task_type {
        TaskType::TenantProvision => Some(DeploymentStatus::Provisioning),
        TaskType::TenantDeprovision => Some(DeploymentStatus::Deprovisioning),
        TaskType::FeatureUpdate | TaskType::InvoiceGeneration => None,
    }
}

fn validate_feature_keys(features: &FeatureFlags) -> ProvisioningResult<()> {
    if features.keys().any(|name| name.trim().is_empty()) {
        return Err(ProvisioningError::validation("feature names must not be blank"));
    }
    Ok(())
}

fn is_plausible_email(address: &str) -> bool {
    match address.trim().split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.contains('@'),
        None => false,
    }
}
