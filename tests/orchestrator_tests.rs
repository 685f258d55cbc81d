//! End-to-end orchestrator flows: enqueue, authenticated worker callbacks,
//! retry republish, lease reconciliation and tenant instance bookkeeping.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderValue;
use chrono::Utc;
use uuid::Uuid;

use common::{invoice_request, provision_request, TestHarness};
use provisioning_core::auth::{ServicePermission, ServiceType};
use provisioning_core::config::{AuthConfig, ProvisioningConfig, TaskConfig};
use provisioning_core::constants::LEASE_EXPIRED_MESSAGE;
use provisioning_core::database::{InMemoryTaskStore, StoreResult};
use provisioning_core::messaging::InMemoryMessageBus;
use provisioning_core::metrics::{InMemoryMetricsCollector, MetricEvent};
use provisioning_core::models::{
    DeploymentStatus, InMemoryTenantInstanceRepository, TaskType, TenantInstance,
    TenantInstanceRepository,
};
use provisioning_core::orchestration::{IgnoreReason, StatusUpdate};
use provisioning_core::{ProvisioningError, ProvisioningOrchestrator, TaskStatus};

#[tokio::test]
async fn test_provision_completes_with_worker_token() {
    let h = TestHarness::with_auth();
    let instance = h.instance(DeploymentStatus::Pending);

    let created = h
        .orchestrator
        .provision_tenant(provision_request(&instance))
        .await
        .unwrap();
    assert_eq!(created.status, TaskStatus::Queued);
    assert_eq!(h.instance_status(&instance).await, DeploymentStatus::Provisioning);

    let claims = h
        .orchestrator
        .authenticate(&h.provisioning_worker_token())
        .unwrap();

    h.orchestrator
        .update_task_status(&claims, &created.task_id, StatusUpdate::processing(40, Some("schema")))
        .await
        .unwrap();
    h.orchestrator
        .add_completed_step(&claims, &created.task_id, "schema")
        .await
        .unwrap();
    let outcome = h
        .orchestrator
        .mark_task_completed(&claims, &created.task_id)
        .await
        .unwrap();

    let task = outcome.task();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100);
    assert_eq!(task.steps_completed, vec!["schema"]);
    assert_eq!(task.worker_id.as_deref(), Some("provisioning-worker-1"));
    assert_eq!(h.instance_status(&instance).await, DeploymentStatus::Active);
    assert_eq!(h.metrics.count(&MetricEvent::Completed(TaskType::TenantProvision)), 1);
}

#[tokio::test]
async fn test_billing_worker_cannot_report_provisioning_task() {
    let h = TestHarness::with_auth();
    let instance = h.instance(DeploymentStatus::Pending);
    let created = h
        .orchestrator
        .provision_tenant(provision_request(&instance))
        .await
        .unwrap();

    let claims = h
        .orchestrator
        .authenticate(&h.billing_worker_token())
        .unwrap();
    let err = h
        .orchestrator
        .mark_task_completed(&claims, &created.task_id)
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisioningError::Forbidden(_)));
    assert_eq!(
        h.metrics
            .count(&MetricEvent::CallbackRejected("insufficient_permissions".to_string())),
        1
    );
    let task = h.orchestrator.get_task_status(&created.task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Queued);
}

#[tokio::test]
async fn test_billing_worker_completes_invoice() {
    let h = TestHarness::with_auth();
    let instance = h.instance(DeploymentStatus::Active);
    let created = h
        .orchestrator
        .generate_invoice(invoice_request(&instance))
        .await
        .unwrap();
    assert_eq!(created.task_type, TaskType::InvoiceGeneration);
    assert_eq!(h.bus.published_to("provisioning.invoice.generate").len(), 1);

    let claims = h
        .orchestrator
        .authenticate(&h.billing_worker_token())
        .unwrap();
    h.orchestrator
        .update_task_status(&claims, &created.task_id, StatusUpdate::processing(50, None))
        .await
        .unwrap();
    h.orchestrator
        .mark_task_completed(&claims, &created.task_id)
        .await
        .unwrap();

    assert_eq!(h.instance_status(&instance).await, DeploymentStatus::Active);
}

#[tokio::test]
async fn test_token_without_update_permission_is_forbidden() {
    let h = TestHarness::with_auth();
    let instance = h.instance(DeploymentStatus::Pending);
    let created = h
        .orchestrator
        .provision_tenant(provision_request(&instance))
        .await
        .unwrap();

    let read_only = h.token(
        "auditor",
        ServiceType::ProvisioningWorker,
        &[ServicePermission::TasksRead],
    );
    let claims = h.orchestrator.authenticate(&read_only).unwrap();
    let err = h
        .orchestrator
        .renew_lease(&claims, &created.task_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisioningError::Forbidden(_)));
}

#[tokio::test]
async fn test_foreign_token_is_rejected() {
    let h = TestHarness::with_auth();
    let other = TestHarness::with_config(ProvisioningConfig {
        auth: AuthConfig::for_secret("some-other-deployment-secret"),
        ..ProvisioningConfig::default()
    });

    let err = h
        .orchestrator
        .authenticate(&other.provisioning_worker_token())
        .unwrap_err();
    assert!(matches!(err, ProvisioningError::Authentication(_)));
    assert_eq!(
        h.metrics
            .count(&MetricEvent::CallbackRejected("invalid_token".to_string())),
        1
    );
}

#[tokio::test]
async fn test_authenticate_header() {
    let h = TestHarness::with_auth();

    let err = h.orchestrator.authenticate_header(None).unwrap_err();
    assert!(matches!(err, ProvisioningError::Authentication(_)));

    let basic = HeaderValue::from_static("Basic dXNlcjpwYXNz");
    assert!(h.orchestrator.authenticate_header(Some(&basic)).is_err());

    let bearer = HeaderValue::from_str(&format!("Bearer {}", h.provisioning_worker_token())).unwrap();
    let claims = h.orchestrator.authenticate_header(Some(&bearer)).unwrap();
    assert_eq!(claims.service_id(), "provisioning-worker-1");

    let open = TestHarness::new();
    assert!(open.orchestrator.authenticate_header(None).is_ok());
}

#[tokio::test]
async fn test_retry_republishes_with_backoff() {
    let h = TestHarness::new();
    let instance = h.instance(DeploymentStatus::Pending);
    let created = h
        .orchestrator
        .provision_tenant(provision_request(&instance))
        .await
        .unwrap();
    let claims = h.orchestrator.authenticate_header(None).unwrap();

    h.orchestrator
        .mark_task_failed(&claims, &created.task_id, "db unreachable")
        .await
        .unwrap();
    assert_eq!(h.instance_status(&instance).await, DeploymentStatus::Failed);
    assert!(h.orchestrator.can_retry_task(&created.task_id).await.unwrap());

    let before = Utc::now();
    let retried = h.orchestrator.retry_task(&created.task_id).await.unwrap();
    assert_eq!(retried.status, TaskStatus::Queued);
    assert_eq!(retried.retry_count, 1);
    assert_ne!(retried.correlation_id, created.correlation_id);

    let published = h.bus.published_to("provisioning.tenant.provision");
    assert_eq!(published.len(), 2);
    let republish = &published[1];
    assert_eq!(republish.correlation_id, retried.correlation_id);
    assert_eq!(republish.metadata.retry_count, 1);
    assert!(republish.metadata.not_before.is_some_and(|at| at > before));

    assert_eq!(h.instance_status(&instance).await, DeploymentStatus::Provisioning);
    assert_eq!(h.metrics.count(&MetricEvent::Retried(TaskType::TenantProvision)), 1);
}

#[tokio::test]
async fn test_retry_publish_failure_rolls_back_to_failed() {
    let h = TestHarness::new();
    let instance = h.instance(DeploymentStatus::Pending);
    let created = h
        .orchestrator
        .provision_tenant(provision_request(&instance))
        .await
        .unwrap();
    let claims = h.orchestrator.authenticate_header(None).unwrap();
    h.orchestrator
        .mark_task_failed(&claims, &created.task_id, "db unreachable")
        .await
        .unwrap();

    h.bus.set_available(false);
    let err = h.orchestrator.retry_task(&created.task_id).await.unwrap_err();
    assert!(err.is_transient());

    let task = h.orchestrator.get_task_status(&created.task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.retry_count, 0);
    assert_eq!(task.correlation_id, created.correlation_id);
    assert_eq!(task.error_message.as_deref(), Some("db unreachable"));

    let history = h.orchestrator.task_history(&created.task_id).await.unwrap();
    assert_eq!(
        history.last().map(|t| t.event.as_str()),
        Some("retry_rolled_back")
    );
    assert_eq!(h.instance_status(&instance).await, DeploymentStatus::Failed);

    h.bus.set_available(true);
    let retried = h.orchestrator.retry_task(&created.task_id).await.unwrap();
    assert_eq!(retried.retry_count, 1);
}

#[tokio::test]
async fn test_expired_lease_is_failed_and_requeued() {
    let h = TestHarness::with_config(ProvisioningConfig {
        tasks: TaskConfig {
            lease_duration_seconds: 0,
            ..TaskConfig::default()
        },
        auth: AuthConfig {
            enabled: false,
            ..AuthConfig::default()
        },
        ..ProvisioningConfig::default()
    });
    let instance = h.instance(DeploymentStatus::Pending);
    let created = h
        .orchestrator
        .provision_tenant(provision_request(&instance))
        .await
        .unwrap();
    let claims = h.orchestrator.authenticate_header(None).unwrap();
    h.orchestrator
        .update_task_status(&claims, &created.task_id, StatusUpdate::processing(30, None))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let report = h.orchestrator.reconcile_expired_leases().await.unwrap();
    assert_eq!(report.examined, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.requeued, 1);
    assert!(report.errors.is_empty());

    let task = h.orchestrator.get_task_status(&created.task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Queued);
    assert_eq!(task.retry_count, 1);

    let history = h.orchestrator.task_history(&created.task_id).await.unwrap();
    assert!(history
        .iter()
        .any(|t| t.to_status == TaskStatus::Failed
            && t.detail.as_deref() == Some(LEASE_EXPIRED_MESSAGE)));
    assert_eq!(h.bus.published_count(), 2);
    assert_eq!(h.instance_status(&instance).await, DeploymentStatus::Provisioning);

    let quiet = h.orchestrator.reconcile_expired_leases().await.unwrap();
    assert!(quiet.is_empty());
}

#[tokio::test]
async fn test_expired_lease_without_budget_stays_failed() {
    let mut config = ProvisioningConfig::default();
    config.auth.enabled = false;
    config.tasks.lease_duration_seconds = 0;
    config.tasks.default_max_retries = 0;
    let h = TestHarness::with_config(config);
    let instance = h.instance(DeploymentStatus::Active);
    let created = h
        .orchestrator
        .deprovision_tenant(instance.id, "ops@acme.test", true)
        .await
        .unwrap();
    let claims = h.orchestrator.authenticate_header(None).unwrap();
    h.orchestrator
        .update_task_status(&claims, &created.task_id, StatusUpdate::processing(10, None))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let report = h.orchestrator.reconcile_expired_leases().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.exhausted, 1);

    let task = h.orchestrator.get_task_status(&created.task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_message.as_deref(), Some(LEASE_EXPIRED_MESSAGE));
    assert_eq!(h.instance_status(&instance).await, DeploymentStatus::Failed);
}

#[tokio::test]
async fn test_heartbeat_keeps_lease_alive() {
    let h = TestHarness::new();
    let instance = h.instance(DeploymentStatus::Pending);
    let created = h
        .orchestrator
        .provision_tenant(provision_request(&instance))
        .await
        .unwrap();
    let claims = h.orchestrator.authenticate_header(None).unwrap();

    let err = h
        .orchestrator
        .renew_lease(&claims, &created.task_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisioningError::Validation(_)));

    let started = h
        .orchestrator
        .update_task_status(&claims, &created.task_id, StatusUpdate::processing(5, None))
        .await
        .unwrap()
        .into_task();
    let renewed = h
        .orchestrator
        .renew_lease(&claims, &created.task_id)
        .await
        .unwrap()
        .into_task();
    assert!(renewed.lease_expires_at >= started.lease_expires_at);
    assert_eq!(renewed.progress, 5);
}

#[tokio::test]
async fn test_cancel_restores_instance_status() {
    let h = TestHarness::new();

    let pending = h.instance(DeploymentStatus::Pending);
    let provision = h
        .orchestrator
        .provision_tenant(provision_request(&pending))
        .await
        .unwrap();
    let cancelled = h.orchestrator.cancel_task(&provision.task_id).await.unwrap();
    assert_eq!(cancelled.status, TaskStatus::Cancelled);
    assert_eq!(h.instance_status(&pending).await, DeploymentStatus::Failed);

    let active = h.instance(DeploymentStatus::Active);
    let deprovision = h
        .orchestrator
        .deprovision_tenant(active.id, "ops@acme.test", false)
        .await
        .unwrap();
    assert_eq!(h.instance_status(&active).await, DeploymentStatus::Deprovisioning);
    h.orchestrator.cancel_task(&deprovision.task_id).await.unwrap();
    assert_eq!(h.instance_status(&active).await, DeploymentStatus::Active);
    assert_eq!(h.metrics.count(&MetricEvent::Cancelled(TaskType::TenantDeprovision)), 1);
}

#[tokio::test]
async fn test_cancel_processing_waits_for_worker() {
    let h = TestHarness::new();
    let instance = h.instance(DeploymentStatus::Active);
    let created = h
        .orchestrator
        .deprovision_tenant(instance.id, "ops@acme.test", false)
        .await
        .unwrap();
    let claims = h.orchestrator.authenticate_header(None).unwrap();
    h.orchestrator
        .update_task_status(&claims, &created.task_id, StatusUpdate::processing(60, None))
        .await
        .unwrap();

    let requested = h.orchestrator.cancel_task(&created.task_id).await.unwrap();
    assert_eq!(requested.status, TaskStatus::Processing);
    assert!(requested.cancellation_requested);
    assert_eq!(h.instance_status(&instance).await, DeploymentStatus::Deprovisioning);

    let again = h.orchestrator.cancel_task(&created.task_id).await.unwrap();
    assert!(again.cancellation_requested);

    let ack = StatusUpdate {
        status: TaskStatus::Cancelled,
        progress: 60,
        current_step: None,
        error_message: None,
    };
    h.orchestrator
        .update_task_status(&claims, &created.task_id, ack)
        .await
        .unwrap();
    assert_eq!(h.instance_status(&instance).await, DeploymentStatus::Active);
}

#[tokio::test]
async fn test_deprovision_lifecycle() {
    let h = TestHarness::new();
    let instance = h.instance(DeploymentStatus::Active);
    let created = h
        .orchestrator
        .deprovision_tenant(instance.id, "ops@acme.test", true)
        .await
        .unwrap();

    let err = h
        .orchestrator
        .deprovision_tenant(instance.id, "ops@acme.test", true)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisioningError::Conflict(_)));

    let claims = h.orchestrator.authenticate_header(None).unwrap();
    h.orchestrator
        .update_task_status(&claims, &created.task_id, StatusUpdate::processing(50, None))
        .await
        .unwrap();
    h.orchestrator
        .update_task_status(&claims, &created.task_id, StatusUpdate::completed())
        .await
        .unwrap();
    assert_eq!(h.instance_status(&instance).await, DeploymentStatus::Deprovisioned);

    let late = h
        .orchestrator
        .mark_task_failed(&claims, &created.task_id, "late failure")
        .await
        .unwrap();
    assert_eq!(late.ignore_reason(), Some(IgnoreReason::TerminalState));
    assert_eq!(h.instance_status(&instance).await, DeploymentStatus::Deprovisioned);
}

#[tokio::test]
async fn test_invoice_period_must_be_ordered() {
    let h = TestHarness::new();
    let instance = h.instance(DeploymentStatus::Active);
    let mut request = invoice_request(&instance);
    std::mem::swap(&mut request.period_start, &mut request.period_end);

    let err = h.orchestrator.generate_invoice(request).await.unwrap_err();
    assert!(matches!(err, ProvisioningError::Validation(_)));
    assert_eq!(h.bus.published_count(), 0);

    let pending = h.instance(DeploymentStatus::Pending);
    let err = h
        .orchestrator
        .generate_invoice(invoice_request(&pending))
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisioningError::Conflict(_)));
}

#[tokio::test]
async fn test_provision_payload_carries_instance_details() {
    let h = TestHarness::new();
    let instance = h.instance(DeploymentStatus::Failed);
    h.orchestrator
        .provision_tenant(provision_request(&instance))
        .await
        .unwrap();

    let published = h.bus.published_to("provisioning.tenant.provision");
    let json = serde_json::to_value(&published[0]).unwrap();
    assert_eq!(json["taskType"], "TenantProvision");
    assert_eq!(json["payload"]["subdomain"], "acme");
    assert_eq!(json["payload"]["region"], "eu-west-1");
    assert_eq!(json["payload"]["adminEmail"], "admin@acme.test");
    assert_eq!(json["payload"]["features"]["sso"], true);
    assert_eq!(json["metadata"]["retryCount"], 0);
}

/// Repository whose reads suspend, so concurrent requests interleave
/// between validating an instance and acting on it
#[derive(Debug)]
struct SlowReadInstances(Arc<InMemoryTenantInstanceRepository>);

#[async_trait]
impl TenantInstanceRepository for SlowReadInstances {
    async fn find(&self, id: Uuid) -> StoreResult<Option<TenantInstance>> {
        let found = self.0.find(id).await;
        tokio::task::yield_now().await;
        found
    }

    async fn update_status(&self, id: Uuid, status: DeploymentStatus) -> StoreResult<()> {
        self.0.update_status(id, status).await
    }

    async fn transition_status(
        &self,
        id: Uuid,
        expected: DeploymentStatus,
        next: DeploymentStatus,
    ) -> StoreResult<bool> {
        self.0.transition_status(id, expected, next).await
    }
}

#[tokio::test]
async fn test_concurrent_provision_requests_queue_one_task() {
    let mut config = ProvisioningConfig::default();
    config.auth.enabled = false;
    let instances = Arc::new(InMemoryTenantInstanceRepository::new());
    let bus = InMemoryMessageBus::new();
    let orchestrator = ProvisioningOrchestrator::from_config(
        &config,
        Arc::new(InMemoryTaskStore::new()),
        Arc::new(bus.clone()),
        Arc::new(SlowReadInstances(instances.clone())),
        Arc::new(InMemoryMetricsCollector::new()),
    )
    .unwrap();
    let instance = TenantInstance::new(Uuid::new_v4(), "acme", "eu-west-1", DeploymentStatus::Pending);
    instances.insert(instance.clone());

    let (first, second) = tokio::join!(
        orchestrator.provision_tenant(provision_request(&instance)),
        orchestrator.provision_tenant(provision_request(&instance)),
    );

    let (accepted, refused): (Vec<_>, Vec<_>) = [first, second].into_iter().partition(Result::is_ok);
    assert_eq!(accepted.len(), 1);
    assert_eq!(refused.len(), 1);
    assert!(matches!(
        refused.into_iter().next().and_then(Result::err),
        Some(ProvisioningError::Conflict(_))
    ));
    assert_eq!(bus.published_to("provisioning.tenant.provision").len(), 1);
    assert_eq!(
        instances.find(instance.id).await.unwrap().unwrap().status,
        DeploymentStatus::Provisioning
    );
}

#[tokio::test]
async fn test_retry_refused_while_instance_is_claimed_elsewhere() {
    let h = TestHarness::new();
    let instance = h.instance(DeploymentStatus::Pending);
    let first = h
        .orchestrator
        .provision_tenant(provision_request(&instance))
        .await
        .unwrap();
    let claims = h.orchestrator.authenticate_header(None).unwrap();
    h.orchestrator
        .mark_task_failed(&claims, &first.task_id, "db unreachable")
        .await
        .unwrap();

    // A fresh provision request takes the failed instance first
    h.orchestrator
        .provision_tenant(provision_request(&instance))
        .await
        .unwrap();
    assert_eq!(h.instance_status(&instance).await, DeploymentStatus::Provisioning);

    let err = h.orchestrator.retry_task(&first.task_id).await.unwrap_err();
    assert!(matches!(err, ProvisioningError::Conflict(_)));

    let task = h.orchestrator.get_task_status(&first.task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.retry_count, 0);
    assert_eq!(h.bus.published_to("provisioning.tenant.provision").len(), 2);
    assert_eq!(h.instance_status(&instance).await, DeploymentStatus::Provisioning);
}
