use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use provisioning_core::auth::{ServicePermission, ServiceType};
use provisioning_core::config::{AuthConfig, ProvisioningConfig};
use provisioning_core::database::InMemoryTaskStore;
use provisioning_core::messaging::InMemoryMessageBus;
use provisioning_core::metrics::InMemoryMetricsCollector;
use provisioning_core::models::{
    DeploymentStatus, FeatureFlags, InMemoryTenantInstanceRepository, TenantInstance,
};
use provisioning_core::orchestration::{InvoiceRequest, ProvisionTenantRequest};
use provisioning_core::ProvisioningOrchestrator;

pub const TEST_SECRET: &str = "integration-test-signing-secret";

/// Orchestrator wired to in-memory collaborators that tests can inspect
pub struct TestHarness {
    pub orchestrator: ProvisioningOrchestrator,
    pub store: Arc<InMemoryTaskStore>,
    pub bus: InMemoryMessageBus,
    pub instances: Arc<InMemoryTenantInstanceRepository>,
    pub metrics: InMemoryMetricsCollector,
}

impl TestHarness {
    /// Authentication disabled
    pub fn new() -> Self {
        let mut config = ProvisioningConfig::default();
        config.auth.enabled = false;
        Self::with_config(config)
    }

    /// Authentication enabled with [`TEST_SECRET`]
    pub fn with_auth() -> Self {
        Self::with_config(ProvisioningConfig {
            auth: AuthConfig::for_secret(TEST_SECRET),
            ..ProvisioningConfig::default()
        })
    }

    pub fn with_config(config: ProvisioningConfig) -> Self {
        let store = Arc::new(InMemoryTaskStore::new());
        let bus = InMemoryMessageBus::new();
        let instances = Arc::new(InMemoryTenantInstanceRepository::new());
        let metrics = InMemoryMetricsCollector::new();
        let orchestrator = ProvisioningOrchestrator::from_config(
            &config,
            store.clone(),
            Arc::new(bus.clone()),
            instances.clone(),
            Arc::new(metrics.clone()),
        )
        .expect("test orchestrator should build");

        Self {
            orchestrator,
            store,
            bus,
            instances,
            metrics,
        }
    }

    pub fn instance(&self, status: DeploymentStatus) -> TenantInstance {
        let instance = TenantInstance::new(Uuid::new_v4(), "acme", "eu-west-1", status);
        self.instances.insert(instance.clone());
        instance
    }

    pub async fn instance_status(&self, instance: &TenantInstance) -> DeploymentStatus {
        use provisioning_core::models::TenantInstanceRepository;
        self.instances
            .find(instance.id)
            .await
            .expect("repository read")
            .expect("instance exists")
            .status
    }

    pub fn provisioning_worker_token(&self) -> String {
        self.token(
            "provisioning-worker-1",
            ServiceType::ProvisioningWorker,
            &[ServicePermission::TasksUpdate],
        )
    }

    pub fn billing_worker_token(&self) -> String {
        self.token(
            "billing-worker-1",
            ServiceType::BillingWorker,
            &[ServicePermission::TasksUpdate],
        )
    }

    pub fn token(
        &self,
        service_id: &str,
        service_type: ServiceType,
        permissions: &[ServicePermission],
    ) -> String {
        self.orchestrator
            .token_issuer()
            .generate_service_token_with_ttl(service_id, service_type, permissions, Duration::minutes(5))
            .expect("token should be issued")
    }
}

pub fn provision_request(instance: &TenantInstance) -> ProvisionTenantRequest {
    let mut features = FeatureFlags::new();
    features.insert("sso".to_string(), true);
    ProvisionTenantRequest {
        tenant_instance_id: instance.id,
        plan: "standard".to_string(),
        admin_email: "admin@acme.test".to_string(),
        features,
        initiated_by: "ops@acme.test".to_string(),
    }
}

pub fn invoice_request(instance: &TenantInstance) -> InvoiceRequest {
    InvoiceRequest {
        tenant_instance_id: instance.id,
        period_start: chrono::NaiveDate::from_ymd_opt(2026, 9, 1).expect("valid date"),
        period_end: chrono::NaiveDate::from_ymd_opt(2026, 9, 30).expect("valid date"),
        initiated_by: "billing@acme.test".to_string(),
    }
}
