//! # Web API Application State

use std::sync::Arc;

use crate::config::WebConfig;
use crate::orchestration::ProvisioningOrchestrator;

/// Shared state handed to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub orchestrator: Arc<ProvisioningOrchestrator>,
    pub config: Arc<WebConfig>,
    pub environment: String,
}

impl AppState {
    pub fn new(
        orchestrator: ProvisioningOrchestrator,
        config: WebConfig,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            config: Arc::new(config),
            environment: environment.into(),
        }
    }
}
