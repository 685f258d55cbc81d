//! # Provisioning Server
//!
//! Runs the orchestrator HTTP API and the lease reconciler.
//!
//! Storage and messaging backends come from configuration: in-memory for
//! local development, PostgreSQL and pgmq for deployed environments.

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

use provisioning_core::config::{ConfigManager, MessagingBackend, ProvisioningConfig, StorageBackend};
use provisioning_core::database::{InMemoryTaskStore, PgTaskStore, TaskStore};
use provisioning_core::logging;
use provisioning_core::messaging::{InMemoryMessageBus, MessageBus, PgmqMessageBus};
use provisioning_core::metrics::{
    MetricsCollector, NoopMetricsCollector, OpenTelemetryMetricsCollector,
};
use provisioning_core::models::{
    InMemoryTenantInstanceRepository, PgTenantInstanceRepository, TenantInstanceRepository,
};
use provisioning_core::orchestration::{LeaseReconciler, ProvisioningOrchestrator};
use provisioning_core::web::{self, AppState};

#[derive(Parser)]
#[command(name = "provisioning-server")]
#[command(about = "Tenant provisioning orchestrator API")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration directory (default: ./config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Environment name (default: PROVISIONING_ENV, APP_ENV or development)
    #[arg(short, long)]
    environment: Option<String>,

    /// Override `web.bind_address`
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let environment = cli
        .environment
        .unwrap_or_else(ConfigManager::detect_environment);

    let manager = ConfigManager::load_from_directory_with_env(cli.config_dir, &environment)
        .context("failed to load configuration")?;
    let config = manager.config().clone();
    logging::init_with_config(&config.telemetry, manager.environment());
    info!(
        environment = %manager.environment(),
        config = %manager.debug_config(),
        "📋 Configuration loaded"
    );

    let pool = connect_if_needed(&config).await?;

    let (store, tenant_instances): (Arc<dyn TaskStore>, Arc<dyn TenantInstanceRepository>) =
        match (&config.database.backend, &pool) {
            (StorageBackend::Postgres, Some(pool)) => {
                let store = PgTaskStore::new(pool.clone());
                if config.database.run_migrations {
                    store.migrate().await.context("failed to run migrations")?;
                }
                (
                    Arc::new(store),
                    Arc::new(PgTenantInstanceRepository::new(pool.clone())),
                )
            }
            _ => (
                Arc::new(InMemoryTaskStore::new()),
                Arc::new(InMemoryTenantInstanceRepository::new()),
            ),
        };

    let bus: Arc<dyn MessageBus> = match (&config.messaging.backend, &pool) {
        (MessagingBackend::Pgmq, Some(pool)) => {
            let bus = PgmqMessageBus::new_with_pool(pool.clone()).await;
            if config.messaging.initialize_queues {
                bus.initialize_queues()
                    .await
                    .context("failed to create task queues")?;
            }
            Arc::new(bus)
        }
        _ => Arc::new(InMemoryMessageBus::new()),
    };

    let metrics: Arc<dyn MetricsCollector> = if config.telemetry.metrics_enabled {
        Arc::new(OpenTelemetryMetricsCollector::new())
    } else {
        Arc::new(NoopMetricsCollector)
    };

    let orchestrator =
        ProvisioningOrchestrator::from_config(&config, store, bus, tenant_instances, metrics)
            .context("failed to build orchestrator")?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let reconciler = LeaseReconciler::new(orchestrator.clone(), config.tasks.reconcile_interval())
        .spawn(shutdown_tx.subscribe());

    let app = web::create_app(AppState::new(
        orchestrator,
        config.web.clone(),
        manager.environment(),
    ));

    let bind_address = cli.bind.unwrap_or_else(|| config.web.bind_address.clone());
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    info!(bind_address = %bind_address, "🌐 Provisioning API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("🛑 Shutting down");
    let _ = shutdown_tx.send(());
    if let Err(e) = reconciler.await {
        error!(error = %e, "Lease reconciler task ended abnormally");
    }
    Ok(())
}

/// A pool is only opened when some backend needs PostgreSQL
async fn connect_if_needed(config: &ProvisioningConfig) -> Result<Option<PgPool>> {
    let needs_pool = config.database.backend == StorageBackend::Postgres
        || config.messaging.backend == MessagingBackend::Pgmq;
    if !needs_pool {
        return Ok(None);
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await
        .context("failed to connect to PostgreSQL")?;
    info!(
        max_connections = config.database.max_connections,
        "🗄️ Database pool ready"
    );
    Ok(Some(pool))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
}
