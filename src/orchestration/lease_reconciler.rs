//! # Lease Reconciler
//!
//! Background service that fails Processing tasks whose worker stopped
//! reporting, and requeues them while retry budget remains.
//!
//! ## Flow
//!
//! 1. Timer tick triggers a reconciliation pass
//! 2. Tasks with an expired lease are loaded in batches
//! 3. Each is re-checked and marked Failed, then retried if eligible
//! 4. A failed pass is logged and the loop keeps going
//!
//! ## Configuration
//!
//! ```toml
//! [tasks]
//! lease_duration_seconds = 300
//! reconcile_interval_seconds = 30
//! reconcile_batch_size = 100
//! ```

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::error::ProvisioningResult;

use super::provisioning_orchestrator::ProvisioningOrchestrator;
use super::types::ReconciliationReport;

#[derive(Debug, Clone)]
pub struct LeaseReconciler {
    orchestrator: ProvisioningOrchestrator,
    interval: Duration,
}

impl LeaseReconciler {
    #[must_use]
    pub fn new(orchestrator: ProvisioningOrchestrator, interval: Duration) -> Self {
        Self {
            orchestrator,
            // tokio::time::interval panics on a zero period
            interval: interval.max(Duration::from_millis(10)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One reconciliation pass
    pub async fn run_once(&self) -> ProvisioningResult<ReconciliationReport> {
        self.orchestrator.reconcile_expired_leases().await
    }

    /// Run until a shutdown signal arrives or the sender is dropped.
    ///
    /// The first pass runs immediately. A failed pass is logged and does not
    /// stop the loop.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_ms = self.interval.as_millis() as u64,
            "⏱️ Starting lease reconciler"
        );

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "❌ Lease reconciliation pass failed");
                    }
                }
                _ = shutdown.recv() => {
                    info!("🛑 Lease reconciler shutting down");
                    break;
                }
            }
        }
    }

    /// Spawn [`Self::run`] on the current runtime
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}
