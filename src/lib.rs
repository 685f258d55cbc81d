#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Provisioning Core
//!
//! Tenant provisioning task orchestrator for a multi-tenant control plane.
//!
//! ## Overview
//!
//! A provisioning, deprovisioning, feature-update or invoice request becomes a
//! durable task. The task is published to a message bus for out-of-process
//! workers, and the workers report progress back through authenticated
//! callbacks. Callers get a task id immediately and poll for status; failed
//! tasks can be retried up to their retry budget.
//!
//! ## Module Organization
//!
//! - [`models`] - Tasks, payloads, tenant instances
//! - [`state_machine`] - Task status transition rules
//! - [`database`] - Task store with optimistic concurrency (in-memory and PostgreSQL)
//! - [`messaging`] - Message bus (in-memory queue groups and pgmq) and the wire schema
//! - [`auth`] - Service tokens and the permission vocabulary
//! - [`orchestration`] - Task tracker, orchestrator façade, backoff, lease reconciliation
//! - [`web`] - Axum HTTP surface
//! - [`config`] - Layered configuration
//! - [`metrics`] - Task lifecycle metrics
//! - [`logging`] - Structured logging setup
//! - [`error`] - Error taxonomy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use provisioning_core::config::ProvisioningConfig;
//! use provisioning_core::database::InMemoryTaskStore;
//! use provisioning_core::messaging::InMemoryMessageBus;
//! use provisioning_core::metrics::NoopMetricsCollector;
//! use provisioning_core::models::InMemoryTenantInstanceRepository;
//! use provisioning_core::orchestration::ProvisioningOrchestrator;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = ProvisioningConfig::default();
//! config.auth.enabled = false;
//! let orchestrator = ProvisioningOrchestrator::from_config(
//!     &config,
//!     Arc::new(InMemoryTaskStore::new()),
//!     Arc::new(InMemoryMessageBus::new()),
//!     Arc::new(InMemoryTenantInstanceRepository::new()),
//!     Arc::new(NoopMetricsCollector),
//! )?;
//! # let _ = orchestrator;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod metrics;
pub mod models;
pub mod orchestration;
pub mod state_machine;
pub mod web;

pub use config::{ConfigManager, ProvisioningConfig};
pub use error::{ErrorKind, ProvisioningError, ProvisioningResult};
pub use models::{ProvisionTask, TaskId, TaskType};
pub use orchestration::{ProvisioningOrchestrator, TaskTracker};
pub use state_machine::TaskStatus;
