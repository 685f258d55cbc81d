//! # PostgreSQL Message Queue Bus (pgmq-rs)
//!
//! Each subject maps to one pgmq queue (`provisioning.tenant.provision` →
//! `provisioning_tenant_provision`). Workers reading the same queue compete
//! for messages through the visibility timeout, which gives queue-group
//! semantics without a broker.

use async_trait::async_trait;
use pgmq::{types::Message, PGMQueue};
use tracing::{debug, info};

use super::bus::{ensure_subject_matches, validate_subject, MessageBus};
use super::errors::{MessagingError, MessagingResult};
use super::message::ProvisioningTaskMessage;
use crate::models::TaskType;

/// Queue name backing a subject
pub fn queue_name_for_subject(subject: &str) -> String {
    subject.replace('.', "_")
}

#[derive(Debug, Clone)]
pub struct PgmqMessageBus {
    pgmq: PGMQueue,
}

impl PgmqMessageBus {
    /// Create a bus on an existing connection pool (shared with the task store)
    pub async fn new_with_pool(pool: sqlx::PgPool) -> Self {
        info!("🚀 Creating pgmq message bus with shared connection pool");
        let pgmq = PGMQueue::new_with_pool(pool).await;
        Self { pgmq }
    }

    /// Create the queue for every task type subject
    pub async fn initialize_queues(&self) -> MessagingResult<()> {
        for task_type in TaskType::all() {
            let queue_name = queue_name_for_subject(task_type.subject());
            self.pgmq
                .create(&queue_name)
                .await
                .map_err(|e| MessagingError::queue_operation(&queue_name, "create", e.to_string()))?;
            debug!(queue = %queue_name, "📋 Queue ready");
        }
        info!(queues = TaskType::all().len(), "✅ Provisioning queues initialized");
        Ok(())
    }

    /// Read up to `limit` messages for a subject, hiding them for `visibility_timeout` seconds
    pub async fn receive(
        &self,
        subject: &str,
        visibility_timeout: i32,
        limit: i32,
    ) -> MessagingResult<Vec<(i64, ProvisioningTaskMessage)>> {
        let queue_name = queue_name_for_subject(subject);
        let messages: Vec<Message<serde_json::Value>> = self
            .pgmq
            .read_batch(&queue_name, Some(visibility_timeout), limit)
            .await
            .map_err(|e| MessagingError::queue_operation(&queue_name, "read_batch", e.to_string()))?
            .unwrap_or_default();

        messages
            .into_iter()
            .map(|raw| -> MessagingResult<_> {
                let message = ProvisioningTaskMessage::from_json(raw.message)?;
                Ok((raw.msg_id, message))
            })
            .collect()
    }

    /// Remove a processed message from its queue
    pub async fn acknowledge(&self, subject: &str, message_id: i64) -> MessagingResult<()> {
        let queue_name = queue_name_for_subject(subject);
        self.pgmq
            .delete(&queue_name, message_id)
            .await
            .map_err(|e| MessagingError::queue_operation(&queue_name, "delete", e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl MessageBus for PgmqMessageBus {
    async fn publish(
        &self,
        subject: &str,
        message: &ProvisioningTaskMessage,
    ) -> MessagingResult<()> {
        validate_subject(subject)?;
        ensure_subject_matches(subject, message)?;

        let queue_name = queue_name_for_subject(subject);
        let body = message.to_json()?;
        let message_id = self
            .pgmq
            .send(&queue_name, &body)
            .await
            .map_err(|e| MessagingError::queue_operation(&queue_name, "send", e.to_string()))?;

        debug!(
            queue = %queue_name,
            message_id = message_id,
            task_id = %message.task_id,
            correlation_id = %message.correlation_id,
            "📤 Provisioning task sent"
        );
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "pgmq"
    }
}
