//! # Provisioning Task Message
//!
//! Wire payload published to the bus. On the wire it is camelCase JSON:
//!
//! ```json
//! {"taskId":"tp_9f2a…","taskType":"TenantProvision","correlationId":"c_81…",
//!  "payload":{…},"metadata":{"publishedAt":"…","retryCount":0,"maxRetries":3}}
//! ```
//!
//! `taskType` is the discriminator of `payload`; a message whose payload does
//! not match its declared type is rejected during deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::models::{CorrelationId, ProvisionTask, TaskId, TaskPayload, TaskType};

/// Delivery metadata stamped at publish time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    pub published_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
    /// Workers should not start the task before this instant (retry backoff)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
}

impl Default for MessageMetadata {
    fn default() -> Self {
        Self {
            published_at: Utc::now(),
            retry_count: 0,
            max_retries: crate::constants::DEFAULT_MAX_RETRIES,
            not_before: None,
        }
    }
}

/// Immutable value object describing one publish of a task
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "WireMessage")]
pub struct ProvisioningTaskMessage {
    pub task_id: TaskId,
    pub correlation_id: CorrelationId,
    pub payload: TaskPayload,
    pub metadata: MessageMetadata,
}

impl ProvisioningTaskMessage {
    pub fn new(task_id: TaskId, correlation_id: CorrelationId, payload: TaskPayload) -> Self {
        Self {
            task_id,
            correlation_id,
            payload,
            metadata: MessageMetadata::default(),
        }
    }

    /// Build the message for the task's current publish
    pub fn for_task(task: &ProvisionTask) -> Self {
        Self {
            task_id: task.task_id.clone(),
            correlation_id: task.correlation_id.clone(),
            payload: task.payload.clone(),
            metadata: MessageMetadata {
                published_at: Utc::now(),
                retry_count: task.retry_count,
                max_retries: task.max_retries,
                not_before: None,
            },
        }
    }

    pub fn with_not_before(mut self, not_before: DateTime<Utc>) -> Self {
        self.metadata.not_before = Some(not_before);
        self
    }

    pub fn task_type(&self) -> TaskType {
        self.payload.task_type()
    }

    /// Subject derived from the task type
    pub fn subject(&self) -> &'static str {
        self.task_type().subject()
    }

    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn from_json(json: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(json)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireMessageRef<'a> {
    task_id: &'a TaskId,
    task_type: TaskType,
    correlation_id: &'a CorrelationId,
    payload: serde_json::Value,
    metadata: &'a MessageMetadata,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    task_id: TaskId,
    task_type: TaskType,
    correlation_id: CorrelationId,
    payload: serde_json::Value,
    #[serde(default)]
    metadata: MessageMetadata,
}

impl Serialize for ProvisioningTaskMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let payload = self.payload.body().map_err(serde::ser::Error::custom)?;
        WireMessageRef {
            task_id: &self.task_id,
            task_type: self.task_type(),
            correlation_id: &self.correlation_id,
            payload,
            metadata: &self.metadata,
        }
        .serialize(serializer)
    }
}

impl TryFrom<WireMessage> for ProvisioningTaskMessage {
    type Error = String;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        let payload = TaskPayload::from_body(wire.task_type, wire.payload).map_err(|e| {
            format!("payload does not match task type {}: {e}", wire.task_type)
        })?;
        Ok(Self {
            task_id: wire.task_id,
            correlation_id: wire.correlation_id,
            payload,
            metadata: wire.metadata,
        })
    }
}
