//! # In-Memory Message Bus
//!
//! Process-local bus with queue-group semantics: every group subscribed to a
//! subject receives each message once, and within a group messages are handed
//! to members round-robin. Used by tests and single-process development.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::bus::{ensure_subject_matches, validate_subject, MessageBus};
use super::errors::{MessagingError, MessagingResult};
use super::message::ProvisioningTaskMessage;

/// A message as received by a subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub subject: String,
    pub message: ProvisioningTaskMessage,
}

#[derive(Debug, Default)]
struct QueueGroup {
    members: Vec<mpsc::UnboundedSender<Delivery>>,
    next: usize,
}

impl QueueGroup {
    /// Hand the delivery to the next live member, pruning closed receivers
    fn deliver(&mut self, delivery: Delivery) -> bool {
        self.members.retain(|member| !member.is_closed());
        if self.members.is_empty() {
            return false;
        }
        let index = self.next % self.members.len();
        self.next = index + 1;
        self.members[index].send(delivery).is_ok()
    }
}

#[derive(Debug, Default)]
struct BusState {
    /// subject -> queue group name -> members
    subscriptions: HashMap<String, HashMap<String, QueueGroup>>,
    published: Vec<Delivery>,
}

/// Receiving end of a queue-group subscription
#[derive(Debug)]
pub struct Subscription {
    subject: String,
    group: String,
    receiver: mpsc::UnboundedReceiver<Delivery>,
}

impl Subscription {
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Wait for the next delivery; `None` once the bus is dropped
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Delivery> {
        self.receiver.try_recv().ok()
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryMessageBus {
    state: Arc<Mutex<BusState>>,
    available: Arc<AtomicBool>,
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState::default())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl InMemoryMessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join `group` on `subject`
    pub fn subscribe(
        &self,
        subject: impl Into<String>,
        group: impl Into<String>,
    ) -> MessagingResult<Subscription> {
        let subject = subject.into();
        let group = group.into();
        validate_subject(&subject)?;

        let (sender, receiver) = mpsc::unbounded_channel();
        self.state
            .lock()
            .subscriptions
            .entry(subject.clone())
            .or_default()
            .entry(group.clone())
            .or_default()
            .members
            .push(sender);

        debug!(subject = %subject, group = %group, "Subscribed to in-memory bus");
        Ok(Subscription {
            subject,
            group,
            receiver,
        })
    }

    /// Simulate the bus becoming unreachable (or recovering)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Every message accepted so far, in publish order
    pub fn published(&self) -> Vec<Delivery> {
        self.state.lock().published.clone()
    }

    pub fn published_to(&self, subject: &str) -> Vec<ProvisioningTaskMessage> {
        self.state
            .lock()
            .published
            .iter()
            .filter(|delivery| delivery.subject == subject)
            .map(|delivery| delivery.message.clone())
            .collect()
    }

    pub fn published_count(&self) -> usize {
        self.state.lock().published.len()
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn publish(
        &self,
        subject: &str,
        message: &ProvisioningTaskMessage,
    ) -> MessagingResult<()> {
        validate_subject(subject)?;
        ensure_subject_matches(subject, message)?;

        if !self.is_available() {
            warn!(subject = %subject, task_id = %message.task_id, "In-memory bus unavailable");
            return Err(MessagingError::unavailable("in-memory bus is unavailable"));
        }

        let delivery = Delivery {
            subject: subject.to_string(),
            message: message.clone(),
        };

        let mut state = self.state.lock();
        let mut delivered_groups = 0usize;
        if let Some(groups) = state.subscriptions.get_mut(subject) {
            for group in groups.values_mut() {
                if group.deliver(delivery.clone()) {
                    delivered_groups += 1;
                }
            }
        }
        state.published.push(delivery);

        debug!(
            subject = %subject,
            task_id = %message.task_id,
            correlation_id = %message.correlation_id,
            groups = delivered_groups,
            "Published provisioning task"
        );
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "in_memory"
    }
}
