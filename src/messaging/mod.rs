//! # Messaging Module
//!
//! Hands provisioning tasks to out-of-process workers. The orchestrator only
//! publishes; workers subscribe to the per-task-type subjects and report back
//! through the callback API.

pub mod bus;
pub mod errors;
pub mod in_memory;
pub mod message;
pub mod pgmq_bus;

pub use bus::MessageBus;
pub use errors::{MessagingError, MessagingResult};
pub use in_memory::{Delivery, InMemoryMessageBus, Subscription};
pub use message::{MessageMetadata, ProvisioningTaskMessage};
pub use pgmq_bus::{queue_name_for_subject, PgmqMessageBus};
