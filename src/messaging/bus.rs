use async_trait::async_trait;

use super::errors::{MessagingError, MessagingResult};
use super::message::ProvisioningTaskMessage;

/// Publish side of the message bus.
///
/// Delivery is at-least-once: a message may reach a worker more than once, and
/// workers are expected to consult `steps_completed` before redoing work.
/// Publishing never waits for a worker; it fails synchronously only when the
/// bus itself cannot accept the message.
#[async_trait]
pub trait MessageBus: Send + Sync + std::fmt::Debug {
    /// Fire-and-forget publish to a named subject
    async fn publish(&self, subject: &str, message: &ProvisioningTaskMessage)
        -> MessagingResult<()>;

    /// Publish to the subject derived from the message's task type
    async fn publish_provisioning_task(
        &self,
        message: &ProvisioningTaskMessage,
    ) -> MessagingResult<()> {
        self.publish(message.subject(), message).await
    }

    /// Short backend name for logs and health output
    fn backend_name(&self) -> &'static str;
}

/// Reject subjects that are empty or contain empty segments (`a..b`)
pub fn validate_subject(subject: &str) -> MessagingResult<()> {
    if subject.is_empty() {
        return Err(MessagingError::invalid_subject(subject, "subject is empty"));
    }
    if subject.split('.').any(|segment| segment.trim().is_empty()) {
        return Err(MessagingError::invalid_subject(
            subject,
            "subject contains an empty segment",
        ));
    }
    Ok(())
}

/// Ensure a message goes to the subject its task type owns
pub fn ensure_subject_matches(
    subject: &str,
    message: &ProvisioningTaskMessage,
) -> MessagingResult<()> {
    let expected = message.subject();
    if subject != expected {
        return Err(MessagingError::SubjectMismatch {
            expected: expected.to_string(),
            actual: subject.to_string(),
        });
    }
    Ok(())
}
