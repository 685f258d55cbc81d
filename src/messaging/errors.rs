//! # Messaging Error Types
//!
//! Structured errors for the message bus using thiserror. Every variant is a
//! publish-time infrastructure failure from the orchestrator's point of view.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Message bus unavailable: {message}")]
    Unavailable { message: String },

    #[error("Queue operation failed: {queue_name}: {operation}: {message}")]
    QueueOperation {
        queue_name: String,
        operation: String,
        message: String,
    },

    #[error("Message serialization error: {message}")]
    MessageSerialization { message: String },

    #[error("Message deserialization error: {message}")]
    MessageDeserialization { message: String },

    #[error("Invalid subject: {subject}: {reason}")]
    InvalidSubject { subject: String, reason: String },

    #[error("Subject mismatch: message for {expected} published to {actual}")]
    SubjectMismatch { expected: String, actual: String },
}

impl MessagingError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn queue_operation(
        queue_name: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::QueueOperation {
            queue_name: queue_name.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn invalid_subject(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSubject {
            subject: subject.into(),
            reason: reason.into(),
        }
    }
}

/// Conversion from serde_json::Error to MessagingError
impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() || err.is_data() || err.is_eof() {
            Self::MessageDeserialization {
                message: err.to_string(),
            }
        } else {
            Self::MessageSerialization {
                message: err.to_string(),
            }
        }
    }
}

/// Conversion from pgmq::errors::PgmqError to MessagingError
impl From<pgmq::errors::PgmqError> for MessagingError {
    fn from(err: pgmq::errors::PgmqError) -> Self {
        Self::queue_operation("unknown", "pgmq", err.to_string())
    }
}

pub type MessagingResult<T> = Result<T, MessagingError>;
