use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a provisioning task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Initial state; the task message has been (or is about to be) published
    Queued,
    /// A worker has picked the task up and is reporting progress
    Processing,
    /// Worker finished all steps
    Completed,
    /// Worker reported a failure; retryable while the retry budget lasts
    Failed,
    /// Cancelled before or (cooperatively) during processing
    Cancelled,
}

impl TaskStatus {
    /// Terminal states accept no further transitions except the explicit retry path
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Processing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" | "Queued" => Ok(Self::Queued),
            "processing" | "Processing" => Ok(Self::Processing),
            "completed" | "Completed" => Ok(Self::Completed),
            "failed" | "Failed" => Ok(Self::Failed),
            "cancelled" | "Cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Queued
    }
}
