//! Video job lifecycle states.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a video job.
///
/// Jobs only move forward: `Pending → Queued → Processing` and then to
/// exactly one of the terminal states. `Rejected` is a business outcome
/// (content moderation), distinct from `Error` (a system fault).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Created by registration, before enqueue confirmation
    #[default]
    Pending,
    /// Task accepted by the queue, waiting for a worker
    Queued,
    /// A worker has claimed the task and begun the pipeline
    Processing,
    /// Frames extracted and uploaded successfully
    Completed,
    /// Content moderation found the video inappropriate
    Rejected,
    /// Processing failed (the delivery may still be retried by the transport)
    Error,
}

impl JobStatus {
    /// Canonical string projection, used for persistence and wire payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Queued => "QUEUED",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Rejected => "REJECTED",
            JobStatus::Error => "ERROR",
        }
    }

    /// Parse the canonical string projection.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(JobStatus::Pending),
            "QUEUED" => Some(JobStatus::Queued),
            "PROCESSING" => Some(JobStatus::Processing),
            "COMPLETED" => Some(JobStatus::Completed),
            "REJECTED" => Some(JobStatus::Rejected),
            "ERROR" => Some(JobStatus::Error),
            _ => None,
        }
    }

    /// Check if this is a terminal state (no more transitions expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Rejected | JobStatus::Error
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_projection_roundtrip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Queued,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Rejected,
            JobStatus::Error,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("pending"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Rejected.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }

    #[test]
    fn test_serde_uses_canonical_strings() {
        let json = serde_json::to_string(&JobStatus::Rejected).unwrap();
        assert_eq!(json, "\"REJECTED\"");
    }
}
