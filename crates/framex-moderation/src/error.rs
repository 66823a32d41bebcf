//! Moderation error types.

use thiserror::Error;

/// Result type for moderation operations.
pub type ModerationResult<T> = Result<T, ModerationError>;

/// Errors that can occur during content moderation.
#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Failed to configure moderation client: {0}")]
    ConfigError(String),

    #[error("Failed to start moderation job: {0}")]
    StartFailed(String),

    #[error("Moderation job failed: {0}")]
    JobFailed(String),

    #[error("Timed out waiting for moderation job {job_id} after {max_wait_secs}s")]
    Timeout { job_id: String, max_wait_secs: u64 },

    #[error("Moderation poll failed: {0}")]
    PollFailed(String),

    #[error("Invalid moderation response: {0}")]
    InvalidResponse(String),
}

impl ModerationError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn start_failed(msg: impl Into<String>) -> Self {
        Self::StartFailed(msg.into())
    }

    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }
}
