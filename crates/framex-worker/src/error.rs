//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Handoff failed: {0}")]
    HandoffFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] framex_storage::StorageError),

    #[error("Firestore error: {0}")]
    Firestore(#[from] framex_firestore::FirestoreError),

    #[error("Moderation error: {0}")]
    Moderation(#[from] framex_moderation::ModerationError),

    #[error("Media error: {0}")]
    Media(#[from] framex_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] framex_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn processing_failed(msg: impl Into<String>) -> Self {
        Self::ProcessingFailed(msg.into())
    }

    pub fn handoff_failed(msg: impl Into<String>) -> Self {
        Self::HandoffFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
