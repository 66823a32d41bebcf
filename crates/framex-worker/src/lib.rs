//! Frame extraction worker.
//!
//! Consumes tasks from the queue and drives each job through the
//! moderation → download → extract → upload pipeline, recording the
//! terminal state and notifying the caller.

pub mod config;
pub mod error;
pub mod executor;
pub mod gateways;
pub mod notify;
pub mod packager;
pub mod processor;
pub mod retry;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use gateways::{
    FfmpegExtractor, FrameExtractor, JobStore, ModerationGateway, NotificationSender, ObjectStore,
};
pub use notify::CallbackNotifier;
pub use packager::PackagerClient;
pub use processor::FrameProcessor;
pub use retry::{retry_async, RetryConfig, RetryResult};
