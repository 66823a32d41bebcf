//! Application state.

use std::sync::Arc;

use framex_firestore::{FirestoreClient, VideoJobRepository};
use framex_queue::JobQueue;
use framex_storage::S3Client;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub storage: Arc<S3Client>,
    pub jobs: Arc<VideoJobRepository>,
    pub queue: Arc<JobQueue>,
}

impl AppState {
    /// Create new application state with explicitly constructed clients.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let storage = S3Client::from_env().await?;
        let firestore = FirestoreClient::from_env().await?;
        let queue = JobQueue::from_env()?;

        Ok(Self {
            config,
            storage: Arc::new(storage),
            jobs: Arc::new(VideoJobRepository::new(firestore)),
            queue: Arc::new(queue),
        })
    }
}
