//! Gateway traits at the processing seam.
//!
//! The processor depends on these traits rather than concrete clients,
//! so the pipeline is exercised in tests with recording fakes while
//! production wires in the real clients below.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use framex_firestore::VideoJobRepository;
use framex_models::{StatusNotification, StorageObject, VideoJob};
use framex_moderation::{ModerationClient, ModerationVerdict};
use framex_storage::S3Client;

use crate::error::WorkerResult;

/// Durable job record store.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Load a job by its caller-facing reference.
    async fn find_by_job_ref(&self, job_ref: &str) -> WorkerResult<Option<VideoJob>>;

    /// Persist the job, returning the stored representation.
    async fn save(&self, job: &VideoJob) -> WorkerResult<VideoJob>;
}

/// Blob storage for videos and frames.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download an object as bytes.
    async fn download(&self, bucket: &str, key: &str) -> WorkerResult<Vec<u8>>;

    /// Upload `(content, key_suffix)` pairs under a common prefix.
    async fn upload_bulk(
        &self,
        items: Vec<(Vec<u8>, String)>,
        bucket: &str,
        prefix: &str,
        content_type: &str,
    ) -> WorkerResult<Vec<StorageObject>>;
}

/// Content appropriateness scanning.
#[async_trait]
pub trait ModerationGateway: Send + Sync {
    async fn moderate_video(&self, bucket: &str, key: &str) -> WorkerResult<ModerationVerdict>;
}

/// Still-frame extraction engine.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Produce an ordered sequence of frame files from a local video.
    async fn extract(&self, video_path: &Path, output_dir: &Path) -> WorkerResult<Vec<PathBuf>>;
}

/// Best-effort callback notification.
///
/// Implementations must never surface failures to the pipeline; a lost
/// notification does not roll back a processing decision.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notify_url: Option<&str>, notification: &StatusNotification);
}

// =============================================================================
// Production implementations
// =============================================================================

#[async_trait]
impl JobStore for VideoJobRepository {
    async fn find_by_job_ref(&self, job_ref: &str) -> WorkerResult<Option<VideoJob>> {
        Ok(VideoJobRepository::find_by_job_ref(self, job_ref).await?)
    }

    async fn save(&self, job: &VideoJob) -> WorkerResult<VideoJob> {
        Ok(VideoJobRepository::save(self, job).await?)
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn download(&self, bucket: &str, key: &str) -> WorkerResult<Vec<u8>> {
        Ok(self.download_object(bucket, key).await?)
    }

    async fn upload_bulk(
        &self,
        items: Vec<(Vec<u8>, String)>,
        bucket: &str,
        prefix: &str,
        content_type: &str,
    ) -> WorkerResult<Vec<StorageObject>> {
        Ok(self
            .upload_objects_bulk(items, bucket, prefix, Some(content_type))
            .await?)
    }
}

#[async_trait]
impl ModerationGateway for ModerationClient {
    async fn moderate_video(&self, bucket: &str, key: &str) -> WorkerResult<ModerationVerdict> {
        Ok(ModerationClient::moderate_video(self, bucket, key).await?)
    }
}

/// FFmpeg-backed frame extractor.
pub struct FfmpegExtractor {
    timeout_secs: Option<u64>,
}

impl FfmpegExtractor {
    pub fn new(timeout_secs: Option<u64>) -> Self {
        Self { timeout_secs }
    }
}

#[async_trait]
impl FrameExtractor for FfmpegExtractor {
    async fn extract(&self, video_path: &Path, output_dir: &Path) -> WorkerResult<Vec<PathBuf>> {
        Ok(framex_media::extract_frames_with_timeout(video_path, output_dir, self.timeout_secs).await?)
    }
}
