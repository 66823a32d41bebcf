//! The video job entity.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::job_status::JobStatus;
use crate::notification::StatusNotification;

/// A persisted unit of work representing one video's end-to-end
/// frame-extraction request.
///
/// The store owns durability; during a single task execution the
/// processing workflow exclusively owns state transitions.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoJob {
    /// Store-assigned identity (absent until first persistence)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Caller-facing unique reference, assigned exactly once at first
    /// persistence as `{client_identification}-{uuid}`
    pub job_ref: String,

    /// Opaque client/user identification supplied by the caller
    pub client_identification: String,

    /// Lifecycle state
    #[serde(default)]
    pub status: JobStatus,

    /// Storage bucket, fixed at creation
    pub bucket: String,

    /// Key prefix under which the raw video is stored
    pub video_path: String,

    /// Key prefix under which extracted frames are stored
    pub frames_path: String,

    /// Caller-supplied callback URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_url: Option<String>,

    /// Caller-supplied configuration, passed through untouched
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,

    /// Failure description; present if and only if status is ERROR
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,

    /// Set when the job enters ERROR, never unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inactivated_at: Option<DateTime<Utc>>,
}

impl VideoJob {
    /// Create a new job in Pending state. The `job_ref` stays empty
    /// until the repository assigns it at first persistence.
    pub fn new(
        client_identification: impl Into<String>,
        bucket: impl Into<String>,
        video_path: impl Into<String>,
        frames_path: impl Into<String>,
        notify_url: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            job_ref: String::new(),
            client_identification: client_identification.into(),
            status: JobStatus::Pending,
            bucket: bucket.into(),
            video_path: video_path.into(),
            frames_path: frames_path.into(),
            notify_url,
            config: HashMap::new(),
            error_message: None,
            created_at: now,
            updated_at: now,
            inactivated_at: None,
        }
    }

    /// Object key of the raw uploaded video.
    pub fn video_key(&self) -> String {
        format!("{}/{}", self.video_path, self.job_ref)
    }

    /// Key prefix under which this job's frames are uploaded.
    pub fn frames_prefix(&self) -> String {
        format!(
            "{}/{}/{}",
            self.frames_path, self.client_identification, self.job_ref
        )
    }

    /// Mark the job as accepted by the queue.
    ///
    /// No-op with a warning unless the job is still Pending.
    pub fn enqueue(&mut self) {
        if self.status != JobStatus::Pending {
            warn!(job_ref = %self.job_ref, status = %self.status, "job is not pending, skipping enqueue");
            return;
        }
        self.status = JobStatus::Queued;
        self.touch();
    }

    /// Mark the job as claimed by a worker.
    ///
    /// No-op with a warning unless the job is Queued; this is what makes
    /// duplicate queue deliveries harmless.
    pub fn start_processing(&mut self) {
        if self.status != JobStatus::Queued {
            warn!(job_ref = %self.job_ref, status = %self.status, "job already started, skipping transition");
            return;
        }
        self.status = JobStatus::Processing;
        self.touch();
    }

    /// Mark the job as completed, clearing any prior error.
    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.error_message = None;
        self.touch();
    }

    /// Mark the job as rejected by content moderation.
    ///
    /// The rejection reason travels in the notification detail and the
    /// processing outcome; `error_message` stays reserved for ERROR.
    pub fn reject(&mut self) {
        self.status = JobStatus::Rejected;
        self.touch();
    }

    /// Mark the job as failed.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = JobStatus::Error;
        self.error_message = Some(reason.into());
        self.inactivated_at = Some(Utc::now());
        self.touch();
    }

    /// Build an outbound notification reflecting the current state.
    pub fn build_notification(&self, detail: Option<String>) -> StatusNotification {
        StatusNotification::new(&self.job_ref, self.status, detail)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> VideoJob {
        let mut job = VideoJob::new("client-a", "media-bucket", "videos", "frames", None);
        job.job_ref = "client-a-1234".to_string();
        job
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = job();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.error_message.is_none());
        assert!(job.inactivated_at.is_none());
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let mut job = job();
        job.enqueue();
        assert_eq!(job.status, JobStatus::Queued);
        job.start_processing();
        assert_eq!(job.status, JobStatus::Processing);
        job.complete();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error_message.is_none());
    }

    #[test]
    fn test_start_processing_is_idempotent_past_queued() {
        let mut job = job();
        job.enqueue();
        job.start_processing();
        job.complete();

        // A duplicate delivery must not regress the state.
        job.start_processing();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn test_enqueue_requires_pending() {
        let mut job = job();
        job.enqueue();
        job.start_processing();
        job.enqueue();
        assert_eq!(job.status, JobStatus::Processing);
    }

    #[test]
    fn test_fail_sets_error_message_and_inactivated_at() {
        let mut job = job();
        job.fail("decode blew up");
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.error_message.as_deref(), Some("decode blew up"));
        assert!(job.inactivated_at.is_some());
    }

    #[test]
    fn test_complete_clears_error_message() {
        let mut job = job();
        job.fail("transient");
        job.complete();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error_message.is_none());
    }

    #[test]
    fn test_reject_leaves_error_message_untouched() {
        let mut job = job();
        job.reject();
        assert_eq!(job.status, JobStatus::Rejected);
        assert!(job.error_message.is_none());
        assert!(job.inactivated_at.is_none());
    }

    #[test]
    fn test_key_builders() {
        let job = job();
        assert_eq!(job.video_key(), "videos/client-a-1234");
        assert_eq!(job.frames_prefix(), "frames/client-a/client-a-1234");
    }

    #[test]
    fn test_updated_at_refreshed_on_mutation() {
        let mut job = job();
        let before = job.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        job.enqueue();
        assert!(job.updated_at > before);
    }
}
