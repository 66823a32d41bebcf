//! Queue task payloads.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::job::VideoJob;

/// The unit of work delivered to a processing worker.
///
/// Carries every job field the pipeline needs so a delivery can run
/// without a second store read for context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractFramesTask {
    /// Caller-facing job reference
    pub job_ref: String,
    /// Opaque client/user identification
    pub client_identification: String,
    /// Storage bucket
    pub bucket: String,
    /// Key prefix of the raw video
    pub video_path: String,
    /// Key prefix for extracted frames
    pub frames_path: String,
    /// Caller-supplied callback URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_url: Option<String>,
    /// Caller-supplied configuration, passed through untouched
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

impl ExtractFramesTask {
    /// Build a task payload from a persisted job.
    pub fn from_job(job: &VideoJob) -> Self {
        Self {
            job_ref: job.job_ref.clone(),
            client_identification: job.client_identification.clone(),
            bucket: job.bucket.clone(),
            video_path: job.video_path.clone(),
            frames_path: job.frames_path.clone(),
            notify_url: job.notify_url.clone(),
            config: job.config.clone(),
        }
    }

    /// Deduplication key for the queue: one in-flight task per job.
    pub fn idempotency_key(&self) -> String {
        format!("extract:{}", self.job_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_from_job_copies_coordinates() {
        let mut job = VideoJob::new(
            "client-a",
            "media-bucket",
            "videos",
            "frames",
            Some("https://example.com/hook".to_string()),
        );
        job.job_ref = "client-a-42".to_string();

        let task = ExtractFramesTask::from_job(&job);
        assert_eq!(task.job_ref, "client-a-42");
        assert_eq!(task.bucket, "media-bucket");
        assert_eq!(task.video_path, "videos");
        assert_eq!(task.frames_path, "frames");
        assert_eq!(task.notify_url.as_deref(), Some("https://example.com/hook"));
    }

    #[test]
    fn test_task_serde_roundtrip() {
        let task = ExtractFramesTask {
            job_ref: "c-1".to_string(),
            client_identification: "c".to_string(),
            bucket: "b".to_string(),
            video_path: "videos".to_string(),
            frames_path: "frames".to_string(),
            notify_url: None,
            config: HashMap::new(),
        };

        let json = serde_json::to_string(&task).unwrap();
        assert!(!json.contains("notify_url"));

        let decoded: ExtractFramesTask = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.job_ref, task.job_ref);
        assert_eq!(decoded.idempotency_key(), "extract:c-1");
    }
}
