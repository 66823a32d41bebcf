//! The frame-extraction processing pipeline.
//!
//! One `process` call handles one queue delivery: load the job, claim
//! it, gate on content moderation, download, extract, bulk-upload, and
//! record the terminal state. Stage failures are caught once at the
//! outer boundary, recorded on the job, notified, and re-raised so the
//! queue transport's retry policy governs redelivery.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use framex_models::{ExtractFramesTask, HandoffDescriptor, ProcessingOutcome, VideoJob};

use crate::error::{WorkerError, WorkerResult};
use crate::gateways::{FrameExtractor, JobStore, ModerationGateway, NotificationSender, ObjectStore};

/// Content type for every uploaded frame.
const FRAME_CONTENT_TYPE: &str = "image/png";

/// Filename of the downloaded video inside the scratch directory.
const SOURCE_FILENAME: &str = "source_video";

/// Pipeline coordinator for a single worker.
pub struct FrameProcessor {
    jobs: Arc<dyn JobStore>,
    storage: Arc<dyn ObjectStore>,
    moderation: Arc<dyn ModerationGateway>,
    extractor: Arc<dyn FrameExtractor>,
    notifier: Arc<dyn NotificationSender>,
    work_dir: PathBuf,
}

impl FrameProcessor {
    /// Create a processor with explicitly constructed gateways.
    pub fn new(
        jobs: Arc<dyn JobStore>,
        storage: Arc<dyn ObjectStore>,
        moderation: Arc<dyn ModerationGateway>,
        extractor: Arc<dyn FrameExtractor>,
        notifier: Arc<dyn NotificationSender>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            jobs,
            storage,
            moderation,
            extractor,
            notifier,
            work_dir: work_dir.into(),
        }
    }

    /// Process one queue delivery.
    ///
    /// A missing job record and a failed claim persist propagate as-is:
    /// there is nothing meaningful to record on the job yet. Everything
    /// after that goes through the failure boundary.
    pub async fn process(&self, task: &ExtractFramesTask) -> WorkerResult<ProcessingOutcome> {
        let mut job = self
            .jobs
            .find_by_job_ref(&task.job_ref)
            .await?
            .ok_or_else(|| WorkerError::JobNotFound(task.job_ref.clone()))?;

        job.start_processing();
        self.jobs.save(&job).await?;

        match self.run_pipeline(&mut job).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let message = format!("Failed to process video: {}", e);
                error!(job_ref = %job.job_ref, "{}", message);

                job.fail(&message);
                if let Err(save_err) = self.jobs.save(&job).await {
                    error!(job_ref = %job.job_ref, "Failed to persist error state: {}", save_err);
                }
                self.notify(&job, Some(message)).await;

                // Re-raise so the transport's retry/backoff policy applies;
                // the job record already reflects this attempt's outcome.
                Err(e)
            }
        }
    }

    /// Steps 3–7: moderation gate, fetch, extract, upload, complete.
    async fn run_pipeline(&self, job: &mut VideoJob) -> WorkerResult<ProcessingOutcome> {
        let video_key = job.video_key();

        let verdict = self
            .moderation
            .moderate_video(&job.bucket, &video_key)
            .await?;
        info!(
            job_ref = %job.job_ref,
            appropriate = verdict.is_appropriate,
            "Content moderation finished"
        );

        if !verdict.is_appropriate {
            let reason = format!(
                "Inappropriate content detected: {}",
                verdict.label_names().join(", ")
            );

            job.reject();
            self.jobs.save(job).await?;
            self.notify(job, Some(reason.clone())).await;

            return Ok(ProcessingOutcome::Rejected {
                job_ref: job.job_ref.clone(),
                client_identification: job.client_identification.clone(),
                reason,
            });
        }

        let video_bytes = self.storage.download(&job.bucket, &video_key).await?;

        // The scratch directory is released on every exit path, including
        // early returns through `?`.
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("job-")
            .tempdir_in(&self.work_dir)?;

        let input = scratch.path().join(SOURCE_FILENAME);
        tokio::fs::write(&input, &video_bytes).await?;

        let frame_paths = self.extractor.extract(&input, scratch.path()).await?;
        info!(job_ref = %job.job_ref, frames = frame_paths.len(), "Frame extraction finished");

        let mut items = Vec::with_capacity(frame_paths.len());
        for path in &frame_paths {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| {
                    WorkerError::processing_failed(format!(
                        "frame path without a file name: {}",
                        path.display()
                    ))
                })?;
            let content = tokio::fs::read(path).await?;
            items.push((content, filename));
        }

        let frames_path = job.frames_prefix();
        let stored = self
            .storage
            .upload_bulk(items, &job.bucket, &frames_path, FRAME_CONTENT_TYPE)
            .await?;
        info!(job_ref = %job.job_ref, uploaded = stored.len(), "Frames uploaded");

        job.complete();
        self.jobs.save(job).await?;
        self.notify(job, None).await;

        Ok(ProcessingOutcome::Completed(HandoffDescriptor {
            job_ref: job.job_ref.clone(),
            client_identification: job.client_identification.clone(),
            bucket: job.bucket.clone(),
            frames_path,
            notify_url: job.notify_url.clone(),
        }))
    }

    async fn notify(&self, job: &VideoJob, detail: Option<String>) {
        let notification = job.build_notification(detail);
        self.notifier
            .send(job.notify_url.as_deref(), &notification)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use framex_models::{JobStatus, StatusNotification, StorageObject};
    use framex_moderation::{ModerationLabel, ModerationVerdict};

    struct FakeJobStore {
        jobs: Mutex<HashMap<String, VideoJob>>,
        saves: AtomicUsize,
    }

    impl FakeJobStore {
        fn new(jobs: Vec<VideoJob>) -> Self {
            Self {
                jobs: Mutex::new(jobs.into_iter().map(|j| (j.job_ref.clone(), j)).collect()),
                saves: AtomicUsize::new(0),
            }
        }

        fn stored(&self, job_ref: &str) -> Option<VideoJob> {
            self.jobs.lock().unwrap().get(job_ref).cloned()
        }
    }

    #[async_trait]
    impl JobStore for FakeJobStore {
        async fn find_by_job_ref(&self, job_ref: &str) -> WorkerResult<Option<VideoJob>> {
            Ok(self.jobs.lock().unwrap().get(job_ref).cloned())
        }

        async fn save(&self, job: &VideoJob) -> WorkerResult<VideoJob> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.jobs
                .lock()
                .unwrap()
                .insert(job.job_ref.clone(), job.clone());
            Ok(job.clone())
        }
    }

    #[derive(Default)]
    struct FakeObjectStore {
        downloads: AtomicUsize,
        bulk_calls: Mutex<Vec<(Vec<String>, String, String, String)>>,
    }

    #[async_trait]
    impl ObjectStore for FakeObjectStore {
        async fn download(&self, _bucket: &str, _key: &str) -> WorkerResult<Vec<u8>> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            Ok(b"fake video bytes".to_vec())
        }

        async fn upload_bulk(
            &self,
            items: Vec<(Vec<u8>, String)>,
            bucket: &str,
            prefix: &str,
            content_type: &str,
        ) -> WorkerResult<Vec<StorageObject>> {
            let suffixes: Vec<String> = items.iter().map(|(_, s)| s.clone()).collect();
            self.bulk_calls.lock().unwrap().push((
                suffixes.clone(),
                bucket.to_string(),
                prefix.to_string(),
                content_type.to_string(),
            ));
            Ok(suffixes
                .into_iter()
                .map(|s| StorageObject {
                    bucket: bucket.to_string(),
                    key: format!("{}/{}", prefix, s),
                    url: format!("https://storage.test/{}/{}", prefix, s),
                    metadata: HashMap::new(),
                })
                .collect())
        }
    }

    struct FakeModeration {
        verdict: ModerationVerdict,
        calls: AtomicUsize,
    }

    impl FakeModeration {
        fn approving() -> Self {
            Self {
                verdict: ModerationVerdict::pass_through("moderation-1"),
                calls: AtomicUsize::new(0),
            }
        }

        fn rejecting(names: &[&str]) -> Self {
            Self {
                verdict: ModerationVerdict {
                    is_appropriate: false,
                    confidence: 99.0,
                    labels: names
                        .iter()
                        .map(|n| ModerationLabel {
                            name: n.to_string(),
                            confidence: 99.0,
                            parent_name: String::new(),
                        })
                        .collect(),
                    job_id: "moderation-1".to_string(),
                },
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ModerationGateway for FakeModeration {
        async fn moderate_video(&self, _bucket: &str, _key: &str) -> WorkerResult<ModerationVerdict> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.verdict.clone())
        }
    }

    struct FakeExtractor {
        frames: usize,
        calls: AtomicUsize,
        failure: Option<String>,
    }

    impl FakeExtractor {
        fn producing(frames: usize) -> Self {
            Self {
                frames,
                calls: AtomicUsize::new(0),
                failure: None,
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                frames: 0,
                calls: AtomicUsize::new(0),
                failure: Some(message.to_string()),
            }
        }
    }

    #[async_trait]
    impl FrameExtractor for FakeExtractor {
        async fn extract(
            &self,
            _video_path: &Path,
            output_dir: &Path,
        ) -> WorkerResult<Vec<PathBuf>> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(message) = &self.failure {
                return Err(framex_media::MediaError::ffmpeg_failed(
                    message.clone(),
                    Some("ffmpeg stderr output".to_string()),
                    Some(1),
                )
                .into());
            }

            let mut paths = Vec::new();
            for i in 0..self.frames {
                let path = output_dir.join(format!("frame_{:04}.png", i));
                tokio::fs::write(&path, b"png").await?;
                paths.push(path);
            }
            Ok(paths)
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(Option<String>, StatusNotification)>>,
    }

    #[async_trait]
    impl NotificationSender for RecordingNotifier {
        async fn send(&self, notify_url: Option<&str>, notification: &StatusNotification) {
            self.sent
                .lock()
                .unwrap()
                .push((notify_url.map(|s| s.to_string()), notification.clone()));
        }
    }

    fn queued_job() -> VideoJob {
        let mut job = VideoJob::new(
            "client-a",
            "media-bucket",
            "videos",
            "frames",
            Some("https://example.com/hook".to_string()),
        );
        job.id = Some("doc-1".to_string());
        job.job_ref = "client-a-1".to_string();
        job.enqueue();
        job
    }

    fn task_for(job: &VideoJob) -> ExtractFramesTask {
        ExtractFramesTask::from_job(job)
    }

    struct Harness {
        jobs: Arc<FakeJobStore>,
        storage: Arc<FakeObjectStore>,
        moderation: Arc<FakeModeration>,
        extractor: Arc<FakeExtractor>,
        notifier: Arc<RecordingNotifier>,
        processor: FrameProcessor,
        _work_dir: tempfile::TempDir,
    }

    fn harness(
        jobs: Vec<VideoJob>,
        moderation: FakeModeration,
        extractor: FakeExtractor,
    ) -> Harness {
        let jobs = Arc::new(FakeJobStore::new(jobs));
        let storage = Arc::new(FakeObjectStore::default());
        let moderation = Arc::new(moderation);
        let extractor = Arc::new(extractor);
        let notifier = Arc::new(RecordingNotifier::default());
        let work_dir = tempfile::tempdir().unwrap();

        let processor = FrameProcessor::new(
            Arc::clone(&jobs) as Arc<dyn JobStore>,
            Arc::clone(&storage) as Arc<dyn ObjectStore>,
            Arc::clone(&moderation) as Arc<dyn ModerationGateway>,
            Arc::clone(&extractor) as Arc<dyn FrameExtractor>,
            Arc::clone(&notifier) as Arc<dyn NotificationSender>,
            work_dir.path(),
        );

        Harness {
            jobs,
            storage,
            moderation,
            extractor,
            notifier,
            processor,
            _work_dir: work_dir,
        }
    }

    #[tokio::test]
    async fn test_successful_run_completes_job_and_uploads_frames() {
        let job = queued_job();
        let task = task_for(&job);
        let h = harness(vec![job], FakeModeration::approving(), FakeExtractor::producing(3));

        let outcome = h.processor.process(&task).await.unwrap();

        let descriptor = outcome.descriptor().expect("completed outcome");
        assert_eq!(descriptor.job_ref, "client-a-1");
        assert_eq!(descriptor.bucket, "media-bucket");
        assert_eq!(descriptor.frames_path, "frames/client-a/client-a-1");
        assert_eq!(
            descriptor.notify_url.as_deref(),
            Some("https://example.com/hook")
        );

        // Exactly one download, one extraction, one bulk upload
        assert_eq!(h.storage.downloads.load(Ordering::SeqCst), 1);
        assert_eq!(h.extractor.calls.load(Ordering::SeqCst), 1);
        let bulk_calls = h.storage.bulk_calls.lock().unwrap();
        assert_eq!(bulk_calls.len(), 1);

        // Frame keys preserve extraction order under the exact prefix
        let (suffixes, bucket, prefix, content_type) = &bulk_calls[0];
        assert_eq!(bucket, "media-bucket");
        assert_eq!(prefix, "frames/client-a/client-a-1");
        assert_eq!(content_type, "image/png");
        assert_eq!(
            suffixes,
            &vec![
                "frame_0000.png".to_string(),
                "frame_0001.png".to_string(),
                "frame_0002.png".to_string()
            ]
        );

        let stored = h.jobs.stored("client-a-1").unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert!(stored.error_message.is_none());

        // Success notification carries no detail
        let sent = h.notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.status, "COMPLETED");
        assert!(sent[0].1.detail.is_none());
    }

    #[tokio::test]
    async fn test_rejected_video_short_circuits_the_pipeline() {
        let job = queued_job();
        let task = task_for(&job);
        let h = harness(
            vec![job],
            FakeModeration::rejecting(&["Explicit Nudity", "Adult Content"]),
            FakeExtractor::producing(3),
        );

        let outcome = h.processor.process(&task).await.unwrap();

        match &outcome {
            ProcessingOutcome::Rejected { reason, .. } => {
                assert!(reason.contains("Explicit Nudity"));
                assert!(reason.contains("Adult Content"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        // Zero downloads, extractions, and uploads past the gate
        assert_eq!(h.moderation.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.storage.downloads.load(Ordering::SeqCst), 0);
        assert_eq!(h.extractor.calls.load(Ordering::SeqCst), 0);
        assert!(h.storage.bulk_calls.lock().unwrap().is_empty());

        let stored = h.jobs.stored("client-a-1").unwrap();
        assert_eq!(stored.status, JobStatus::Rejected);
        assert!(stored.error_message.is_none());

        let sent = h.notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.status, "REJECTED");
        assert!(sent[0].1.detail.as_deref().unwrap().contains("Explicit Nudity"));
    }

    #[tokio::test]
    async fn test_missing_job_raises_without_mutation() {
        let job = queued_job();
        let task = task_for(&job);
        // Store is empty: the payload references a job that does not exist
        let h = harness(vec![], FakeModeration::approving(), FakeExtractor::producing(1));

        let err = h.processor.process(&task).await.unwrap_err();
        assert!(matches!(err, WorkerError::JobNotFound(_)));

        assert_eq!(h.jobs.saves.load(Ordering::SeqCst), 0);
        assert_eq!(h.moderation.calls.load(Ordering::SeqCst), 0);
        assert!(h.notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_extraction_failure_records_error_notifies_and_reraises() {
        let job = queued_job();
        let task = task_for(&job);
        let h = harness(
            vec![job],
            FakeModeration::approving(),
            FakeExtractor::failing("moov atom not found"),
        );

        let err = h.processor.process(&task).await.unwrap_err();
        assert!(matches!(err, WorkerError::Media(_)));

        let stored = h.jobs.stored("client-a-1").unwrap();
        assert_eq!(stored.status, JobStatus::Error);
        let message = stored.error_message.unwrap();
        assert!(message.contains("moov atom not found"));
        assert!(stored.inactivated_at.is_some());

        let sent = h.notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.status, "ERROR");
        assert!(sent[0].1.detail.as_deref().unwrap().contains("moov atom not found"));
    }

    #[tokio::test]
    async fn test_duplicate_delivery_does_not_regress_status() {
        let mut job = queued_job();
        job.start_processing();
        job.complete();
        let task = task_for(&job);
        let h = harness(vec![job], FakeModeration::approving(), FakeExtractor::producing(1));

        // The claim transition is a no-op; the pipeline still reruns, which
        // is the documented redelivery behavior for an at-least-once queue.
        let outcome = h.processor.process(&task).await.unwrap();
        assert!(outcome.descriptor().is_some());

        let stored = h.jobs.stored("client-a-1").unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
    }
}
