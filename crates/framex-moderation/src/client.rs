//! Rekognition content moderation client.

use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_sdk_rekognition::types::{S3Object, Video, VideoJobStatus};
use aws_sdk_rekognition::Client;
use tracing::{debug, info, warn};

use crate::error::{ModerationError, ModerationResult};
use crate::verdict::{ModerationLabel, ModerationVerdict};

/// Configuration for the moderation client.
#[derive(Debug, Clone)]
pub struct ModerationConfig {
    /// AWS region
    pub region: String,
    /// Labels below this confidence are ignored (percent)
    pub min_confidence: f32,
    /// Maximum total wait for an asynchronous moderation job
    pub max_wait: Duration,
    /// Delay between status polls
    pub poll_interval: Duration,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            min_confidence: 50.0,
            max_wait: Duration::from_secs(300),
            poll_interval: Duration::from_secs(10),
        }
    }
}

impl ModerationConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            region: std::env::var("AWS_DEFAULT_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            min_confidence: std::env::var("MODERATION_MIN_CONFIDENCE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(50.0),
            max_wait: Duration::from_secs(
                std::env::var("MODERATION_MAX_WAIT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            poll_interval: Duration::from_secs(
                std::env::var("MODERATION_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
        }
    }
}

/// Content moderation client backed by Rekognition's asynchronous
/// video moderation API.
#[derive(Clone)]
pub struct ModerationClient {
    client: Client,
    config: ModerationConfig,
}

impl ModerationClient {
    /// Create a new client from configuration.
    pub async fn new(config: ModerationConfig) -> ModerationResult<Self> {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        Ok(Self {
            client: Client::new(&sdk_config),
            config,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> ModerationResult<Self> {
        Self::new(ModerationConfig::from_env()).await
    }

    /// Moderate a stored video and return the verdict.
    ///
    /// Starts an asynchronous Rekognition job and polls it to completion,
    /// bounded by the configured maximum wait.
    pub async fn moderate_video(&self, bucket: &str, key: &str) -> ModerationResult<ModerationVerdict> {
        info!("Starting content moderation for s3://{}/{}", bucket, key);

        let video = Video::builder()
            .s3_object(S3Object::builder().bucket(bucket).name(key).build())
            .build();

        let response = self
            .client
            .start_content_moderation()
            .video(video)
            .min_confidence(self.config.min_confidence)
            .send()
            .await
            .map_err(|e| ModerationError::start_failed(e.to_string()))?;

        let job_id = response
            .job_id
            .ok_or_else(|| ModerationError::InvalidResponse("missing moderation job id".into()))?;

        debug!("Moderation job started: {}", job_id);

        self.wait_for_job(&job_id).await
    }

    /// Poll the moderation job until it completes, fails, or times out.
    async fn wait_for_job(&self, job_id: &str) -> ModerationResult<ModerationVerdict> {
        let deadline = tokio::time::Instant::now() + self.config.max_wait;

        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(ModerationError::Timeout {
                    job_id: job_id.to_string(),
                    max_wait_secs: self.config.max_wait.as_secs(),
                });
            }

            let response = match self
                .client
                .get_content_moderation()
                .job_id(job_id)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    let msg = e.to_string();
                    // Rekognition rejects media types it cannot analyze with an
                    // InvalidParameterException; those videos pass through
                    // unmoderated rather than failing the job.
                    if msg.contains("InvalidParameterException") {
                        warn!("Unsupported media for moderation job {}, approving pass-through", job_id);
                        return Ok(ModerationVerdict::pass_through(job_id));
                    }
                    return Err(ModerationError::PollFailed(msg));
                }
            };

            match response.job_status {
                Some(VideoJobStatus::Succeeded) => {
                    debug!("Moderation job {} succeeded", job_id);
                    return Ok(self.build_verdict(job_id, response.moderation_labels));
                }
                Some(VideoJobStatus::Failed) => {
                    return Err(ModerationError::job_failed(
                        response
                            .status_message
                            .unwrap_or_else(|| "unknown failure".to_string()),
                    ));
                }
                other => {
                    debug!("Moderation job {} status: {:?}", job_id, other);
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Reduce the raw label stream to the offending labels at or above
    /// the confidence threshold.
    fn build_verdict(
        &self,
        job_id: &str,
        labels: Option<Vec<aws_sdk_rekognition::types::ContentModerationDetection>>,
    ) -> ModerationVerdict {
        let mut offending = Vec::new();
        let mut max_confidence = 0.0f32;

        for detail in labels.unwrap_or_default() {
            let Some(label) = detail.moderation_label else {
                continue;
            };
            let confidence = label.confidence.unwrap_or(0.0);
            let name = label.name.unwrap_or_default();

            debug!("Moderation label: {} ({:.2}%)", name, confidence);

            if confidence >= self.config.min_confidence {
                max_confidence = max_confidence.max(confidence);
                offending.push(ModerationLabel {
                    name,
                    confidence,
                    parent_name: label.parent_name.unwrap_or_default(),
                });
            }
        }

        let verdict = ModerationVerdict {
            is_appropriate: offending.is_empty(),
            confidence: max_confidence,
            labels: offending,
            job_id: job_id.to_string(),
        };

        info!(
            "Moderation finished for job {}: appropriate={}, {} offending labels",
            job_id,
            verdict.is_appropriate,
            verdict.labels.len()
        );

        verdict
    }
}
