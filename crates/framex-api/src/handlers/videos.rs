//! Video registration and status handlers.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use framex_models::{ExtractFramesTask, StorageItem, VideoJob};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Outward projection of a job record.
#[derive(Debug, Serialize)]
pub struct VideoJobResponse {
    pub job_ref: String,
    pub client_identification: String,
    pub status: String,
    pub bucket: String,
    pub video_path: String,
    pub frames_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<VideoJob> for VideoJobResponse {
    fn from(job: VideoJob) -> Self {
        Self {
            job_ref: job.job_ref,
            client_identification: job.client_identification,
            status: job.status.as_str().to_string(),
            bucket: job.bucket,
            video_path: job.video_path,
            frames_path: job.frames_path,
            notify_url: job.notify_url,
            error_message: job.error_message,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

struct UploadForm {
    video: Vec<u8>,
    content_type: Option<String>,
    client_identification: String,
    notify_url: Option<String>,
}

/// Register a video for frame extraction.
///
/// Side effects are ordered persist → upload → enqueue; a failure
/// leaves earlier effects in place (no rollback at this layer).
pub async fn register_video(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<VideoJobResponse>)> {
    let form = parse_upload_form(multipart, state.config.max_upload_bytes).await?;

    let layout = &state.config.storage_layout;
    let job = VideoJob::new(
        form.client_identification,
        layout.bucket.clone(),
        layout.video_path.clone(),
        layout.frames_path.clone(),
        form.notify_url,
    );

    // First persistence assigns the id and the immutable job_ref
    let mut saved = state.jobs.save(&job).await?;
    info!(job_ref = %saved.job_ref, "Registered video job");

    state
        .storage
        .upload_object(StorageItem::new(
            saved.bucket.clone(),
            saved.video_key(),
            form.video,
            form.content_type,
        ))
        .await?;

    let task = ExtractFramesTask::from_job(&saved);
    state.queue.enqueue(&task).await?;

    saved.enqueue();
    saved = state.jobs.save(&saved).await?;

    Ok((StatusCode::CREATED, Json(saved.into())))
}

/// Get the status of a job by its reference.
pub async fn get_video_status(
    State(state): State<AppState>,
    Path(job_ref): Path<String>,
) -> ApiResult<Json<VideoJobResponse>> {
    let job = state
        .jobs
        .find_by_job_ref(&job_ref)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No job with reference {}", job_ref)))?;

    Ok(Json(job.into()))
}

async fn parse_upload_form(
    mut multipart: Multipart,
    max_upload_bytes: usize,
) -> ApiResult<UploadForm> {
    let mut video: Option<Vec<u8>> = None;
    let mut content_type: Option<String> = None;
    let mut client_identification: Option<String> = None;
    let mut notify_url: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("video_file") => {
                content_type = field.content_type().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read video field: {}", e)))?;
                video = Some(bytes.to_vec());
            }
            Some("client_identification") => {
                client_identification = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(e.to_string()))?,
                );
            }
            Some("notify_url") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.to_string()))?;
                if !value.trim().is_empty() {
                    notify_url = Some(value.trim().to_string());
                }
            }
            other => {
                warn!("Ignoring unknown multipart field: {:?}", other);
            }
        }
    }

    let video = video.ok_or_else(|| ApiError::validation("video_file is required"))?;
    let client_identification = client_identification
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::validation("client_identification is required"))?;

    if video.len() > max_upload_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "Video exceeds the {} byte limit",
            max_upload_bytes
        )));
    }

    if let Some(ref url) = notify_url {
        validate_notify_url(url)?;
    }

    Ok(UploadForm {
        video,
        content_type,
        client_identification,
        notify_url,
    })
}

fn validate_notify_url(url: &str) -> ApiResult<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ApiError::validation(
            "notify_url must start with http:// or https://",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_url_validation() {
        assert!(validate_notify_url("https://example.com/hook").is_ok());
        assert!(validate_notify_url("http://example.com/hook").is_ok());
        assert!(validate_notify_url("ftp://example.com/hook").is_err());
        assert!(validate_notify_url("example.com/hook").is_err());
    }

    #[test]
    fn test_response_projection() {
        let mut job = VideoJob::new("client-a", "bucket", "videos", "frames", None);
        job.job_ref = "client-a-1".to_string();

        let response = VideoJobResponse::from(job);
        assert_eq!(response.status, "PENDING");
        assert_eq!(response.job_ref, "client-a-1");
        assert!(response.error_message.is_none());
    }
}
