//! Typed repository for video job records.

use std::collections::HashMap;

use tracing::info;
use uuid::Uuid;

use framex_models::{JobStatus, VideoJob};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{FromFirestoreValue, StructuredQuery, ToFirestoreValue, Value};

/// Collection holding job documents.
const COLLECTION: &str = "video_jobs";

/// Repository for video job records.
pub struct VideoJobRepository {
    client: FirestoreClient,
}

impl VideoJobRepository {
    /// Create a new repository.
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Persist a job: create on first save (assigning id and job_ref),
    /// update-in-place afterwards.
    pub async fn save(&self, job: &VideoJob) -> FirestoreResult<VideoJob> {
        match &job.id {
            None => self.create(job).await,
            Some(id) => self.update(id, job).await,
        }
    }

    /// First persistence: assigns the store id and the immutable job_ref.
    async fn create(&self, job: &VideoJob) -> FirestoreResult<VideoJob> {
        let mut job = job.clone();
        let doc_id = Uuid::new_v4().to_string();
        job.id = Some(doc_id.clone());
        job.job_ref = generate_job_ref(&job.client_identification);

        self.client
            .create_document(COLLECTION, &doc_id, job_to_fields(&job))
            .await?;

        info!(job_ref = %job.job_ref, "Created job record");
        Ok(job)
    }

    /// Update the mutable fields of an existing record.
    async fn update(&self, id: &str, job: &VideoJob) -> FirestoreResult<VideoJob> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), job.status.as_str().to_firestore_value());
        fields.insert(
            "error_message".to_string(),
            job.error_message.to_firestore_value(),
        );
        fields.insert("updated_at".to_string(), job.updated_at.to_firestore_value());
        fields.insert(
            "inactivated_at".to_string(),
            job.inactivated_at.to_firestore_value(),
        );

        // The patch carries currentDocument.exists=true, so an update
        // against an unknown id fails instead of creating a document.
        self.client.patch_document(COLLECTION, id, fields).await?;

        Ok(job.clone())
    }

    /// Load a job by its caller-facing reference.
    pub async fn find_by_job_ref(&self, job_ref: &str) -> FirestoreResult<Option<VideoJob>> {
        let query = StructuredQuery::field_equals(
            COLLECTION,
            "job_ref",
            job_ref.to_firestore_value(),
            1,
        );

        let docs = self.client.run_query(query).await?;
        match docs.into_iter().next() {
            Some(doc) => {
                let id = doc
                    .doc_id()
                    .ok_or_else(|| FirestoreError::invalid_response("document without a name"))?
                    .to_string();
                Ok(Some(document_fields_to_job(id, &doc)?))
            }
            None => Ok(None),
        }
    }

    /// Load a job by its store id.
    pub async fn get_by_id(&self, id: &str) -> FirestoreResult<Option<VideoJob>> {
        match self.client.get_document(COLLECTION, id).await? {
            Some(doc) => Ok(Some(document_fields_to_job(id.to_string(), &doc)?)),
            None => Ok(None),
        }
    }
}

/// Caller-facing reference: client identification plus a random suffix.
fn generate_job_ref(client_identification: &str) -> String {
    format!("{}-{}", client_identification, Uuid::new_v4())
}

fn job_to_fields(job: &VideoJob) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("job_ref".to_string(), job.job_ref.to_firestore_value());
    fields.insert(
        "client_identification".to_string(),
        job.client_identification.to_firestore_value(),
    );
    fields.insert("status".to_string(), job.status.as_str().to_firestore_value());
    fields.insert("bucket".to_string(), job.bucket.to_firestore_value());
    fields.insert("video_path".to_string(), job.video_path.to_firestore_value());
    fields.insert("frames_path".to_string(), job.frames_path.to_firestore_value());
    fields.insert("notify_url".to_string(), job.notify_url.to_firestore_value());
    fields.insert("config".to_string(), job.config.to_firestore_value());
    fields.insert(
        "error_message".to_string(),
        job.error_message.to_firestore_value(),
    );
    fields.insert("created_at".to_string(), job.created_at.to_firestore_value());
    fields.insert("updated_at".to_string(), job.updated_at.to_firestore_value());
    fields.insert(
        "inactivated_at".to_string(),
        job.inactivated_at.to_firestore_value(),
    );
    fields
}

fn document_fields_to_job(
    id: String,
    doc: &crate::types::Document,
) -> FirestoreResult<VideoJob> {
    let get_string = |key: &str| -> FirestoreResult<String> {
        doc.field(key)
            .and_then(String::from_firestore_value)
            .ok_or_else(|| FirestoreError::invalid_response(format!("missing field {}", key)))
    };

    let status_str = get_string("status")?;
    let status = JobStatus::parse(&status_str).ok_or_else(|| {
        FirestoreError::invalid_response(format!("unknown status value {}", status_str))
    })?;

    let config = doc
        .field("config")
        .and_then(serde_json::Value::from_firestore_value)
        .and_then(|v| match v {
            serde_json::Value::Object(map) => Some(map.into_iter().collect()),
            _ => None,
        })
        .unwrap_or_default();

    Ok(VideoJob {
        id: Some(id),
        job_ref: get_string("job_ref")?,
        client_identification: get_string("client_identification")?,
        status,
        bucket: get_string("bucket")?,
        video_path: get_string("video_path")?,
        frames_path: get_string("frames_path")?,
        notify_url: doc.field("notify_url").and_then(String::from_firestore_value),
        config,
        error_message: doc
            .field("error_message")
            .and_then(String::from_firestore_value),
        created_at: doc
            .field("created_at")
            .and_then(chrono::DateTime::from_firestore_value)
            .ok_or_else(|| FirestoreError::invalid_response("missing field created_at"))?,
        updated_at: doc
            .field("updated_at")
            .and_then(chrono::DateTime::from_firestore_value)
            .ok_or_else(|| FirestoreError::invalid_response("missing field updated_at"))?,
        inactivated_at: doc
            .field("inactivated_at")
            .and_then(chrono::DateTime::from_firestore_value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Document;

    fn sample_job() -> VideoJob {
        let mut job = VideoJob::new(
            "client-a",
            "media-bucket",
            "videos",
            "frames",
            Some("https://example.com/hook".to_string()),
        );
        job.id = Some("doc-1".to_string());
        job.job_ref = "client-a-xyz".to_string();
        job
    }

    #[test]
    fn test_job_fields_roundtrip() {
        let job = sample_job();
        let doc = Document::new(job_to_fields(&job));

        let restored = document_fields_to_job("doc-1".to_string(), &doc).unwrap();
        assert_eq!(restored.job_ref, job.job_ref);
        assert_eq!(restored.status, job.status);
        assert_eq!(restored.bucket, job.bucket);
        assert_eq!(restored.video_path, job.video_path);
        assert_eq!(restored.frames_path, job.frames_path);
        assert_eq!(restored.notify_url, job.notify_url);
        assert_eq!(restored.created_at, job.created_at);
    }

    #[test]
    fn test_error_state_roundtrip() {
        let mut job = sample_job();
        job.fail("decode failed");
        let doc = Document::new(job_to_fields(&job));

        let restored = document_fields_to_job("doc-1".to_string(), &doc).unwrap();
        assert_eq!(restored.status, JobStatus::Error);
        assert_eq!(restored.error_message.as_deref(), Some("decode failed"));
        assert!(restored.inactivated_at.is_some());
    }

    #[test]
    fn test_job_ref_format_and_uniqueness() {
        let a = generate_job_ref("client-a");
        let b = generate_job_ref("client-a");

        assert!(a.starts_with("client-a-"));
        assert!(a.len() > "client-a-".len());
        assert_ne!(a, b);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let mut fields = job_to_fields(&sample_job());
        fields.insert("status".to_string(), "HALTED".to_firestore_value());
        let doc = Document::new(fields);

        assert!(document_fields_to_job("doc-1".to_string(), &doc).is_err());
    }
}
