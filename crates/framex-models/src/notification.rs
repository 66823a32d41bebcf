//! Outbound status notifications.

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job_status::JobStatus;

/// Originating service name carried on every notification.
pub const SERVICE_NAME: &str = "frame-extractor";

/// A status event posted to the caller's callback URL.
///
/// Constructed fresh for every send; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatusNotification {
    /// Caller-facing job reference
    pub job_ref: String,
    /// Canonical status string
    pub status: String,
    /// Originating service
    pub service: String,
    /// ISO-8601 timestamp of the event
    pub timestamp: String,
    /// Human-readable detail (rejection reason or error message)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Resolved result URL, when one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
}

impl StatusNotification {
    /// Build a notification for the given job reference and status.
    pub fn new(job_ref: impl Into<String>, status: JobStatus, detail: Option<String>) -> Self {
        Self {
            job_ref: job_ref.into(),
            status: status.as_str().to_string(),
            service: SERVICE_NAME.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            detail,
            result_url: None,
        }
    }

    /// Attach a result URL.
    pub fn with_result_url(mut self, url: impl Into<String>) -> Self {
        self.result_url = Some(url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_carries_service_and_status() {
        let n = StatusNotification::new("client-1-abc", JobStatus::Completed, None);
        assert_eq!(n.service, "frame-extractor");
        assert_eq!(n.status, "COMPLETED");
        assert!(n.detail.is_none());
    }

    #[test]
    fn test_detail_is_omitted_from_json_when_absent() {
        let n = StatusNotification::new("client-1-abc", JobStatus::Completed, None);
        let json = serde_json::to_string(&n).unwrap();
        assert!(!json.contains("detail"));
        assert!(!json.contains("result_url"));
    }

    #[test]
    fn test_detail_is_serialized_when_present() {
        let n = StatusNotification::new(
            "client-1-abc",
            JobStatus::Rejected,
            Some("Inappropriate content detected: Explicit Nudity".to_string()),
        );
        let json = serde_json::to_string(&n).unwrap();
        assert!(json.contains("Explicit Nudity"));
    }
}
