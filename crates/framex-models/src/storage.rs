//! Storage value types and layout configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A blob to be written to object storage.
///
/// Constructed per operation and discarded afterwards.
#[derive(Debug, Clone)]
pub struct StorageItem {
    pub bucket: String,
    pub key: String,
    pub content: Vec<u8>,
    pub content_type: Option<String>,
}

impl StorageItem {
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        content: Vec<u8>,
        content_type: Option<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            content,
            content_type,
        }
    }
}

/// A blob that has been written to object storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageObject {
    pub bucket: String,
    pub key: String,
    pub url: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Bucket and key-prefix layout, fixed at job creation.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Bucket all job blobs live in
    pub bucket: String,
    /// Key prefix for raw uploaded videos
    pub video_path: String,
    /// Key prefix for extracted frames
    pub frames_path: String,
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self {
            bucket: "framex-media".to_string(),
            video_path: "videos".to_string(),
            frames_path: "frames".to_string(),
        }
    }
}

impl StorageLayout {
    /// Create layout from environment variables.
    pub fn from_env() -> Self {
        Self {
            bucket: std::env::var("STORAGE_BUCKET").unwrap_or_else(|_| "framex-media".to_string()),
            video_path: std::env::var("STORAGE_VIDEO_PATH").unwrap_or_else(|_| "videos".to_string()),
            frames_path: std::env::var("STORAGE_FRAMES_PATH")
                .unwrap_or_else(|_| "frames".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_object_metadata_defaults_empty() {
        let json = r#"{"bucket":"b","key":"k","url":"https://example.com/k"}"#;
        let obj: StorageObject = serde_json::from_str(json).unwrap();
        assert!(obj.metadata.is_empty());
    }
}
