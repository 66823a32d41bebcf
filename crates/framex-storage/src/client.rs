//! S3 client implementation.

use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use framex_models::{StorageItem, StorageObject};

use crate::error::{StorageError, StorageResult};

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Optional custom endpoint (S3-compatible stores)
    pub endpoint_url: Option<String>,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Region
    pub region: String,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("S3_ENDPOINT_URL").ok(),
            access_key_id: std::env::var("AWS_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("AWS_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("AWS_SECRET_ACCESS_KEY not set"))?,
            region: std::env::var("AWS_DEFAULT_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
        })
    }
}

/// S3 object storage client.
///
/// Buckets are passed per call; jobs carry their own bucket coordinate.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    region: String,
}

impl S3Client {
    /// Create a new client from configuration.
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "framex",
        );

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);

        if let Some(ref endpoint) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(builder.build());

        Ok(Self {
            client,
            region: config.region,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = S3Config::from_env()?;
        Self::new(config).await
    }

    /// Upload a single item and return the stored-object descriptor.
    pub async fn upload_object(&self, item: StorageItem) -> StorageResult<StorageObject> {
        debug!("Uploading {} bytes to {}/{}", item.content.len(), item.bucket, item.key);

        let mut request = self
            .client
            .put_object()
            .bucket(&item.bucket)
            .key(&item.key)
            .body(ByteStream::from(item.content));

        if let Some(ref content_type) = item.content_type {
            request = request.content_type(content_type);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        let mut metadata = std::collections::HashMap::new();
        if let Some(etag) = response.e_tag() {
            metadata.insert("ETag".to_string(), etag.to_string());
        }

        info!("Uploaded object {}/{}", item.bucket, item.key);
        Ok(StorageObject {
            url: self.object_url(&item.bucket, &item.key),
            bucket: item.bucket,
            key: item.key,
            metadata,
        })
    }

    /// Upload a batch of blobs under a common prefix in one call site.
    ///
    /// Each entry is `(content, key_suffix)`; the stored key is
    /// `{prefix}/{key_suffix}`. All entries share the content type.
    pub async fn upload_objects_bulk(
        &self,
        items: Vec<(Vec<u8>, String)>,
        bucket: &str,
        prefix: &str,
        content_type: Option<&str>,
    ) -> StorageResult<Vec<StorageObject>> {
        debug!("Bulk uploading {} objects under {}/{}", items.len(), bucket, prefix);

        let mut stored = Vec::with_capacity(items.len());
        for (content, suffix) in items {
            let item = StorageItem::new(
                bucket,
                format!("{}/{}", prefix, suffix),
                content,
                content_type.map(|s| s.to_string()),
            );
            stored.push(self.upload_object(item).await?);
        }

        info!("Bulk uploaded {} objects under {}/{}", stored.len(), bucket, prefix);
        Ok(stored)
    }

    /// Download an object as bytes.
    pub async fn download_object(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        debug!("Downloading {}/{}", bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::not_found(key)
                } else {
                    StorageError::DownloadFailed(e.to_string())
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?
            .into_bytes()
            .to_vec();

        info!("Downloaded object {}/{} ({} bytes)", bucket, key, bytes.len());
        Ok(bytes)
    }

    /// Generate a presigned GET URL.
    pub async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    /// Delete an object.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        debug!("Deleting {}/{}", bucket, key);

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        Ok(())
    }

    /// List object keys with a prefix.
    pub async fn list_objects(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<String>> {
        debug!("Listing objects under {}/{}", bucket, prefix);

        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix);

            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| StorageError::ListFailed(e.to_string()))?;

            if let Some(contents) = response.contents {
                keys.extend(contents.into_iter().filter_map(|o| o.key));
            }

            if response.is_truncated == Some(true) {
                continuation_token = response.next_continuation_token;
            } else {
                break;
            }
        }

        Ok(keys)
    }

    /// Check if an object exists.
    pub async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("NotFound") || msg.contains("NoSuchKey") {
                    Ok(false)
                } else {
                    Err(StorageError::AwsSdk(msg))
                }
            }
        }
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("https://{}.s3.{}.amazonaws.com/{}", bucket, self.region, key)
    }
}
