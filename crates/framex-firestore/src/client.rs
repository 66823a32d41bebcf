//! Firestore REST API client.
//!
//! Lean client with token caching (refresh margin, single-flight),
//! HTTP client tuning, and retry on transient failures.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, StatusCode};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{Document, RunQueryRequest, RunQueryResponseItem, StructuredQuery, Value};

/// Refresh tokens 60 seconds before expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Conservative token TTL when expiry is unknown.
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope for Firestore/Datastore access.
const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// GCP project ID
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max attempts for retryable failures
    pub max_attempts: u32,
}

impl FirestoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> FirestoreResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID").map_err(|_| {
            FirestoreError::auth_error("GCP_PROJECT_ID must be set to access Firestore")
        })?;

        if project_id.is_empty() {
            return Err(FirestoreError::auth_error("GCP_PROJECT_ID cannot be empty"));
        }

        Ok(Self {
            project_id,
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            timeout: Duration::from_secs(30),
            max_attempts: std::env::var("FIRESTORE_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
        })
    }
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

/// Firestore REST API client.
pub struct FirestoreClient {
    http: Client,
    config: FirestoreConfig,
    base_url: String,
    auth: Arc<dyn TokenProvider>,
    token: RwLock<Option<CachedToken>>,
}

impl FirestoreClient {
    /// Create a new Firestore client.
    pub async fn new(config: FirestoreConfig) -> FirestoreResult<Self> {
        let auth = Self::create_auth_provider()?;

        let http = Client::builder()
            .timeout(config.timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("framex-firestore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FirestoreError::Network)?;

        let base_url = format!(
            "https://firestore.googleapis.com/v1/projects/{}/databases/{}/documents",
            config.project_id, config.database_id
        );

        Ok(Self {
            http,
            config,
            base_url,
            auth,
            token: RwLock::new(None),
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> FirestoreResult<Self> {
        let config = FirestoreConfig::from_env()?;
        Self::new(config).await
    }

    fn create_auth_provider() -> FirestoreResult<Arc<dyn TokenProvider>> {
        let service_account = CustomServiceAccount::from_env().map_err(|e| {
            FirestoreError::auth_error(format!("Failed to load service account: {}", e))
        })?;

        match service_account {
            Some(sa) => Ok(Arc::new(sa)),
            None => Err(FirestoreError::auth_error(
                "GOOGLE_APPLICATION_CREDENTIALS not set. \
                 Set it to the path of your service account JSON file.",
            )),
        }
    }

    /// Get a valid access token, refreshing when close to expiry.
    async fn get_token(&self) -> FirestoreResult<String> {
        {
            let token = self.token.read().await;
            if let Some(cached) = token.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let mut token = self.token.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(cached) = token.as_ref() {
            if cached.is_valid() {
                return Ok(cached.access_token.clone());
            }
        }

        let fresh = self
            .auth
            .token(&[FIRESTORE_SCOPE])
            .await
            .map_err(|e| FirestoreError::auth_error(format!("Failed to obtain auth token: {}", e)))?;

        let access_token = fresh.as_str().to_string();
        let expires_at = {
            let now = chrono::Utc::now();
            let exp = fresh.expires_at();
            if exp > now {
                match (exp - now).to_std() {
                    Ok(ttl) => Instant::now() + ttl,
                    Err(_) => Instant::now() + TOKEN_DEFAULT_TTL,
                }
            } else {
                Instant::now()
            }
        };

        *token = Some(CachedToken {
            access_token: access_token.clone(),
            expires_at,
        });

        debug!("Refreshed Firestore auth token");
        Ok(access_token)
    }

    async fn invalidate_token(&self) {
        let mut token = self.token.write().await;
        *token = None;
    }

    fn document_path(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, doc_id)
    }

    /// Run a request closure with retry on retryable failures and one
    /// re-auth pass on an expired access token.
    async fn with_retry<T, F, Fut>(&self, operation: &str, f: F) -> FirestoreResult<T>
    where
        F: Fn(String) -> Fut,
        Fut: std::future::Future<Output = FirestoreResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            let token = self.get_token().await?;
            match f(token).await {
                Ok(v) => return Ok(v),
                Err(FirestoreError::AuthError(msg)) if attempt == 0 => {
                    debug!("{}: re-authenticating after {}", operation, msg);
                    self.invalidate_token().await;
                    attempt += 1;
                }
                Err(e) if e.is_retryable() && attempt + 1 < self.config.max_attempts => {
                    attempt += 1;
                    let delay = Duration::from_millis(100 * 2u64.saturating_pow(attempt.min(6)));
                    warn!("{} attempt {} failed, retrying in {:?}: {}", operation, attempt, delay, e);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn check_unauthorized(response: reqwest::Response) -> FirestoreResult<reqwest::Response> {
        if response.status() == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(FirestoreError::auth_error(format!(
                "access token rejected: {}",
                body
            )));
        }
        Ok(response)
    }

    async fn error_from_response(url: &str, response: reqwest::Response) -> FirestoreError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        FirestoreError::from_http_status(status, format!("{} failed: {}", url, body))
    }

    // =========================================================================
    // CRUD operations
    // =========================================================================

    /// Get a document. Returns `None` when it does not exist.
    pub async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> FirestoreResult<Option<Document>> {
        let url = self.document_path(collection, doc_id);

        self.with_retry("get_document", |token| {
            let url = url.clone();
            async move {
                let response = self.http.get(&url).bearer_auth(&token).send().await?;
                let response = Self::check_unauthorized(response).await?;

                match response.status() {
                    StatusCode::OK => {
                        let doc: Document = response.json().await?;
                        Ok(Some(doc))
                    }
                    StatusCode::NOT_FOUND => Ok(None),
                    _ => Err(Self::error_from_response(&url, response).await),
                }
            }
        })
        .await
    }

    /// Create a document with an explicit id.
    pub async fn create_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<Document> {
        let url = format!("{}/{}?documentId={}", self.base_url, collection, doc_id);
        let body = Document::new(fields);

        self.with_retry("create_document", |token| {
            let url = url.clone();
            let body = body.clone();
            async move {
                let response = self
                    .http
                    .post(&url)
                    .bearer_auth(&token)
                    .json(&body)
                    .send()
                    .await?;
                let response = Self::check_unauthorized(response).await?;

                match response.status() {
                    StatusCode::OK | StatusCode::CREATED => {
                        let doc: Document = response.json().await?;
                        Ok(doc)
                    }
                    StatusCode::CONFLICT => Err(FirestoreError::AlreadyExists(format!(
                        "{}/{}",
                        collection, doc_id
                    ))),
                    _ => Err(Self::error_from_response(&url, response).await),
                }
            }
        })
        .await
    }

    /// Patch a document, updating only the masked fields.
    pub async fn patch_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<Document> {
        let params: Vec<String> = fields
            .keys()
            .map(|f| format!("updateMask.fieldPaths={}", f))
            .collect();
        // currentDocument.exists guards against silently creating a new
        // document when the update targets an unknown id.
        let url = format!(
            "{}?{}&currentDocument.exists=true",
            self.document_path(collection, doc_id),
            params.join("&")
        );
        let body = Document::new(fields);

        self.with_retry("patch_document", |token| {
            let url = url.clone();
            let body = body.clone();
            async move {
                let response = self
                    .http
                    .patch(&url)
                    .bearer_auth(&token)
                    .json(&body)
                    .send()
                    .await?;
                let response = Self::check_unauthorized(response).await?;

                match response.status() {
                    StatusCode::OK => {
                        let doc: Document = response.json().await?;
                        Ok(doc)
                    }
                    _ => Err(Self::error_from_response(&url, response).await),
                }
            }
        })
        .await
    }

    /// Run a structured query and return the matching documents.
    pub async fn run_query(&self, query: StructuredQuery) -> FirestoreResult<Vec<Document>> {
        // runQuery hangs off the documents parent resource
        let url = format!("{}:runQuery", self.base_url);
        let body = RunQueryRequest {
            structured_query: query,
        };

        self.with_retry("run_query", |token| {
            let url = url.clone();
            let body = RunQueryRequest {
                structured_query: body.structured_query.clone(),
            };
            async move {
                let response = self
                    .http
                    .post(&url)
                    .bearer_auth(&token)
                    .json(&body)
                    .send()
                    .await?;
                let response = Self::check_unauthorized(response).await?;

                if response.status() != StatusCode::OK {
                    return Err(Self::error_from_response(&url, response).await);
                }

                let items: Vec<RunQueryResponseItem> = response.json().await?;
                Ok(items.into_iter().filter_map(|i| i.document).collect())
            }
        })
        .await
    }
}
