//! Callback notification sender.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use framex_models::StatusNotification;

use crate::gateways::NotificationSender;
use crate::retry::{retry_async, RetryConfig, RetryResult};

/// Posts status notifications to caller-supplied callback URLs.
///
/// Sends are best-effort: transient transport failures are retried with
/// bounded exponential backoff, and exhausted retries are logged and
/// dropped. A lost notification never affects the job outcome.
pub struct CallbackNotifier {
    http: reqwest::Client,
    retry: RetryConfig,
}

impl CallbackNotifier {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            retry: RetryConfig::new("send_notification")
                .with_max_retries(9)
                .with_base_delay(Duration::from_secs(2))
                .with_max_delay(Duration::from_secs(10)),
        }
    }
}

impl Default for CallbackNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSender for CallbackNotifier {
    async fn send(&self, notify_url: Option<&str>, notification: &StatusNotification) {
        let Some(url) = notify_url else {
            info!(
                job_ref = %notification.job_ref,
                "No notify_url provided, skipping notification"
            );
            return;
        };

        let result = retry_async(&self.retry, || async {
            let response = self.http.post(url).json(notification).send().await?;
            response.error_for_status()?;
            Ok::<_, reqwest::Error>(())
        })
        .await;

        match result {
            RetryResult::Success(()) => {
                info!(
                    job_ref = %notification.job_ref,
                    "Notification sent to {}", url
                );
            }
            RetryResult::Failed { error, attempts } => {
                metrics::counter!("framex_notifications_dropped_total").increment(1);
                error!(
                    job_ref = %notification.job_ref,
                    "Dropping notification to {} after {} attempts: {}",
                    url, attempts, error
                );
            }
        }
    }
}
