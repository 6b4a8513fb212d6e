//! Webhook delivery for alert messages

use std::time::Duration;

use async_trait::async_trait;

/// Outcome of a post that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Endpoint accepted the message
    Sent,
    /// No endpoint configured for this channel
    Skipped,
}

/// Transport that delivers a rendered alert to an endpoint
#[async_trait]
pub trait AlertTransport: Send + Sync {
    /// Post `message` to `endpoint`. An empty endpoint is skipped, not an error.
    async fn post(&self, message: &str, endpoint: &str) -> Result<Delivery, NotifierError>;
}

/// Posts markdown messages to group-chat webhooks
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Create a notifier with a 10 second request timeout
    pub fn new() -> Result<Self, NotifierError> {
        Self::with_timeout(Duration::from_secs(10))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, NotifierError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifierError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    async fn send_markdown(&self, message: &str, url: &str) -> Result<(), NotifierError> {
        let payload = serde_json::json!({
            "msgtype": "markdown",
            "markdown": {
                "content": message,
            }
        });

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifierError::Webhook(format!("Failed to send webhook: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifierError::Webhook(format!(
                "Webhook returned status {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl AlertTransport for WebhookNotifier {
    async fn post(&self, message: &str, endpoint: &str) -> Result<Delivery, NotifierError> {
        let url = endpoint.trim();
        if url.is_empty() {
            tracing::warn!("Webhook endpoint is empty, skipping alert");
            return Ok(Delivery::Skipped);
        }

        match self.send_markdown(message, url).await {
            Ok(()) => {
                tracing::info!(url = %url, "Alert delivered");
                Ok(Delivery::Sent)
            }
            Err(e) => {
                tracing::error!(url = %url, error = %e, "Alert delivery failed");
                Err(e)
            }
        }
    }
}

/// Notifier errors
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Webhook error: {0}")]
    Webhook(String),
}
