//! Notification transports. Email delivery rides an external topic-based
//! relay and is abstracted away entirely; webhook delivery is implemented
//! here over HTTP.

use anyhow::Context;
use async_trait::async_trait;

/// Delivers templated text to a topic's subscriber list.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// `subject` must already be clamped to 100 characters by the caller.
    async fn send(&self, topic_ref: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Posts structured JSON to a webhook URL.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn send(&self, url: &str, payload: &serde_json::Value) -> anyhow::Result<()>;
}

/// Webhook transport over reqwest. A non-2xx response is a failure and the
/// response body is included in the error.
pub struct HttpWebhook {
    client: reqwest::Client,
}

impl HttpWebhook {
    pub fn new(timeout: std::time::Duration) -> anyhow::Result<HttpWebhook> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building webhook HTTP client")?;
        Ok(HttpWebhook { client })
    }
}

#[async_trait]
impl WebhookTransport for HttpWebhook {
    async fn send(&self, url: &str, payload: &serde_json::Value) -> anyhow::Result<()> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .context("posting to webhook")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("webhook returned {status}: {body}");
        }
        Ok(())
    }
}

/// No-op email transport for deployments without a configured relay. Logs
/// and reports success so that delivery accounting still works end to end.
#[derive(Debug, Default)]
pub struct NoopEmail;

#[async_trait]
impl EmailTransport for NoopEmail {
    async fn send(&self, topic_ref: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
        tracing::warn!(%topic_ref, %subject, "skipping email alert (no transport configured)");
        Ok(())
    }
}
