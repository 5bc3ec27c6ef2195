//! On-demand test alerts, used to verify channel configuration without
//! waiting for a real execution to fail.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use models::{AlertChannel, AlertHistoryEntry, AlertType};
use serde::Serialize;

use crate::alerts::dispatcher::HISTORY_RETENTION_DAYS;
use crate::alerts::render::{clamp_subject, webhook_payload, RenderedAlert};
use crate::rate_limit::RateLimiter;
use crate::stores::{AlertHistoryStore, PipelineRegistry, PreferencesStore};
use crate::transports::{EmailTransport, WebhookTransport};

/// Minimum spacing between test alerts for one pipeline.
const TEST_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum TestAlertError {
    #[error("pipeline not found")]
    PipelineNotFound,
    #[error("no alert channels are enabled for this pipeline")]
    NoChannels,
    #[error("a test alert was sent recently, retry in {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Outcome of one channel's test delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAttempt {
    pub channel: AlertChannel,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct TestAlertSender {
    registry: Arc<dyn PipelineRegistry>,
    preferences: Arc<dyn PreferencesStore>,
    history: Arc<dyn AlertHistoryStore>,
    email: Arc<dyn EmailTransport>,
    webhook: Arc<dyn WebhookTransport>,
    limiter: Arc<dyn RateLimiter>,
}

impl TestAlertSender {
    pub fn new(
        registry: Arc<dyn PipelineRegistry>,
        preferences: Arc<dyn PreferencesStore>,
        history: Arc<dyn AlertHistoryStore>,
        email: Arc<dyn EmailTransport>,
        webhook: Arc<dyn WebhookTransport>,
        limiter: Arc<dyn RateLimiter>,
    ) -> TestAlertSender {
        TestAlertSender {
            registry,
            preferences,
            history,
            email,
            webhook,
            limiter,
        }
    }

    /// Send a test alert over every enabled channel and record the attempts
    /// in the delivery history. A transport failure is reported in the
    /// per-channel result, not as an error.
    #[tracing::instrument(skip_all, fields(pipeline_id = %pipeline_id))]
    pub async fn send(&self, pipeline_id: &str) -> Result<Vec<ChannelAttempt>, TestAlertError> {
        let pipeline = self
            .registry
            .get(pipeline_id)
            .await
            .context("fetching pipeline")?
            .ok_or(TestAlertError::PipelineNotFound)?;
        let prefs = self
            .preferences
            .get(pipeline_id)
            .await
            .context("fetching alert preferences")?
            .ok_or(TestAlertError::NoChannels)?;

        // Only channels that are both enabled and configured are testable.
        let mut channels = Vec::new();
        if prefs.channels.email.enabled {
            channels.push(AlertChannel::Email);
        }
        if prefs.channels.webhook.enabled && webhook_url(&prefs).is_some() {
            channels.push(AlertChannel::Webhook);
        }
        if channels.is_empty() {
            return Err(TestAlertError::NoChannels);
        }

        // Rate limit only after the request is known to be actionable, so
        // a rejected misconfiguration does not burn the cooldown.
        if let Err(wait) = self.limiter.try_acquire(pipeline_id, TEST_COOLDOWN) {
            return Err(TestAlertError::RateLimited {
                retry_after_seconds: wait.as_secs().max(1),
            });
        }

        let rendered = RenderedAlert {
            subject: clamp_subject(&format!("[TEST] Oxbow Alert: test alert - {pipeline_id}")),
            body: format!(
                "[TEST] This is a test notification for pipeline {pipeline_id}. If you \
                 received this, the channel is configured correctly."
            ),
        };

        let now = Utc::now();
        let mut attempts = Vec::new();
        for channel in channels {
            let result = match channel {
                AlertChannel::Email => {
                    self.email
                        .send(&pipeline.notification_topic, &rendered.subject, &rendered.body)
                        .await
                }
                AlertChannel::Webhook => self.send_webhook(&prefs, &rendered).await,
            };
            let error = result.err().map(|e| format!("{e:#}"));
            let success = error.is_none();
            if let Some(error) = &error {
                tracing::warn!(channel = %channel, %error, "test alert delivery failed");
            }

            let entry = AlertHistoryEntry {
                pipeline_id: pipeline_id.to_string(),
                sent_at: now,
                alert_type: AlertType::Failure,
                channel,
                success,
                error_message: error.clone(),
                execution_ref: None,
                execution_status: None,
                message: rendered.body.clone(),
                expires_at: now + chrono::Duration::days(HISTORY_RETENTION_DAYS),
            };
            if let Err(error) = self.history.put(entry).await {
                tracing::warn!(error = ?error, "failed to record test alert history entry");
            }

            attempts.push(ChannelAttempt {
                channel,
                success,
                error,
            });
        }
        Ok(attempts)
    }

    async fn send_webhook(
        &self,
        prefs: &models::AlertPreferences,
        rendered: &RenderedAlert,
    ) -> anyhow::Result<()> {
        let url =
            webhook_url(prefs).context("webhook channel is enabled but no URL is configured")?;
        self.webhook
            .send(url, &webhook_payload(AlertType::Failure, rendered))
            .await
    }
}

fn webhook_url(prefs: &models::AlertPreferences) -> Option<&str> {
    prefs
        .channels
        .webhook
        .url
        .as_deref()
        .filter(|url| !url.is_empty())
}
