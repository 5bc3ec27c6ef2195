//! Evaluation of execution-completion events end to end: preference gate,
//! classification, cooldown, rendering, delivery, and history accounting.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use models::{
    AlertChannel, AlertChannels, AlertHistoryEntry, AlertType, ExecutionCompleted, Pipeline,
};

use crate::alerts::classifier::AlertClassifier;
use crate::alerts::render::{
    execution_short_name, webhook_payload, AlertContext, RenderedAlert, Renderer,
};
use crate::rate_limit::PipelineLocks;
use crate::stores::{AlertHistoryStore, PipelineRegistry, PreferencesStore};
use crate::transports::{EmailTransport, WebhookTransport};

/// Minimum spacing in seconds between alerts for one pipeline, across all
/// alert types and channels.
const COOLDOWN_SECONDS: i64 = 300;
/// How long delivery history is retained before it may be purged.
pub const HISTORY_RETENTION_DAYS: i64 = 90;

pub struct AlertDispatcher {
    registry: Arc<dyn PipelineRegistry>,
    preferences: Arc<dyn PreferencesStore>,
    history: Arc<dyn AlertHistoryStore>,
    classifier: AlertClassifier,
    email: Arc<dyn EmailTransport>,
    webhook: Arc<dyn WebhookTransport>,
    renderer: Renderer,
    locks: PipelineLocks,
}

impl AlertDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<dyn PipelineRegistry>,
        preferences: Arc<dyn PreferencesStore>,
        history: Arc<dyn AlertHistoryStore>,
        classifier: AlertClassifier,
        email: Arc<dyn EmailTransport>,
        webhook: Arc<dyn WebhookTransport>,
        renderer: Renderer,
    ) -> AlertDispatcher {
        AlertDispatcher {
            registry,
            preferences,
            history,
            classifier,
            email,
            webhook,
            renderer,
            locks: PipelineLocks::default(),
        }
    }

    pub async fn evaluate(&self, event: &ExecutionCompleted) -> anyhow::Result<u32> {
        self.evaluate_at(event, Utc::now()).await
    }

    /// Evaluate one completion event, returning the number of successful
    /// channel deliveries.
    #[tracing::instrument(skip_all, fields(
        pipeline_id = %event.pipeline_id,
        execution_status = %event.execution_status,
    ))]
    pub async fn evaluate_at(
        &self,
        event: &ExecutionCompleted,
        now: DateTime<Utc>,
    ) -> anyhow::Result<u32> {
        let Some(prefs) = self
            .preferences
            .get(&event.pipeline_id)
            .await
            .context("fetching alert preferences")?
        else {
            tracing::debug!("no alert preferences configured, skipping");
            return Ok(0);
        };
        if !prefs.enabled {
            tracing::debug!("alerts disabled for pipeline, skipping");
            return Ok(0);
        }

        let alert_types = self
            .classifier
            .classify(event, &prefs.triggers)
            .await
            .context("classifying event")?;
        if alert_types.is_empty() {
            return Ok(0);
        }

        // The cooldown check and the sends it guards are serialized per
        // pipeline, so two concurrent events cannot both pass the check.
        let lock = self.locks.lock_for(&event.pipeline_id);
        let _guard = lock.lock().await;

        if let Some(last) = self
            .history
            .last_sent_at(&event.pipeline_id)
            .await
            .context("fetching last alert time")?
        {
            if now - last < Duration::seconds(COOLDOWN_SECONDS) {
                tracing::info!(last_sent_at = %last, "within cooldown, suppressing alerts");
                return Ok(0);
            }
        }

        let Some(pipeline) = self
            .registry
            .get(&event.pipeline_id)
            .await
            .context("fetching pipeline")?
        else {
            tracing::error!("event references an unknown pipeline, skipping");
            return Ok(0);
        };
        tracing::info!(?alert_types, "dispatching alerts");

        let context = AlertContext {
            pipeline_id: &event.pipeline_id,
            execution_status: event.execution_status.name(),
            execution_name: execution_short_name(&event.execution_ref),
        };

        let mut sent = 0;
        for alert_type in alert_types {
            let rendered = self
                .renderer
                .render(alert_type, &context)
                .with_context(|| format!("rendering {alert_type} alert"))?;

            for channel in enabled_channels(&prefs.channels) {
                let result = self
                    .deliver(&pipeline, &prefs.channels, channel, alert_type, &rendered)
                    .await;
                let success = result.is_ok();
                if let Err(error) = &result {
                    tracing::error!(
                        channel = %channel,
                        alert_type = %alert_type,
                        error = ?error,
                        "alert delivery failed"
                    );
                } else {
                    sent += 1;
                }

                let entry = AlertHistoryEntry {
                    pipeline_id: event.pipeline_id.clone(),
                    sent_at: now,
                    alert_type,
                    channel,
                    success,
                    error_message: result.err().map(|e| format!("{e:#}")),
                    execution_ref: Some(event.execution_ref.clone()),
                    execution_status: Some(event.execution_status),
                    message: rendered.body.clone(),
                    expires_at: now + Duration::days(HISTORY_RETENTION_DAYS),
                };
                if let Err(error) = self.history.put(entry).await {
                    tracing::warn!(error = ?error, "failed to record alert history entry");
                }
            }
        }
        Ok(sent)
    }

    async fn deliver(
        &self,
        pipeline: &Pipeline,
        channels: &AlertChannels,
        channel: AlertChannel,
        alert_type: AlertType,
        rendered: &RenderedAlert,
    ) -> anyhow::Result<()> {
        match channel {
            AlertChannel::Email => {
                self.email
                    .send(&pipeline.notification_topic, &rendered.subject, &rendered.body)
                    .await
            }
            AlertChannel::Webhook => {
                let url = webhook_url(channels)
                    .context("webhook channel is enabled but no URL is configured")?;
                self.webhook
                    .send(url, &webhook_payload(alert_type, rendered))
                    .await
            }
        }
    }
}

/// Channels that are both enabled and configured. A webhook channel with no
/// URL is not deliverable and is skipped entirely, without a history entry.
fn enabled_channels(channels: &AlertChannels) -> Vec<AlertChannel> {
    let mut enabled = Vec::new();
    if channels.email.enabled {
        enabled.push(AlertChannel::Email);
    }
    if channels.webhook.enabled && webhook_url(channels).is_some() {
        enabled.push(AlertChannel::Webhook);
    }
    enabled
}

fn webhook_url(channels: &AlertChannels) -> Option<&str> {
    channels.webhook.url.as_deref().filter(|url| !url.is_empty())
}
