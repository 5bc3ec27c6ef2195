//! Shared fixtures and fake transports for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use models::{
    AlertChannel, AlertChannels, AlertHistoryEntry, AlertPreferences, AlertTriggers, AlertType,
    ConsecutiveFailureTrigger, EmailChannel, ExecutionStatus, ExecutionSummary, Pipeline,
    WebhookChannel,
};

use crate::transports::{EmailTransport, WebhookTransport};

pub fn pipeline(pipeline_id: &str) -> Pipeline {
    Pipeline {
        pipeline_id: pipeline_id.to_string(),
        client_name: "acme".to_string(),
        schedule_expression: "rate(1 hour)".to_string(),
        notification_topic: format!("topics/{pipeline_id}"),
        job_ref: format!("jobs/{pipeline_id}"),
        enabled: true,
    }
}

pub fn execution(
    execution_ref: &str,
    status: ExecutionStatus,
    started_at: DateTime<Utc>,
    stopped_at: Option<DateTime<Utc>>,
) -> ExecutionSummary {
    ExecutionSummary {
        execution_ref: execution_ref.to_string(),
        status,
        started_at,
        stopped_at,
    }
}

/// Preferences with email enabled and every trigger off except on-failure.
pub fn email_preferences(pipeline_id: &str) -> AlertPreferences {
    AlertPreferences {
        pipeline_id: pipeline_id.to_string(),
        enabled: true,
        channels: AlertChannels {
            email: EmailChannel { enabled: true },
            webhook: WebhookChannel {
                enabled: false,
                url: None,
            },
        },
        triggers: AlertTriggers {
            on_failure: true,
            on_consecutive_failures: ConsecutiveFailureTrigger {
                enabled: false,
                threshold: 3,
            },
            on_recovery: false,
            on_sla_breach: None,
        },
        updated_at: Utc::now(),
        updated_by: "tests".to_string(),
    }
}

pub fn history_entry(pipeline_id: &str, sent_at: DateTime<Utc>) -> AlertHistoryEntry {
    AlertHistoryEntry {
        pipeline_id: pipeline_id.to_string(),
        sent_at,
        alert_type: AlertType::Failure,
        channel: AlertChannel::Email,
        success: true,
        error_message: None,
        execution_ref: None,
        execution_status: None,
        message: "test entry".to_string(),
        expires_at: sent_at + chrono::Duration::days(90),
    }
}

/// Email transport that records every send.
#[derive(Debug, Default)]
pub struct RecordingEmail {
    pub sent: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl EmailTransport for RecordingEmail {
    async fn send(&self, topic_ref: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push((
            topic_ref.to_string(),
            subject.to_string(),
            body.to_string(),
        ));
        Ok(())
    }
}

/// Webhook transport that records payloads and optionally fails every send.
#[derive(Debug, Default)]
pub struct RecordingWebhook {
    pub sent: Mutex<Vec<(String, serde_json::Value)>>,
    pub fail_with: Option<String>,
}

impl RecordingWebhook {
    pub fn failing(message: &str) -> RecordingWebhook {
        RecordingWebhook {
            sent: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl WebhookTransport for RecordingWebhook {
    async fn send(&self, url: &str, payload: &serde_json::Value) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((url.to_string(), payload.clone()));
        match &self.fail_with {
            Some(message) => Err(anyhow::anyhow!("{message}")),
            None => Ok(()),
        }
    }
}
