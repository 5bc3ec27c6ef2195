use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ExecutionStatus;

/// The kinds of alerts an execution outcome can be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Failure,
    ConsecutiveFailures,
    Recovery,
    SlaBreach,
}

impl AlertType {
    pub fn name(&self) -> &'static str {
        match self {
            AlertType::Failure => "failure",
            AlertType::ConsecutiveFailures => "consecutive_failures",
            AlertType::Recovery => "recovery",
            AlertType::SlaBreach => "sla_breach",
        }
    }

    /// Human-readable form used in message subjects.
    pub fn label(&self) -> &'static str {
        match self {
            AlertType::Failure => "failure",
            AlertType::ConsecutiveFailures => "consecutive failures",
            AlertType::Recovery => "recovery",
            AlertType::SlaBreach => "SLA breach",
        }
    }

    pub fn all() -> &'static [AlertType] {
        &[
            AlertType::Failure,
            AlertType::ConsecutiveFailures,
            AlertType::Recovery,
            AlertType::SlaBreach,
        ]
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Notification channels an alert can be delivered over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertChannel {
    Email,
    Webhook,
}

impl AlertChannel {
    pub fn name(&self) -> &'static str {
        match self {
            AlertChannel::Email => "email",
            AlertChannel::Webhook => "webhook",
        }
    }
}

impl std::fmt::Display for AlertChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EmailChannel {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WebhookChannel {
    pub enabled: bool,
    /// Destination URL. Masked in any outward-facing view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AlertChannels {
    #[validate(nested)]
    pub email: EmailChannel,
    #[validate(nested)]
    pub webhook: WebhookChannel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConsecutiveFailureTrigger {
    pub enabled: bool,
    /// Number of consecutive failures required before the alert fires.
    #[validate(range(min = 2, max = 10))]
    pub threshold: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SlaBreachTrigger {
    pub enabled: bool,
}

/// Standing trigger configuration for a pipeline's alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AlertTriggers {
    pub on_failure: bool,
    #[validate(nested)]
    pub on_consecutive_failures: ConsecutiveFailureTrigger,
    pub on_recovery: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub on_sla_breach: Option<SlaBreachTrigger>,
}

impl AlertTriggers {
    pub fn sla_breach_enabled(&self) -> bool {
        self.on_sla_breach.map_or(false, |t| t.enabled)
    }
}

/// Per-pipeline alert preferences. Created on first save and overwritten
/// wholesale on each update; merge semantics belong to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlertPreferences {
    pub pipeline_id: String,
    pub enabled: bool,
    pub channels: AlertChannels,
    pub triggers: AlertTriggers,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

/// One channel-delivery attempt, successful or not. Entries are append-only
/// and never mutated, ordered by `sent_at` within a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlertHistoryEntry {
    pub pipeline_id: String,
    pub sent_at: DateTime<Utc>,
    pub alert_type: AlertType,
    pub channel: AlertChannel,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_status: Option<ExecutionStatus>,
    /// Rendered message body as delivered (or attempted).
    pub message: String,
    /// Absolute time after which the entry may be purged.
    pub expires_at: DateTime<Utc>,
}

/// Execution-completion event delivered by the external scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionCompleted {
    #[validate(length(min = 1))]
    pub pipeline_id: String,
    #[validate(length(min = 1))]
    pub execution_ref: String,
    pub execution_status: ExecutionStatus,
    #[validate(length(min = 1))]
    pub job_ref: String,
}

/// Mask a webhook URL for outward-facing views: at most the last four
/// characters are revealed.
pub fn mask_webhook_url(url: &str) -> String {
    if url.len() <= 4 {
        "****".to_string()
    } else {
        let tail: String = url.chars().skip(url.chars().count().saturating_sub(4)).collect();
        format!("****{tail}")
    }
}
