//! Alert preference reads and updates. Stored webhook URLs are secrets:
//! reads only ever return a masked form, and updates distinguish "leave the
//! URL alone" (field omitted) from "clear it" (empty string).

use std::sync::Arc;

use axum::extract::{Path, State};
use chrono::Utc;
use models::{
    mask_webhook_url, AlertChannels, AlertPreferences, AlertTriggers, ConsecutiveFailureTrigger,
    EmailChannel, WebhookChannel,
};
use validator::Validate;

use super::{ApiError, App, Request};

/// Attributed author of updates arriving through this API.
const UPDATED_BY: &str = "dashboard";

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookChannelView {
    pub enabled: bool,
    /// Masked form of the stored URL, absent when none is stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub configured: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct ChannelsView {
    pub email: EmailChannel,
    pub webhook: WebhookChannelView,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesView {
    pub pipeline_id: String,
    pub enabled: bool,
    pub channels: ChannelsView,
    pub triggers: AlertTriggers,
    pub updated_at: chrono::DateTime<Utc>,
    pub updated_by: String,
}

impl From<AlertPreferences> for PreferencesView {
    fn from(prefs: AlertPreferences) -> Self {
        let stored_url = prefs
            .channels
            .webhook
            .url
            .as_deref()
            .filter(|url| !url.is_empty());
        PreferencesView {
            pipeline_id: prefs.pipeline_id,
            enabled: prefs.enabled,
            channels: ChannelsView {
                email: prefs.channels.email,
                webhook: WebhookChannelView {
                    enabled: prefs.channels.webhook.enabled,
                    url: stored_url.map(mask_webhook_url),
                    configured: stored_url.is_some(),
                },
            },
            triggers: prefs.triggers,
            updated_at: prefs.updated_at,
            updated_by: prefs.updated_by,
        }
    }
}

#[derive(Debug, serde::Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WebhookChannelUpdate {
    pub enabled: bool,
    /// Omitted: keep the stored URL. Empty: clear it. Otherwise: replace it.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, serde::Deserialize, Validate)]
pub struct ChannelsUpdate {
    #[validate(nested)]
    pub email: EmailChannel,
    #[validate(nested)]
    pub webhook: WebhookChannelUpdate,
}

#[derive(Debug, serde::Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesUpdate {
    pub enabled: bool,
    #[validate(nested)]
    pub channels: ChannelsUpdate,
    #[validate(nested)]
    pub triggers: AlertTriggers,
}

/// Defaults served (and never stored) for pipelines without saved
/// preferences.
fn default_preferences(pipeline_id: &str) -> AlertPreferences {
    AlertPreferences {
        pipeline_id: pipeline_id.to_string(),
        enabled: false,
        channels: AlertChannels {
            email: EmailChannel { enabled: false },
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
            on_recovery: true,
            on_sla_breach: None,
        },
        updated_at: Utc::now(),
        updated_by: UPDATED_BY.to_string(),
    }
}

/// GET /pipelines/:pipeline_id/alerts
pub async fn get_preferences(
    State(app): State<Arc<App>>,
    Path(pipeline_id): Path<String>,
) -> Result<axum::Json<PreferencesView>, ApiError> {
    require_pipeline(&app, &pipeline_id).await?;
    let prefs = app
        .preferences
        .get(&pipeline_id)
        .await?
        .unwrap_or_else(|| default_preferences(&pipeline_id));
    Ok(axum::Json(prefs.into()))
}

/// PUT /pipelines/:pipeline_id/alerts
pub async fn put_preferences(
    State(app): State<Arc<App>>,
    Path(pipeline_id): Path<String>,
    Request(update): Request<PreferencesUpdate>,
) -> Result<axum::Json<PreferencesView>, ApiError> {
    require_pipeline(&app, &pipeline_id).await?;
    let stored = app.preferences.get(&pipeline_id).await?;

    let url = merge_webhook_url(
        update.channels.webhook.url,
        stored.and_then(|prefs| prefs.channels.webhook.url),
    )?;
    let prefs = AlertPreferences {
        pipeline_id: pipeline_id.clone(),
        enabled: update.enabled,
        channels: AlertChannels {
            email: update.channels.email,
            webhook: WebhookChannel {
                enabled: update.channels.webhook.enabled,
                url,
            },
        },
        triggers: update.triggers,
        updated_at: Utc::now(),
        updated_by: UPDATED_BY.to_string(),
    };

    app.preferences.put(prefs.clone()).await?;
    Ok(axum::Json(prefs.into()))
}

fn merge_webhook_url(
    update: Option<String>,
    stored: Option<String>,
) -> Result<Option<String>, ApiError> {
    match update {
        None => Ok(stored),
        Some(url) if url.is_empty() => Ok(None),
        Some(url) => {
            url::Url::parse(&url)
                .map_err(|err| ApiError::bad_request(format!("invalid webhook URL: {err}")))?;
            Ok(Some(url))
        }
    }
}

async fn require_pipeline(app: &App, pipeline_id: &str) -> Result<(), ApiError> {
    app.registry
        .get(pipeline_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| ApiError::not_found("pipeline"))
}
