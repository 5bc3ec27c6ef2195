use std::sync::Arc;

use axum::extract::{Path, State};
use chrono::Utc;
use models::SlaConfig;
use validator::Validate;

use super::{ApiError, App, Request};

const UPDATED_BY: &str = "dashboard";

#[derive(Debug, serde::Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SlaUpdate {
    pub enabled: bool,
    #[validate(range(min = 0.0, max = 100.0))]
    pub uptime_target_percent: f64,
    #[validate(range(min = 1))]
    pub max_execution_duration_seconds: u32,
    #[validate(range(min = 1))]
    pub freshness_window_minutes: u32,
}

/// Defaults served for pipelines without a stored SLA configuration.
fn default_sla(pipeline_id: &str) -> SlaConfig {
    SlaConfig {
        pipeline_id: pipeline_id.to_string(),
        enabled: false,
        uptime_target_percent: 99.0,
        max_execution_duration_seconds: 3600,
        freshness_window_minutes: 120,
        updated_at: Utc::now(),
        updated_by: UPDATED_BY.to_string(),
    }
}

/// GET /pipelines/:pipeline_id/sla
pub async fn get_sla(
    State(app): State<Arc<App>>,
    Path(pipeline_id): Path<String>,
) -> Result<axum::Json<SlaConfig>, ApiError> {
    require_pipeline(&app, &pipeline_id).await?;
    let config = app
        .sla
        .get(&pipeline_id)
        .await?
        .unwrap_or_else(|| default_sla(&pipeline_id));
    Ok(axum::Json(config))
}

/// PUT /pipelines/:pipeline_id/sla
pub async fn put_sla(
    State(app): State<Arc<App>>,
    Path(pipeline_id): Path<String>,
    Request(update): Request<SlaUpdate>,
) -> Result<axum::Json<SlaConfig>, ApiError> {
    require_pipeline(&app, &pipeline_id).await?;

    let config = SlaConfig {
        pipeline_id: pipeline_id.clone(),
        enabled: update.enabled,
        uptime_target_percent: update.uptime_target_percent,
        max_execution_duration_seconds: update.max_execution_duration_seconds,
        freshness_window_minutes: update.freshness_window_minutes,
        updated_at: Utc::now(),
        updated_by: UPDATED_BY.to_string(),
    };
    app.sla.put(config.clone()).await?;
    Ok(axum::Json(config))
}

async fn require_pipeline(app: &App, pipeline_id: &str) -> Result<(), ApiError> {
    app.registry
        .get(pipeline_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| ApiError::not_found("pipeline"))
}
