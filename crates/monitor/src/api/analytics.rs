use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use models::{AnalyticsPeriod, PipelineAnalytics};

use super::{ApiError, App};

/// Summaries are fleet-wide scans, so edge caches may serve them slightly
/// stale rather than recomputing per request.
const SUMMARY_CACHE_CONTROL: &str = "s-maxage=300, stale-while-revalidate=600";

#[derive(Debug, Default, serde::Deserialize)]
pub struct PeriodQuery {
    #[serde(default)]
    pub period: Option<AnalyticsPeriod>,
}

/// GET /pipelines/:pipeline_id/analytics
pub async fn pipeline_analytics(
    State(app): State<Arc<App>>,
    Path(pipeline_id): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> Result<axum::Json<PipelineAnalytics>, ApiError> {
    let pipeline = app
        .registry
        .get(&pipeline_id)
        .await?
        .ok_or_else(|| ApiError::not_found("pipeline"))?;

    let analytics = app
        .analytics
        .compute(&pipeline, query.period.unwrap_or_default())
        .await?;
    Ok(axum::Json(analytics))
}

/// GET /analytics/summary
pub async fn fleet_summary(
    State(app): State<Arc<App>>,
    Query(query): Query<PeriodQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let pipelines = app.registry.list().await?;
    let summary = app
        .analytics
        .fleet_summary(&pipelines, query.period.unwrap_or_default())
        .await;

    Ok((
        [(header::CACHE_CONTROL, SUMMARY_CACHE_CONTROL)],
        axum::Json(summary),
    ))
}
