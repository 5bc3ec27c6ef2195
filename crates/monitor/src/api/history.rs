use std::sync::Arc;

use axum::extract::{Path, Query, State};
use models::AlertHistoryEntry;

use super::{ApiError, App};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Default, serde::Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub pipeline_id: String,
    pub alerts: Vec<AlertHistoryEntry>,
}

/// GET /pipelines/:pipeline_id/alerts/history
pub async fn recent_history(
    State(app): State<Arc<App>>,
    Path(pipeline_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<axum::Json<HistoryResponse>, ApiError> {
    app.registry
        .get(&pipeline_id)
        .await?
        .ok_or_else(|| ApiError::not_found("pipeline"))?;

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let alerts = app.history.query_recent(&pipeline_id, limit).await?;
    Ok(axum::Json(HistoryResponse {
        pipeline_id,
        alerts,
    }))
}
