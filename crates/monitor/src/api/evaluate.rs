use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use models::ExecutionCompleted;

use super::{ApiError, App, Request};

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    pub message: String,
    pub alerts_sent: u32,
}

/// POST /alerts/evaluate: classify a completed execution and dispatch any
/// resulting alerts. Called by the external scheduler, authenticated with a
/// shared key when one is configured.
pub async fn evaluate(
    State(app): State<Arc<App>>,
    headers: HeaderMap,
    Request(event): Request<ExecutionCompleted>,
) -> Result<axum::Json<EvaluateResponse>, ApiError> {
    if let Some(expected) = &app.evaluate_api_key {
        let presented = headers.get("x-api-key").and_then(|value| value.to_str().ok());
        if presented != Some(expected.as_str()) {
            return Err(ApiError::unauthorized("invalid or missing x-api-key header"));
        }
    }

    let alerts_sent = app.dispatcher.evaluate(&event).await?;
    Ok(axum::Json(EvaluateResponse {
        message: "evaluation complete".to_string(),
        alerts_sent,
    }))
}
