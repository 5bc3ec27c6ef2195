use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::alerts::{ChannelAttempt, TestAlertError};

use super::{ApiError, App};

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestAlertResponse {
    pub message: String,
    pub results: Vec<ChannelAttempt>,
}

/// POST /pipelines/:pipeline_id/alerts/test
pub async fn send_test_alert(
    State(app): State<Arc<App>>,
    Path(pipeline_id): Path<String>,
) -> Result<Response, ApiError> {
    match app.test_alerts.send(&pipeline_id).await {
        Ok(results) => Ok(axum::Json(TestAlertResponse {
            message: "test alert sent".to_string(),
            results,
        })
        .into_response()),
        Err(TestAlertError::PipelineNotFound) => Err(ApiError::not_found("pipeline")),
        Err(err @ TestAlertError::NoChannels) => Err(ApiError::bad_request(err.to_string())),
        Err(TestAlertError::RateLimited {
            retry_after_seconds,
        }) => {
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                axum::Json(serde_json::json!({
                    "error": "a test alert was sent recently, try again later",
                    "retryAfterSeconds": retry_after_seconds,
                })),
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_seconds));
            Ok(response)
        }
        Err(TestAlertError::Internal(error)) => Err(error.into()),
    }
}
