//! The HTTP surface: evaluation webhook, analytics reads, and the
//! per-pipeline alert and SLA configuration endpoints.

use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse};

use crate::alerts::{AlertDispatcher, TestAlertSender};
use crate::analytics::AnalyticsComputer;
use crate::stores::{AlertHistoryStore, PipelineRegistry, PreferencesStore, SlaStore};

mod analytics;
mod error;
mod evaluate;
mod history;
mod preferences;
mod sla;
mod test_alert;

pub use error::{ApiError, ApiErrorExt};

/// Request wraps a JSON-deserialized request type T which
/// also implements the validator::Validate trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct Request<T>(pub T);

/// Rejection is an error type of reasons why an API request may fail.
#[derive(Debug, thiserror::Error)]
pub enum Rejection {
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),
    #[error(transparent)]
    JsonError(#[from] axum::extract::rejection::JsonRejection),
}

pub struct App {
    pub registry: Arc<dyn PipelineRegistry>,
    pub preferences: Arc<dyn PreferencesStore>,
    pub history: Arc<dyn AlertHistoryStore>,
    pub sla: Arc<dyn SlaStore>,
    pub dispatcher: AlertDispatcher,
    pub analytics: AnalyticsComputer,
    pub test_alerts: TestAlertSender,
    /// Shared secret required of evaluation callers, when configured.
    pub evaluate_api_key: Option<String>,
}

/// Build the monitor's API router.
pub fn build_router(app: Arc<App>) -> axum::Router<()> {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/alerts/evaluate", post(evaluate::evaluate))
        .route("/analytics/summary", get(analytics::fleet_summary))
        .route(
            "/pipelines/:pipeline_id/analytics",
            get(analytics::pipeline_analytics),
        )
        .route(
            "/pipelines/:pipeline_id/alerts",
            get(preferences::get_preferences).put(preferences::put_preferences),
        )
        .route(
            "/pipelines/:pipeline_id/alerts/history",
            get(history::recent_history),
        )
        .route(
            "/pipelines/:pipeline_id/alerts/test",
            post(test_alert::send_test_alert),
        )
        .route(
            "/pipelines/:pipeline_id/sla",
            get(sla::get_sla).put(sla::put_sla),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app)
}

#[axum::async_trait]
impl<T, S> axum::extract::FromRequest<S> for Request<T>
where
    T: serde::de::DeserializeOwned + validator::Validate,
    S: Send + Sync,
    axum::extract::Json<T>:
        axum::extract::FromRequest<S, Rejection = axum::extract::rejection::JsonRejection>,
{
    type Rejection = Rejection;

    async fn from_request(req: axum::extract::Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Json(value) = axum::extract::Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Request(value))
    }
}

impl axum::response::IntoResponse for Rejection {
    fn into_response(self) -> axum::response::Response {
        match self {
            Rejection::ValidationError(inner) => {
                let message = format!("Input validation error: [{inner}]").replace('\n', ", ");
                (StatusCode::BAD_REQUEST, message).into_response()
            }
            Rejection::JsonError(inner) => inner.into_response(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStores;
    use crate::testutil;
    use axum::body::Body;
    use axum::http::{header, Request as HttpRequest};
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_pipeline_is_404() {
        let stores = Arc::new(MemoryStores::default());
        let router = build_router(test_support::test_app(stores, None));

        let response = router
            .oneshot(
                HttpRequest::builder()
                    .uri("/pipelines/nope/analytics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "pipeline not found");
    }

    #[tokio::test]
    async fn test_evaluate_requires_api_key_when_configured() {
        let stores = Arc::new(MemoryStores::default());
        let router = build_router(test_support::test_app(stores, Some("sekrit".to_string())));
        let event = serde_json::json!({
            "pipelineId": "orders",
            "executionRef": "jobs:orders:e-0",
            "executionStatus": "FAILED",
            "jobRef": "jobs/orders",
        });

        let response = router
            .clone()
            .oneshot(json_request("POST", "/alerts/evaluate", event.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let mut request = json_request("POST", "/alerts/evaluate", event);
        request
            .headers_mut()
            .insert("x-api-key", "sekrit".parse().unwrap());
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        // No pipeline or preferences are registered, so nothing is sent.
        assert_eq!(body["alertsSent"], 0);
    }

    #[tokio::test]
    async fn test_evaluate_rejects_invalid_body() {
        let stores = Arc::new(MemoryStores::default());
        let router = build_router(test_support::test_app(stores, None));

        let response = router
            .oneshot(json_request(
                "POST",
                "/alerts/evaluate",
                serde_json::json!({
                    "pipelineId": "",
                    "executionRef": "jobs:orders:e-0",
                    "executionStatus": "FAILED",
                    "jobRef": "jobs/orders",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_evaluate_dispatches_alerts() {
        let stores = Arc::new(MemoryStores::default());
        stores.insert_pipeline(testutil::pipeline("orders"));
        crate::stores::PreferencesStore::put(&*stores, testutil::email_preferences("orders"))
            .await
            .unwrap();
        let now = chrono::Utc::now();
        stores.insert_executions(
            "jobs/orders",
            vec![testutil::execution(
                "e-0",
                models::ExecutionStatus::Failed,
                now - chrono::Duration::minutes(5),
                Some(now),
            )],
        );
        let router = build_router(test_support::test_app(stores, None));

        let response = router
            .oneshot(json_request(
                "POST",
                "/alerts/evaluate",
                serde_json::json!({
                    "pipelineId": "orders",
                    "executionRef": "e-0",
                    "executionStatus": "FAILED",
                    "jobRef": "jobs/orders",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["alertsSent"], 1);
    }

    #[tokio::test]
    async fn test_fleet_summary_sets_cache_control() {
        let stores = Arc::new(MemoryStores::default());
        let router = build_router(test_support::test_app(stores, None));

        let response = router
            .oneshot(
                HttpRequest::builder()
                    .uri("/analytics/summary?period=7d")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "s-maxage=300, stale-while-revalidate=600"
        );
        let body = body_json(response).await;
        assert_eq!(body["totals"]["totalPipelines"], 0);
        assert_eq!(body["totals"]["overallUptimePercent"], 100.0);
    }

    #[tokio::test]
    async fn test_preferences_default_and_update_round_trip() {
        let stores = Arc::new(MemoryStores::default());
        stores.insert_pipeline(testutil::pipeline("orders"));
        let router = build_router(test_support::test_app(stores, None));

        // Defaults before anything is stored.
        let response = router
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .uri("/pipelines/orders/alerts")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["enabled"], false);
        assert_eq!(body["triggers"]["onFailure"], true);
        assert_eq!(body["triggers"]["onConsecutiveFailures"]["threshold"], 3);

        // Store a configuration with a webhook URL.
        let response = router
            .clone()
            .oneshot(json_request(
                "PUT",
                "/pipelines/orders/alerts",
                serde_json::json!({
                    "enabled": true,
                    "channels": {
                        "email": {"enabled": true},
                        "webhook": {"enabled": true, "url": "https://hooks.example.com/T1/secret99"},
                    },
                    "triggers": {
                        "onFailure": true,
                        "onConsecutiveFailures": {"enabled": true, "threshold": 4},
                        "onRecovery": false,
                    },
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        // The URL never comes back in the clear.
        assert_eq!(body["channels"]["webhook"]["url"], "****et99");
        assert_eq!(body["channels"]["webhook"]["configured"], true);

        // Updating without a url field preserves the stored URL.
        let response = router
            .clone()
            .oneshot(json_request(
                "PUT",
                "/pipelines/orders/alerts",
                serde_json::json!({
                    "enabled": true,
                    "channels": {
                        "email": {"enabled": false},
                        "webhook": {"enabled": true},
                    },
                    "triggers": {
                        "onFailure": true,
                        "onConsecutiveFailures": {"enabled": true, "threshold": 4},
                        "onRecovery": false,
                    },
                }),
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["channels"]["webhook"]["url"], "****et99");

        // An explicit empty url clears it.
        let response = router
            .oneshot(json_request(
                "PUT",
                "/pipelines/orders/alerts",
                serde_json::json!({
                    "enabled": true,
                    "channels": {
                        "email": {"enabled": true},
                        "webhook": {"enabled": false, "url": ""},
                    },
                    "triggers": {
                        "onFailure": true,
                        "onConsecutiveFailures": {"enabled": true, "threshold": 4},
                        "onRecovery": false,
                    },
                }),
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["channels"]["webhook"]["configured"], false);
        assert!(body["channels"]["webhook"]["url"].is_null());
    }

    #[tokio::test]
    async fn test_preferences_reject_out_of_range_threshold() {
        let stores = Arc::new(MemoryStores::default());
        stores.insert_pipeline(testutil::pipeline("orders"));
        let router = build_router(test_support::test_app(stores, None));

        let response = router
            .oneshot(json_request(
                "PUT",
                "/pipelines/orders/alerts",
                serde_json::json!({
                    "enabled": true,
                    "channels": {
                        "email": {"enabled": true},
                        "webhook": {"enabled": false},
                    },
                    "triggers": {
                        "onFailure": true,
                        "onConsecutiveFailures": {"enabled": true, "threshold": 1},
                        "onRecovery": false,
                    },
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_sla_default_and_update() {
        let stores = Arc::new(MemoryStores::default());
        stores.insert_pipeline(testutil::pipeline("orders"));
        let router = build_router(test_support::test_app(stores, None));

        let response = router
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .uri("/pipelines/orders/sla")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["enabled"], false);
        assert_eq!(body["uptimeTargetPercent"], 99.0);
        assert_eq!(body["maxExecutionDurationSeconds"], 3600);

        let response = router
            .clone()
            .oneshot(json_request(
                "PUT",
                "/pipelines/orders/sla",
                serde_json::json!({
                    "enabled": true,
                    "uptimeTargetPercent": 99.9,
                    "maxExecutionDurationSeconds": 1800,
                    "freshnessWindowMinutes": 90,
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["uptimeTargetPercent"], 99.9);

        // Out-of-range target is rejected.
        let response = router
            .oneshot(json_request(
                "PUT",
                "/pipelines/orders/sla",
                serde_json::json!({
                    "enabled": true,
                    "uptimeTargetPercent": 101.0,
                    "maxExecutionDurationSeconds": 1800,
                    "freshnessWindowMinutes": 90,
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_history_limit_clamped() {
        let stores = Arc::new(MemoryStores::default());
        stores.insert_pipeline(testutil::pipeline("orders"));
        let now = chrono::Utc::now();
        for i in 0..5 {
            crate::stores::AlertHistoryStore::put(
                &*stores,
                testutil::history_entry("orders", now - chrono::Duration::minutes(i)),
            )
            .await
            .unwrap();
        }
        let router = build_router(test_support::test_app(stores, None));

        let response = router
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .uri("/pipelines/orders/alerts/history?limit=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["alerts"].as_array().unwrap().len(), 2);

        // A zero limit is clamped up to one.
        let response = router
            .oneshot(
                HttpRequest::builder()
                    .uri("/pipelines/orders/alerts/history?limit=0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["alerts"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_test_alert_rate_limit_maps_to_429() {
        let stores = Arc::new(MemoryStores::default());
        stores.insert_pipeline(testutil::pipeline("orders"));
        crate::stores::PreferencesStore::put(&*stores, testutil::email_preferences("orders"))
            .await
            .unwrap();
        let router = build_router(test_support::test_app(stores, None));

        let request = || {
            HttpRequest::builder()
                .method("POST")
                .uri("/pipelines/orders/alerts/test")
                .body(Body::empty())
                .unwrap()
        };
        let response = router.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["results"][0]["channel"], "email");
        assert_eq!(body["results"][0]["success"], true);

        let response = router.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
    }
}
