//! `ApiError` pairs an HTTP status with an `anyhow::Error`, letting
//! handlers return `Result<Json<T>, ApiError>` and use `?` freely. `From`
//! impls supply default status codes, and `ApiErrorExt::with_status`
//! overrides them where a handler needs a specific response status.

use axum::http::StatusCode;

use super::Rejection;

pub trait ApiErrorExt {
    /// Sets the http response status to use when responding with this error.
    fn with_status(self, status: StatusCode) -> ApiError;
}

impl<E: Into<ApiError> + Sized> ApiErrorExt for E {
    fn with_status(self, status: StatusCode) -> ApiError {
        let mut err: ApiError = self.into();
        err.status = status;
        err
    }
}

#[derive(Debug, thiserror::Error)]
#[error("status: {status}, error: {error}")]
pub struct ApiError {
    pub status: StatusCode,
    #[source]
    pub error: anyhow::Error,
}

impl ApiError {
    pub fn new(status: StatusCode, error: anyhow::Error) -> ApiError {
        ApiError { status, error }
    }

    pub fn not_found(what: &str) -> ApiError {
        ApiError::new(StatusCode::NOT_FOUND, anyhow::anyhow!("{what} not found"))
    }

    pub fn bad_request(message: String) -> ApiError {
        ApiError::new(StatusCode::BAD_REQUEST, anyhow::anyhow!(message))
    }

    pub fn unauthorized(message: &str) -> ApiError {
        ApiError::new(StatusCode::UNAUTHORIZED, anyhow::anyhow!("{message}"))
    }

    fn status_for(err: &anyhow::Error) -> StatusCode {
        // A Rejection or ApiError may have been converted into an
        // anyhow::Error by a `?` somewhere before reaching us; recover the
        // intended status in that case.
        if err.downcast_ref::<Rejection>().is_some() {
            return StatusCode::BAD_REQUEST;
        }
        if let Some(api_error) = err.downcast_ref::<ApiError>() {
            return api_error.status;
        }
        StatusCode::SERVICE_UNAVAILABLE
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        let status = Self::status_for(&error);
        ApiError { status, error }
    }
}

impl From<Rejection> for ApiError {
    fn from(value: Rejection) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            error: anyhow::Error::from(value).context("Input validation error"),
        }
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        // Server-side failures are logged in full but answered with a
        // generic message, so collaborator details never leak outward.
        let message = if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = ?self.error, "API request failed");
            "service temporarily unavailable, please retry the request".to_string()
        } else {
            format!("{:#}", self.error)
        };
        (
            self.status,
            axum::Json(serde_json::json!({ "error": message })),
        )
            .into_response()
    }
}
