//! API error responses
//!
//! Every failure is returned as `{"error": ..., "detail"?: ..., "raw"?: ...}`,
//! including extractor and rate limiter rejections.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pollutant_normalizer::{Coercion, ValidationError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use upstream::UpstreamError;

/// Errors surfaced by request handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed client request
    #[error("{0}")]
    BadRequest(String),

    /// A setting the request needs is not configured
    #[error("{0}")]
    Config(&'static str),

    /// Pollutant generation call failed
    #[error("Pollutant generation failed: {0}")]
    Generation(#[source] UpstreamError),

    /// Prediction call failed
    #[error("Prediction failed: {0}")]
    Prediction(#[source] UpstreamError),

    /// Reading refused by strict validation
    #[error(transparent)]
    Rejected(#[from] ValidationError),

    /// Per-client quota exhausted
    #[error("Too many requests, retry in {wait_time}s")]
    RateLimited { wait_time: u64 },
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<Coercion>>,
}

impl ErrorBody {
    pub(crate) fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            detail: None,
            raw: None,
            issues: None,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl ApiError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorBody::new(msg)),
            ApiError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::new(msg)),
            ApiError::Generation(UpstreamError::UnparsableReply { raw }) => {
                let mut body = ErrorBody::new("Failed to parse generated pollutant data");
                body.raw = Some(raw);
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
            ApiError::Generation(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new("Pollutant generation failed").with_detail(err.to_string()),
            ),
            ApiError::Prediction(UpstreamError::Rejected { status, detail }) => {
                let status = StatusCode::from_u16(status.as_u16())
                    .ok()
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                (status, ErrorBody::new("Prediction failed").with_detail(detail))
            }
            ApiError::Prediction(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new("Backend connection failed or invalid JSON received")
                    .with_detail(err.to_string()),
            ),
            ApiError::Rejected(err) => {
                let message = err.to_string();
                let ValidationError::Rejected { issues } = err;
                let mut body = ErrorBody::new(message);
                body.issues = Some(issues);
                (StatusCode::BAD_REQUEST, body)
            }
            ApiError::RateLimited { wait_time } => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorBody::new("Too many requests")
                    .with_detail(format!("Retry in {}s", wait_time)),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if !matches!(
            self,
            ApiError::BadRequest(_) | ApiError::Rejected(_) | ApiError::RateLimited { .. }
        ) {
            error!("{}", self);
        }
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}
