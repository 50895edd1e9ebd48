//! Health and Metrics Routes

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub schema: Vec<String>,
    pub strict_validation: bool,
    pub components: ComponentStatus,
}

/// Upstream collaborators
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub generation: ComponentHealth,
    pub prediction: ComponentHealth,
}

/// Whether an upstream is usable, and where it points
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl ComponentHealth {
    fn from_target(target: Option<String>) -> Self {
        let status = if target.is_some() { "configured" } else { "missing" };
        Self {
            status: status.to_string(),
            target,
        }
    }
}

/// `GET /api/health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let generation = state.generation.as_ref().map(|c| c.model().to_string());
    let prediction = state.prediction.as_ref().map(|c| c.endpoint());

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        schema: state.normalizer.schema().fields().to_vec(),
        strict_validation: state.config.prediction.strict_validation,
        components: ComponentStatus {
            generation: ComponentHealth::from_target(generation),
            prediction: ComponentHealth::from_target(prediction),
        },
    })
}

/// `GET /metrics` in Prometheus text format
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
