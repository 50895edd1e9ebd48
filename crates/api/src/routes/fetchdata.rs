//! Pollutant Data Route

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use pollutant_normalizer::PollutantReading;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use super::predict::forward_prediction;
use crate::{error::ApiError, AppState};

/// Query parameters for the fetchdata endpoint
#[derive(Debug, Deserialize)]
pub struct FetchQuery {
    /// City to generate readings for
    pub city: Option<String>,
    /// Also run the reading through the prediction service
    #[serde(default)]
    pub predict: bool,
}

/// Response for the fetchdata endpoint
#[derive(Debug, Serialize)]
pub struct FetchResponse {
    pub city: String,
    pub pollutants: PollutantReading,
    #[serde(rename = "predictedAQI", skip_serializing_if = "Option::is_none")]
    pub predicted_aqi: Option<Value>,
}

/// `GET /api/fetchdata?city=<name>[&predict=true]`
pub async fn fetch_data(
    State(state): State<Arc<AppState>>,
    query: Result<Query<FetchQuery>, QueryRejection>,
) -> Result<Json<FetchResponse>, ApiError> {
    metrics::counter!("aqi_requests_total", "route" => "fetchdata").increment(1);

    let Query(params) =
        query.map_err(|e| ApiError::BadRequest(format!("Invalid query: {}", e.body_text())))?;

    let city = params
        .city
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("City name is required".to_string()))?
        .to_string();

    let client = state
        .generation
        .as_ref()
        .ok_or(ApiError::Config("Generation API key is not configured"))?;

    let started = Instant::now();
    let generated = client
        .generate_pollutants(&city, state.normalizer.schema())
        .await;
    metrics::histogram!("aqi_upstream_latency_seconds", "upstream" => "generation")
        .record(started.elapsed().as_secs_f64());

    let generated = generated.map_err(|e| {
        warn!("Pollutant generation for {} failed: {}", city, e);
        metrics::counter!("aqi_upstream_errors_total", "upstream" => "generation").increment(1);
        ApiError::Generation(e)
    })?;

    let pollutants = state.normalize_logged(&generated);

    let predicted_aqi = if params.predict {
        Some(forward_prediction(&state, &pollutants).await?)
    } else {
        None
    };

    Ok(Json(FetchResponse {
        city,
        pollutants,
        predicted_aqi,
    }))
}
