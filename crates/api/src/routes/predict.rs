//! Prediction Route

use axum::{body::Bytes, extract::State, Json};
use pollutant_normalizer::PollutantReading;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::{error::ApiError, AppState};

/// `POST /api/predict`
///
/// Accepts a reading either flat or nested under `pollutants`, normalizes it
/// and returns the prediction service's reply unchanged.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    metrics::counter!("aqi_requests_total", "route" => "predict").increment(1);

    let input: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?;

    let reading = state.sanitize(&input)?;
    let result = forward_prediction(&state, &reading).await?;

    Ok(Json(result))
}

/// Send a reading to the prediction service, recording latency
pub(crate) async fn forward_prediction(
    state: &AppState,
    reading: &PollutantReading,
) -> Result<Value, ApiError> {
    let client = state
        .prediction
        .as_ref()
        .ok_or(ApiError::Config("Prediction backend URL is not configured"))?;

    let started = Instant::now();
    let result = client.predict(reading).await;
    metrics::histogram!("aqi_upstream_latency_seconds", "upstream" => "prediction")
        .record(started.elapsed().as_secs_f64());

    match result {
        Ok(value) => {
            info!("Prediction from {} in {:?}", client.endpoint(), started.elapsed());
            Ok(value)
        }
        Err(e) => {
            warn!("Prediction call to {} failed: {}", client.endpoint(), e);
            metrics::counter!("aqi_upstream_errors_total", "upstream" => "prediction")
                .increment(1);
            Err(ApiError::Prediction(e))
        }
    }
}
