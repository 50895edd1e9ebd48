//! AQI prediction service client

use pollutant_normalizer::PollutantReading;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::UpstreamError;

/// Message used when the service gives no usable detail
const FALLBACK_DETAIL: &str = "Prediction failed";

/// Prediction service settings
#[derive(Debug, Clone)]
pub struct PredictionConfig {
    /// Service root, e.g. `http://localhost:8000`
    pub base_url: String,
    /// Route appended to `base_url`
    pub path: String,
    /// Sent as a bearer token when set
    pub auth_token: Option<String>,
}

impl PredictionConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path: "/predict".to_string(),
            auth_token: None,
        }
    }

    /// Full URL of the prediction route
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

/// Client forwarding normalized readings to the prediction service
#[derive(Debug, Clone)]
pub struct PredictionClient {
    client: Client,
    config: PredictionConfig,
}

impl PredictionClient {
    pub fn new(client: Client, config: PredictionConfig) -> Self {
        Self { client, config }
    }

    pub fn endpoint(&self) -> String {
        self.config.endpoint()
    }

    /// Post a reading and return the service's JSON reply untouched
    pub async fn predict(&self, reading: &PollutantReading) -> Result<Value, UpstreamError> {
        let url = self.config.endpoint();
        debug!("Forwarding {} pollutant fields to {}", reading.len(), url);

        let mut request = self.client.post(&url).json(reading);
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let detail = extract_detail(&body);
            warn!("Prediction service returned {}: {}", status, detail);
            return Err(UpstreamError::Rejected { status, detail });
        }

        serde_json::from_slice(&body).map_err(|e| UpstreamError::InvalidBody(e.to_string()))
    }
}

/// Pull a message out of an error body (`detail`, then `error`)
fn extract_detail(body: &[u8]) -> String {
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return FALLBACK_DETAIL.to_string();
    };

    ["detail", "error"]
        .iter()
        .find_map(|key| match value.get(*key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        })
        .unwrap_or_else(|| FALLBACK_DETAIL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use pollutant_normalizer::{normalize, PollutantSchema};
    use serde_json::json;
    use std::time::Duration;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn reading() -> PollutantReading {
        normalize(&json!({"pm2_5": 35.2, "co": 1.1}), &PollutantSchema::canonical())
    }

    fn client(config: PredictionConfig) -> PredictionClient {
        PredictionClient::new(crate::http_client(Duration::from_secs(5)).unwrap(), config)
    }

    #[test]
    fn test_endpoint_joins_slashes() {
        let mut config = PredictionConfig::new("http://backend:8000/");
        assert_eq!(config.endpoint(), "http://backend:8000/predict");
        config.path = "test-predict".to_string();
        assert_eq!(config.endpoint(), "http://backend:8000/test-predict");
    }

    #[test]
    fn test_extract_detail() {
        assert_eq!(extract_detail(br#"{"detail": "Model not loaded"}"#), "Model not loaded");
        assert_eq!(extract_detail(br#"{"error": "boom"}"#), "boom");
        assert_eq!(
            extract_detail(br#"{"detail": [{"loc": ["body", "co"]}]}"#),
            r#"[{"loc":["body","co"]}]"#
        );
        assert_eq!(extract_detail(b"<html>502</html>"), FALLBACK_DETAIL);
        assert_eq!(extract_detail(br#"{"detail": null}"#), FALLBACK_DETAIL);
    }

    #[tokio::test]
    async fn test_predict_forwards_reading() {
        let router = Router::new().route(
            "/predict",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer secret");
                assert_eq!(body["pm2_5"], json!(35.2));
                assert_eq!(body["no"], json!(0.0));
                Json(json!({"aqi": 92.4, "category": "Moderate"}))
            }),
        );
        let base = serve(router).await;

        let mut config = PredictionConfig::new(base);
        config.auth_token = Some("secret".to_string());

        let result = client(config).predict(&reading()).await.unwrap();
        assert_eq!(result, json!({"aqi": 92.4, "category": "Moderate"}));
    }

    #[tokio::test]
    async fn test_rejection_keeps_status_and_detail() {
        let router = Router::new().route(
            "/predict",
            post(|| async {
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({"detail": "Prediction failed: bad shape"})),
                )
            }),
        );
        let base = serve(router).await;

        let err = client(PredictionConfig::new(base))
            .predict(&reading())
            .await
            .unwrap_err();
        match err {
            UpstreamError::Rejected { status, detail } => {
                assert_eq!(status.as_u16(), 422);
                assert_eq!(detail, "Prediction failed: bad shape");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_success_is_invalid_body() {
        let router = Router::new().route("/predict", post(|| async { "ok" }));
        let base = serve(router).await;

        let err = client(PredictionConfig::new(base))
            .predict(&reading())
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidBody(_)));
    }

    #[tokio::test]
    async fn test_slow_service_times_out() {
        let router = Router::new().route(
            "/predict",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"aqi": 1.0}))
            }),
        );
        let base = serve(router).await;

        let http = crate::http_client(Duration::from_millis(200)).unwrap();
        let err = PredictionClient::new(http, PredictionConfig::new(base))
            .predict(&reading())
            .await
            .unwrap_err();
        match err {
            UpstreamError::Http(e) => assert!(e.is_timeout()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reply_key_order_is_kept() {
        let router = Router::new().route(
            "/predict",
            post(|| async { r#"{"zeta": 1, "aqi": 2, "category": "Good"}"# }),
        );
        let base = serve(router).await;

        let result = client(PredictionConfig::new(base))
            .predict(&reading())
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"zeta":1,"aqi":2,"category":"Good"}"#
        );
    }

    #[tokio::test]
    async fn test_unreachable_service_is_http_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(PredictionConfig::new(format!("http://{}", addr)))
            .predict(&reading())
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Http(_)));
    }
}
