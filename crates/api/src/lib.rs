//! AQI Gateway API Server
//!
//! HTTP routes used by the browser UI. Each route proxies to the pollutant
//! generation service and/or the AQI prediction service, normalizing
//! pollutant payloads on the way through.

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use pollutant_normalizer::{Normalizer, PollutantReading};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use upstream::{GenerationClient, PredictionClient, UpstreamError};

pub mod config;
pub mod error;
pub mod rate_limit;
mod routes;

pub use config::AppConfig;
pub use error::ApiError;

use config::LoggingConfig;

/// Application state shared across handlers
pub struct AppState {
    /// Loaded configuration
    pub config: AppConfig,
    /// Normalizer bound to the configured schema
    pub normalizer: Normalizer,
    /// Present when a generation API key is configured
    pub generation: Option<GenerationClient>,
    /// Present when a prediction base URL is configured
    pub prediction: Option<PredictionClient>,
    /// Prometheus handle backing `/metrics`
    pub metrics: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Build state and upstream clients from configuration
    pub fn new(config: AppConfig) -> Result<Self, UpstreamError> {
        let http = upstream::http_client(config.upstream.timeout())?;

        let generation = match config.generation.api_key() {
            Some(key) => Some(GenerationClient::new(
                http.clone(),
                key,
                config.generation.client_config(),
            )),
            None => {
                warn!("No generation API key configured; /api/fetchdata will fail");
                None
            }
        };

        let prediction = match config.prediction.client_config() {
            Some(client_config) => Some(PredictionClient::new(http, client_config)),
            None => {
                warn!("No prediction base URL configured; /api/predict will fail");
                None
            }
        };

        Ok(Self {
            normalizer: Normalizer::new(config.prediction.schema.clone()),
            config,
            generation,
            prediction,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        })
    }

    /// Attach a Prometheus handle for `/metrics`
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Zero-filling normalization, logging whatever had to be coerced
    pub fn normalize_logged(&self, input: &Value) -> PollutantReading {
        let (reading, coercions) = self.normalizer.normalize_with_report(input);
        if !coercions.is_empty() {
            metrics::counter!("aqi_coerced_fields_total").increment(coercions.len() as u64);
            for coercion in &coercions {
                debug!("Coerced {}", coercion);
            }
            warn!(
                "Coerced {} of {} pollutant fields",
                coercions.len(),
                reading.len()
            );
        }
        reading
    }

    /// Normalize an inbound reading, strictly if configured
    pub fn sanitize(&self, input: &Value) -> Result<PollutantReading, ApiError> {
        if self.config.prediction.strict_validation {
            Ok(self.normalizer.validate_strict(input)?)
        } else {
            Ok(self.normalize_logged(input))
        }
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut api = Router::new()
        .route("/api/fetchdata", get(routes::fetchdata::fetch_data))
        .route("/api/predict", post(routes::predict::predict));

    let limits = &state.config.server.rate_limit;
    if limits.enabled {
        match rate_limit::governor_layer(limits) {
            Some(layer) => api = api.layer(layer),
            None => warn!("Invalid rate limit settings; rate limiting disabled"),
        }
    }

    Router::new()
        .merge(api)
        .route("/api/health", get(routes::health::health))
        .route("/metrics", get(routes::health::metrics))
        .layer(cors_layer(&state.config.server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        }))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

/// Initialize logging
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let level = config.level.parse::<Level>().unwrap_or(Level::INFO);

    if config.json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    }
}

/// Install the global Prometheus recorder
pub fn install_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Run the server until Ctrl-C
pub async fn run_server(state: AppState) -> std::io::Result<()> {
    let addr = state.config.server.bind_address.clone();
    let app = create_router(Arc::new(state));

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
