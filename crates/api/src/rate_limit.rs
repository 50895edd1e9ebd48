//! Rate Limiting Middleware using GCRA Algorithm
//!
//! Limits the proxy routes per client IP with tower_governor. Every
//! request that gets through costs two upstream calls, so the limits are
//! deliberately tight.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use governor::middleware::StateInformationMiddleware;
use serde::Deserialize;
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{GovernorError, GovernorLayer};
use tracing::warn;

use crate::error::{ApiError, ErrorBody};

/// Governor config keyed by peer IP, reporting quota in `X-RateLimit-*` headers
pub type DefaultGovernorConfig =
    tower_governor::governor::GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>;

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Turn the limiter off entirely
    pub enabled: bool,
    /// Seconds between replenished requests
    pub per_second: u64,
    /// Burst size (max requests that can be made immediately)
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_second: 2,
            burst_size: 5,
        }
    }
}

/// Build the governor config, or `None` if the limits are zero
pub fn create_governor_config(config: &RateLimitConfig) -> Option<Arc<DefaultGovernorConfig>> {
    GovernorConfigBuilder::default()
        .per_second(config.per_second)
        .burst_size(config.burst_size)
        .use_headers()
        .error_handler(error_response)
        .finish()
        .map(Arc::new)
}

/// Render limiter failures with the JSON error body, keeping quota headers
fn error_response(err: GovernorError) -> Response {
    match err {
        GovernorError::TooManyRequests { wait_time, headers } => {
            let mut response = ApiError::RateLimited { wait_time }.into_response();
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
        GovernorError::UnableToExtractKey => {
            warn!("Rate limiter could not determine the client address");
            ApiError::Config("Unable to determine client address").into_response()
        }
        GovernorError::Other { code, msg, headers } => {
            let body = ErrorBody::new(msg.unwrap_or_else(|| "Rate limiter error".to_string()));
            let mut response = (code, Json(body)).into_response();
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
    }
}

/// Layer limiting requests per peer IP.
///
/// The server must be run with
/// `into_make_service_with_connect_info::<SocketAddr>()` for the IP to be
/// known.
pub fn governor_layer(
    config: &RateLimitConfig,
) -> Option<GovernorLayer<PeerIpKeyExtractor, StateInformationMiddleware>> {
    create_governor_config(config).map(|config| GovernorLayer { config })
}
