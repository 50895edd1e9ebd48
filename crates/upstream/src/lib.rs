//! Upstream Service Clients
//!
//! Clients for the two external collaborators of the gateway:
//! - Gemini `generateContent`, prompted to synthesize pollutant readings
//! - The AQI prediction service, fed normalized readings
//!
//! Neither client retries. Both honour the timeout of the shared
//! [`reqwest::Client`] they are built from.

mod generation;
mod prediction;

pub use generation::{build_prompt, strip_code_fences, GenerationClient, GenerationConfig};
pub use prediction::{PredictionClient, PredictionConfig};

use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Upstream call errors
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Transport failure, timeout, or unreadable body
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generation service answered with a non-success status
    #[error("Upstream returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// Generated text was not JSON, even after stripping code fences
    #[error("Could not parse generated reply as JSON")]
    UnparsableReply { raw: String },

    /// Prediction service refused the reading
    #[error("Prediction rejected with {status}: {detail}")]
    Rejected { status: StatusCode, detail: String },

    /// Success status but the body was not JSON
    #[error("Invalid response body: {0}")]
    InvalidBody(String),
}

/// Build the HTTP client shared by both upstream clients
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, UpstreamError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("aqi-gateway/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}
