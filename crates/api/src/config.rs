//! Gateway configuration
//!
//! Loaded once at startup from an optional file and `AQI_*` environment
//! variables, then shared read-only with every handler through `AppState`.
//! Nested keys use `__` in the environment, e.g.
//! `AQI_PREDICTION__BASE_URL=http://localhost:8000`.

use config::{Config, ConfigError, Environment, File};
use pollutant_normalizer::PollutantSchema;
use serde::Deserialize;
use std::time::Duration;
use upstream::{GenerationConfig, PredictionConfig};

use crate::rate_limit::RateLimitConfig;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub generation: GenerationSettings,
    pub prediction: PredictionSettings,
    pub logging: LoggingConfig,
    pub upstream: UpstreamSettings,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind
    pub bind_address: String,
    /// Origins allowed by CORS (`*` for any)
    pub cors_origins: Vec<String>,
    /// Per-IP limits on the `/api` routes
    pub rate_limit: RateLimitConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Pollutant generation (Gemini) settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Required by `/api/fetchdata`
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        let defaults = GenerationConfig::default();
        Self {
            api_key: None,
            base_url: defaults.base_url,
            model: defaults.model,
            temperature: defaults.temperature,
            max_output_tokens: defaults.max_output_tokens,
        }
    }
}

impl GenerationSettings {
    /// API key, treating a blank value as unset
    pub fn api_key(&self) -> Option<&str> {
        non_blank(self.api_key.as_deref())
    }

    pub fn client_config(&self) -> GenerationConfig {
        GenerationConfig {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        }
    }
}

/// Prediction service settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PredictionSettings {
    /// Required by `/api/predict`
    pub base_url: Option<String>,
    /// Route on the prediction service
    pub path: String,
    /// Optional bearer token
    pub auth_token: Option<String>,
    /// Fields forwarded to the model, in order
    pub schema: PollutantSchema,
    /// Reject readings that would need zero-filling
    pub strict_validation: bool,
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            path: "/predict".to_string(),
            auth_token: None,
            schema: PollutantSchema::canonical(),
            strict_validation: false,
        }
    }
}

impl PredictionSettings {
    /// Client config, or `None` when no base URL is set
    pub fn client_config(&self) -> Option<PredictionConfig> {
        let base_url = non_blank(self.base_url.as_deref())?;
        Some(PredictionConfig {
            base_url: base_url.to_string(),
            path: self.path.clone(),
            auth_token: non_blank(self.auth_token.as_deref()).map(str::to_string),
        })
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Outbound HTTP settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamSettings {
    /// Whole-request timeout for each upstream call
    pub timeout_secs: u64,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl UpstreamSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Load from an optional file, then `AQI_*` environment variables
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("AQI")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("prediction.schema")
                    .with_list_parse_key("server.cors_origins"),
            )
            .build()?;

        Self::from_config(config)
    }

    /// Deserialize and check an already-built [`Config`]
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let app: AppConfig = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.server.rate_limit;
        if limits.enabled && (limits.per_second == 0 || limits.burst_size == 0) {
            return Err(ConfigError::Message(
                "server.rate_limit.per_second and burst_size must be positive".to_string(),
            ));
        }
        if self.upstream.timeout_secs == 0 {
            return Err(ConfigError::Message(
                "upstream.timeout_secs must be positive".to_string(),
            ));
        }
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::Message(format!(
                "unknown logging.level: {}",
                self.logging.level
            )));
        }
        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
