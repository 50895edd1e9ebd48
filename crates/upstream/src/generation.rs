//! Gemini pollutant generation client

use pollutant_normalizer::PollutantSchema;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::UpstreamError;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Generation service settings
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// API root, without the `/models/...` suffix
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Reply length cap
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: GEMINI_API_BASE.to_string(),
            model: "gemini-2.5-flash-lite".to_string(),
            temperature: 0.2,
            max_output_tokens: 150,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationParams,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationParams {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate, or empty
    fn into_text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .unwrap_or_default()
    }
}

/// Prompt asking for one JSON object with exactly the schema's fields
pub fn build_prompt(city: &str, schema: &PollutantSchema) -> String {
    let fields = schema.fields().join(", ");
    let template = schema
        .fields()
        .iter()
        .map(|f| format!("\"{}\": number", f))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Generate synthetic air quality pollutant data for the city \"{}\".\n\
         Include numerical values for: {}.\n\
         Return only pure JSON (no markdown, no code blocks) in this format:\n\
         {{{}}}",
        city, fields, template
    )
}

/// Remove markdown code fence markers and surrounding whitespace
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Client for Gemini `generateContent`
#[derive(Debug, Clone)]
pub struct GenerationClient {
    client: Client,
    api_key: String,
    config: GenerationConfig,
}

impl GenerationClient {
    pub fn new(client: Client, api_key: impl Into<String>, config: GenerationConfig) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send a prompt and return the raw reply text
    pub async fn generate_text(&self, prompt: &str) -> Result<String, UpstreamError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationParams {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Gemini API error: {} - {}", status, body);
            return Err(UpstreamError::Status { status, body });
        }

        let reply: GenerateContentResponse = response.json().await?;
        Ok(reply.into_text())
    }

    /// Ask for pollutant values for `city` and parse the reply as JSON
    ///
    /// The returned value is not normalized.
    pub async fn generate_pollutants(
        &self,
        city: &str,
        schema: &PollutantSchema,
    ) -> Result<Value, UpstreamError> {
        info!("Requesting pollutant data for {} from {}", city, self.config.model);

        let text = self.generate_text(&build_prompt(city, schema)).await?;
        let cleaned = strip_code_fences(&text);
        debug!("Cleaned generated text: {}", cleaned);

        serde_json::from_str(&cleaned).map_err(|e| {
            warn!("Could not parse generated JSON: {}", e);
            UpstreamError::UnparsableReply { raw: cleaned }
        })
    }
}
