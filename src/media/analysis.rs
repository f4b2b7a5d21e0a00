//! Media authenticity analysis via a hosted multimodal model.
//!
//! Provides a provider-agnostic [`MediaAnalyzer`] trait and the
//! [`GeminiMediaAnalyzer`] implementation, which sends the media inline to
//! the Gemini `generateContent` endpoint with a strict response schema and
//! decodes the reply into an [`AnalysisResult`].
//!
//! Failures are logged with full detail and surfaced to callers as an
//! [`AnalysisError`] whose message is always [`ANALYSIS_FAILED_MESSAGE`].

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::ingest::MediaFile;
use super::prompt::{AnalysisRequest, MalformedPreview};
use crate::config::ModelConfig;

/// Default model for forensic analysis.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-pro-preview";

/// Default Gemini API base URL.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Reasoning budget requested from the model for every call.
pub const DEFAULT_THINKING_BUDGET: u32 = 4000;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on one full round-trip, including upload and reasoning.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// The only message a caller ever sees for a failed analysis.
pub const ANALYSIS_FAILED_MESSAGE: &str = "Failed to analyze the media. Please try again.";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Coarse category of a failed analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisErrorKind {
    Configuration,
    Transport,
    Timeout,
    Status,
    Decode,
    Schema,
    Cancelled,
}

impl fmt::Display for AnalysisErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnalysisErrorKind::Configuration => "configuration",
            AnalysisErrorKind::Transport => "transport",
            AnalysisErrorKind::Timeout => "timeout",
            AnalysisErrorKind::Status => "status",
            AnalysisErrorKind::Decode => "decode",
            AnalysisErrorKind::Schema => "schema",
            AnalysisErrorKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A failed analysis as seen by callers.
///
/// The underlying cause is only logged. The kind is kept so the CLI and the
/// HTTP surface can pick an exit code or status.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Failed to analyze the media. Please try again.")]
pub struct AnalysisError {
    kind: AnalysisErrorKind,
}

impl AnalysisError {
    pub fn new(kind: AnalysisErrorKind) -> Self {
        Self { kind }
    }

    pub fn cancelled() -> Self {
        Self::new(AnalysisErrorKind::Cancelled)
    }

    pub fn kind(&self) -> AnalysisErrorKind {
        self.kind
    }

    pub fn user_message(&self) -> &'static str {
        ANALYSIS_FAILED_MESSAGE
    }
}

/// Detailed cause of a failed analysis. Logged, never shown to users.
#[derive(Error, Debug)]
pub enum AnalysisFailure {
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    #[error(transparent)]
    MalformedPreview(#[from] MalformedPreview),

    #[error("API request failed: {0}")]
    ApiRequest(String),

    #[error("API request timed out: {0}")]
    Timeout(String),

    #[error("API response error: {status} {body}")]
    ApiResponse { status: u16, body: String },

    #[error("prompt blocked by provider: {0}")]
    Blocked(String),

    #[error("failed to parse API response: {0}")]
    ParseResponse(String),

    #[error("response does not match the declared schema: {0}")]
    SchemaViolation(String),
}

impl AnalysisFailure {
    pub fn kind(&self) -> AnalysisErrorKind {
        match self {
            AnalysisFailure::NotConfigured(_) => AnalysisErrorKind::Configuration,
            AnalysisFailure::MalformedPreview(_) => AnalysisErrorKind::Decode,
            AnalysisFailure::ApiRequest(_) => AnalysisErrorKind::Transport,
            AnalysisFailure::Timeout(_) => AnalysisErrorKind::Timeout,
            AnalysisFailure::ApiResponse { .. } | AnalysisFailure::Blocked(_) => {
                AnalysisErrorKind::Status
            }
            AnalysisFailure::ParseResponse(_) => AnalysisErrorKind::Decode,
            AnalysisFailure::SchemaViolation(_) => AnalysisErrorKind::Schema,
        }
    }
}

impl From<AnalysisFailure> for AnalysisError {
    fn from(failure: AnalysisFailure) -> Self {
        AnalysisError::new(failure.kind())
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Categorical authenticity judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Real,
    AiGenerated,
    Uncertain,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Real => "REAL",
            Verdict::AiGenerated => "AI_GENERATED",
            Verdict::Uncertain => "UNCERTAIN",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// One forensic observation cited by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisArtifact {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

/// Decoded model verdict.
///
/// Artifacts keep the order the model returned them in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub is_ai_generated: bool,
    /// Documented as 0 to 100. Kept as returned, never clamped.
    pub confidence_score: f64,
    pub summary: String,
    pub verdict: Verdict,
    pub artifacts: Vec<AnalysisArtifact>,
}

impl AnalysisResult {
    /// Strictly decode the model's JSON text.
    ///
    /// Missing required fields, wrong JSON types, and values outside the
    /// declared enums are rejected. Unknown extra fields are ignored.
    pub fn from_model_json(text: &str) -> Result<Self, AnalysisFailure> {
        let value: Value = serde_json::from_str(text.trim())
            .map_err(|e| AnalysisFailure::ParseResponse(format!("model output is not JSON: {e}")))?;
        if !value.is_object() {
            return Err(AnalysisFailure::SchemaViolation(
                "expected a JSON object at the top level".to_string(),
            ));
        }
        serde_json::from_value(value).map_err(|e| AnalysisFailure::SchemaViolation(e.to_string()))
    }

    /// Whether `verdict` and `is_ai_generated` agree.
    ///
    /// `UNCERTAIN` agrees with either flag value.
    pub fn is_consistent(&self) -> bool {
        match self.verdict {
            Verdict::Real => !self.is_ai_generated,
            Verdict::AiGenerated => self.is_ai_generated,
            Verdict::Uncertain => true,
        }
    }

    pub fn confidence_in_range(&self) -> bool {
        (0.0..=100.0).contains(&self.confidence_score)
    }
}

// ---------------------------------------------------------------------------
// Analyzer trait
// ---------------------------------------------------------------------------

/// Provider-agnostic interface for media authenticity analysis.
#[async_trait]
pub trait MediaAnalyzer: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &str;

    /// Run one analysis round-trip for `media`.
    ///
    /// No caching: every call reaches the provider.
    async fn analyze(&self, media: &MediaFile) -> Result<AnalysisResult, AnalysisError>;
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

/// Gemini `generateContent` analyzer.
///
/// Sends the media as an `inlineData` part next to the forensic prompt and
/// asks for `application/json` output constrained by
/// [`response_schema`](super::prompt::response_schema).
pub struct GeminiMediaAnalyzer {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    thinking_budget: u32,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl GeminiMediaAnalyzer {
    /// Create a new Gemini analyzer.
    ///
    /// # Arguments
    /// * `api_key` - Gemini API key
    pub fn new(api_key: String) -> Result<Self, AnalysisFailure> {
        if api_key.trim().is_empty() {
            return Err(AnalysisFailure::NotConfigured(
                "Gemini API key must not be empty".to_string(),
            ));
        }
        let client = build_client(DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            thinking_budget: DEFAULT_THINKING_BUDGET,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Build an analyzer from resolved model configuration.
    ///
    /// Fails with [`AnalysisFailure::NotConfigured`] when no API key is set.
    pub fn from_config(config: &ModelConfig) -> Result<Self, AnalysisFailure> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            AnalysisFailure::NotConfigured(
                "no API key; set API_KEY, GEMINI_API_KEY or GOOGLE_API_KEY".to_string(),
            )
        })?;
        Self::new(api_key)?
            .with_base_url(config.base_url.clone())
            .with_model(config.model.clone())
            .with_thinking_budget(config.thinking_budget)
            .with_timeouts(
                Duration::from_secs(config.connect_timeout_secs),
                Duration::from_secs(config.request_timeout_secs),
            )
    }

    /// Set a custom base URL (e.g., for proxy or testing).
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = budget;
        self
    }

    /// Replace the connect and total request deadlines.
    pub fn with_timeouts(
        mut self,
        connect: Duration,
        request: Duration,
    ) -> Result<Self, AnalysisFailure> {
        self.client = build_client(connect, request)?;
        self.connect_timeout = connect;
        self.request_timeout = request;
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn thinking_budget(&self) -> u32 {
        self.thinking_budget
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    async fn request_analysis(&self, media: &MediaFile) -> Result<AnalysisResult, AnalysisFailure> {
        let request = AnalysisRequest::from_media(media)?;
        let body = request.to_generate_content_body(self.thinking_budget);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_failure(e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable>".to_string());
            return Err(AnalysisFailure::ApiResponse {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let resp_body: Value = response
            .json()
            .await
            .map_err(|e| AnalysisFailure::ParseResponse(format!("failed to read JSON: {e}")))?;

        let text = extract_gemini_text(&resp_body)?;
        AnalysisResult::from_model_json(&text)
    }

    fn transport_failure(&self, err: reqwest::Error) -> AnalysisFailure {
        if err.is_timeout() {
            AnalysisFailure::Timeout(format!(
                "no response within {:?} (connect timeout {:?}): {err}",
                self.request_timeout, self.connect_timeout
            ))
        } else {
            AnalysisFailure::ApiRequest(format!("HTTP request failed: {err}"))
        }
    }
}

#[async_trait]
impl MediaAnalyzer for GeminiMediaAnalyzer {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn analyze(&self, media: &MediaFile) -> Result<AnalysisResult, AnalysisError> {
        let started = Instant::now();
        match self.request_analysis(media).await {
            Ok(result) => {
                if !result.confidence_in_range() {
                    tracing::warn!(
                        confidence = result.confidence_score,
                        "Model returned a confidence score outside 0-100; keeping it as-is"
                    );
                }
                if !result.is_consistent() {
                    tracing::warn!(
                        verdict = %result.verdict,
                        is_ai_generated = result.is_ai_generated,
                        "Model verdict disagrees with isAiGenerated; both kept as returned"
                    );
                }
                tracing::info!(
                    provider = "gemini",
                    model = %self.model,
                    kind = %media.kind(),
                    sha256 = %media.sha256(),
                    verdict = %result.verdict,
                    artifacts = result.artifacts.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Media analysis complete"
                );
                Ok(result)
            }
            Err(failure) => {
                tracing::error!(
                    provider = "gemini",
                    model = %self.model,
                    kind = %media.kind(),
                    sha256 = %media.sha256(),
                    error_kind = %failure.kind(),
                    error = %failure,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Gemini analysis error"
                );
                Err(failure.into())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build_client(connect: Duration, request: Duration) -> Result<reqwest::Client, AnalysisFailure> {
    reqwest::Client::builder()
        .connect_timeout(connect)
        .timeout(request)
        .build()
        .map_err(|e| AnalysisFailure::NotConfigured(format!("failed to build HTTP client: {e}")))
}

/// Extract the model's answer text from a `generateContent` response.
///
/// Text parts of the first candidate are concatenated; parts flagged as
/// `thought` are skipped.
fn extract_gemini_text(response: &Value) -> Result<String, AnalysisFailure> {
    if let Some(reason) = response
        .pointer("/promptFeedback/blockReason")
        .and_then(|v| v.as_str())
    {
        return Err(AnalysisFailure::Blocked(reason.to_string()));
    }

    let candidates = response
        .get("candidates")
        .and_then(|c| c.as_array())
        .ok_or_else(|| {
            AnalysisFailure::ParseResponse("response missing 'candidates' array".to_string())
        })?;

    let first = candidates.first().ok_or_else(|| {
        AnalysisFailure::ParseResponse("no candidates in Gemini response".to_string())
    })?;

    let parts = first
        .pointer("/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            let reason = first
                .get("finishReason")
                .and_then(|r| r.as_str())
                .unwrap_or("unknown");
            AnalysisFailure::ParseResponse(format!(
                "candidate has no content parts (finishReason: {reason})"
            ))
        })?;

    let text: String = parts
        .iter()
        .filter(|p| !p.get("thought").and_then(|t| t.as_bool()).unwrap_or(false))
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.trim().is_empty() {
        return Err(AnalysisFailure::ParseResponse(
            "no text content in Gemini response".to_string(),
        ));
    }
    Ok(text)
}
