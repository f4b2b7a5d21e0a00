//! Typed configuration structures
//!
//! Every section has defaults, so an empty file (or no file at all) yields a
//! working configuration apart from the API key.

use serde::{Deserialize, Serialize};

use crate::logging::LoggingConfig;
use crate::media::analysis::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_THINKING_BUDGET,
};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8790;

/// Largest upload accepted by the HTTP surface.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Hosted model settings
    pub model: ModelConfig,

    /// HTTP surface settings
    pub server: ServerConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Hosted model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelConfig {
    /// API key; usually supplied through the environment instead
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    pub base_url: String,

    /// Model id passed to `generateContent`
    pub model: String,

    /// Reasoning budget requested on every call
    pub thinking_budget: u32,

    pub connect_timeout_secs: u64,

    /// Deadline for one complete analysis round-trip
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            thinking_budget: DEFAULT_THINKING_BUDGET,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

/// HTTP surface configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.model.model, "gemini-3-pro-preview");
        assert_eq!(config.model.thinking_budget, 4000);
        assert!(config.model.api_key.is_none());
        assert_eq!(config.server.port, DEFAULT_PORT);
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"model": {"model": "gemini-2.5-pro"}}"#).unwrap();
        assert_eq!(config.model.model, "gemini-2.5-pro");
        assert_eq!(config.model.base_url, DEFAULT_GEMINI_BASE_URL);
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_api_key_omitted_when_unset() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert!(json["model"].get("apiKey").is_none());
        assert_eq!(json["model"]["thinkingBudget"], 4000);
    }
}
