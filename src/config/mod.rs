//! Configuration loading
//!
//! Configuration is resolved in three layers, later layers winning:
//!
//! 1. defaults ([`Config::default`])
//! 2. an optional JSON5 file (`--config`, `$VERISIGHT_CONFIG`, or
//!    `<config dir>/verisight/config.json5`)
//! 3. environment variables (see [`apply_env_overrides`])

pub mod types;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use types::{Config, ModelConfig, ServerConfig};

use crate::logging::LogFormat;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "VERISIGHT_CONFIG";

/// Environment variables checked for the API key, in order.
pub const API_KEY_ENV_VARS: &[&str] = &["API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: String, value: String },
}

/// Resolve the config file path.
pub fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("verisight")
        .join("config.json5")
}

/// Load configuration from disk and the process environment.
///
/// An explicit `path` must exist. The default path is optional.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => load_config_file(p)?,
        None => {
            let default_path = get_config_path();
            if default_path.exists() {
                load_config_file(&default_path)?
            } else {
                Config::default()
            }
        }
    };
    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    Ok(config)
}

/// Parse a JSON5 config file.
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    json5::from_str(&raw).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Overlay environment variables onto `config`.
///
/// `lookup` abstracts the environment so tests do not touch process state.
///
/// | variable | field |
/// |---|---|
/// | `API_KEY`, `GEMINI_API_KEY`, `GOOGLE_API_KEY` | `model.apiKey` |
/// | `GOOGLE_API_BASE_URL` | `model.baseUrl` |
/// | `VERISIGHT_MODEL` | `model.model` |
/// | `VERISIGHT_THINKING_BUDGET` | `model.thinkingBudget` |
/// | `VERISIGHT_REQUEST_TIMEOUT_SECS` | `model.requestTimeoutSecs` |
/// | `VERISIGHT_HOST`, `VERISIGHT_PORT` | `server.*` |
/// | `VERISIGHT_LOG_LEVEL`, `VERISIGHT_LOG_FORMAT` | `logging.*` |
pub fn apply_env_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    if let Some(key) = API_KEY_ENV_VARS.iter().find_map(|&var| get(var)) {
        config.model.api_key = Some(key);
    }
    if let Some(url) = get("GOOGLE_API_BASE_URL") {
        config.model.base_url = url;
    }
    if let Some(model) = get("VERISIGHT_MODEL") {
        config.model.model = model;
    }
    if let Some(raw) = get("VERISIGHT_THINKING_BUDGET") {
        config.model.thinking_budget = parse_env("VERISIGHT_THINKING_BUDGET", &raw)?;
    }
    if let Some(raw) = get("VERISIGHT_REQUEST_TIMEOUT_SECS") {
        config.model.request_timeout_secs = parse_env("VERISIGHT_REQUEST_TIMEOUT_SECS", &raw)?;
    }
    if let Some(host) = get("VERISIGHT_HOST") {
        config.server.host = host;
    }
    if let Some(raw) = get("VERISIGHT_PORT") {
        config.server.port = parse_env("VERISIGHT_PORT", &raw)?;
    }
    if let Some(level) = get("VERISIGHT_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(raw) = get("VERISIGHT_LOG_FORMAT") {
        config.logging.format = match raw.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "text" => LogFormat::Text,
            _ => {
                return Err(ConfigError::InvalidEnv {
                    var: "VERISIGHT_LOG_FORMAT".to_string(),
                    value: raw,
                })
            }
        };
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(var: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: raw.to_string(),
    })
}
