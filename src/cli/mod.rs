//! CLI subcommand definitions and handlers.
//!
//! Uses clap derive to define the subcommand hierarchy:
//! - `analyze <FILE>` -- analyze one file and print the verdict
//! - `serve` -- run the single-session HTTP surface
//! - `schema` -- print the response schema sent to the model
//! - `prompt <KIND>` -- print the forensic instructions for a media kind
//! - `config show|path` -- inspect configuration
//! - `version` -- print build/version info

pub mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use thiserror::Error;

use crate::config::{self, Config, ConfigError};
use crate::logging::init_logging;
use crate::media::prompt::instruction_text;
use crate::media::{
    ingest_path, response_schema, AnalysisFailure, GeminiMediaAnalyzer, IngestError, MediaKind,
};
use crate::session::{Session, SessionError, SessionState};

/// Forensic authenticity analysis for images, video, and audio.
#[derive(Parser, Debug)]
#[command(
    name = "verisight",
    version = env!("CARGO_PKG_VERSION"),
    about = "VeriSight: is this image, video or audio clip AI-generated?"
)]
pub struct Cli {
    /// Path to a JSON5 configuration file.
    #[arg(long, global = true, env = "VERISIGHT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze a single media file.
    Analyze {
        /// File to analyze.
        path: PathBuf,

        /// Declared MIME type (default: guessed from the file extension).
        #[arg(long)]
        mime: Option<String>,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Model id override.
        #[arg(long)]
        model: Option<String>,
    },

    /// Serve the single-session HTTP interface.
    Serve {
        /// Bind address (default: from config or 127.0.0.1).
        #[arg(long)]
        host: Option<String>,

        /// Port (default: from config or 8790).
        #[arg(short, long)]
        port: Option<u16>,

        /// Model id override.
        #[arg(long)]
        model: Option<String>,
    },

    /// Print the JSON response schema sent with every request.
    Schema,

    /// Print the instruction text used for a media kind.
    Prompt {
        /// One of: image, video, audio.
        kind: MediaKind,
    },

    /// Inspect configuration.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Print version, build date, and git commit information.
    Version,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the fully loaded configuration (secrets redacted) as JSON.
    Show,

    /// Print the resolved configuration file path.
    Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Failure of an `analyze` or `serve` run, carrying its exit code.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0}")]
    NotConfigured(String),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Analysis(#[from] SessionError),

    #[error("server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    /// 1 for analysis and runtime failures, 2 for input or configuration problems.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::NotConfigured(_) | CliError::Ingest(_) => 2,
            CliError::Analysis(_) | CliError::Server(_) | CliError::Output(_) => 1,
        }
    }
}

impl From<AnalysisFailure> for CliError {
    fn from(failure: AnalysisFailure) -> Self {
        CliError::NotConfigured(failure.to_string())
    }
}

/// Dispatch a parsed command line and return the process exit code.
pub async fn run(cli: Cli) -> i32 {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Analyze {
            path,
            mime,
            format,
            model,
        } => {
            let outcome = match prepare(config_path) {
                Ok(mut cfg) => {
                    if let Some(model) = model {
                        cfg.model.model = model;
                    }
                    handle_analyze(&cfg, &path, mime.as_deref(), format).await
                }
                Err(e) => Err(e.into()),
            };
            exit_code_for(outcome)
        }
        Command::Serve { host, port, model } => {
            let outcome = match prepare(config_path) {
                Ok(mut cfg) => {
                    if let Some(host) = host {
                        cfg.server.host = host;
                    }
                    if let Some(port) = port {
                        cfg.server.port = port;
                    }
                    if let Some(model) = model {
                        cfg.model.model = model;
                    }
                    handle_serve(&cfg).await
                }
                Err(e) => Err(e.into()),
            };
            exit_code_for(outcome)
        }
        Command::Schema => report(handle_schema()),
        Command::Prompt { kind } => {
            handle_prompt(kind);
            0
        }
        Command::Config(ConfigCommand::Show) => report(handle_config_show(config_path)),
        Command::Config(ConfigCommand::Path) => {
            handle_config_path(config_path);
            0
        }
        Command::Version => {
            handle_version();
            0
        }
    }
}

fn exit_code_for(outcome: Result<(), CliError>) -> i32 {
    match outcome {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn report(outcome: Result<(), Box<dyn std::error::Error>>) -> i32 {
    match outcome {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            2
        }
    }
}

/// Load configuration and install the logger.
fn prepare(config_path: Option<&Path>) -> Result<Config, ConfigError> {
    let cfg = config::load_config(config_path)?;
    if let Err(e) = init_logging(&cfg.logging) {
        eprintln!("Warning: logging disabled: {}", e);
    }
    Ok(cfg)
}

// ---------------------------------------------------------------------------
// Subcommand handlers
// ---------------------------------------------------------------------------

/// Secrets that should be redacted when printing config.
const SECRET_KEYS: &[&str] = &["apiKey", "apikey", "api_key", "token", "secret", "password"];

/// Run the `analyze` subcommand.
///
/// Ctrl-C while waiting on the model resets the session, which cancels the
/// request and exits with the analysis failure code.
pub async fn handle_analyze(
    cfg: &Config,
    path: &Path,
    mime: Option<&str>,
    format: OutputFormat,
) -> Result<(), CliError> {
    let analyzer = GeminiMediaAnalyzer::from_config(&cfg.model)?;

    let media = match ingest_path(path, mime).await {
        Ok(media) => media,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Media ingestion failed");
            return Err(e.into());
        }
    };

    let session = Session::new();

    let submit = session.submit(media, &analyzer);
    tokio::pin!(submit);
    tokio::select! {
        res = &mut submit => { res?; }
        Ok(()) = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted; cancelling analysis");
            session.reset();
            submit.await?;
        }
    }

    let SessionState::Ready { media, result } = session.state() else {
        return Err(SessionError::Cancelled.into());
    };
    let output = match format {
        OutputFormat::Text => render::render_text(&media, &result),
        OutputFormat::Json => render::render_json(&media, &result)?,
    };
    println!("{}", output.trim_end());
    Ok(())
}

/// Run the `serve` subcommand.
pub async fn handle_serve(cfg: &Config) -> Result<(), CliError> {
    let analyzer = GeminiMediaAnalyzer::from_config(&cfg.model)?;
    crate::server::serve(&cfg.server, Arc::new(analyzer)).await?;
    Ok(())
}

/// Run the `schema` subcommand.
pub fn handle_schema() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(&response_schema())?);
    Ok(())
}

/// Run the `prompt <kind>` subcommand.
pub fn handle_prompt(kind: MediaKind) {
    println!("{}", instruction_text(kind));
}

/// Run the `config show` subcommand.
pub fn handle_config_show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::load_config(config_path)?;
    let redacted = redact_secrets(serde_json::to_value(&cfg)?);
    let pretty = serde_json::to_string_pretty(&redacted)?;
    println!("{}", pretty);
    Ok(())
}

/// Run the `config path` subcommand.
pub fn handle_config_path(config_path: Option<&Path>) {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::get_config_path);
    println!("{}", path.display());
}

/// Run the `version` subcommand.
pub fn handle_version() {
    println!("verisight {}", env!("CARGO_PKG_VERSION"));
    println!("  Build date: {}", env!("VERISIGHT_BUILD_DATE"));
    println!("  Git commit: {}", env!("VERISIGHT_GIT_HASH"));
    println!(
        "  Platform:   {} ({})",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Redact known secret keys in a JSON value (recursive).
fn redact_secrets(mut value: Value) -> Value {
    match &mut value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                let lower = key.to_lowercase();
                if SECRET_KEYS.iter().any(|s| lower.contains(&s.to_lowercase())) {
                    *child = Value::String("[REDACTED]".to_string());
                } else {
                    *child = redact_secrets(child.take());
                }
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                *item = redact_secrets(item.take());
            }
        }
        _ => {}
    }
    value
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["verisight"]).is_err());
    }

    #[test]
    fn test_cli_analyze_defaults() {
        let cli = Cli::try_parse_from(["verisight", "analyze", "photo.png"]).unwrap();
        match cli.command {
            Command::Analyze {
                ref path,
                ref mime,
                format,
                ref model,
            } => {
                assert_eq!(path, &PathBuf::from("photo.png"));
                assert!(mime.is_none());
                assert_eq!(format, OutputFormat::Text);
                assert!(model.is_none());
            }
            other => panic!("Expected Analyze, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_analyze_with_flags() {
        let cli = Cli::try_parse_from([
            "verisight",
            "analyze",
            "clip.bin",
            "--mime",
            "video/mp4",
            "--format",
            "json",
            "--config",
            "/tmp/v.json5",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/v.json5")));
        match cli.command {
            Command::Analyze {
                ref mime, format, ..
            } => {
                assert_eq!(mime.as_deref(), Some("video/mp4"));
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("Expected Analyze, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_analyze_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["verisight", "analyze", "a.png", "--format", "xml"]).is_err());
    }

    #[test]
    fn test_cli_serve_with_port() {
        let cli = Cli::try_parse_from(["verisight", "serve", "--port", "9000"]).unwrap();
        match cli.command {
            Command::Serve { port, ref host, .. } => {
                assert_eq!(port, Some(9000));
                assert!(host.is_none());
            }
            other => panic!("Expected Serve, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_prompt_kind() {
        let cli = Cli::try_parse_from(["verisight", "prompt", "Audio"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Prompt {
                kind: MediaKind::Audio
            }
        ));
        assert!(Cli::try_parse_from(["verisight", "prompt", "pdf"]).is_err());
    }

    #[test]
    fn test_cli_config_subcommands() {
        let cli = Cli::try_parse_from(["verisight", "config", "show"]).unwrap();
        assert!(matches!(cli.command, Command::Config(ConfigCommand::Show)));
        let cli = Cli::try_parse_from(["verisight", "config", "path"]).unwrap();
        assert!(matches!(cli.command, Command::Config(ConfigCommand::Path)));
    }

    #[test]
    fn test_cli_schema_and_version() {
        let cli = Cli::try_parse_from(["verisight", "schema"]).unwrap();
        assert!(matches!(cli.command, Command::Schema));
        let cli = Cli::try_parse_from(["verisight", "version"]).unwrap();
        assert!(matches!(cli.command, Command::Version));
    }

    #[test]
    fn test_redact_secrets() {
        let val = serde_json::json!({
            "model": {
                "apiKey": "AIza-secret",
                "model": "gemini-3-pro-preview"
            },
            "server": { "port": 8790 },
            "safe": "visible"
        });
        let redacted = redact_secrets(val);
        assert_eq!(redacted["model"]["apiKey"], "[REDACTED]");
        assert_eq!(redacted["model"]["model"], "gemini-3-pro-preview");
        assert_eq!(redacted["server"]["port"], 8790);
        assert_eq!(redacted["safe"], "visible");
    }

    #[test]
    fn test_redact_secrets_array() {
        let val = serde_json::json!([{"apiKey": "secret"}, {"safe": "ok"}]);
        let redacted = redact_secrets(val);
        assert_eq!(redacted[0]["apiKey"], "[REDACTED]");
        assert_eq!(redacted[1]["safe"], "ok");
    }

    #[test]
    fn test_redact_secrets_on_loaded_config() {
        let mut cfg = Config::default();
        cfg.model.api_key = Some("AIza-secret".to_string());
        let redacted = redact_secrets(serde_json::to_value(&cfg).unwrap());
        assert_eq!(redacted["model"]["apiKey"], "[REDACTED]");
        assert!(!redacted.to_string().contains("AIza-secret"));
    }

    #[test]
    fn test_exit_codes() {
        let missing = IngestError::Read {
            path: PathBuf::from("/nope"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(CliError::from(missing).exit_code(), 2);
        assert_eq!(
            CliError::from(AnalysisFailure::NotConfigured("no key".to_string())).exit_code(),
            2
        );
        assert_eq!(CliError::from(SessionError::Busy).exit_code(), 1);
    }

    #[tokio::test]
    async fn test_handle_analyze_without_key_is_config_error() {
        let cfg = Config::default();
        let err = handle_analyze(&cfg, Path::new("/nonexistent.png"), None, OutputFormat::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::NotConfigured(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_handle_analyze_missing_file_is_ingest_error() {
        let mut cfg = Config::default();
        cfg.model.api_key = Some("test-key".to_string());
        let err = handle_analyze(&cfg, Path::new("/nonexistent.png"), None, OutputFormat::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Ingest(_)));
        assert_eq!(err.exit_code(), 2);
    }
}
