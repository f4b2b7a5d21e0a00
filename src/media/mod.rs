//! Media pipeline module
//!
//! The request/validate half of the system:
//!
//! - **ingest**: loads a file into memory as a data URL and classifies it
//!   as image, video, or audio from its declared MIME type
//! - **prompt**: picks the forensic instruction block for a media kind and
//!   declares the strict JSON output schema
//! - **analysis**: sends one request to the hosted model and strictly
//!   decodes the reply into an [`AnalysisResult`]
//!
//! # Example
//!
//! ```ignore
//! use verisight::media::{ingest_path, GeminiMediaAnalyzer, MediaAnalyzer};
//!
//! let media = ingest_path(Path::new("portrait.png"), None).await?;
//! let analyzer = GeminiMediaAnalyzer::new(api_key)?;
//! let result = analyzer.analyze(&media).await?;
//!
//! println!("{} ({}%)", result.verdict, result.confidence_score);
//! ```

pub mod analysis;
pub mod ingest;
pub mod prompt;

pub use analysis::{
    AnalysisArtifact, AnalysisError, AnalysisErrorKind, AnalysisFailure, AnalysisResult,
    GeminiMediaAnalyzer, MediaAnalyzer, Severity, Verdict, ANALYSIS_FAILED_MESSAGE,
};
pub use ingest::{
    data_url_payload, encode_data_url, ingest_bytes, ingest_path, mime_for_path, IngestError,
    MediaFile, MediaKind, SourceFile,
};
pub use prompt::{build_request, response_schema, AnalysisRequest};
