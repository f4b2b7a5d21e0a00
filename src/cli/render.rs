//! Terminal rendering of a finished analysis.
//!
//! Values are shown exactly as the model returned them: no rounding or
//! clamping of the confidence, no reordering of artifacts.

use std::fmt::Write as _;

use serde::Serialize;

use crate::media::{AnalysisResult, MediaFile, MediaKind, Severity, SourceFile, Verdict};

/// Human label for a verdict (`AI_GENERATED` becomes `AI GENERATED`).
pub fn verdict_label(verdict: Verdict) -> String {
    verdict.as_str().replace('_', " ")
}

fn severity_badge(severity: Severity) -> String {
    format!("[{}]", severity.as_str().to_uppercase())
}

/// Plain-text report for the terminal.
pub fn render_text(media: &MediaFile, result: &AnalysisResult) -> String {
    let file = media.file();
    let mut out = String::new();

    let _ = writeln!(
        out,
        "File:          {} ({}, {})",
        file.name,
        display_mime(&file.mime_type),
        format_size(file.size_bytes)
    );
    let _ = writeln!(out, "Kind:          {}", media.kind());
    let _ = writeln!(out, "SHA-256:       {}", media.sha256());
    out.push('\n');

    let _ = writeln!(out, "Verdict:       {}", verdict_label(result.verdict));
    let _ = writeln!(out, "Confidence:    {}%", result.confidence_score);
    let _ = writeln!(
        out,
        "AI generated:  {}",
        if result.is_ai_generated { "yes" } else { "no" }
    );
    out.push('\n');

    out.push_str("Summary\n");
    let _ = writeln!(out, "  {}", result.summary);
    out.push('\n');

    if result.artifacts.is_empty() {
        out.push_str("No artifacts reported\n");
    } else {
        let _ = writeln!(out, "Artifacts ({})", result.artifacts.len());
        for (i, artifact) in result.artifacts.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {}. {} {}",
                i + 1,
                severity_badge(artifact.severity),
                artifact.title
            );
            let _ = writeln!(out, "     {}", artifact.description);
        }
    }
    out
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    file: &'a SourceFile,
    kind: MediaKind,
    sha256: &'a str,
    result: &'a AnalysisResult,
}

/// Machine-readable report. The preview data URL is left out.
pub fn render_json(
    media: &MediaFile,
    result: &AnalysisResult,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&JsonReport {
        file: media.file(),
        kind: media.kind(),
        sha256: media.sha256(),
        result,
    })
}

fn display_mime(mime: &str) -> &str {
    if mime.is_empty() {
        "unknown type"
    } else {
        mime
    }
}

fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    let b = bytes as f64;
    if b >= MIB {
        format!("{:.1} MiB", b / MIB)
    } else if b >= KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{} B", bytes)
    }
}
