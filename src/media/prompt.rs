//! Forensic prompt and response schema construction.
//!
//! Everything in here is a pure function of [`MediaKind`]. The output schema
//! is written in the `responseSchema` dialect of the Gemini
//! `generateContent` API and is the contract that
//! [`AnalysisResult::from_model_json`](super::analysis::AnalysisResult::from_model_json)
//! enforces on the way back.

use serde_json::{json, Value};

use super::ingest::{data_url_payload, MediaFile, MediaKind};

/// Instruction block for audio submissions.
pub const AUDIO_INSTRUCTIONS: &str = "\
Perform a forensic audio analysis. Look for:
- Neural grain or metallic \"ringing\" in vocals.
- Spectral gaps or unnatural frequency cutoffs.
- Robotic phrasing or lack of natural breath/performance micro-variations.
- Phase inconsistencies in stereo imaging characteristic of early AI audio models.";

/// Instruction block for image submissions (photography and artwork).
pub const IMAGE_INSTRUCTIONS: &str = "\
Perform deep artistic forensics. Distinguish between human-made \
digital/traditional art and AI generation. Look for:
- \"Neural brush strokes\" (procedural patterns that mimic art but lack intent).
- Inconsistent light sources on complex jewelry or fabric.
- Layering errors in digital art (background bleeding into foreground).
- Procedural gradients that look too mathematically perfect.";

/// Instruction block for video submissions.
pub const VIDEO_INSTRUCTIONS: &str = "\
Standard video forensic analysis. Check for temporal flickering, frame-to-frame consistency, \
and motion blur artifacts.";

const JSON_DIRECTIVE: &str =
    "Provide a structured JSON response evaluating the likelihood of it being AI-generated.";

/// Fields every response object must carry.
pub const REQUIRED_RESULT_FIELDS: [&str; 5] = [
    "isAiGenerated",
    "confidenceScore",
    "summary",
    "verdict",
    "artifacts",
];

/// Fields every artifact object must carry.
pub const REQUIRED_ARTIFACT_FIELDS: [&str; 3] = ["title", "description", "severity"];

/// Select the instruction block for a media kind.
pub fn instructions_for(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Audio => AUDIO_INSTRUCTIONS,
        MediaKind::Image => IMAGE_INSTRUCTIONS,
        MediaKind::Video => VIDEO_INSTRUCTIONS,
    }
}

/// Full instruction text sent alongside the media.
pub fn instruction_text(kind: MediaKind) -> String {
    format!(
        "Perform a high-level forensic analysis of this {kind} to determine if it is \
         AI-generated or authentic.\n\n{}\n\n{JSON_DIRECTIVE}",
        instructions_for(kind)
    )
}

/// The structured output the model is required to emit.
///
/// Identical for every media kind.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "isAiGenerated": { "type": "BOOLEAN" },
            "confidenceScore": {
                "type": "NUMBER",
                "description": "Confidence score from 0 to 100"
            },
            "summary": { "type": "STRING" },
            "verdict": {
                "type": "STRING",
                "enum": ["REAL", "AI_GENERATED", "UNCERTAIN"]
            },
            "artifacts": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "description": { "type": "STRING" },
                        "severity": {
                            "type": "STRING",
                            "enum": ["low", "medium", "high"]
                        }
                    },
                    "required": REQUIRED_ARTIFACT_FIELDS
                }
            }
        },
        "required": REQUIRED_RESULT_FIELDS
    })
}

/// Instruction text and output schema for one media kind.
pub fn build_request(kind: MediaKind) -> (String, Value) {
    (instruction_text(kind), response_schema())
}

/// One outbound analysis call, assembled from a [`MediaFile`].
///
/// Borrows the base64 payload straight out of the media's data URL.
#[derive(Debug, Clone)]
pub struct AnalysisRequest<'a> {
    pub kind: MediaKind,
    pub mime_type: &'a str,
    pub payload: &'a str,
    pub instructions: String,
    pub schema: Value,
}

/// Raised when a media preview is not a `header,payload` data URL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("media preview is not a data URL with a comma-separated payload")]
pub struct MalformedPreview;

impl<'a> AnalysisRequest<'a> {
    pub fn from_media(media: &'a MediaFile) -> Result<Self, MalformedPreview> {
        let payload = data_url_payload(media.preview()).ok_or(MalformedPreview)?;
        let (instructions, schema) = build_request(media.kind());
        Ok(Self {
            kind: media.kind(),
            mime_type: &media.file().mime_type,
            payload,
            instructions,
            schema,
        })
    }

    /// Serialize into a `generateContent` request body.
    ///
    /// The declared MIME type is passed through untouched, the same way the
    /// media was declared at ingestion.
    pub fn to_generate_content_body(&self, thinking_budget: u32) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": self.mime_type,
                            "data": self.payload,
                        }
                    },
                    { "text": self.instructions }
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": self.schema,
                "thinkingConfig": { "thinkingBudget": thinking_budget }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::ingest::ingest_bytes;

    const ALL_KINDS: [MediaKind; 3] = [MediaKind::Image, MediaKind::Video, MediaKind::Audio];
    const ALL_BLOCKS: [&str; 3] = [IMAGE_INSTRUCTIONS, VIDEO_INSTRUCTIONS, AUDIO_INSTRUCTIONS];

    #[test]
    fn test_instructions_for_each_kind() {
        assert_eq!(instructions_for(MediaKind::Audio), AUDIO_INSTRUCTIONS);
        assert_eq!(instructions_for(MediaKind::Image), IMAGE_INSTRUCTIONS);
        assert_eq!(instructions_for(MediaKind::Video), VIDEO_INSTRUCTIONS);
    }

    #[test]
    fn test_instruction_text_contains_exactly_one_block() {
        for kind in ALL_KINDS {
            let (text, _) = build_request(kind);
            let matches = ALL_BLOCKS.iter().filter(|b| text.contains(*b)).count();
            assert_eq!(matches, 1, "kind {kind} selected {matches} blocks");
            assert!(text.contains(instructions_for(kind)));
        }
    }

    #[test]
    fn test_instruction_text_frames_kind_and_json() {
        let text = instruction_text(MediaKind::Audio);
        assert!(text.starts_with("Perform a high-level forensic analysis of this audio"));
        assert!(text.contains("structured JSON"));
    }

    #[test]
    fn test_wrapped_instruction_lines_join_with_single_space() {
        assert!(instruction_text(MediaKind::Video)
            .contains("of this video to determine if it is AI-generated or authentic.\n\n"));
        assert!(IMAGE_INSTRUCTIONS
            .contains("between human-made digital/traditional art and AI generation. Look for:\n"));
        assert!(VIDEO_INSTRUCTIONS
            .ends_with("frame-to-frame consistency, and motion blur artifacts."));
    }

    #[test]
    fn test_schema_identical_across_kinds() {
        let (_, image) = build_request(MediaKind::Image);
        let (_, video) = build_request(MediaKind::Video);
        let (_, audio) = build_request(MediaKind::Audio);
        assert_eq!(image, video);
        assert_eq!(video, audio);
    }

    #[test]
    fn test_schema_required_fields() {
        let schema = response_schema();
        assert_eq!(schema["type"], "OBJECT");
        assert_eq!(
            schema["required"],
            json!(["isAiGenerated", "confidenceScore", "summary", "verdict", "artifacts"])
        );
        assert_eq!(
            schema["properties"]["verdict"]["enum"],
            json!(["REAL", "AI_GENERATED", "UNCERTAIN"])
        );

        let item = &schema["properties"]["artifacts"]["items"];
        assert_eq!(item["required"], json!(["title", "description", "severity"]));
        assert_eq!(
            item["properties"]["severity"]["enum"],
            json!(["low", "medium", "high"])
        );
    }

    #[test]
    fn test_request_from_media() {
        let media = ingest_bytes("track.wav", "audio/wav", b"RIFF");
        let request = AnalysisRequest::from_media(&media).unwrap();
        assert_eq!(request.kind, MediaKind::Audio);
        assert_eq!(request.mime_type, "audio/wav");
        assert_eq!(request.payload, "UklGRg==");
        assert!(request.instructions.contains(AUDIO_INSTRUCTIONS));
    }

    #[test]
    fn test_request_payload_with_comma_in_declared_mime() {
        let media = ingest_bytes("a.png", "image/png,image/x-icon", b"hello");
        let request = AnalysisRequest::from_media(&media).unwrap();
        assert_eq!(request.payload, "aGVsbG8=");
        assert_eq!(request.mime_type, "image/png,image/x-icon");
    }

    #[test]
    fn test_generate_content_body_shape() {
        let media = ingest_bytes("art.png", "image/png", b"hello");
        let request = AnalysisRequest::from_media(&media).unwrap();
        let body = request.to_generate_content_body(4000);

        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inlineData"]["data"], "aGVsbG8=");
        assert!(parts[1]["text"].as_str().unwrap().contains(IMAGE_INSTRUCTIONS));

        let config = &body["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["thinkingConfig"]["thinkingBudget"], 4000);
        assert_eq!(config["responseSchema"], response_schema());
    }
}
