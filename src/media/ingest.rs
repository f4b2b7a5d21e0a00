//! Media ingestion.
//!
//! Turns a user-selected file into a [`MediaFile`]: the raw bytes are loaded
//! fully into memory and re-encoded as a self-describing data URL, and the
//! declared MIME type is classified into a [`MediaKind`].
//!
//! Nothing is validated here. Any declared type is accepted, and every type
//! that is neither `video*` nor `audio*` is treated as an image.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// MIME type used in the data URL when the declared type is empty or would
/// break the `header,payload` split.
pub const FALLBACK_DATA_URL_MIME: &str = "application/octet-stream";

/// Errors that can occur while loading a file into memory.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Three-way classification of submitted media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    /// Classify a declared MIME type.
    ///
    /// `video*` maps to [`MediaKind::Video`], `audio*` to
    /// [`MediaKind::Audio`], and everything else (including an empty or
    /// non-media type) falls back to [`MediaKind::Image`].
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("video") {
            MediaKind::Video
        } else if mime.starts_with("audio") {
            MediaKind::Audio
        } else {
            MediaKind::Image
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            "audio" => Ok(MediaKind::Audio),
            other => Err(format!("unknown media kind: {other}")),
        }
    }
}

/// What the user handed over: a name, a declared type, and a size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    pub name: String,
    /// Declared MIME type as given by the caller; may be empty.
    pub mime_type: String,
    pub size_bytes: u64,
}

/// A fully loaded submission.
#[derive(Debug, Clone)]
pub struct MediaFile {
    file: SourceFile,
    preview: String,
    kind: MediaKind,
    sha256: String,
}

impl MediaFile {
    pub fn file(&self) -> &SourceFile {
        &self.file
    }

    /// Data URL (`data:<mime>;base64,<payload>`) of the whole file.
    pub fn preview(&self) -> &str {
        &self.preview
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Hex SHA-256 of the raw bytes. Only used to correlate log lines.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }
}

/// Build a [`MediaFile`] from bytes already in memory.
pub fn ingest_bytes(
    name: impl Into<String>,
    mime_type: impl Into<String>,
    bytes: &[u8],
) -> MediaFile {
    let mime_type = mime_type.into();
    let kind = MediaKind::from_mime(&mime_type);
    let preview = encode_data_url(&mime_type, bytes);
    let sha256 = hex::encode(Sha256::digest(bytes));

    MediaFile {
        file: SourceFile {
            name: name.into(),
            mime_type,
            size_bytes: bytes.len() as u64,
        },
        preview,
        kind,
        sha256,
    }
}

/// Read a file from disk and ingest it.
///
/// `declared_mime` plays the role of the type a browser attaches to a picked
/// file. When absent, the type is guessed from the extension the same way a
/// file picker would, and left empty when the extension is unknown.
pub async fn ingest_path(
    path: &Path,
    declared_mime: Option<&str>,
) -> Result<MediaFile, IngestError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| IngestError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mime_type = match declared_mime {
        Some(m) => m.to_string(),
        None => mime_for_path(path).unwrap_or_default().to_string(),
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let media = ingest_bytes(name, mime_type, &bytes);
    tracing::debug!(
        path = %path.display(),
        kind = %media.kind(),
        mime = %media.file().mime_type,
        size = media.file().size_bytes,
        sha256 = %media.sha256(),
        "Ingested media file"
    );
    Ok(media)
}

/// Encode bytes as a base64 data URL.
///
/// The payload always starts after the first comma, so a declared type that
/// itself contains a comma is replaced by [`FALLBACK_DATA_URL_MIME`] in the
/// header.
pub fn encode_data_url(mime_type: &str, bytes: &[u8]) -> String {
    let mime = if mime_type.is_empty() || mime_type.contains(',') {
        FALLBACK_DATA_URL_MIME
    } else {
        mime_type
    };
    let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{};base64,{}", mime, b64)
}

/// Everything after the first comma of a data URL, or `None` when the value
/// has no header/payload separator.
pub fn data_url_payload(data_url: &str) -> Option<&str> {
    data_url.split_once(',').map(|(_, payload)| payload)
}

/// Guess the MIME type a file picker would declare for `path`.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => return None,
    };
    Some(mime)
}
