//! Analysis session
//!
//! Owns the only mutable state in the system: the current media, the
//! current result or error, and the in-flight flag. Transitions are
//! `Idle -> Loading -> {Ready | Failed}`, and `reset` returns to `Idle` from
//! any state. At most one analysis is in flight at a time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::media::{
    AnalysisError, AnalysisResult, IngestError, MediaAnalyzer, MediaFile, MediaKind, SourceFile,
};

/// Message shown when a file could not be loaded.
pub const INGEST_FAILED_MESSAGE: &str = "Failed to read the selected file. Please try again.";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("an analysis is already in progress")]
    Busy,

    #[error("the analysis was cancelled")]
    Cancelled,

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Where a session currently stands.
#[derive(Debug, Clone)]
pub enum SessionState {
    Idle,
    Loading {
        media: Arc<MediaFile>,
    },
    Ready {
        media: Arc<MediaFile>,
        result: Arc<AnalysisResult>,
    },
    Failed {
        media: Option<Arc<MediaFile>>,
        message: String,
    },
}

impl SessionState {
    pub fn status(&self) -> SessionStatus {
        match self {
            SessionState::Idle => SessionStatus::Idle,
            SessionState::Loading { .. } => SessionStatus::Loading,
            SessionState::Ready { .. } => SessionStatus::Ready,
            SessionState::Failed { .. } => SessionStatus::Failed,
        }
    }

    pub fn media(&self) -> Option<&Arc<MediaFile>> {
        match self {
            SessionState::Idle => None,
            SessionState::Loading { media } | SessionState::Ready { media, .. } => Some(media),
            SessionState::Failed { media, .. } => media.as_ref(),
        }
    }

    pub fn result(&self) -> Option<&Arc<AnalysisResult>> {
        match self {
            SessionState::Ready { result, .. } => Some(result),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Serializable view of a session for presentation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaView {
    #[serde(flatten)]
    pub file: SourceFile,
    pub kind: MediaKind,
    pub sha256: String,
    /// Data URL of the submitted file; left out while loading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

impl MediaView {
    fn new(media: &MediaFile, include_preview: bool) -> Self {
        Self {
            file: media.file().clone(),
            kind: media.kind(),
            sha256: media.sha256().to_string(),
            preview: include_preview.then(|| media.preview().to_string()),
        }
    }
}

struct Inner {
    state: SessionState,
    generation: u64,
    cancel: Option<CancellationToken>,
    updated_at: DateTime<Utc>,
}

/// Single-user analysis session.
pub struct Session {
    id: String,
    inner: Mutex<Inner>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            inner: Mutex::new(Inner {
                state: SessionState::Idle,
                generation: 0,
                cancel: None,
                updated_at: Utc::now(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state.clone()
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.inner.lock().state, SessionState::Loading { .. })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        let state = &inner.state;
        let include_preview = !matches!(state, SessionState::Loading { .. });
        SessionSnapshot {
            session_id: self.id.clone(),
            status: state.status(),
            media: state.media().map(|m| MediaView::new(m, include_preview)),
            result: state.result().map(|r| (**r).clone()),
            error: match state {
                SessionState::Failed { message, .. } => Some(message.clone()),
                _ => None,
            },
            updated_at: inner.updated_at,
        }
    }

    /// Analyze `media`, replacing whatever the session held before.
    ///
    /// Rejected with [`SessionError::Busy`] while another analysis is in
    /// flight. If the session is reset before the analyzer returns, the
    /// late result is dropped and [`SessionError::Cancelled`] is returned.
    pub async fn submit(
        &self,
        media: MediaFile,
        analyzer: &dyn MediaAnalyzer,
    ) -> Result<Arc<AnalysisResult>, SessionError> {
        let media = Arc::new(media);
        let (generation, token) = {
            let mut inner = self.inner.lock();
            if matches!(inner.state, SessionState::Loading { .. }) {
                tracing::debug!(session = %self.id, "Rejected submission while busy");
                return Err(SessionError::Busy);
            }
            let token = CancellationToken::new();
            inner.generation += 1;
            inner.cancel = Some(token.clone());
            inner.state = SessionState::Loading {
                media: Arc::clone(&media),
            };
            inner.updated_at = Utc::now();
            (inner.generation, token)
        };

        tracing::info!(
            session = %self.id,
            provider = analyzer.name(),
            name = %media.file().name,
            kind = %media.kind(),
            size = media.file().size_bytes,
            "Starting analysis"
        );

        let outcome = tokio::select! {
            _ = token.cancelled() => Err(AnalysisError::cancelled()),
            res = analyzer.analyze(&media) => res,
        };

        let mut inner = self.inner.lock();
        if inner.generation != generation || token.is_cancelled() {
            tracing::info!(session = %self.id, "Discarding result of a reset analysis");
            return Err(SessionError::Cancelled);
        }
        inner.cancel = None;
        inner.updated_at = Utc::now();

        match outcome {
            Ok(result) => {
                let result = Arc::new(result);
                inner.state = SessionState::Ready {
                    media,
                    result: Arc::clone(&result),
                };
                Ok(result)
            }
            Err(err) => {
                inner.state = SessionState::Failed {
                    media: Some(media),
                    message: err.user_message().to_string(),
                };
                Err(SessionError::Analysis(err))
            }
        }
    }

    /// Record a file that could not be loaded.
    ///
    /// Ignored while an analysis is in flight.
    pub fn fail_ingestion(&self, err: &IngestError) {
        tracing::error!(session = %self.id, error = %err, "Media ingestion failed");
        let mut inner = self.inner.lock();
        if matches!(inner.state, SessionState::Loading { .. }) {
            return;
        }
        inner.state = SessionState::Failed {
            media: None,
            message: INGEST_FAILED_MESSAGE.to_string(),
        };
        inner.updated_at = Utc::now();
    }

    /// Return to `Idle`, cancelling any in-flight analysis.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        if let Some(token) = inner.cancel.take() {
            token.cancel();
        }
        inner.generation += 1;
        inner.state = SessionState::Idle;
        inner.updated_at = Utc::now();
        tracing::debug!(session = %self.id, "Session reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{ingest_bytes, AnalysisErrorKind, Verdict};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn sample_result(verdict: Verdict) -> AnalysisResult {
        AnalysisResult {
            is_ai_generated: verdict == Verdict::AiGenerated,
            confidence_score: 91.0,
            summary: "summary".to_string(),
            verdict,
            artifacts: vec![],
        }
    }

    /// Returns a canned outcome, optionally waiting for a release signal.
    struct MockAnalyzer {
        outcome: Result<AnalysisResult, AnalysisError>,
        gate: Option<Arc<Notify>>,
        calls: AtomicUsize,
    }

    impl MockAnalyzer {
        fn ok(result: AnalysisResult) -> Self {
            Self {
                outcome: Ok(result),
                gate: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(kind: AnalysisErrorKind) -> Self {
            Self {
                outcome: Err(AnalysisError::new(kind)),
                gate: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn gated(result: AnalysisResult, gate: Arc<Notify>) -> Self {
            Self {
                outcome: Ok(result),
                gate: Some(gate),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MediaAnalyzer for MockAnalyzer {
        fn name(&self) -> &str {
            "mock"
        }

        async fn analyze(&self, _media: &MediaFile) -> Result<AnalysisResult, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.outcome.clone()
        }
    }

    async fn wait_until_busy(session: &Session) {
        for _ in 0..200 {
            if session.is_busy() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("session never became busy");
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = Session::new();
        assert_eq!(session.state().status(), SessionStatus::Idle);
        let snap = session.snapshot();
        assert!(snap.media.is_none());
        assert!(snap.result.is_none());
        assert!(snap.error.is_none());
    }

    #[tokio::test]
    async fn test_submit_success_moves_to_ready() {
        let session = Session::new();
        let analyzer = MockAnalyzer::ok(sample_result(Verdict::Real));
        let media = ingest_bytes("photo.jpg", "image/jpeg", b"jpeg");

        let result = session.submit(media, &analyzer).await.unwrap();
        assert_eq!(result.verdict, Verdict::Real);

        let snap = session.snapshot();
        assert_eq!(snap.status, SessionStatus::Ready);
        assert_eq!(snap.result.unwrap().verdict, Verdict::Real);
        let media = snap.media.unwrap();
        assert_eq!(media.kind, MediaKind::Image);
        assert!(media.preview.unwrap().starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_submit_failure_moves_to_failed_with_generic_message() {
        let session = Session::new();
        let analyzer = MockAnalyzer::failing(AnalysisErrorKind::Transport);
        let media = ingest_bytes("a.wav", "audio/wav", b"RIFF");

        let err = session.submit(media, &analyzer).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Analysis(e) if e.kind() == AnalysisErrorKind::Transport
        ));

        let snap = session.snapshot();
        assert_eq!(snap.status, SessionStatus::Failed);
        assert_eq!(
            snap.error.as_deref(),
            Some("Failed to analyze the media. Please try again.")
        );
        assert!(snap.result.is_none());
    }

    #[tokio::test]
    async fn test_second_submit_while_busy_is_rejected() {
        let session = Arc::new(Session::new());
        let gate = Arc::new(Notify::new());
        let analyzer = Arc::new(MockAnalyzer::gated(
            sample_result(Verdict::AiGenerated),
            Arc::clone(&gate),
        ));

        let first = {
            let session = Arc::clone(&session);
            let analyzer = Arc::clone(&analyzer);
            tokio::spawn(async move {
                let media = ingest_bytes("first.png", "image/png", b"1");
                session.submit(media, analyzer.as_ref()).await
            })
        };
        wait_until_busy(&session).await;

        let second = ingest_bytes("second.png", "image/png", b"2");
        let err = session.submit(second, analyzer.as_ref()).await.unwrap_err();
        assert_eq!(err, SessionError::Busy);

        gate.notify_one();
        first.await.unwrap().unwrap();

        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
        let snap = session.snapshot();
        assert_eq!(snap.status, SessionStatus::Ready);
        assert_eq!(snap.media.unwrap().file.name, "first.png");
    }

    #[tokio::test]
    async fn test_new_submission_replaces_previous_result() {
        let session = Session::new();
        session
            .submit(
                ingest_bytes("a.png", "image/png", b"a"),
                &MockAnalyzer::ok(sample_result(Verdict::AiGenerated)),
            )
            .await
            .unwrap();
        session
            .submit(
                ingest_bytes("b.mp4", "video/mp4", b"b"),
                &MockAnalyzer::ok(sample_result(Verdict::Uncertain)),
            )
            .await
            .unwrap();

        let snap = session.snapshot();
        assert_eq!(snap.result.unwrap().verdict, Verdict::Uncertain);
        assert_eq!(snap.media.unwrap().kind, MediaKind::Video);
    }

    #[tokio::test]
    async fn test_reset_after_completion_clears_everything() {
        let session = Session::new();
        session
            .submit(
                ingest_bytes("a.png", "image/png", b"a"),
                &MockAnalyzer::ok(sample_result(Verdict::AiGenerated)),
            )
            .await
            .unwrap();

        session.reset();
        let snap = session.snapshot();
        assert_eq!(snap.status, SessionStatus::Idle);
        assert!(snap.media.is_none());
        assert!(snap.result.is_none());
        assert!(snap.error.is_none());
    }

    #[tokio::test]
    async fn test_reset_while_loading_discards_late_result() {
        let session = Arc::new(Session::new());
        let gate = Arc::new(Notify::new());
        let analyzer = Arc::new(MockAnalyzer::gated(
            sample_result(Verdict::AiGenerated),
            Arc::clone(&gate),
        ));

        let pending = {
            let session = Arc::clone(&session);
            let analyzer = Arc::clone(&analyzer);
            tokio::spawn(async move {
                let media = ingest_bytes("slow.png", "image/png", b"slow");
                session.submit(media, analyzer.as_ref()).await
            })
        };
        wait_until_busy(&session).await;

        session.reset();
        let outcome = pending.await.unwrap();
        assert_eq!(outcome.unwrap_err(), SessionError::Cancelled);
        assert_eq!(session.state().status(), SessionStatus::Idle);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_fail_ingestion_sets_failed_state() {
        let session = Session::new();
        let err = IngestError::Read {
            path: "/missing.png".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        session.fail_ingestion(&err);

        let snap = session.snapshot();
        assert_eq!(snap.status, SessionStatus::Failed);
        assert_eq!(snap.error.as_deref(), Some(INGEST_FAILED_MESSAGE));
        assert!(snap.media.is_none());
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let session = Session::new();
        let json = serde_json::to_value(session.snapshot()).unwrap();
        assert_eq!(json["status"], "idle");
        assert!(json.get("sessionId").is_some());
        assert!(json.get("updatedAt").is_some());
        assert!(json.get("result").is_none());
    }
}
