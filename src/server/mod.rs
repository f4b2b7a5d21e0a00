//! Single-session HTTP surface
//!
//! One [`Session`] is shared by every client:
//!
//! | route | effect |
//! |---|---|
//! | `GET /health` | liveness |
//! | `GET /session` | current [`SessionSnapshot`](crate::session::SessionSnapshot) |
//! | `POST /analyze` | raw file body, `Content-Type` is the declared MIME, optional `X-File-Name` |
//! | `POST /reset` | back to idle, cancelling any in-flight analysis |
//! | `GET /schema` | the response schema sent to the model |

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::Value;

use crate::config::ServerConfig;
use crate::media::{ingest_bytes, response_schema, AnalysisErrorKind, MediaAnalyzer};
use crate::session::{Session, SessionError};

/// Header carrying the original file name of an upload.
pub const FILE_NAME_HEADER: &str = "x-file-name";

/// Name used when an upload carries no `X-File-Name`.
pub const DEFAULT_UPLOAD_NAME: &str = "upload";

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Session>,
    pub analyzer: Arc<dyn MediaAnalyzer>,
}

impl AppState {
    pub fn new(analyzer: Arc<dyn MediaAnalyzer>) -> Self {
        Self {
            session: Arc::new(Session::new()),
            analyzer,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    provider: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<AnalysisErrorKind>,
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    kind: Option<AnalysisErrorKind>,
) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            kind,
        }),
    )
        .into_response()
}

/// Build the router with the given upload cap.
pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/session", get(session_handler))
        .route("/analyze", post(analyze_handler))
        .route("/reset", post(reset_handler))
        .route("/schema", get(schema_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        provider: state.analyzer.name().to_string(),
    })
}

async fn session_handler(State(state): State<AppState>) -> Response {
    Json(state.session.snapshot()).into_response()
}

async fn schema_handler() -> Json<Value> {
    Json(response_schema())
}

async fn reset_handler(State(state): State<AppState>) -> Response {
    state.session.reset();
    Json(state.session.snapshot()).into_response()
}

/// Analyze the request body as one file.
///
/// The analysis runs on its own task so a client disconnect cannot leave
/// the session stuck in `loading`.
async fn analyze_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mime_type = declared_mime(&headers);
    let name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_UPLOAD_NAME)
        .to_string();

    if state.session.is_busy() {
        return error_response(StatusCode::CONFLICT, SessionError::Busy.to_string(), None);
    }

    let media = ingest_bytes(name, mime_type, &body);
    let session = Arc::clone(&state.session);
    let analyzer = Arc::clone(&state.analyzer);
    let task = tokio::spawn(async move { session.submit(media, analyzer.as_ref()).await });

    match task.await {
        Ok(Ok(_)) => Json(state.session.snapshot()).into_response(),
        Ok(Err(SessionError::Busy)) => {
            error_response(StatusCode::CONFLICT, SessionError::Busy.to_string(), None)
        }
        Ok(Err(SessionError::Cancelled)) => error_response(
            StatusCode::CONFLICT,
            SessionError::Cancelled.to_string(),
            Some(AnalysisErrorKind::Cancelled),
        ),
        Ok(Err(SessionError::Analysis(err))) => {
            error_response(StatusCode::BAD_GATEWAY, err.user_message(), Some(err.kind()))
        }
        Err(join_err) => {
            tracing::error!(error = %join_err, "Analysis task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error", None)
        }
    }
}

/// MIME essence of the `Content-Type` header, or empty when absent.
fn declared_mime(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

/// Bind and serve until Ctrl-C or SIGTERM.
pub async fn serve(config: &ServerConfig, analyzer: Arc<dyn MediaAnalyzer>) -> std::io::Result<()> {
    let state = AppState::new(analyzer);
    let app = create_router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        max_upload_bytes = config.max_upload_bytes,
        "VeriSight server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT"); }
        () = terminate => { tracing::info!("received SIGTERM"); }
    }
}
