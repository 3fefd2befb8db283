//! HTTP front door: health check, TTS streaming proxy, commentary
//! generation, and static bundle hosting with SPA fallback.
//!
//! Error taxonomy: 503 when the vendor credential/client is missing, 400
//! for caller input rejected before any outbound call, 500 for remote or
//! internal failures. Full detail is logged server-side; callers get a
//! short `{detail}` message.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::commentary::{CommentaryClient, CommentaryError, CommentaryRequest};
use crate::config::Config;
use crate::tts::{chunk_audio, SpeechSynthesizer};

/// CosyVoice rejects inputs beyond 500 characters.
pub const MAX_TTS_CHARS: usize = 500;

/// Shared per-process state. Vendor clients are built once at startup and
/// injected here; requests share no mutable state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub commentary: Option<Arc<CommentaryClient>>,
    pub synthesizer: Option<Arc<SpeechSynthesizer>>,
}

impl AppState {
    /// Build vendor clients from config. A present credential with a failed
    /// client build leaves that endpoint degraded (503) without aborting
    /// startup, so `dashscope_configured` and `tts_initialized` can diverge.
    pub fn from_config(config: Config) -> Self {
        let mut commentary = None;
        let mut synthesizer = None;

        if config.dashscope.api_key.is_empty() {
            warn!("DASHSCOPE_API_KEY not set; TTS and commentary endpoints will answer 503");
        } else {
            match CommentaryClient::new(&config.dashscope.api_key, &config.dashscope.base_url) {
                Ok(client) => commentary = Some(Arc::new(client)),
                Err(e) => warn!("Failed to build commentary client: {e}"),
            }
            match SpeechSynthesizer::new(
                &config.dashscope.api_key,
                &config.dashscope.base_url,
                &config.tts,
            ) {
                Ok(synth) => {
                    info!(
                        "CosyVoice synthesizer ready: model={}, voice={}, rate={}",
                        config.tts.model, config.tts.voice, config.tts.speech_rate
                    );
                    synthesizer = Some(Arc::new(synth));
                }
                Err(e) => warn!("CosyVoice initialization failed: {e}"),
            }
        }

        Self {
            config: Arc::new(config),
            commentary,
            synthesizer,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct TtsRequest {
    text: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    dashscope_configured: bool,
    tts_initialized: bool,
    static_files_dir: String,
    static_files_exists: bool,
}

#[derive(Serialize)]
struct CommentaryResponse {
    commentary: String,
    status: &'static str,
}

/// Build the axum router: API routes first, then either the static bundle
/// with SPA fallback or a JSON hint when the bundle was never built.
pub fn router(state: AppState) -> Router {
    let static_dir = state.config.server.static_dir.clone();

    let router = Router::new()
        .route("/health", get(handle_health))
        .route("/api/tts", post(handle_tts))
        .route("/api/commentary", post(handle_commentary));

    let router = if static_dir.exists() {
        let index = static_dir.join("index.html");
        router.fallback_service(ServeDir::new(&static_dir).fallback(ServeFile::new(index)))
    } else {
        router.fallback(handle_missing_bundle)
    };

    // The game client may be opened from another origin during development.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// --- Handlers ---

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let static_dir = &state.config.server.static_dir;
    Json(HealthResponse {
        status: "ok",
        dashscope_configured: !state.config.dashscope.api_key.is_empty(),
        tts_initialized: state.synthesizer.is_some(),
        static_files_dir: static_dir.display().to_string(),
        static_files_exists: static_dir.exists(),
    })
}

async fn handle_tts(
    State(state): State<AppState>,
    Json(req): Json<TtsRequest>,
) -> Result<Response, ApiError> {
    let synthesizer = state.synthesizer.clone().ok_or_else(|| {
        ApiError::Unavailable("TTS service unavailable. Set DASHSCOPE_API_KEY and restart.".into())
    })?;

    let text = validate_tts_text(&req.text)?;

    // One synchronous vendor call returning the full buffer; any failure
    // here happens before the first byte is sent, so it maps to a status.
    let audio = synthesizer.synthesize(text).await.map_err(|e| {
        error!("TTS synthesis failed: {e}");
        ApiError::Internal("speech synthesis failed".into())
    })?;

    let chunks = chunk_audio(&audio);
    let body = Body::from_stream(stream::iter(chunks.into_iter().map(Ok::<_, Infallible>)));

    Response::builder()
        .header(header::CONTENT_TYPE, "audio/mpeg")
        .header(header::CONTENT_DISPOSITION, "inline; filename=tts_audio.mp3")
        .header(header::CACHE_CONTROL, "no-cache")
        // Keep intermediaries from buffering the chunked stream.
        .header("X-Accel-Buffering", "no")
        .body(body)
        .map_err(|e| {
            error!("Failed to build TTS response: {e}");
            ApiError::Internal("internal server error".into())
        })
}

fn validate_tts_text(text: &str) -> Result<&str, ApiError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".into()));
    }
    let length = text.chars().count();
    if length > MAX_TTS_CHARS {
        return Err(ApiError::BadRequest(format!(
            "text is {length} characters, limit is {MAX_TTS_CHARS}"
        )));
    }
    Ok(text)
}

async fn handle_commentary(
    State(state): State<AppState>,
    Json(req): Json<CommentaryRequest>,
) -> Result<Json<CommentaryResponse>, ApiError> {
    let client = state.commentary.clone().ok_or_else(|| {
        ApiError::Unavailable(
            "Text generation unavailable. Set DASHSCOPE_API_KEY and restart.".into(),
        )
    })?;

    if req.events.is_empty() {
        return Err(ApiError::BadRequest("events must not be empty".into()));
    }

    let commentary = client.generate(&req).await.map_err(|e| {
        error!("Commentary generation failed: {e}");
        match e {
            CommentaryError::MalformedResponse(_) => {
                ApiError::Internal("text generation failed: unexpected API response".into())
            }
            _ => ApiError::Internal("text generation failed".into()),
        }
    })?;

    Ok(Json(CommentaryResponse {
        commentary,
        status: "success",
    }))
}

/// Fallback when the bundle directory does not exist: a 404 hint instead
/// of an opaque connection-level error.
async fn handle_missing_bundle(State(state): State<AppState>) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "message": "game bundle not found",
            "hint": "run the frontend build to produce the static bundle",
            "dist_dir": state.config.server.static_dir.display().to_string(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::Request;
    use serde_json::Value;
    use std::path::PathBuf;
    use tower::ServiceExt;

    fn app(api_key: &str, static_dir: PathBuf) -> Router {
        let mut config = Config::default();
        config.dashscope.api_key = api_key.to_string();
        config.server.static_dir = static_dir;
        router(AppState::from_config(config))
    }

    fn json_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_unconfigured_state() {
        let app = app("", PathBuf::from("no-such-dir"));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["dashscope_configured"], false);
        assert_eq!(body["tts_initialized"], false);
        assert_eq!(body["static_files_exists"], false);
    }

    #[tokio::test]
    async fn health_reports_configured_state() {
        let app = app("sk-test", PathBuf::from("no-such-dir"));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["dashscope_configured"], true);
        assert_eq!(body["tts_initialized"], true);
    }

    #[tokio::test]
    async fn tts_without_credential_is_503() {
        let app = app("", PathBuf::from("no-such-dir"));
        let response = app
            .oneshot(json_post("/api/tts", r#"{"text":"hello"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert!(body["detail"].as_str().unwrap().contains("DASHSCOPE_API_KEY"));
    }

    #[tokio::test]
    async fn tts_rejects_whitespace_only_text() {
        let app = app("sk-test", PathBuf::from("no-such-dir"));
        let response = app
            .oneshot(json_post("/api/tts", r#"{"text":"   "}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn tts_rejects_overlong_text() {
        let app = app("sk-test", PathBuf::from("no-such-dir"));
        let text = "x".repeat(MAX_TTS_CHARS + 1);
        let response = app
            .oneshot(json_post("/api/tts", &format!(r#"{{"text":"{text}"}}"#)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn tts_text_at_limit_is_accepted() {
        let text = "x".repeat(MAX_TTS_CHARS);
        assert_eq!(validate_tts_text(&text).unwrap(), text);
        // Trailing whitespace does not count toward the limit.
        let padded = format!("  {text}  ");
        assert_eq!(validate_tts_text(&padded).unwrap(), text);
        assert!(validate_tts_text(&"x".repeat(MAX_TTS_CHARS + 1)).is_err());
        assert!(validate_tts_text("").is_err());
    }

    #[tokio::test]
    async fn commentary_without_credential_is_503() {
        let app = app("", PathBuf::from("no-such-dir"));
        let response = app
            .oneshot(json_post("/api/commentary", r#"{"events":[{"type":"game_start"}]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn commentary_rejects_empty_events_before_any_call() {
        let app = app("sk-test", PathBuf::from("no-such-dir"));
        let response = app
            .oneshot(json_post("/api/commentary", r#"{"events":[]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["detail"].as_str().unwrap().contains("events"));
    }

    #[tokio::test]
    async fn missing_bundle_root_returns_json_hint() {
        let app = app("", PathBuf::from("no-such-dir"));
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["dist_dir"], "no-such-dir");
        assert!(body["hint"].as_str().is_some());
    }

    #[tokio::test]
    async fn static_bundle_is_served_with_spa_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>game</html>").unwrap();
        let app = app("", dir.path().to_path_buf());

        let response = app
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Unknown client-side routes fall back to the index document.
        let response = app
            .oneshot(Request::get("/battle/42").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("game"));
    }
}
