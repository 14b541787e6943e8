//! HTTP API.
//!
//! - POST /chat    (form field `message`, urlencoded or multipart)
//! - POST /vision  (multipart fields `prompt`, `image`)
//! - GET /health
//! - GET /metrics

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::metrics::RelayMetrics;
use crate::relay::engine::{RelayEngine, RelayRequest};
use crate::relay::model::{GenerativeModel, Prompt};
use crate::server::streaming::text_stream_response;

/// Application state shared across handlers.
pub struct AppState {
    pub relay: RelayEngine,
    pub config: Arc<Config>,
    pub metrics: Arc<RelayMetrics>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        config: Arc<Config>,
    ) -> Result<Self, prometheus::Error> {
        let metrics = Arc::new(RelayMetrics::new()?);
        let relay = RelayEngine::new(model, metrics.clone(), config.server.stream_buffer);
        Ok(Self {
            relay,
            config,
            metrics,
            start_time: Instant::now(),
        })
    }
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_body_bytes;

    Router::new()
        .route("/chat", post(chat))
        .route("/vision", post(vision))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─── Request/Response Types ────────────────────────────────────────────────

/// `/chat` form body.
#[derive(Debug, Deserialize)]
pub struct ChatForm {
    pub message: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub model: String,
}

/// Rejection for a form body the relay cannot use.
#[derive(Debug)]
pub struct UploadRejection {
    status: StatusCode,
    message: String,
}

impl UploadRejection {
    fn missing(field: &str) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: format!("missing form field `{field}`"),
        }
    }
}

/// A required text field must be present and non-empty.
fn required(field: &str, value: Option<String>) -> Result<String, UploadRejection> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| UploadRejection::missing(field))
}

impl From<axum::extract::multipart::MultipartError> for UploadRejection {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Self {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl IntoResponse for UploadRejection {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

/// The `/chat` message, from either a urlencoded or a multipart form.
pub struct ChatMessage(pub String);

impl<S> FromRequest<S> for ChatMessage
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"));

        let message = if is_multipart {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;

            let mut message = None;
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| UploadRejection::from(e).into_response())?
            {
                if field.name() == Some("message") {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| UploadRejection::from(e).into_response())?;
                    message = Some(text);
                }
            }
            message
        } else {
            let Form(form) = Form::<ChatForm>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Some(form.message)
        };

        required("message", message)
            .map(ChatMessage)
            .map_err(IntoResponse::into_response)
    }
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn chat(
    State(state): State<Arc<AppState>>,
    ChatMessage(message): ChatMessage,
) -> Response {
    let request_id = Uuid::new_v4().to_string();

    info!(request_id, chars = message.chars().count(), "Chat request");
    state.metrics.request("chat");

    let rx = state.relay.relay(RelayRequest {
        request_id: request_id.clone(),
        route: "chat",
        prompt: Prompt::Text(message),
    });
    text_stream_response(rx, &request_id)
}

async fn vision(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, UploadRejection> {
    let request_id = Uuid::new_v4().to_string();

    let mut prompt: Option<String> = None;
    let mut image: Option<(Bytes, Option<String>)> = None;

    // The upload is read fully before the remote call is issued.
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "prompt" => prompt = Some(field.text().await?),
            "image" => {
                let content_type = field.content_type().map(str::to_string);
                image = Some((field.bytes().await?, content_type));
            }
            _ => {}
        }
    }

    let text = required("prompt", prompt)?;
    let (image, upload_type) = image.ok_or_else(|| UploadRejection::missing("image"))?;

    let vision = &state.config.vision;
    let mime_type = match upload_type {
        Some(declared) if vision.trust_upload_content_type => declared,
        _ => vision.mime_type.clone(),
    };

    info!(
        request_id,
        chars = text.chars().count(),
        image_bytes = image.len(),
        mime_type,
        "Vision request"
    );
    state.metrics.request("vision");

    let rx = state.relay.relay(RelayRequest {
        request_id: request_id.clone(),
        route: "vision",
        prompt: Prompt::Vision {
            text,
            image,
            mime_type,
        },
    });
    Ok(text_stream_response(rx, &request_id))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        model: state.relay.model_name().to_string(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to render metrics: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
