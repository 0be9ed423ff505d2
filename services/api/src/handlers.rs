//! Axum Handlers for the relay endpoints
//!
//! Each handler opens its upstream relay before responding, so failures to
//! reach a provider, or a provider rejecting the request, become a JSON
//! error. Once streaming has started, an upstream failure aborts the
//! response body.

use axum::{
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use base64::Engine;
use kb_core::RelayError;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    models::{ErrorResponse, RelayRequest, TtsResponse},
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    Relay(RelayError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Relay(err) => {
                let status = match &err {
                    RelayError::Config(_) => {
                        error!("Relay misconfigured: {}", err);
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                    RelayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                    RelayError::Transport(_) | RelayError::Protocol(_) | RelayError::Http { .. } => {
                        StatusCode::BAD_GATEWAY
                    }
                };
                warn!(%status, error = %err, "Relay request failed");
                let message = err.to_string();
                (status, Json(ErrorResponse { message })).into_response()
            }
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self::Relay(err)
    }
}

fn require_text(payload: &RelayRequest) -> Result<(), ApiError> {
    if payload.text.trim().is_empty() {
        return Err(ApiError::BadRequest("`text` must not be empty".to_string()));
    }
    Ok(())
}

/// Stream the assistant's reply as plain text, token by token.
#[utoipa::path(
    post,
    path = "/chat",
    request_body = RelayRequest,
    responses(
        (status = 200, description = "Reply fragments streamed as they are generated", content_type = "text/plain", body = String),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 500, description = "LLM provider rejected the configured credentials", body = ErrorResponse),
        (status = 502, description = "LLM provider unreachable or failed", body = ErrorResponse),
        (status = 504, description = "LLM provider sent nothing within the idle window", body = ErrorResponse)
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RelayRequest>,
) -> Result<Response, ApiError> {
    require_text(&payload)?;
    info!(session_id = %payload.session_id, "Chat request");

    let fragments = state
        .completion
        .stream_completion(&payload.session_id, &payload.text)
        .await?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(fragments),
    )
        .into_response())
}

/// Stream synthesized speech as MP3 chunks while the provider produces them.
#[utoipa::path(
    post,
    path = "/tts_stream",
    request_body = RelayRequest,
    responses(
        (status = 200, description = "MP3 audio streamed chunk by chunk", content_type = "audio/mpeg"),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 502, description = "Speech provider unreachable", body = ErrorResponse)
    )
)]
pub async fn tts_stream(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RelayRequest>,
) -> Result<Response, ApiError> {
    require_text(&payload)?;
    info!(chars = payload.text.len(), "Streaming speech request");

    let audio = state.speech.stream_speech(&payload.text).await?;

    Ok((
        [(header::CONTENT_TYPE, "audio/mpeg")],
        Body::from_stream(audio),
    )
        .into_response())
}

/// Synthesize the whole file in one call and return it base64 encoded (legacy).
#[utoipa::path(
    post,
    path = "/tts",
    request_body = RelayRequest,
    responses(
        (status = 200, description = "Base64-encoded MP3", body = TtsResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 502, description = "Speech provider returned an error", body = ErrorResponse)
    )
)]
pub async fn tts(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RelayRequest>,
) -> Result<Json<TtsResponse>, ApiError> {
    require_text(&payload)?;
    info!(chars = payload.text.len(), "Batch speech request");

    let audio = state.batch.synthesize_batch(&payload.text).await?;
    let b64 = base64::engine::general_purpose::STANDARD.encode(&audio);
    Ok(Json(TtsResponse { b64 }))
}
