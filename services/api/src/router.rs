//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the relay endpoints and the OpenAPI documentation.

use crate::{
    handlers,
    models::{ErrorResponse, RelayRequest, TtsResponse},
    state::AppState,
};

use axum::{Router, routing::post};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::chat, handlers::tts_stream, handlers::tts),
    components(schemas(RelayRequest, TtsResponse, ErrorResponse)),
    tags(
        (name = "KB Relay", description = "Streaming chat and speech relay for the KB assistant")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
///
/// Cross-origin access is unrestricted; the service is meant for trusted demo
/// deployments.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/chat", post(handlers::chat))
        .route("/tts_stream", post(handlers::tts_stream))
        .route("/tts", post(handlers::tts))
        .with_state(app_state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
