use crate::handlers::{
    batch_handler, convert_handler, download_handler, health_handler, info_handler,
    reinitialize_handler, supported_formats_handler, AppState,
};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Assemble the HTTP surface around shared state
pub fn build(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route("/supported-formats", get(supported_formats_handler))
        .route("/convert/:format", post(convert_handler))
        .route("/convert-batch", post(batch_handler))
        .route("/download/:file_id", get(download_handler))
        .route("/session/reinitialize", post(reinitialize_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
