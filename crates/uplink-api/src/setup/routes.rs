//! Route configuration and setup

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::api_doc::ApiDoc;
use crate::auth::{auth_middleware, AuthState};
use crate::handlers;
use crate::state::AppState;

/// Assemble the full application router over the given state.
///
/// The body limit is disabled on purpose: upload endpoints enforce their own
/// size ceilings while streaming.
pub fn build_router(state: Arc<AppState>) -> Router {
    let auth_state = Arc::new(AuthState::new(&state.config.jwt_secret));

    let protected = Router::new()
        .route("/api/v1/uploads", post(handlers::uploads::create_upload))
        .route(
            "/api/v1/uploads/{id}",
            get(handlers::uploads::get_upload).post(handlers::uploads::upload_data),
        )
        .route("/api/v1/files", post(handlers::files::upload_files))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ));

    let public = Router::new()
        .route("/health", get(health))
        .route("/api/openapi.json", get(openapi_spec));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    public
        .merge(protected)
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn openapi_spec() -> Json<serde_json::Value> {
    Json(serde_json::json!(ApiDoc::openapi()))
}
