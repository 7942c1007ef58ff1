//! HTTP router for sqsd

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use sqsd_sqs::SqsState;

/// Create the main application router
pub fn create_router(state: Arc<SqsState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(Arc::clone(&state))
        .merge(sqsd_sqs::router(state))
        .layer(TraceLayer::new_for_http())
}

async fn health_check(State(state): State<Arc<SqsState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "running",
            "services": ["sqs"],
            "queues": state.registry.len(),
        })),
    )
}
