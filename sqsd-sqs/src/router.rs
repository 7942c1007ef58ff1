//! Routes served by the SQS service

use axum::{routing::post, Router};
use std::sync::Arc;

use crate::handlers::{handle_request, handle_reset};
use crate::state::SqsState;

/// Path of the state-clearing endpoint used between test runs
pub const RESET_PATH: &str = "/_sqsd/reset";

/// Router for the Query API
///
/// Every path not claimed by another route is an SQS request; GET requests
/// may address a queue by its path (`/{account}/{queue}`).
pub fn router(state: Arc<SqsState>) -> Router {
    Router::new()
        .route(RESET_PATH, post(handle_reset))
        .fallback(handle_request)
        .with_state(state)
}
