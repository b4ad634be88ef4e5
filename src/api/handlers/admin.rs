//! Admin API Handlers
//!
//! Liveness probe and the global reset that reinstates the seed fixture.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::utils::response::ApiResponse;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// GET /test
pub async fn api_test() -> Json<ApiResponse<MessageResponse>> {
    Json(ApiResponse::success(MessageResponse {
        message: "API is up and running".to_string(),
    }))
}

/// POST /reset
pub async fn reset_data(State(state): State<Arc<AppState>>) -> Json<ApiResponse<MessageResponse>> {
    state.exchange.reset();
    Json(ApiResponse::success(MessageResponse {
        message: "Data reset and reseeded".to_string(),
    }))
}
