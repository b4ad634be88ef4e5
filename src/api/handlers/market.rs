//! Market API Handlers
//!
//! Symbol creation and orderbook snapshots.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::services::matching::BookSnapshot;
use crate::utils::response::{ApiResponse, AppError};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CreateSymbolResponse {
    pub symbol: String,
}

/// POST /symbols/:symbol
pub async fn create_symbol(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<CreateSymbolResponse>>, AppError> {
    state.exchange.create_symbol(&symbol)?;
    Ok(Json(ApiResponse::success(CreateSymbolResponse { symbol })))
}

/// GET /orderbook
pub async fn get_all_orderbooks(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Vec<BookSnapshot>>> {
    Json(ApiResponse::success(state.exchange.all_books()))
}

/// GET /orderbook/:symbol
pub async fn get_orderbook(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<BookSnapshot>>, AppError> {
    let snapshot = state.exchange.book_snapshot(&symbol)?;
    Ok(Json(ApiResponse::success(snapshot)))
}
