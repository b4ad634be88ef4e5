//! Order API Handlers
//!
//! Buy, sell, cancel and mint. Handlers validate the interface-level types
//! (decimal quantities, outcome strings) and delegate everything else to the
//! engine.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::models::{MintRequest, OrderRequest};
use crate::services::matching::{CancelReport, MintReport, PlacementReport};
use crate::utils::response::{ApiResponse, AppError};
use crate::AppState;

/// POST /orders/buy
pub async fn buy(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OrderRequest>,
) -> Result<Json<ApiResponse<PlacementReport>>, AppError> {
    let quantity = req.parse_quantity()?;
    let outcome = req.parse_outcome()?;
    let report = state
        .exchange
        .buy(&req.user_id, &req.symbol, quantity, req.price, outcome)?;
    Ok(Json(ApiResponse::success(report)))
}

/// POST /orders/sell
pub async fn sell(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OrderRequest>,
) -> Result<Json<ApiResponse<PlacementReport>>, AppError> {
    let quantity = req.parse_quantity()?;
    let outcome = req.parse_outcome()?;
    let report = state
        .exchange
        .sell(&req.user_id, &req.symbol, quantity, req.price, outcome)?;
    Ok(Json(ApiResponse::success(report)))
}

/// POST /orders/cancel
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OrderRequest>,
) -> Result<Json<ApiResponse<CancelReport>>, AppError> {
    let quantity = req.parse_quantity()?;
    let outcome = req.parse_outcome()?;
    let report = state
        .exchange
        .cancel(&req.user_id, &req.symbol, quantity, req.price, outcome)?;
    Ok(Json(ApiResponse::success(report)))
}

/// POST /mint
pub async fn mint(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MintRequest>,
) -> Result<Json<ApiResponse<MintReport>>, AppError> {
    let quantity = req.parse_quantity()?;
    let report = state
        .exchange
        .mint(&req.user_id, &req.symbol, quantity, req.price)?;
    Ok(Json(ApiResponse::success(report)))
}
