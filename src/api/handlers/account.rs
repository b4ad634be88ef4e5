//! Account API Handlers
//!
//! User creation, cash onramp, and the balance snapshots.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::{CashBalanceView, OnrampRequest, PositionView};
use crate::utils::response::{ApiResponse, AppError};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub user_id: String,
    pub created: bool,
}

#[derive(Debug, Serialize)]
pub struct OnrampResponse {
    pub user_id: String,
    pub balance: CashBalanceView,
}

/// POST /users/:user_id
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<ApiResponse<CreateUserResponse>> {
    let created = state.exchange.create_user(&user_id);
    Json(ApiResponse::success(CreateUserResponse { user_id, created }))
}

/// POST /onramp
pub async fn onramp(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OnrampRequest>,
) -> Result<Json<ApiResponse<OnrampResponse>>, AppError> {
    let account = state.exchange.onramp(&req.user_id, req.amount)?;
    Ok(Json(ApiResponse::success(OnrampResponse {
        user_id: req.user_id,
        balance: account.into(),
    })))
}

/// GET /balances/cash
pub async fn get_all_cash(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<BTreeMap<String, CashBalanceView>>>, AppError> {
    let balances = state.exchange.cash_balances(None)?;
    let view: BTreeMap<String, CashBalanceView> = balances
        .into_iter()
        .map(|(user, account)| (user, account.into()))
        .collect();
    Ok(Json(ApiResponse::success(view)))
}

/// GET /balances/cash/:user_id
pub async fn get_user_cash(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<BTreeMap<String, CashBalanceView>>>, AppError> {
    let balances = state.exchange.cash_balances(Some(&user_id))?;
    let view: BTreeMap<String, CashBalanceView> = balances
        .into_iter()
        .map(|(user, account)| (user, account.into()))
        .collect();
    Ok(Json(ApiResponse::success(view)))
}

/// GET /balances/inventory
pub async fn get_all_inventory(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<BTreeMap<String, BTreeMap<String, PositionView>>>>, AppError> {
    let positions = state.exchange.inventory_positions(None)?;
    Ok(Json(ApiResponse::success(inventory_view(positions))))
}

/// GET /balances/inventory/:user_id
pub async fn get_user_inventory(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<BTreeMap<String, BTreeMap<String, PositionView>>>>, AppError> {
    let positions = state.exchange.inventory_positions(Some(&user_id))?;
    Ok(Json(ApiResponse::success(inventory_view(positions))))
}

fn inventory_view(
    positions: BTreeMap<String, BTreeMap<String, crate::services::matching::Position>>,
) -> BTreeMap<String, BTreeMap<String, PositionView>> {
    positions
        .into_iter()
        .map(|(user, by_symbol)| {
            (
                user,
                by_symbol
                    .into_iter()
                    .map(|(symbol, position)| (symbol, position.into()))
                    .collect(),
            )
        })
        .collect()
}
