use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers;
use crate::AppState;

pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/test", get(handlers::admin::api_test))
        .route("/reset", post(handlers::admin::reset_data))
        // Accounts
        .route("/users/:user_id", post(handlers::account::create_user))
        .route("/onramp", post(handlers::account::onramp))
        .route("/balances/cash", get(handlers::account::get_all_cash))
        .route("/balances/cash/:user_id", get(handlers::account::get_user_cash))
        .route("/balances/inventory", get(handlers::account::get_all_inventory))
        .route("/balances/inventory/:user_id", get(handlers::account::get_user_inventory))
        // Markets
        .route("/symbols/:symbol", post(handlers::market::create_symbol))
        .route("/orderbook", get(handlers::market::get_all_orderbooks))
        .route("/orderbook/:symbol", get(handlers::market::get_orderbook))
        // Orders
        .route("/orders/buy", post(handlers::order::buy))
        .route("/orders/sell", post(handlers::order::sell))
        .route("/orders/cancel", post(handlers::order::cancel))
        .route("/mint", post(handlers::order::mint))
}
