use rust_decimal::Decimal;
use serde::Deserialize;

use crate::services::matching::{validate_quantity, ExchangeError, Outcome};

/// Shared body of the buy, sell and cancel order routes.
///
/// Quantity arrives as a decimal so fractional-token requests can be
/// rejected explicitly instead of silently truncated.
#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    pub user_id: String,
    pub symbol: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub outcome: String,
}

impl OrderRequest {
    pub fn parse_quantity(&self) -> Result<u64, ExchangeError> {
        validate_quantity(self.quantity)
    }

    pub fn parse_outcome(&self) -> Result<Outcome, ExchangeError> {
        Outcome::parse(&self.outcome)
    }
}

/// Body of the mint route; price is the unit cost of one YES/NO pair
#[derive(Debug, Deserialize)]
pub struct MintRequest {
    pub user_id: String,
    pub symbol: String,
    pub quantity: Decimal,
    pub price: Decimal,
}

impl MintRequest {
    pub fn parse_quantity(&self) -> Result<u64, ExchangeError> {
        validate_quantity(self.quantity)
    }
}

/// Body of the onramp route
#[derive(Debug, Deserialize)]
pub struct OnrampRequest {
    pub user_id: String,
    pub amount: Decimal,
}
