use rust_decimal::Decimal;
use serde::Serialize;

use crate::services::matching::{CashAccount, Position};

/// Cash balances for one user; decimals serialize as strings
#[derive(Debug, Serialize)]
pub struct CashBalanceView {
    #[serde(with = "rust_decimal::serde::str")]
    pub free: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub locked: Decimal,
}

impl From<CashAccount> for CashBalanceView {
    fn from(account: CashAccount) -> Self {
        Self {
            free: account.free,
            locked: account.locked,
        }
    }
}

/// Free and locked token quantities for one outcome
#[derive(Debug, Serialize)]
pub struct HoldingView {
    pub quantity: u64,
    pub locked: u64,
}

/// YES and NO holdings of one (user, symbol)
#[derive(Debug, Serialize)]
pub struct PositionView {
    pub yes: HoldingView,
    pub no: HoldingView,
}

impl From<Position> for PositionView {
    fn from(position: Position) -> Self {
        Self {
            yes: HoldingView {
                quantity: position.yes.free,
                locked: position.yes.locked,
            },
            no: HoldingView {
                quantity: position.no.free,
                locked: position.no.locked,
            },
        }
    }
}
