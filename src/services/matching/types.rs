//! Matching Engine Types
//!
//! Shared types, input validation and error taxonomy for the exchange core.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Face value of a matched YES+NO pair, and the upper price bound.
pub const FACE_VALUE: Decimal = Decimal::TEN;

/// Lower price bound.
pub const MIN_PRICE: Decimal = Decimal::ONE;

// ============================================================================
// Price Key
// ============================================================================

/// Book ordering key with 8 decimal precision for exact comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PriceKey(i64);

const PRICE_SCALE: i64 = 100_000_000;

impl PriceKey {
    /// Create a PriceKey from a Decimal price
    pub fn from_decimal(price: Decimal) -> Self {
        let scaled = (price * Decimal::from(PRICE_SCALE)).trunc();
        PriceKey(scaled.to_i64().unwrap_or(0))
    }

    /// Convert back to Decimal
    pub fn to_decimal(&self) -> Decimal {
        Decimal::from(self.0) / Decimal::from(PRICE_SCALE)
    }

    /// Get raw value
    pub fn raw(&self) -> i64 {
        self.0
    }
}

impl Ord for PriceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for PriceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ============================================================================
// Outcome & Side
// ============================================================================

/// One of the two complementary outcome tokens of a market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    /// The other outcome of the pair
    pub fn complement(&self) -> Self {
        match self {
            Outcome::Yes => Outcome::No,
            Outcome::No => Outcome::Yes,
        }
    }

    /// Parse from the public `yes | no` representation
    pub fn parse(s: &str) -> Result<Self, ExchangeError> {
        match s {
            "yes" => Ok(Outcome::Yes),
            "no" => Ok(Outcome::No),
            other => Err(ExchangeError::InvalidInput(format!(
                "outcome must be 'yes' or 'no', got '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Yes => write!(f, "yes"),
            Outcome::No => write!(f, "no"),
        }
    }
}

/// Order side within an outcome book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

// ============================================================================
// Input Validation
// ============================================================================

/// Validate and canonicalize a price literal.
///
/// Any decimal that parses into the closed range [1, 10] is accepted;
/// trailing zeros are stripped so equal prices land on the same book level.
pub fn validate_price(price: Decimal) -> Result<Decimal, ExchangeError> {
    if price < MIN_PRICE || price > FACE_VALUE {
        return Err(ExchangeError::InvalidInput(format!(
            "price must be between {} and {}, got {}",
            MIN_PRICE, FACE_VALUE, price
        )));
    }
    Ok(price.normalize())
}

/// Validate a quantity literal: a whole number of at least one token.
pub fn validate_quantity(quantity: Decimal) -> Result<u64, ExchangeError> {
    if !quantity.fract().is_zero() {
        return Err(ExchangeError::InvalidInput(format!(
            "quantity must be a whole number of tokens, got {}",
            quantity
        )));
    }
    if quantity < Decimal::ONE {
        return Err(ExchangeError::InvalidInput(format!(
            "quantity must be at least 1, got {}",
            quantity
        )));
    }
    quantity
        .to_u64()
        .ok_or_else(|| ExchangeError::InvalidInput(format!("quantity out of range: {}", quantity)))
}

/// Midpoint of two crossing bids, rounded half-even to cents.
pub fn midpoint_price(yes_bid: Decimal, no_bid: Decimal) -> Decimal {
    ((yes_bid + no_bid) / Decimal::TWO)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

// ============================================================================
// Operation Reports
// ============================================================================

/// Aggregate outcome of an order placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStatus {
    FullyMatched,
    PartiallyMatched,
    Pending,
}

/// A single fill against a resting maker during the taker pass
#[derive(Debug, Clone, Serialize)]
pub struct Fill {
    pub maker: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    pub quantity: u64,
}

/// A YES x NO pairing settled by the book-sweep
#[derive(Debug, Clone, Serialize)]
pub struct PairFill {
    pub yes_buyer: String,
    pub no_buyer: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    pub quantity: u64,
}

/// Result of a buy or sell placement
#[derive(Debug, Clone, Serialize)]
pub struct PlacementReport {
    pub status: FillStatus,
    pub requested: u64,
    pub matched: u64,
    pub resting: u64,
    pub fills: Vec<Fill>,
    pub sweep_fills: Vec<PairFill>,
}

/// Result of a cancel
#[derive(Debug, Clone, Serialize)]
pub struct CancelReport {
    pub canceled: u64,
    pub side: Side,
    #[serde(with = "rust_decimal::serde::str")]
    pub released_cash: Decimal,
    pub released_quantity: u64,
}

/// Result of a mint
#[derive(Debug, Clone, Serialize)]
pub struct MintReport {
    pub quantity: u64,
    #[serde(with = "rust_decimal::serde::str")]
    pub cost: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub remaining_cash: Decimal,
}

// ============================================================================
// Error Types
// ============================================================================

/// Exchange error taxonomy
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("symbol already exists: {0}")]
    SymbolExists(String),

    #[error("insufficient cash: required {required}, available {available}")]
    InsufficientCash {
        required: Decimal,
        available: Decimal,
    },

    #[error("insufficient inventory: required {required}, available {available}")]
    InsufficientInventory { required: u64, available: u64 },

    #[error("order not found")]
    OrderNotFound,

    #[error("ledger inconsistency: {0}")]
    LedgerInconsistency(String),
}

impl ExchangeError {
    /// Stable machine-readable code for the API envelope
    pub fn code(&self) -> &'static str {
        match self {
            ExchangeError::InvalidInput(_) => "INVALID_INPUT",
            ExchangeError::UserNotFound(_) => "USER_NOT_FOUND",
            ExchangeError::SymbolNotFound(_) => "SYMBOL_NOT_FOUND",
            ExchangeError::SymbolExists(_) => "SYMBOL_EXISTS",
            ExchangeError::InsufficientCash { .. } => "INSUFFICIENT_CASH",
            ExchangeError::InsufficientInventory { .. } => "INSUFFICIENT_INVENTORY",
            ExchangeError::OrderNotFound => "ORDER_NOT_FOUND",
            ExchangeError::LedgerInconsistency(_) => "LEDGER_INCONSISTENCY",
        }
    }
}
