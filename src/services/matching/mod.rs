//! Exchange Core Module
//!
//! The matching engine and its coupled ledgers for a binary-options
//! exchange: every market symbol carries a pair of complementary YES/NO
//! outcome tokens with a combined face value of 10.
//!
//! # Architecture
//!
//! ```text
//! API Handler
//!   ↓
//! Exchange (single write lock)
//!   ├→ CashLedger        (per-user free/locked cash)
//!   ├→ InventoryLedger   (per-user, per-symbol, per-outcome tokens)
//!   ├→ Orderbook         (per symbol: YES/NO bid and ask ladders)
//!   └→ EventBus          (bounded queue → async broadcast fan-out)
//! ```
//!
//! # Matching
//!
//! - **Taker pass**: an incoming buy crosses the same outcome's asks by
//!   price-time priority, trading at each maker's resting price.
//! - **Book-sweep**: YES and NO bids whose prices cover the face value are
//!   paired off after every placement, minting the outcome pair on the fly
//!   at the half-even midpoint of the two bids.
//!
//! All ledger and book mutations for one operation happen atomically under
//! the engine lock; events are drained to subscribers outside of it.

mod book;
mod engine;
mod events;
mod inventory;
mod ledger;
mod seed;
mod types;

// Re-export main types
pub use book::{BookSnapshot, LevelSnapshot, MakerSnapshot, Orderbook, OutcomeBookSnapshot};
pub use engine::Exchange;
pub use events::{BalancePayload, EventBus, ExchangeEvent};
pub use inventory::{Holding, InventoryLedger, Position};
pub use ledger::{CashAccount, CashLedger};
pub use seed::SEED_SYMBOL;
pub use types::*;
