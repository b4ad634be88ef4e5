//! Exchange Events
//!
//! Value-typed records describing state changes, plus the outbound path:
//! write operations append events to a bounded lock-free queue while holding
//! the engine lock, and an async fan-out worker drains the queue into a
//! broadcast channel once the lock is released. Delivery is fire-and-forget;
//! on overflow the oldest events are dropped - the ledger is the source of
//! truth, the event stream is observability.

use super::ledger::CashAccount;
use super::types::{Outcome, Side};
use crossbeam::queue::ArrayQueue;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, Notify};
use tracing::{info, warn};

/// Free/locked cash pair attached to balance events.
/// Numeric fields travel as strings to preserve decimal precision.
#[derive(Debug, Clone, Serialize)]
pub struct BalancePayload {
    pub free: String,
    pub locked: String,
}

impl From<CashAccount> for BalancePayload {
    fn from(account: CashAccount) -> Self {
        Self {
            free: account.free.to_string(),
            locked: account.locked.to_string(),
        }
    }
}

/// A state-change record emitted on the outbound channel
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ExchangeEvent {
    DataReset,
    #[serde(rename_all = "camelCase")]
    UserCreated { user_id: String },
    #[serde(rename_all = "camelCase")]
    SymbolCreated { symbol_name: String },
    #[serde(rename_all = "camelCase")]
    BalanceUpdated {
        user_id: String,
        balance: BalancePayload,
    },
    #[serde(rename_all = "camelCase")]
    OrderPlaced {
        #[serde(rename = "type")]
        kind: String,
        user_id: String,
        stock_symbol: String,
        quantity: String,
        price: String,
        stock_type: String,
    },
    #[serde(rename_all = "camelCase")]
    OrderCanceled {
        #[serde(rename = "type")]
        kind: String,
        user_id: String,
        stock_symbol: String,
        quantity: String,
        price: String,
        stock_type: String,
    },
    #[serde(rename_all = "camelCase")]
    TokensMinted {
        user_id: String,
        stock_symbol: String,
        quantity: String,
        price: String,
    },
}

impl ExchangeEvent {
    pub fn user_created(user: &str) -> Self {
        ExchangeEvent::UserCreated {
            user_id: user.to_string(),
        }
    }

    pub fn symbol_created(symbol: &str) -> Self {
        ExchangeEvent::SymbolCreated {
            symbol_name: symbol.to_string(),
        }
    }

    pub fn balance_updated(user: &str, account: CashAccount) -> Self {
        ExchangeEvent::BalanceUpdated {
            user_id: user.to_string(),
            balance: account.into(),
        }
    }

    pub fn order_placed(
        side: Side,
        user: &str,
        symbol: &str,
        quantity: u64,
        price: Decimal,
        outcome: Outcome,
    ) -> Self {
        ExchangeEvent::OrderPlaced {
            kind: side.to_string(),
            user_id: user.to_string(),
            stock_symbol: symbol.to_string(),
            quantity: quantity.to_string(),
            price: price.to_string(),
            stock_type: outcome.to_string(),
        }
    }

    pub fn order_canceled(
        side: Side,
        user: &str,
        symbol: &str,
        quantity: u64,
        price: Decimal,
        outcome: Outcome,
    ) -> Self {
        ExchangeEvent::OrderCanceled {
            kind: side.to_string(),
            user_id: user.to_string(),
            stock_symbol: symbol.to_string(),
            quantity: quantity.to_string(),
            price: price.to_string(),
            stock_type: outcome.to_string(),
        }
    }

    pub fn tokens_minted(user: &str, symbol: &str, quantity: u64, price: Decimal) -> Self {
        ExchangeEvent::TokensMinted {
            user_id: user.to_string(),
            stock_symbol: symbol.to_string(),
            quantity: quantity.to_string(),
            price: price.to_string(),
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Bounded outbound queue plus broadcast fan-out
pub struct EventBus {
    queue: ArrayQueue<ExchangeEvent>,
    notify: Notify,
    sender: broadcast::Sender<ExchangeEvent>,
}

impl EventBus {
    pub fn new(queue_capacity: usize) -> Self {
        let capacity = queue_capacity.max(1);
        let (sender, _) = broadcast::channel(capacity.max(16));
        Self {
            queue: ArrayQueue::new(capacity),
            notify: Notify::new(),
            sender,
        }
    }

    /// Append events to the outbound queue. Safe to call while holding the
    /// engine lock; a full queue displaces its oldest entries.
    pub fn enqueue(&self, events: impl IntoIterator<Item = ExchangeEvent>) {
        for event in events {
            if let Some(dropped) = self.queue.force_push(event) {
                warn!("Outbound event queue full, dropped {:?}", dropped);
            }
        }
    }

    /// Wake the fan-out worker. Called after the engine lock is released.
    pub fn flush(&self) {
        self.notify.notify_one();
    }

    /// Subscribe to the broadcast side of the bus
    pub fn subscribe(&self) -> broadcast::Receiver<ExchangeEvent> {
        self.sender.subscribe()
    }

    /// Start the async worker that drains the queue into the broadcast channel
    pub fn spawn_fanout_worker(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let bus = Arc::clone(self);
        tokio::spawn(async move {
            info!("Event fan-out worker started");
            loop {
                while let Some(event) = bus.queue.pop() {
                    // send only errors when no subscriber exists; best-effort
                    let _ = bus.sender.send(event);
                }
                bus.notify.notified().await;
            }
        })
    }
}
