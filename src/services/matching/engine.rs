//! Matching Engine
//!
//! The `Exchange` owns the cash ledger, the inventory ledger and the
//! per-symbol books behind one write lock. Every write path (place, cancel,
//! mint, reset, create, onramp) runs start-to-finish under that lock with no
//! suspension points; snapshots take the read lock and never observe a
//! partial trade.
//!
//! Order placement runs in two passes:
//!
//! 1. **Taker pass** (buys only): the incoming buy walks the same outcome's
//!    asks in ascending price order and fills against makers in queue order,
//!    trading at each maker's resting price.
//! 2. **Book-sweep**: after any placement, YES bids and NO bids whose prices
//!    sum to at least the face value are paired off. There is no seller in a
//!    sweep trade - the pair is minted on the fly, funded jointly by the two
//!    buyers, and settled at the half-even midpoint of their bids.
//!
//! A failing write leaves ledgers and book untouched: validation and balance
//! reservation precede every mutation, and the reservation is the only thing
//! unwound afterwards (the end-of-call refund of taker over-reservation).

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::book::{BookSnapshot, Orderbook};
use super::events::{EventBus, ExchangeEvent};
use super::inventory::{InventoryLedger, Position};
use super::ledger::{CashAccount, CashLedger};
use super::seed;
use super::types::{
    midpoint_price, validate_price, CancelReport, ExchangeError, Fill, FillStatus, MintReport,
    Outcome, PairFill, PlacementReport, PriceKey, Side,
};

/// Everything the engine mutates, guarded by one lock
pub(super) struct ExchangeState {
    pub(super) cash: CashLedger,
    pub(super) inventory: InventoryLedger,
    pub(super) books: HashMap<String, Orderbook>,
}

impl ExchangeState {
    fn new() -> Self {
        Self {
            cash: CashLedger::new(),
            inventory: InventoryLedger::new(),
            books: HashMap::new(),
        }
    }
}

/// The in-memory exchange: ledgers, books and the matching engine
pub struct Exchange {
    state: RwLock<ExchangeState>,
    events: Arc<EventBus>,
}

impl Exchange {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            state: RwLock::new(ExchangeState::new()),
            events,
        }
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.events
    }

    // ========================================================================
    // Admin & Account Operations
    // ========================================================================

    /// Clear all state and reinstate the deterministic fixture.
    pub fn reset(&self) {
        let mut guard = self.state.write();
        guard.cash.clear();
        guard.inventory.clear();
        guard.books.clear();
        seed::populate(&mut guard);
        self.events.enqueue([ExchangeEvent::DataReset]);
        drop(guard);
        self.events.flush();
        info!("Exchange state reset and reseeded");
    }

    /// Idempotently create a user. Returns true if the user was created.
    pub fn create_user(&self, user: &str) -> bool {
        let mut guard = self.state.write();
        let created = guard.cash.ensure_user(user);
        if created {
            self.events.enqueue([ExchangeEvent::user_created(user)]);
        }
        drop(guard);
        self.events.flush();
        if created {
            info!("User created: {}", user);
        }
        created
    }

    /// Create an empty book for a new symbol.
    pub fn create_symbol(&self, symbol: &str) -> Result<(), ExchangeError> {
        let mut guard = self.state.write();
        if guard.books.contains_key(symbol) {
            return Err(ExchangeError::SymbolExists(symbol.to_string()));
        }
        guard.books.insert(symbol.to_string(), Orderbook::new());
        self.events.enqueue([ExchangeEvent::symbol_created(symbol)]);
        drop(guard);
        self.events.flush();
        info!("Symbol created: {}", symbol);
        Ok(())
    }

    /// Credit free cash, creating the user on first touch.
    pub fn onramp(&self, user: &str, amount: Decimal) -> Result<CashAccount, ExchangeError> {
        let mut guard = self.state.write();
        let created = guard.cash.ensure_user(user);
        let account = guard.cash.deposit(user, amount)?;
        let mut events = Vec::with_capacity(2);
        if created {
            events.push(ExchangeEvent::user_created(user));
        }
        events.push(ExchangeEvent::balance_updated(user, account));
        self.events.enqueue(events);
        drop(guard);
        self.events.flush();
        debug!("Onramp: {} credited {}", user, amount);
        Ok(account)
    }

    // ========================================================================
    // Order Placement
    // ========================================================================

    /// Place a buy: reserve the full notional, run the taker pass against the
    /// same outcome's asks, rest the residual, refund the over-reservation,
    /// then sweep the book.
    pub fn buy(
        &self,
        user: &str,
        symbol: &str,
        quantity: u64,
        price: Decimal,
        outcome: Outcome,
    ) -> Result<PlacementReport, ExchangeError> {
        let price = validate_price(price)?;
        require_quantity(quantity)?;
        let notional = Decimal::from(quantity) * price;

        let mut guard = self.state.write();
        let ExchangeState {
            cash,
            inventory,
            books,
        } = &mut *guard;

        if !books.contains_key(symbol) {
            return Err(ExchangeError::SymbolNotFound(symbol.to_string()));
        }
        cash.ensure_user(user);
        // Reserve the full notional up front; everything after this point is
        // infallible while the book/lock invariants hold.
        cash.lock(user, notional)?;

        let book = books
            .get_mut(symbol)
            .ok_or_else(|| ExchangeError::SymbolNotFound(symbol.to_string()))?;

        // Taker pass: ascending ask levels at or below the limit price
        let mut remaining = quantity;
        let mut consumed = Decimal::ZERO;
        let mut fills = Vec::new();
        let max_key = PriceKey::from_decimal(price);
        let ladder = book.outcome_mut(outcome);
        let crossable: Vec<PriceKey> = ladder.asks.range(..=max_key).map(|(k, _)| *k).collect();

        for key in crossable {
            if remaining == 0 {
                break;
            }
            let Some(level) = ladder.asks.get_mut(&key) else {
                continue;
            };
            let level_price = level.price;
            while remaining > 0 {
                let Some((maker, maker_qty)) = level.front() else {
                    break;
                };
                let maker = maker.to_string();
                let fill_qty = remaining.min(maker_qty);
                let fill_notional = Decimal::from(fill_qty) * level_price;

                level.reduce(&maker, fill_qty);
                // Buyer: locked cash leaves, tokens arrive free
                cash.consume_locked(user, fill_notional)?;
                inventory.credit_free_qty(user, symbol, outcome, fill_qty);
                // Maker: locked inventory leaves, cash arrives free
                inventory.consume_locked_qty(&maker, symbol, outcome, fill_qty)?;
                cash.credit_free(&maker, fill_notional);

                consumed += fill_notional;
                remaining -= fill_qty;
                fills.push(Fill {
                    maker,
                    price: level_price,
                    quantity: fill_qty,
                });
            }
            let depleted = level.total == 0;
            if depleted {
                ladder.asks.remove(&key);
            }
        }

        // Rest the residual at the limit price; its reservation stays locked
        if remaining > 0 {
            book.add_maker(outcome, Side::Buy, price, user, remaining);
        }

        // Refund the over-reservation: fills traded below the limit price
        let reserved = Decimal::from(remaining) * price;
        let refund = notional - consumed - reserved;
        if refund > Decimal::ZERO {
            cash.unlock(user, refund)?;
        }

        let sweep_fills = Self::sweep(cash, inventory, symbol, book)?;

        let status = placement_status(quantity, remaining);
        self.events.enqueue([ExchangeEvent::order_placed(
            Side::Buy,
            user,
            symbol,
            quantity,
            price,
            outcome,
        )]);
        drop(guard);
        self.events.flush();

        debug!(
            "Buy {} {} {}@{} for {}: {:?}, matched {}, resting {}",
            quantity,
            outcome,
            symbol,
            price,
            user,
            status,
            quantity - remaining,
            remaining
        );
        Ok(PlacementReport {
            status,
            requested: quantity,
            matched: quantity - remaining,
            resting: remaining,
            fills,
            sweep_fills,
        })
    }

    /// Place a sell: lock the offered inventory and rest it on the asks.
    /// Sells have no taker pass; they are consumed by arriving buys.
    pub fn sell(
        &self,
        user: &str,
        symbol: &str,
        quantity: u64,
        price: Decimal,
        outcome: Outcome,
    ) -> Result<PlacementReport, ExchangeError> {
        let price = validate_price(price)?;
        require_quantity(quantity)?;

        let mut guard = self.state.write();
        let ExchangeState {
            cash,
            inventory,
            books,
        } = &mut *guard;

        if !books.contains_key(symbol) {
            return Err(ExchangeError::SymbolNotFound(symbol.to_string()));
        }
        cash.ensure_user(user);
        inventory.lock_qty(user, symbol, outcome, quantity)?;

        let book = books
            .get_mut(symbol)
            .ok_or_else(|| ExchangeError::SymbolNotFound(symbol.to_string()))?;
        book.add_maker(outcome, Side::Sell, price, user, quantity);

        let sweep_fills = Self::sweep(cash, inventory, symbol, book)?;

        self.events.enqueue([ExchangeEvent::order_placed(
            Side::Sell,
            user,
            symbol,
            quantity,
            price,
            outcome,
        )]);
        drop(guard);
        self.events.flush();

        debug!(
            "Sell {} {} {}@{} for {}: resting",
            quantity, outcome, symbol, price, user
        );
        Ok(PlacementReport {
            status: FillStatus::Pending,
            requested: quantity,
            matched: 0,
            resting: quantity,
            fills: Vec::new(),
            sweep_fills,
        })
    }

    /// Cancel up to `quantity` of the resting order at (symbol, outcome,
    /// price, user). The bid side is checked first, then the ask side.
    pub fn cancel(
        &self,
        user: &str,
        symbol: &str,
        quantity: u64,
        price: Decimal,
        outcome: Outcome,
    ) -> Result<CancelReport, ExchangeError> {
        let price = validate_price(price)?;
        require_quantity(quantity)?;

        let mut guard = self.state.write();
        let ExchangeState {
            cash,
            inventory,
            books,
        } = &mut *guard;

        let book = books
            .get_mut(symbol)
            .ok_or_else(|| ExchangeError::SymbolNotFound(symbol.to_string()))?;

        let owned_bid = book.maker_qty(outcome, Side::Buy, price, user);
        let report = if owned_bid > 0 {
            let canceled = quantity.min(owned_bid);
            book.reduce_maker(outcome, Side::Buy, price, user, canceled);
            let reservation = Decimal::from(canceled) * price;
            let shortfall = cash.unlock_clamped(user, reservation);
            if shortfall > Decimal::ZERO {
                warn!(
                    "Ledger inconsistency on cancel: {} of {} reserved cash missing for {} on {}",
                    shortfall, reservation, user, symbol
                );
            }
            CancelReport {
                canceled,
                side: Side::Buy,
                released_cash: reservation - shortfall,
                released_quantity: 0,
            }
        } else {
            let owned_ask = book.maker_qty(outcome, Side::Sell, price, user);
            if owned_ask == 0 {
                return Err(ExchangeError::OrderNotFound);
            }
            let canceled = quantity.min(owned_ask);
            book.reduce_maker(outcome, Side::Sell, price, user, canceled);
            let shortfall = inventory.unlock_qty_clamped(user, symbol, outcome, canceled);
            if shortfall > 0 {
                warn!(
                    "Ledger inconsistency on cancel: {} of {} locked tokens missing for {} on {}",
                    shortfall, canceled, user, symbol
                );
            }
            CancelReport {
                canceled,
                side: Side::Sell,
                released_cash: Decimal::ZERO,
                released_quantity: canceled - shortfall,
            }
        };

        self.events.enqueue([ExchangeEvent::order_canceled(
            report.side,
            user,
            symbol,
            report.canceled,
            price,
            outcome,
        )]);
        drop(guard);
        self.events.flush();

        debug!(
            "Canceled {} {} {}@{} for {}",
            report.canceled, outcome, symbol, price, user
        );
        Ok(report)
    }

    /// Mint `quantity` matched YES/NO pairs at `price` cash per pair. The
    /// cash leaves the ledger entirely; both outcomes are credited free.
    pub fn mint(
        &self,
        user: &str,
        symbol: &str,
        quantity: u64,
        price: Decimal,
    ) -> Result<MintReport, ExchangeError> {
        let price = validate_price(price)?;
        require_quantity(quantity)?;
        let cost = Decimal::from(quantity) * price;

        let mut guard = self.state.write();
        let ExchangeState {
            cash,
            inventory,
            books,
        } = &mut *guard;

        if !books.contains_key(symbol) {
            return Err(ExchangeError::SymbolNotFound(symbol.to_string()));
        }
        cash.ensure_user(user);
        cash.consume_free(user, cost)?;
        inventory.mint(user, symbol, quantity);
        let remaining_cash = cash.balances(user).map(|a| a.free).unwrap_or_default();

        self.events.enqueue([ExchangeEvent::tokens_minted(
            user, symbol, quantity, price,
        )]);
        drop(guard);
        self.events.flush();

        debug!(
            "Minted {} pairs of {} for {} at {} each",
            quantity, symbol, user, price
        );
        Ok(MintReport {
            quantity,
            cost,
            remaining_cash,
        })
    }

    // ========================================================================
    // Book-Sweep
    // ========================================================================

    /// Pair YES bids with NO bids while the head prices sum to at least the
    /// face value. Each pair trade consumes both buyers' locked bid notional
    /// and mints one outcome token to each; no resting inventory is touched.
    fn sweep(
        cash: &mut CashLedger,
        inventory: &mut InventoryLedger,
        symbol: &str,
        book: &mut Orderbook,
    ) -> Result<Vec<PairFill>, ExchangeError> {
        let mut pair_fills = Vec::new();

        loop {
            let (Some(yes_bid), Some(no_bid)) =
                (book.best_bid(Outcome::Yes), book.lowest_bid(Outcome::No))
            else {
                break;
            };
            // The sorted heads cannot improve on later iterations
            if yes_bid < no_bid {
                break;
            }

            let trade_price = midpoint_price(yes_bid, no_bid);
            let yes_key = PriceKey::from_decimal(yes_bid);
            let no_key = PriceKey::from_decimal(no_bid);
            let (yes_ladder, no_ladder) = book.ladders_mut();

            // Pair head makers until one of the two levels empties
            loop {
                let (Some(yes_level), Some(no_level)) = (
                    yes_ladder.bids.get_mut(&yes_key),
                    no_ladder.bids.get_mut(&no_key),
                ) else {
                    break;
                };
                let Some((yes_buyer, yes_qty)) = yes_level.front().map(|(u, q)| (u.to_string(), q))
                else {
                    break;
                };
                let Some((no_buyer, no_qty)) = no_level.front().map(|(u, q)| (u.to_string(), q))
                else {
                    break;
                };

                let fill_qty = yes_qty.min(no_qty);
                cash.consume_locked(&yes_buyer, Decimal::from(fill_qty) * yes_bid)?;
                cash.consume_locked(&no_buyer, Decimal::from(fill_qty) * no_bid)?;
                inventory.credit_free_qty(&yes_buyer, symbol, Outcome::Yes, fill_qty);
                inventory.credit_free_qty(&no_buyer, symbol, Outcome::No, fill_qty);
                yes_level.reduce(&yes_buyer, fill_qty);
                no_level.reduce(&no_buyer, fill_qty);

                debug!(
                    "Book-sweep {}: {} pairs at {} ({} yes / {} no)",
                    symbol, fill_qty, trade_price, yes_buyer, no_buyer
                );
                pair_fills.push(PairFill {
                    yes_buyer,
                    no_buyer,
                    price: trade_price,
                    quantity: fill_qty,
                });

                let yes_empty = yes_level.total == 0;
                let no_empty = no_level.total == 0;
                if yes_empty {
                    yes_ladder.bids.remove(&yes_key);
                }
                if no_empty {
                    no_ladder.bids.remove(&no_key);
                }
                if yes_empty || no_empty {
                    break;
                }
            }
        }

        Ok(pair_fills)
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Cash balances, for one user or all. Explicit unknown users are an error.
    pub fn cash_balances(
        &self,
        user: Option<&str>,
    ) -> Result<BTreeMap<String, CashAccount>, ExchangeError> {
        let state = self.state.read();
        match user {
            Some(u) => {
                let account = state
                    .cash
                    .balances(u)
                    .ok_or_else(|| ExchangeError::UserNotFound(u.to_string()))?;
                Ok(BTreeMap::from([(u.to_string(), account)]))
            }
            None => Ok(state
                .cash
                .iter()
                .map(|(u, a)| (u.clone(), *a))
                .collect()),
        }
    }

    /// Token positions, for one user or all, keyed user -> symbol.
    pub fn inventory_positions(
        &self,
        user: Option<&str>,
    ) -> Result<BTreeMap<String, BTreeMap<String, Position>>, ExchangeError> {
        let state = self.state.read();
        match user {
            Some(u) => {
                let positions = state
                    .inventory
                    .user_positions(u)
                    .ok_or_else(|| ExchangeError::UserNotFound(u.to_string()))?;
                Ok(BTreeMap::from([(
                    u.to_string(),
                    positions
                        .iter()
                        .map(|(s, p)| (s.clone(), *p))
                        .collect(),
                )]))
            }
            None => Ok(state
                .inventory
                .iter()
                .map(|(u, by_symbol)| {
                    (
                        u.clone(),
                        by_symbol.iter().map(|(s, p)| (s.clone(), *p)).collect(),
                    )
                })
                .collect()),
        }
    }

    /// Snapshot of one symbol's book
    pub fn book_snapshot(&self, symbol: &str) -> Result<BookSnapshot, ExchangeError> {
        let state = self.state.read();
        state
            .books
            .get(symbol)
            .map(|book| book.snapshot(symbol))
            .ok_or_else(|| ExchangeError::SymbolNotFound(symbol.to_string()))
    }

    /// Snapshots of every book, sorted by symbol
    pub fn all_books(&self) -> Vec<BookSnapshot> {
        let state = self.state.read();
        let mut symbols: Vec<&String> = state.books.keys().collect();
        symbols.sort();
        symbols
            .into_iter()
            .filter_map(|s| state.books.get(s).map(|book| book.snapshot(s)))
            .collect()
    }
}

fn require_quantity(quantity: u64) -> Result<(), ExchangeError> {
    if quantity == 0 {
        return Err(ExchangeError::InvalidInput(
            "quantity must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn placement_status(requested: u64, remaining: u64) -> FillStatus {
    if remaining == 0 {
        FillStatus::FullyMatched
    } else if remaining < requested {
        FillStatus::PartiallyMatched
    } else {
        FillStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::matching::SEED_SYMBOL;
    use rust_decimal_macros::dec;

    fn exchange() -> Exchange {
        Exchange::new(Arc::new(EventBus::new(64)))
    }

    fn seeded() -> Exchange {
        let ex = exchange();
        ex.reset();
        ex
    }

    fn cash_of(ex: &Exchange, user: &str) -> CashAccount {
        ex.cash_balances(Some(user)).unwrap()[user]
    }

    fn position_of(ex: &Exchange, user: &str, symbol: &str) -> Position {
        ex.inventory_positions(Some(user)).unwrap()[user][symbol]
    }

    fn total_cash(ex: &Exchange) -> Decimal {
        ex.state.read().cash.total_cash()
    }

    // ------------------------------------------------------------------
    // Seeded scenarios
    // ------------------------------------------------------------------

    #[test]
    fn test_seed_fixture() {
        let ex = seeded();
        assert_eq!(
            cash_of(&ex, "user1"),
            CashAccount { free: dec!(10000), locked: dec!(0) }
        );
        assert_eq!(
            cash_of(&ex, "user2"),
            CashAccount { free: dec!(20000), locked: dec!(5000) }
        );
        assert_eq!(
            cash_of(&ex, "user3"),
            CashAccount { free: dec!(15000), locked: dec!(2000) }
        );

        let snapshot = ex.book_snapshot(SEED_SYMBOL).unwrap();
        assert_eq!(snapshot.yes.bids.len(), 2);
        assert_eq!(snapshot.yes.bids[0].price, "9.5");
        assert_eq!(snapshot.yes.bids[0].total, 1200);
        assert_eq!(snapshot.yes.bids[1].price, "8.5");
        assert_eq!(snapshot.yes.bids[1].total, 1200);
        assert_eq!(snapshot.no.bids[0].price, "10.5");
        assert_eq!(snapshot.no.bids[0].total, 800);

        let position = position_of(&ex, "user1", SEED_SYMBOL);
        assert_eq!(position.yes.free, 100);
        assert_eq!(position.no.free, 50);
    }

    #[test]
    fn test_buy_rests_when_no_asks() {
        let ex = seeded();
        let report = ex
            .buy("user3", SEED_SYMBOL, 100, dec!(9.5), Outcome::Yes)
            .unwrap();

        assert_eq!(report.status, FillStatus::Pending);
        assert_eq!(report.resting, 100);
        assert!(report.fills.is_empty());
        assert!(report.sweep_fills.is_empty());

        assert_eq!(
            cash_of(&ex, "user3"),
            CashAccount { free: dec!(14050), locked: dec!(2950) }
        );

        let snapshot = ex.book_snapshot(SEED_SYMBOL).unwrap();
        let top = &snapshot.yes.bids[0];
        assert_eq!(top.price, "9.5");
        assert_eq!(top.total, 1300);
        assert_eq!(top.orders.last().unwrap().user, "user3");
        assert_eq!(top.orders.last().unwrap().quantity, 100);
    }

    #[test]
    fn test_seed_no_bid_above_face_never_sweeps() {
        let ex = seeded();
        let report = ex
            .buy("user3", SEED_SYMBOL, 100, dec!(9.5), Outcome::Yes)
            .unwrap();
        assert!(report.sweep_fills.is_empty());

        // 10.5 sits outside [1, 10], so the sweep never sees a NO head
        let state = ex.state.read();
        let book = &state.books[SEED_SYMBOL];
        assert_eq!(book.best_bid(Outcome::Yes), Some(dec!(9.5)));
        assert_eq!(book.lowest_bid(Outcome::No), None);
        drop(state);

        let snapshot = ex.book_snapshot(SEED_SYMBOL).unwrap();
        assert_eq!(snapshot.no.bids[0].total, 800);
    }

    #[test]
    fn test_mint_scenario() {
        let ex = seeded();
        let report = ex.mint("user1", SEED_SYMBOL, 10, dec!(5)).unwrap();

        assert_eq!(report.quantity, 10);
        assert_eq!(report.cost, dec!(50));
        assert_eq!(report.remaining_cash, dec!(9950));
        assert_eq!(
            cash_of(&ex, "user1"),
            CashAccount { free: dec!(9950), locked: dec!(0) }
        );

        let position = position_of(&ex, "user1", SEED_SYMBOL);
        assert_eq!(position.yes.free, 110);
        assert_eq!(position.no.free, 60);
    }

    #[test]
    fn test_mint_conservation() {
        let ex = seeded();
        let before = total_cash(&ex);
        ex.mint("user1", SEED_SYMBOL, 10, dec!(5)).unwrap();
        assert_eq!(total_cash(&ex), before - dec!(50));

        let state = ex.state.read();
        assert_eq!(state.inventory.total_supply(SEED_SYMBOL, Outcome::Yes), 110);
        assert_eq!(state.inventory.total_supply(SEED_SYMBOL, Outcome::No), 60);
    }

    #[test]
    fn test_cancel_seeded_bid_clamps_unlock() {
        let ex = seeded();
        let report = ex
            .cancel("user1", SEED_SYMBOL, 200, dec!(9.5), Outcome::Yes)
            .unwrap();

        assert_eq!(report.canceled, 200);
        assert_eq!(report.side, Side::Buy);
        // seed book entries carry no cash locks; the unlock clamps to zero
        assert_eq!(report.released_cash, dec!(0));
        assert_eq!(
            cash_of(&ex, "user1"),
            CashAccount { free: dec!(10000), locked: dec!(0) }
        );

        let snapshot = ex.book_snapshot(SEED_SYMBOL).unwrap();
        let top = &snapshot.yes.bids[0];
        assert_eq!(top.total, 1000);
        assert_eq!(top.orders.len(), 1);
        assert_eq!(top.orders[0].user, "user2");
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let ex = seeded();
        ex.cancel("user1", SEED_SYMBOL, 200, dec!(9.5), Outcome::Yes)
            .unwrap();
        let err = ex
            .cancel("user1", SEED_SYMBOL, 200, dec!(9.5), Outcome::Yes)
            .unwrap_err();
        assert_eq!(err, ExchangeError::OrderNotFound);
    }

    #[test]
    fn test_cancel_clamps_to_owned_quantity() {
        let ex = seeded();
        let report = ex
            .cancel("user1", SEED_SYMBOL, 9999, dec!(9.5), Outcome::Yes)
            .unwrap();
        assert_eq!(report.canceled, 200);
    }

    #[test]
    fn test_insufficient_cash_leaves_state_unchanged() {
        let ex = seeded();
        let before = ex.book_snapshot(SEED_SYMBOL).unwrap();

        let err = ex
            .buy("user1", SEED_SYMBOL, 100_000, dec!(10), Outcome::Yes)
            .unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_CASH");

        assert_eq!(
            cash_of(&ex, "user1"),
            CashAccount { free: dec!(10000), locked: dec!(0) }
        );
        let after = ex.book_snapshot(SEED_SYMBOL).unwrap();
        assert_eq!(after.yes.bids[0].total, before.yes.bids[0].total);
    }

    // ------------------------------------------------------------------
    // Book-sweep
    // ------------------------------------------------------------------

    #[test]
    fn test_sweep_crosses_at_midpoint() {
        let ex = exchange();
        ex.create_symbol("X").unwrap();
        ex.onramp("user1", dec!(100000)).unwrap();
        ex.onramp("user2", dec!(100000)).unwrap();

        let first = ex.buy("user1", "X", 50, dec!(6), Outcome::Yes).unwrap();
        assert!(first.sweep_fills.is_empty());

        let second = ex.buy("user2", "X", 50, dec!(5), Outcome::No).unwrap();
        assert_eq!(second.sweep_fills.len(), 1);
        let pair = &second.sweep_fills[0];
        assert_eq!(pair.yes_buyer, "user1");
        assert_eq!(pair.no_buyer, "user2");
        assert_eq!(pair.price, dec!(5.5));
        assert_eq!(pair.quantity, 50);

        // both bid notionals consumed, tokens delivered free
        assert_eq!(
            cash_of(&ex, "user1"),
            CashAccount { free: dec!(99700), locked: dec!(0) }
        );
        assert_eq!(
            cash_of(&ex, "user2"),
            CashAccount { free: dec!(99750), locked: dec!(0) }
        );
        assert_eq!(position_of(&ex, "user1", "X").yes.free, 50);
        assert_eq!(position_of(&ex, "user2", "X").no.free, 50);

        let snapshot = ex.book_snapshot("X").unwrap();
        assert!(snapshot.yes.bids.is_empty());
        assert!(snapshot.no.bids.is_empty());
    }

    #[test]
    fn test_sweep_pairs_makers_in_queue_order() {
        let ex = exchange();
        ex.create_symbol("X").unwrap();
        for user in ["a", "b", "c", "d"] {
            ex.onramp(user, dec!(10000)).unwrap();
        }

        ex.buy("a", "X", 30, dec!(6), Outcome::Yes).unwrap();
        ex.buy("b", "X", 20, dec!(6), Outcome::Yes).unwrap();
        ex.buy("c", "X", 40, dec!(5), Outcome::No).unwrap();
        let report = ex.buy("d", "X", 10, dec!(5), Outcome::No).unwrap();

        // the third placement pairs a then b against c; the fourth pairs
        // b's remainder against d
        let state = ex.state.read();
        assert!(state.books["X"].best_bid(Outcome::Yes).is_none());
        assert!(state.books["X"].lowest_bid(Outcome::No).is_none());
        drop(state);

        assert_eq!(position_of(&ex, "a", "X").yes.free, 30);
        assert_eq!(position_of(&ex, "b", "X").yes.free, 20);
        assert_eq!(position_of(&ex, "c", "X").no.free, 40);
        assert_eq!(position_of(&ex, "d", "X").no.free, 10);
        // last placement only had 10 left to pair
        assert_eq!(report.sweep_fills.len(), 1);
        assert_eq!(report.sweep_fills[0].yes_buyer, "b");
        assert_eq!(report.sweep_fills[0].no_buyer, "d");
    }

    #[test]
    fn test_sweep_equal_heads_cross() {
        let ex = exchange();
        ex.create_symbol("X").unwrap();
        ex.onramp("user1", dec!(1000)).unwrap();
        ex.onramp("user2", dec!(1000)).unwrap();

        ex.buy("user1", "X", 10, dec!(5), Outcome::Yes).unwrap();
        let report = ex.buy("user2", "X", 10, dec!(5), Outcome::No).unwrap();
        assert_eq!(report.sweep_fills.len(), 1);
        assert_eq!(report.sweep_fills[0].price, dec!(5));
    }

    #[test]
    fn test_sweep_cash_leaves_system_like_a_mint() {
        let ex = exchange();
        ex.create_symbol("X").unwrap();
        ex.onramp("user1", dec!(100000)).unwrap();
        ex.onramp("user2", dec!(100000)).unwrap();
        let before = total_cash(&ex);

        ex.buy("user1", "X", 50, dec!(6), Outcome::Yes).unwrap();
        ex.buy("user2", "X", 50, dec!(5), Outcome::No).unwrap();

        // 50 pairs funded at 6 + 5 per pair
        assert_eq!(total_cash(&ex), before - dec!(550));
        let state = ex.state.read();
        assert_eq!(state.inventory.total_supply("X", Outcome::Yes), 50);
        assert_eq!(state.inventory.total_supply("X", Outcome::No), 50);
    }

    #[test]
    fn test_no_crossing_left_after_placement() {
        let ex = exchange();
        ex.create_symbol("X").unwrap();
        for user in ["a", "b", "c"] {
            ex.onramp(user, dec!(10000)).unwrap();
        }

        ex.buy("a", "X", 10, dec!(7), Outcome::Yes).unwrap();
        ex.buy("b", "X", 25, dec!(4), Outcome::No).unwrap();
        ex.buy("c", "X", 5, dec!(8), Outcome::Yes).unwrap();

        let state = ex.state.read();
        let book = &state.books["X"];
        if let (Some(yes_bid), Some(no_bid)) =
            (book.best_bid(Outcome::Yes), book.lowest_bid(Outcome::No))
        {
            assert!(yes_bid < no_bid);
        }
    }

    // ------------------------------------------------------------------
    // Taker pass
    // ------------------------------------------------------------------

    /// Stand up a symbol with a seller resting `qty` of `outcome` at `price`
    fn with_resting_ask(ex: &Exchange, qty: u64, price: Decimal, outcome: Outcome) {
        ex.create_symbol("X").unwrap();
        ex.onramp("seller", dec!(10000)).unwrap();
        ex.mint("seller", "X", qty, dec!(1)).unwrap();
        ex.sell("seller", "X", qty, price, outcome).unwrap();
    }

    #[test]
    fn test_taker_buy_fills_at_maker_price_and_refunds() {
        let ex = exchange();
        with_resting_ask(&ex, 100, dec!(5), Outcome::Yes);
        ex.onramp("buyer", dec!(1000)).unwrap();

        let report = ex.buy("buyer", "X", 60, dec!(7), Outcome::Yes).unwrap();
        assert_eq!(report.status, FillStatus::FullyMatched);
        assert_eq!(report.matched, 60);
        assert_eq!(report.resting, 0);
        assert_eq!(report.fills.len(), 1);
        assert_eq!(report.fills[0].maker, "seller");
        assert_eq!(report.fills[0].price, dec!(5));
        assert_eq!(report.fills[0].quantity, 60);

        // buyer paid the maker price, not the limit price
        assert_eq!(
            cash_of(&ex, "buyer"),
            CashAccount { free: dec!(700), locked: dec!(0) }
        );
        assert_eq!(position_of(&ex, "buyer", "X").yes.free, 60);

        // seller keeps 40 locked on the book and received 300 cash
        let seller_position = position_of(&ex, "seller", "X");
        assert_eq!(seller_position.yes.locked, 40);
        let seller_cash = cash_of(&ex, "seller");
        assert_eq!(seller_cash.free, dec!(10000) - dec!(100) + dec!(300));

        let snapshot = ex.book_snapshot("X").unwrap();
        assert_eq!(snapshot.yes.asks[0].total, 40);
    }

    #[test]
    fn test_taker_buy_partial_rests_residual() {
        let ex = exchange();
        with_resting_ask(&ex, 100, dec!(5), Outcome::Yes);
        ex.onramp("buyer", dec!(1000)).unwrap();

        let report = ex.buy("buyer", "X", 150, dec!(5), Outcome::Yes).unwrap();
        assert_eq!(report.status, FillStatus::PartiallyMatched);
        assert_eq!(report.matched, 100);
        assert_eq!(report.resting, 50);

        // 150*5 locked, 100*5 consumed, 50*5 still reserved for the residual
        assert_eq!(
            cash_of(&ex, "buyer"),
            CashAccount { free: dec!(250), locked: dec!(250) }
        );
        let snapshot = ex.book_snapshot("X").unwrap();
        assert!(snapshot.yes.asks.is_empty());
        assert_eq!(snapshot.yes.bids[0].total, 50);
    }

    #[test]
    fn test_taker_buy_walks_levels_in_price_order() {
        let ex = exchange();
        ex.create_symbol("X").unwrap();
        ex.onramp("seller", dec!(10000)).unwrap();
        ex.mint("seller", "X", 60, dec!(1)).unwrap();
        ex.sell("seller", "X", 30, dec!(5), Outcome::Yes).unwrap();
        ex.sell("seller", "X", 30, dec!(4), Outcome::Yes).unwrap();
        ex.onramp("buyer", dec!(1000)).unwrap();

        let report = ex.buy("buyer", "X", 40, dec!(5), Outcome::Yes).unwrap();
        assert_eq!(report.fills.len(), 2);
        assert_eq!(report.fills[0].price, dec!(4));
        assert_eq!(report.fills[0].quantity, 30);
        assert_eq!(report.fills[1].price, dec!(5));
        assert_eq!(report.fills[1].quantity, 10);
    }

    #[test]
    fn test_taker_buy_fills_makers_in_insertion_order() {
        let ex = exchange();
        ex.create_symbol("X").unwrap();
        for seller in ["s1", "s2"] {
            ex.onramp(seller, dec!(1000)).unwrap();
            ex.mint(seller, "X", 20, dec!(1)).unwrap();
        }
        ex.sell("s1", "X", 20, dec!(5), Outcome::Yes).unwrap();
        ex.sell("s2", "X", 20, dec!(5), Outcome::Yes).unwrap();
        ex.onramp("buyer", dec!(1000)).unwrap();

        let report = ex.buy("buyer", "X", 30, dec!(5), Outcome::Yes).unwrap();
        assert_eq!(report.fills[0].maker, "s1");
        assert_eq!(report.fills[0].quantity, 20);
        assert_eq!(report.fills[1].maker, "s2");
        assert_eq!(report.fills[1].quantity, 10);
    }

    #[test]
    fn test_taker_buy_ignores_asks_above_limit() {
        let ex = exchange();
        with_resting_ask(&ex, 50, dec!(8), Outcome::Yes);
        ex.onramp("buyer", dec!(1000)).unwrap();

        let report = ex.buy("buyer", "X", 10, dec!(7), Outcome::Yes).unwrap();
        assert_eq!(report.status, FillStatus::Pending);
        assert!(report.fills.is_empty());
        let snapshot = ex.book_snapshot("X").unwrap();
        assert_eq!(snapshot.yes.asks[0].total, 50);
        assert_eq!(snapshot.yes.bids[0].total, 10);
    }

    #[test]
    fn test_cash_conserved_without_mint_or_sweep() {
        let ex = exchange();
        with_resting_ask(&ex, 100, dec!(5), Outcome::Yes);
        ex.onramp("buyer", dec!(1000)).unwrap();
        let before = total_cash(&ex);

        ex.buy("buyer", "X", 60, dec!(5), Outcome::Yes).unwrap();
        ex.buy("buyer", "X", 10, dec!(3), Outcome::Yes).unwrap();
        ex.cancel("buyer", "X", 10, dec!(3), Outcome::Yes).unwrap();
        ex.sell("buyer", "X", 20, dec!(6), Outcome::Yes).unwrap();
        ex.cancel("buyer", "X", 20, dec!(6), Outcome::Yes).unwrap();

        assert_eq!(total_cash(&ex), before);
    }

    // ------------------------------------------------------------------
    // Validation & errors
    // ------------------------------------------------------------------

    #[test]
    fn test_sell_requires_inventory() {
        let ex = exchange();
        ex.create_symbol("X").unwrap();
        let err = ex
            .sell("nobody", "X", 10, dec!(5), Outcome::Yes)
            .unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_INVENTORY");
        let snapshot = ex.book_snapshot("X").unwrap();
        assert!(snapshot.yes.asks.is_empty());
    }

    #[test]
    fn test_unknown_symbol() {
        let ex = exchange();
        assert_eq!(
            ex.buy("u", "NONE", 1, dec!(5), Outcome::Yes).unwrap_err().code(),
            "SYMBOL_NOT_FOUND"
        );
        assert_eq!(
            ex.cancel("u", "NONE", 1, dec!(5), Outcome::Yes).unwrap_err().code(),
            "SYMBOL_NOT_FOUND"
        );
        assert_eq!(
            ex.mint("u", "NONE", 1, dec!(5)).unwrap_err().code(),
            "SYMBOL_NOT_FOUND"
        );
    }

    #[test]
    fn test_duplicate_symbol() {
        let ex = exchange();
        ex.create_symbol("X").unwrap();
        assert_eq!(
            ex.create_symbol("X").unwrap_err(),
            ExchangeError::SymbolExists("X".to_string())
        );
    }

    #[test]
    fn test_price_out_of_range() {
        let ex = exchange();
        ex.create_symbol("X").unwrap();
        ex.onramp("u", dec!(1000)).unwrap();
        assert_eq!(
            ex.buy("u", "X", 1, dec!(0.5), Outcome::Yes).unwrap_err().code(),
            "INVALID_INPUT"
        );
        assert_eq!(
            ex.buy("u", "X", 1, dec!(10.5), Outcome::Yes).unwrap_err().code(),
            "INVALID_INPUT"
        );
    }

    #[test]
    fn test_explicit_unknown_user_lookup() {
        let ex = exchange();
        assert_eq!(
            ex.cash_balances(Some("ghost")).unwrap_err().code(),
            "USER_NOT_FOUND"
        );
        assert_eq!(
            ex.inventory_positions(Some("ghost")).unwrap_err().code(),
            "USER_NOT_FOUND"
        );
    }

    #[test]
    fn test_equivalent_prices_share_a_level() {
        let ex = exchange();
        ex.create_symbol("X").unwrap();
        ex.onramp("u", dec!(1000)).unwrap();
        ex.buy("u", "X", 10, dec!(9.5), Outcome::Yes).unwrap();
        ex.buy("u", "X", 10, dec!(9.50), Outcome::Yes).unwrap();

        let snapshot = ex.book_snapshot("X").unwrap();
        assert_eq!(snapshot.yes.bids.len(), 1);
        assert_eq!(snapshot.yes.bids[0].total, 20);
    }

    #[test]
    fn test_book_aggregation_invariant() {
        let ex = seeded();
        ex.buy("user3", SEED_SYMBOL, 100, dec!(9.5), Outcome::Yes)
            .unwrap();
        ex.cancel("user1", SEED_SYMBOL, 100, dec!(8.5), Outcome::Yes)
            .unwrap();

        for snapshot in ex.all_books() {
            for side in [&snapshot.yes, &snapshot.no] {
                for level in side.bids.iter().chain(side.asks.iter()) {
                    let sum: u64 = level.orders.iter().map(|o| o.quantity).sum();
                    assert_eq!(level.total, sum);
                    assert!(level.total > 0);
                }
            }
        }
    }
}
