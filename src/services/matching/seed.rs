//! Seed Data
//!
//! Deterministic fixture reinstated on reset: three funded users, one
//! symbol, and a pre-populated book. The 10.5 NO bid is reproduced as-is
//! from the fixture even though it sits above the face value; the sweep's
//! [1, 10] filter keeps it from ever crossing.

use rust_decimal::Decimal;

use super::book::Orderbook;
use super::engine::ExchangeState;
use super::types::{Outcome, Side};

pub const SEED_SYMBOL: &str = "BTC_USDT_10_Oct_2024_9_30";

pub(super) fn populate(state: &mut ExchangeState) {
    state
        .cash
        .restore("user1", Decimal::from(10000), Decimal::ZERO);
    state
        .cash
        .restore("user2", Decimal::from(20000), Decimal::from(5000));
    state
        .cash
        .restore("user3", Decimal::from(15000), Decimal::from(2000));

    for user in ["user1", "user2", "user3"] {
        state.inventory.ensure_position(user, SEED_SYMBOL);
    }
    state
        .inventory
        .credit_free_qty("user1", SEED_SYMBOL, Outcome::Yes, 100);
    state
        .inventory
        .credit_free_qty("user1", SEED_SYMBOL, Outcome::No, 50);

    let mut book = Orderbook::new();
    let yes_95 = Decimal::new(95, 1);
    book.add_maker(Outcome::Yes, Side::Buy, yes_95, "user1", 200);
    book.add_maker(Outcome::Yes, Side::Buy, yes_95, "user2", 1000);

    let yes_85 = Decimal::new(85, 1);
    book.add_maker(Outcome::Yes, Side::Buy, yes_85, "user1", 300);
    book.add_maker(Outcome::Yes, Side::Buy, yes_85, "user2", 300);
    book.add_maker(Outcome::Yes, Side::Buy, yes_85, "user3", 600);

    let no_105 = Decimal::new(105, 1);
    book.add_maker(Outcome::No, Side::Buy, no_105, "user2", 500);
    book.add_maker(Outcome::No, Side::Buy, no_105, "user3", 300);

    state.books.insert(SEED_SYMBOL.to_string(), book);
}
