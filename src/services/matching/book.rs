//! Orderbook Implementation
//!
//! One book per symbol, one bid/ask ladder pair per outcome. Ladders are
//! `BTreeMap`s keyed by the scaled price; each level aggregates resting
//! quantity per maker in insertion order. Orders carry no identifiers, so a
//! maker is keyed by user and repeated placements at the same price merge
//! into the existing entry without losing queue position.

use super::types::{Outcome, PriceKey, Side, FACE_VALUE, MIN_PRICE};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Aggregate resting quantity at one price, with per-maker breakdown
#[derive(Debug, Clone)]
pub struct PriceLevel {
    pub price: Decimal,
    pub total: u64,
    makers: Vec<(String, u64)>,
}

impl PriceLevel {
    fn new(price: Decimal) -> Self {
        Self {
            price,
            total: 0,
            makers: Vec::new(),
        }
    }

    /// Add quantity for a maker, merging into an existing entry.
    pub fn add(&mut self, user: &str, qty: u64) {
        self.total += qty;
        if let Some(entry) = self.makers.iter_mut().find(|(u, _)| u == user) {
            entry.1 += qty;
        } else {
            self.makers.push((user.to_string(), qty));
        }
    }

    /// Remove up to `qty` from a maker's entry; returns the quantity removed.
    /// A maker entry is dropped when it reaches zero.
    pub fn reduce(&mut self, user: &str, qty: u64) -> u64 {
        let Some(pos) = self.makers.iter().position(|(u, _)| u == user) else {
            return 0;
        };
        let removed = qty.min(self.makers[pos].1);
        self.makers[pos].1 -= removed;
        self.total -= removed;
        if self.makers[pos].1 == 0 {
            self.makers.remove(pos);
        }
        removed
    }

    /// Resting quantity for one maker (0 if absent)
    pub fn maker_qty(&self, user: &str) -> u64 {
        self.makers
            .iter()
            .find(|(u, _)| u == user)
            .map(|(_, q)| *q)
            .unwrap_or(0)
    }

    /// Oldest maker entry at this level
    pub fn front(&self) -> Option<(&str, u64)> {
        self.makers.first().map(|(u, q)| (u.as_str(), *q))
    }

    /// Maker entries in insertion order
    pub fn makers(&self) -> impl Iterator<Item = (&str, u64)> {
        self.makers.iter().map(|(u, q)| (u.as_str(), *q))
    }
}

/// The bid and ask ladders of one outcome
#[derive(Debug, Clone, Default)]
pub struct OutcomeLadder {
    pub bids: BTreeMap<PriceKey, PriceLevel>,
    pub asks: BTreeMap<PriceKey, PriceLevel>,
}

impl OutcomeLadder {
    pub fn side(&self, side: Side) -> &BTreeMap<PriceKey, PriceLevel> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut BTreeMap<PriceKey, PriceLevel> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }
}

/// A single market orderbook
#[derive(Debug, Clone, Default)]
pub struct Orderbook {
    yes: OutcomeLadder,
    no: OutcomeLadder,
}

impl Orderbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcome(&self, outcome: Outcome) -> &OutcomeLadder {
        match outcome {
            Outcome::Yes => &self.yes,
            Outcome::No => &self.no,
        }
    }

    pub fn outcome_mut(&mut self, outcome: Outcome) -> &mut OutcomeLadder {
        match outcome {
            Outcome::Yes => &mut self.yes,
            Outcome::No => &mut self.no,
        }
    }

    /// Both ladders at once, for the sweep's simultaneous YES/NO mutation
    pub fn ladders_mut(&mut self) -> (&mut OutcomeLadder, &mut OutcomeLadder) {
        (&mut self.yes, &mut self.no)
    }

    /// Rest `qty` for `user` at `price`, creating the level on demand.
    pub fn add_maker(&mut self, outcome: Outcome, side: Side, price: Decimal, user: &str, qty: u64) {
        let key = PriceKey::from_decimal(price);
        self.outcome_mut(outcome)
            .side_mut(side)
            .entry(key)
            .or_insert_with(|| PriceLevel::new(price))
            .add(user, qty);
    }

    /// Remove up to `qty` of a maker's resting order; drops the level at zero.
    /// Returns the quantity actually removed.
    pub fn reduce_maker(
        &mut self,
        outcome: Outcome,
        side: Side,
        price: Decimal,
        user: &str,
        qty: u64,
    ) -> u64 {
        let key = PriceKey::from_decimal(price);
        let ladder = self.outcome_mut(outcome).side_mut(side);
        let Some(level) = ladder.get_mut(&key) else {
            return 0;
        };
        let removed = level.reduce(user, qty);
        if level.total == 0 {
            ladder.remove(&key);
        }
        removed
    }

    /// Resting quantity for (outcome, side, price, user); 0 if absent.
    pub fn maker_qty(&self, outcome: Outcome, side: Side, price: Decimal, user: &str) -> u64 {
        let key = PriceKey::from_decimal(price);
        self.outcome(outcome)
            .side(side)
            .get(&key)
            .map(|level| level.maker_qty(user))
            .unwrap_or(0)
    }

    /// Highest bid within the sweepable [1, 10] range
    pub fn best_bid(&self, outcome: Outcome) -> Option<Decimal> {
        self.outcome(outcome)
            .bids
            .range(sweep_range())
            .next_back()
            .map(|(_, level)| level.price)
    }

    /// Lowest bid within the sweepable [1, 10] range
    pub fn lowest_bid(&self, outcome: Outcome) -> Option<Decimal> {
        self.outcome(outcome)
            .bids
            .range(sweep_range())
            .next()
            .map(|(_, level)| level.price)
    }

    /// Point-in-time copy for API responses; bids highest-first, asks lowest-first.
    pub fn snapshot(&self, symbol: &str) -> BookSnapshot {
        BookSnapshot {
            symbol: symbol.to_string(),
            yes: ladder_snapshot(&self.yes),
            no: ladder_snapshot(&self.no),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Key range covering resting prices the sweep may cross
fn sweep_range() -> std::ops::RangeInclusive<PriceKey> {
    PriceKey::from_decimal(MIN_PRICE)..=PriceKey::from_decimal(FACE_VALUE)
}

fn ladder_snapshot(ladder: &OutcomeLadder) -> OutcomeBookSnapshot {
    OutcomeBookSnapshot {
        bids: ladder
            .bids
            .values()
            .rev()
            .map(LevelSnapshot::from)
            .collect(),
        asks: ladder.asks.values().map(LevelSnapshot::from).collect(),
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// One maker's share of a level
#[derive(Debug, Clone, Serialize)]
pub struct MakerSnapshot {
    pub user: String,
    pub quantity: u64,
}

/// One price level, makers in queue order
#[derive(Debug, Clone, Serialize)]
pub struct LevelSnapshot {
    pub price: String,
    pub total: u64,
    pub orders: Vec<MakerSnapshot>,
}

impl From<&PriceLevel> for LevelSnapshot {
    fn from(level: &PriceLevel) -> Self {
        Self {
            price: level.price.to_string(),
            total: level.total,
            orders: level
                .makers()
                .map(|(user, quantity)| MakerSnapshot {
                    user: user.to_string(),
                    quantity,
                })
                .collect(),
        }
    }
}

/// Bid and ask levels of one outcome
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeBookSnapshot {
    pub bids: Vec<LevelSnapshot>,
    pub asks: Vec<LevelSnapshot>,
}

/// Full book snapshot for one symbol
#[derive(Debug, Clone, Serialize)]
pub struct BookSnapshot {
    pub symbol: String,
    pub yes: OutcomeBookSnapshot,
    pub no: OutcomeBookSnapshot,
    pub timestamp: i64,
}
