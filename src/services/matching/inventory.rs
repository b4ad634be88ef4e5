//! Inventory Ledger
//!
//! Per-user, per-symbol, per-outcome token holdings, split into free and
//! locked quantities the same way the cash ledger splits balances. Minting
//! credits both outcomes of a symbol equally.

use super::types::{ExchangeError, Outcome};
use std::collections::HashMap;

/// Free and locked token quantities for one (user, symbol, outcome)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Holding {
    pub free: u64,
    pub locked: u64,
}

/// The YES and NO holdings of one (user, symbol)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub yes: Holding,
    pub no: Holding,
}

impl Position {
    pub fn holding(&self, outcome: Outcome) -> &Holding {
        match outcome {
            Outcome::Yes => &self.yes,
            Outcome::No => &self.no,
        }
    }

    fn holding_mut(&mut self, outcome: Outcome) -> &mut Holding {
        match outcome {
            Outcome::Yes => &mut self.yes,
            Outcome::No => &mut self.no,
        }
    }
}

/// Per-user token register, keyed user -> symbol -> position
#[derive(Debug, Default)]
pub struct InventoryLedger {
    positions: HashMap<String, HashMap<String, Position>>,
}

impl InventoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotently create an empty position.
    pub fn ensure_position(&mut self, user: &str, symbol: &str) {
        self.positions
            .entry(user.to_string())
            .or_default()
            .entry(symbol.to_string())
            .or_default();
    }

    /// Move `qty` tokens from free to locked.
    pub fn lock_qty(
        &mut self,
        user: &str,
        symbol: &str,
        outcome: Outcome,
        qty: u64,
    ) -> Result<(), ExchangeError> {
        let holding = self.holding_mut(user, symbol, outcome);
        if holding.free < qty {
            return Err(ExchangeError::InsufficientInventory {
                required: qty,
                available: holding.free,
            });
        }
        holding.free -= qty;
        holding.locked += qty;
        Ok(())
    }

    /// Move `qty` tokens from locked back to free.
    pub fn unlock_qty(
        &mut self,
        user: &str,
        symbol: &str,
        outcome: Outcome,
        qty: u64,
    ) -> Result<(), ExchangeError> {
        let holding = self.holding_mut(user, symbol, outcome);
        if holding.locked < qty {
            return Err(ExchangeError::LedgerInconsistency(format!(
                "unlock of {} exceeds locked {} tokens for {} on {}",
                qty, holding.locked, user, symbol
            )));
        }
        holding.locked -= qty;
        holding.free += qty;
        Ok(())
    }

    /// Unlock as much of `qty` as is actually locked; returns the shortfall.
    pub fn unlock_qty_clamped(
        &mut self,
        user: &str,
        symbol: &str,
        outcome: Outcome,
        qty: u64,
    ) -> u64 {
        let holding = self.holding_mut(user, symbol, outcome);
        let unlockable = qty.min(holding.locked);
        holding.locked -= unlockable;
        holding.free += unlockable;
        qty - unlockable
    }

    /// Remove `qty` tokens from the locked bucket (trade settlement leg).
    pub fn consume_locked_qty(
        &mut self,
        user: &str,
        symbol: &str,
        outcome: Outcome,
        qty: u64,
    ) -> Result<(), ExchangeError> {
        let holding = self.holding_mut(user, symbol, outcome);
        if holding.locked < qty {
            return Err(ExchangeError::LedgerInconsistency(format!(
                "consume of {} exceeds locked {} tokens for {} on {}",
                qty, holding.locked, user, symbol
            )));
        }
        holding.locked -= qty;
        Ok(())
    }

    /// Credit `qty` tokens to the free bucket, creating the position on demand.
    pub fn credit_free_qty(&mut self, user: &str, symbol: &str, outcome: Outcome, qty: u64) {
        let holding = self.holding_mut(user, symbol, outcome);
        holding.free += qty;
    }

    /// Credit `qty` to both outcomes' free quantity for the same user/symbol.
    pub fn mint(&mut self, user: &str, symbol: &str, qty: u64) {
        self.credit_free_qty(user, symbol, Outcome::Yes, qty);
        self.credit_free_qty(user, symbol, Outcome::No, qty);
    }

    pub fn position(&self, user: &str, symbol: &str) -> Option<Position> {
        self.positions.get(user)?.get(symbol).copied()
    }

    pub fn user_positions(&self, user: &str) -> Option<&HashMap<String, Position>> {
        self.positions.get(user)
    }

    /// All positions, for snapshots. Callers sort at read time.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &HashMap<String, Position>)> {
        self.positions.iter()
    }

    /// Total supply of one outcome across all users of a symbol
    pub fn total_supply(&self, symbol: &str, outcome: Outcome) -> u64 {
        self.positions
            .values()
            .filter_map(|by_symbol| by_symbol.get(symbol))
            .map(|p| {
                let h = p.holding(outcome);
                h.free + h.locked
            })
            .sum()
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }

    fn holding_mut(&mut self, user: &str, symbol: &str, outcome: Outcome) -> &mut Holding {
        self.positions
            .entry(user.to_string())
            .or_default()
            .entry(symbol.to_string())
            .or_default()
            .holding_mut(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_credits_both_outcomes() {
        let mut inventory = InventoryLedger::new();
        inventory.mint("alice", "SYM", 10);

        let position = inventory.position("alice", "SYM").unwrap();
        assert_eq!(position.yes.free, 10);
        assert_eq!(position.no.free, 10);
        assert_eq!(inventory.total_supply("SYM", Outcome::Yes), 10);
        assert_eq!(inventory.total_supply("SYM", Outcome::No), 10);
    }

    #[test]
    fn test_lock_and_consume() {
        let mut inventory = InventoryLedger::new();
        inventory.credit_free_qty("alice", "SYM", Outcome::Yes, 100);
        inventory.lock_qty("alice", "SYM", Outcome::Yes, 60).unwrap();
        inventory
            .consume_locked_qty("alice", "SYM", Outcome::Yes, 40)
            .unwrap();

        let holding = inventory.position("alice", "SYM").unwrap().yes;
        assert_eq!(holding.free, 40);
        assert_eq!(holding.locked, 20);
    }

    #[test]
    fn test_lock_insufficient() {
        let mut inventory = InventoryLedger::new();
        inventory.credit_free_qty("alice", "SYM", Outcome::No, 5);

        let err = inventory.lock_qty("alice", "SYM", Outcome::No, 6).unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_INVENTORY");
        assert_eq!(inventory.position("alice", "SYM").unwrap().no.free, 5);
    }

    #[test]
    fn test_unlock_over_locked_is_inconsistency() {
        let mut inventory = InventoryLedger::new();
        inventory.credit_free_qty("alice", "SYM", Outcome::Yes, 10);
        inventory.lock_qty("alice", "SYM", Outcome::Yes, 10).unwrap();

        let err = inventory
            .unlock_qty("alice", "SYM", Outcome::Yes, 11)
            .unwrap_err();
        assert_eq!(err.code(), "LEDGER_INCONSISTENCY");
    }

    #[test]
    fn test_unlock_clamped_reports_shortfall() {
        let mut inventory = InventoryLedger::new();
        inventory.credit_free_qty("alice", "SYM", Outcome::Yes, 10);
        inventory.lock_qty("alice", "SYM", Outcome::Yes, 10).unwrap();

        let shortfall = inventory.unlock_qty_clamped("alice", "SYM", Outcome::Yes, 25);
        assert_eq!(shortfall, 15);

        let holding = inventory.position("alice", "SYM").unwrap().yes;
        assert_eq!(holding.free, 10);
        assert_eq!(holding.locked, 0);
    }

    #[test]
    fn test_ensure_position_idempotent() {
        let mut inventory = InventoryLedger::new();
        inventory.credit_free_qty("alice", "SYM", Outcome::Yes, 7);
        inventory.ensure_position("alice", "SYM");
        assert_eq!(inventory.position("alice", "SYM").unwrap().yes.free, 7);
    }
}
