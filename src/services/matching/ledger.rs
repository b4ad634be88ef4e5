//! Cash Ledger
//!
//! Per-user free and locked cash balances. Cash moves between the free and
//! locked buckets when orders are placed or canceled, and leaves a bucket
//! only when a trade settles (`consume_*`) or enters on deposit.

use super::types::ExchangeError;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// A single user's cash balances
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CashAccount {
    pub free: Decimal,
    pub locked: Decimal,
}

impl CashAccount {
    pub fn total(&self) -> Decimal {
        self.free + self.locked
    }
}

/// Per-user cash register
#[derive(Debug, Default)]
pub struct CashLedger {
    accounts: HashMap<String, CashAccount>,
}

impl CashLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotently create a zero-balance account. Returns true if created.
    pub fn ensure_user(&mut self, user: &str) -> bool {
        if self.accounts.contains_key(user) {
            return false;
        }
        self.accounts.insert(user.to_string(), CashAccount::default());
        true
    }

    /// Credit free cash; `amount` must be positive.
    pub fn deposit(&mut self, user: &str, amount: Decimal) -> Result<CashAccount, ExchangeError> {
        if amount <= Decimal::ZERO {
            return Err(ExchangeError::InvalidInput(format!(
                "deposit amount must be positive, got {}",
                amount
            )));
        }
        let account = self.accounts.entry(user.to_string()).or_default();
        account.free += amount;
        Ok(*account)
    }

    /// Move `amount` from free to locked.
    pub fn lock(&mut self, user: &str, amount: Decimal) -> Result<(), ExchangeError> {
        let account = self.account_mut(user)?;
        if account.free < amount {
            return Err(ExchangeError::InsufficientCash {
                required: amount,
                available: account.free,
            });
        }
        account.free -= amount;
        account.locked += amount;
        Ok(())
    }

    /// Move `amount` from locked back to free.
    pub fn unlock(&mut self, user: &str, amount: Decimal) -> Result<(), ExchangeError> {
        let account = self.account_mut(user)?;
        if account.locked < amount {
            return Err(ExchangeError::LedgerInconsistency(format!(
                "unlock of {} exceeds locked cash {} for {}",
                amount, account.locked, user
            )));
        }
        account.locked -= amount;
        account.free += amount;
        Ok(())
    }

    /// Unlock as much of `amount` as is actually locked; returns the shortfall.
    ///
    /// Used by cancel, which must complete even against book entries whose
    /// reservations were never recorded (seed data).
    pub fn unlock_clamped(&mut self, user: &str, amount: Decimal) -> Decimal {
        let account = self.accounts.entry(user.to_string()).or_default();
        let unlockable = amount.min(account.locked);
        account.locked -= unlockable;
        account.free += unlockable;
        amount - unlockable
    }

    /// Remove `amount` from locked cash; it leaves this account entirely.
    pub fn consume_locked(&mut self, user: &str, amount: Decimal) -> Result<(), ExchangeError> {
        let account = self.account_mut(user)?;
        if account.locked < amount {
            return Err(ExchangeError::LedgerInconsistency(format!(
                "consume of {} exceeds locked cash {} for {}",
                amount, account.locked, user
            )));
        }
        account.locked -= amount;
        Ok(())
    }

    /// Remove `amount` from free cash; it leaves this account entirely.
    pub fn consume_free(&mut self, user: &str, amount: Decimal) -> Result<(), ExchangeError> {
        let account = self.account_mut(user)?;
        if account.free < amount {
            return Err(ExchangeError::InsufficientCash {
                required: amount,
                available: account.free,
            });
        }
        account.free -= amount;
        Ok(())
    }

    /// Credit free cash without a positivity check (trade settlement leg).
    pub fn credit_free(&mut self, user: &str, amount: Decimal) {
        let account = self.accounts.entry(user.to_string()).or_default();
        account.free += amount;
    }

    /// Install balances directly. Seed/restore path only; skips the
    /// deposit-and-lock bookkeeping.
    pub(super) fn restore(&mut self, user: &str, free: Decimal, locked: Decimal) {
        self.accounts
            .insert(user.to_string(), CashAccount { free, locked });
    }

    pub fn balances(&self, user: &str) -> Option<CashAccount> {
        self.accounts.get(user).copied()
    }

    /// All accounts, for snapshots. Callers sort at read time.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &CashAccount)> {
        self.accounts.iter()
    }

    /// Sum of free + locked over all users
    pub fn total_cash(&self) -> Decimal {
        self.accounts.values().map(|a| a.total()).sum()
    }

    pub fn clear(&mut self) {
        self.accounts.clear();
    }

    fn account_mut(&mut self, user: &str) -> Result<&mut CashAccount, ExchangeError> {
        self.accounts
            .get_mut(user)
            .ok_or_else(|| ExchangeError::UserNotFound(user.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_deposit_and_lock() {
        let mut ledger = CashLedger::new();
        ledger.ensure_user("alice");
        ledger.deposit("alice", dec!(100)).unwrap();
        ledger.lock("alice", dec!(40)).unwrap();

        let account = ledger.balances("alice").unwrap();
        assert_eq!(account.free, dec!(60));
        assert_eq!(account.locked, dec!(40));
        assert_eq!(account.total(), dec!(100));
    }

    #[test]
    fn test_lock_insufficient() {
        let mut ledger = CashLedger::new();
        ledger.ensure_user("alice");
        ledger.deposit("alice", dec!(10)).unwrap();

        let err = ledger.lock("alice", dec!(11)).unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_CASH");
        // nothing moved
        assert_eq!(ledger.balances("alice").unwrap().free, dec!(10));
    }

    #[test]
    fn test_deposit_rejects_non_positive() {
        let mut ledger = CashLedger::new();
        assert!(ledger.deposit("alice", dec!(0)).is_err());
        assert!(ledger.deposit("alice", dec!(-5)).is_err());
    }

    #[test]
    fn test_unlock_and_consume() {
        let mut ledger = CashLedger::new();
        ledger.ensure_user("alice");
        ledger.deposit("alice", dec!(100)).unwrap();
        ledger.lock("alice", dec!(100)).unwrap();

        ledger.unlock("alice", dec!(30)).unwrap();
        ledger.consume_locked("alice", dec!(70)).unwrap();

        let account = ledger.balances("alice").unwrap();
        assert_eq!(account.free, dec!(30));
        assert_eq!(account.locked, dec!(0));
    }

    #[test]
    fn test_unlock_over_locked_is_inconsistency() {
        let mut ledger = CashLedger::new();
        ledger.ensure_user("alice");
        ledger.deposit("alice", dec!(100)).unwrap();
        ledger.lock("alice", dec!(20)).unwrap();

        let err = ledger.unlock("alice", dec!(21)).unwrap_err();
        assert_eq!(err.code(), "LEDGER_INCONSISTENCY");
    }

    #[test]
    fn test_unlock_clamped_reports_shortfall() {
        let mut ledger = CashLedger::new();
        ledger.ensure_user("alice");
        ledger.deposit("alice", dec!(100)).unwrap();
        ledger.lock("alice", dec!(20)).unwrap();

        let shortfall = ledger.unlock_clamped("alice", dec!(50));
        assert_eq!(shortfall, dec!(30));

        let account = ledger.balances("alice").unwrap();
        assert_eq!(account.free, dec!(100));
        assert_eq!(account.locked, dec!(0));
    }

    #[test]
    fn test_ensure_user_idempotent() {
        let mut ledger = CashLedger::new();
        assert!(ledger.ensure_user("alice"));
        ledger.deposit("alice", dec!(5)).unwrap();
        assert!(!ledger.ensure_user("alice"));
        assert_eq!(ledger.balances("alice").unwrap().free, dec!(5));
    }

    #[test]
    fn test_total_cash() {
        let mut ledger = CashLedger::new();
        ledger.deposit("alice", dec!(100)).unwrap();
        ledger.deposit("bob", dec!(50)).unwrap();
        ledger.lock("bob", dec!(25)).unwrap();
        assert_eq!(ledger.total_cash(), dec!(150));
    }
}
