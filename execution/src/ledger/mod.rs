//! Coin ledger.
//!
//! Every balance mutation is a single self-contained operation executed under
//! one lock around the [Store]: the balance is re-read, checked, and written
//! without any other mutation interleaving. Callers never compute a balance
//! themselves.

mod store;

pub use store::{Account, Entry, EntryKind, EntryStatus, Memory, Store, StoreError};

use arcade_types::{EngineConfig, GameKind, UserId, BASIS_POINTS, ROLLBACK_SOURCE};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("amount must be positive and fit in a balance (got {0})")]
    InvalidAmount(u64),
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: i64, need: u64 },
    #[error("ledger inconsistency for user {user}: {before} + {amount} != {after}")]
    Inconsistency {
        user: UserId,
        before: i64,
        amount: i64,
        after: i64,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Whether a debit may take the balance below zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Overdraft {
    Deny,
    /// Internal corrections only.
    Allow,
}

/// Result of a debit or credit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub applied: bool,
    pub balance_before: i64,
    pub balance_after: i64,
}

/// Result of [Ledger::settle_win].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settlement {
    pub applied: bool,
    pub capped: u64,
    pub net: u64,
    pub tax: u64,
    pub balance_after: i64,
}

/// Payout cap and tax rates applying to one game.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WinPolicy {
    pub max_payout: u64,
    pub tax_bps: u64,
    pub premium_tax_bps: u64,
}

impl WinPolicy {
    pub fn for_game(config: &EngineConfig, kind: GameKind) -> Self {
        Self {
            max_payout: config.limits(kind).max_payout,
            tax_bps: config.tax_bps(false),
            premium_tax_bps: config.tax_bps(true),
        }
    }

    /// Split a gross payout into `(capped, net, tax)`.
    ///
    /// `net` is truncated, so any fractional coin goes to the tax.
    pub fn split(&self, gross: u64, premium: bool) -> (u64, u64, u64) {
        let capped = gross.min(self.max_payout);
        let rate = if premium {
            self.premium_tax_bps
        } else {
            self.tax_bps
        }
        .min(BASIS_POINTS);
        let net = (capped as u128 * (BASIS_POINTS - rate) as u128 / BASIS_POINTS as u128) as u64;
        (capped, net, capped - net)
    }
}

/// Append-only balance ledger over a [Store].
pub struct Ledger<S: Store> {
    store: Mutex<S>,
    next_entry: AtomicU64,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

impl<S: Store> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Mutex::new(store),
            next_entry: AtomicU64::new(1),
        }
    }

    /// Current balance (zero for users never seen before).
    pub async fn balance(&self, user: UserId) -> Result<i64, LedgerError> {
        let store = self.store.lock().await;
        Ok(store.load(user).await?.map(|a| a.balance).unwrap_or(0))
    }

    /// Transaction log of a user, oldest first.
    pub async fn history(&self, user: UserId) -> Result<Vec<Entry>, LedgerError> {
        let store = self.store.lock().await;
        Ok(store.history(user).await?)
    }

    /// Exclusive access to the backing store.
    #[cfg(any(test, feature = "mocks"))]
    pub async fn store(&self) -> MutexGuard<'_, S> {
        self.store.lock().await
    }

    /// Remove `amount` from the balance unless that would make it negative.
    pub async fn debit(
        &self,
        user: UserId,
        amount: u64,
        source: &str,
        comment: &str,
    ) -> Result<Receipt, LedgerError> {
        self.debit_with(user, amount, source, comment, Overdraft::Deny)
            .await
    }

    pub async fn debit_with(
        &self,
        user: UserId,
        amount: u64,
        source: &str,
        comment: &str,
        overdraft: Overdraft,
    ) -> Result<Receipt, LedgerError> {
        let delta = signed(amount)?;
        let mut store = self.store.lock().await;
        self.apply(
            &mut store,
            user,
            -delta,
            EntryKind::Expense,
            overdraft,
            source,
            comment,
        )
        .await
    }

    /// Add `amount` to the balance. Never rejected.
    pub async fn credit(
        &self,
        user: UserId,
        amount: u64,
        source: &str,
        comment: &str,
    ) -> Result<Receipt, LedgerError> {
        let delta = signed(amount)?;
        let mut store = self.store.lock().await;
        self.apply(
            &mut store,
            user,
            delta,
            EntryKind::Income,
            Overdraft::Allow,
            source,
            comment,
        )
        .await
    }

    /// Cap, tax, and credit a gross win.
    ///
    /// Nothing is written when the taxed amount would be zero.
    pub async fn settle_win(
        &self,
        user: UserId,
        gross: u64,
        premium: bool,
        policy: &WinPolicy,
        source: &str,
    ) -> Result<Settlement, LedgerError> {
        let (capped, net, tax) = policy.split(gross, premium);
        if net == 0 {
            let balance_after = self.balance(user).await?;
            return Ok(Settlement {
                applied: false,
                capped,
                net,
                tax,
                balance_after,
            });
        }
        let comment = format!("win {gross} capped {capped} tax {tax}");
        let receipt = self.credit(user, net, source, &comment).await?;
        Ok(Settlement {
            applied: receipt.applied,
            capped,
            net,
            tax,
            balance_after: receipt.balance_after,
        })
    }

    /// Move coins between users with all-or-nothing visible effect.
    pub async fn transfer(
        &self,
        from: UserId,
        to: UserId,
        amount: u64,
        source: &str,
        comment: &str,
    ) -> Result<(), LedgerError> {
        let debit = self.debit(from, amount, source, comment).await?;
        if !debit.applied {
            return Err(LedgerError::InsufficientFunds {
                have: debit.balance_before,
                need: amount,
            });
        }
        if let Err(err) = self.credit(to, amount, source, comment).await {
            warn!(from, to, amount, ?err, "transfer credit failed, rolling back");
            let rollback = format!("rollback of transfer to {to}: {comment}");
            if let Err(rollback_err) = self
                .credit(from, amount, ROLLBACK_SOURCE, &rollback)
                .await
            {
                error!(
                    from,
                    to,
                    amount,
                    ?rollback_err,
                    "transfer rollback failed, manual correction required"
                );
            }
            return Err(err);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply(
        &self,
        store: &mut MutexGuard<'_, S>,
        user: UserId,
        delta: i64,
        kind: EntryKind,
        overdraft: Overdraft,
        source: &str,
        comment: &str,
    ) -> Result<Receipt, LedgerError> {
        let mut account = store.load(user).await?.unwrap_or_else(|| Account::new(user));
        let before = account.balance;
        let Some(after) = before.checked_add(delta) else {
            error!(user, before, delta, "ledger overflow, refusing mutation");
            return Err(LedgerError::Inconsistency {
                user,
                before,
                amount: delta,
                after: before,
            });
        };

        let permitted = kind == EntryKind::Income || overdraft == Overdraft::Allow || after >= 0;
        let (amount, after, status) = if permitted {
            (delta, after, EntryStatus::Applied)
        } else {
            (0, before, EntryStatus::Rejected)
        };
        let entry = Entry {
            id: self.next_entry.fetch_add(1, Ordering::Relaxed),
            user,
            amount,
            requested: delta,
            balance_before: before,
            balance_after: after,
            kind,
            status,
            source: source.to_string(),
            comment: comment.to_string(),
            timestamp_ms: now_ms(),
        };
        if !entry.is_consistent() {
            error!(?entry, "ledger entry violates balance invariant");
            return Err(LedgerError::Inconsistency {
                user,
                before,
                amount,
                after,
            });
        }

        account.balance = after;
        store.commit(account, entry).await?;
        if permitted {
            debug!(user, delta, before, after, source, "ledger entry applied");
        } else {
            debug!(user, delta, before, source, "ledger debit rejected");
        }
        Ok(Receipt {
            applied: permitted,
            balance_before: before,
            balance_after: after,
        })
    }
}

fn signed(amount: u64) -> Result<i64, LedgerError> {
    match i64::try_from(amount) {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(LedgerError::InvalidAmount(amount)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> WinPolicy {
        WinPolicy {
            max_payout: 1_000,
            tax_bps: 500,
            premium_tax_bps: 250,
        }
    }

    async fn funded(user: UserId, amount: u64) -> Ledger<Memory> {
        let ledger = Ledger::new(Memory::default());
        ledger.credit(user, amount, "grant", "test").await.unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_debit_and_credit() {
        let ledger = funded(1, 100).await;

        let receipt = ledger.debit(1, 30, "slot", "stake").await.unwrap();
        assert_eq!(
            receipt,
            Receipt {
                applied: true,
                balance_before: 100,
                balance_after: 70
            }
        );

        let receipt = ledger.credit(1, 5, "slot", "win").await.unwrap();
        assert!(receipt.applied);
        assert_eq!(ledger.balance(1).await.unwrap(), 75);
    }

    #[tokio::test]
    async fn test_debit_rejected_without_override() {
        let ledger = funded(1, 30).await;

        let receipt = ledger.debit(1, 50, "slot", "stake").await.unwrap();
        assert!(!receipt.applied);
        assert_eq!(receipt.balance_before, 30);
        assert_eq!(receipt.balance_after, 30);
        assert_eq!(ledger.balance(1).await.unwrap(), 30);

        // The attempt is still on the audit trail, as a no-op.
        let history = ledger.history(1).await.unwrap();
        let attempt = history.last().unwrap();
        assert_eq!(attempt.status, EntryStatus::Rejected);
        assert_eq!(attempt.kind, EntryKind::Expense);
        assert_eq!(attempt.requested, -50);
        assert_eq!(attempt.amount, 0);
        assert_eq!(attempt.balance_before, attempt.balance_after);
    }

    #[tokio::test]
    async fn test_overdraft_override() {
        let ledger = funded(1, 30).await;
        let receipt = ledger
            .debit_with(1, 50, "correction", "manual", Overdraft::Allow)
            .await
            .unwrap();
        assert!(receipt.applied);
        assert_eq!(ledger.balance(1).await.unwrap(), -20);

        // A negative balance still refuses ordinary debits.
        let receipt = ledger.debit(1, 1, "slot", "stake").await.unwrap();
        assert!(!receipt.applied);
    }

    #[tokio::test]
    async fn test_zero_amount_rejected() {
        let ledger = Ledger::new(Memory::default());
        assert_eq!(
            ledger.credit(1, 0, "grant", "").await,
            Err(LedgerError::InvalidAmount(0))
        );
        assert_eq!(
            ledger.debit(1, u64::MAX, "grant", "").await,
            Err(LedgerError::InvalidAmount(u64::MAX))
        );
        assert!(ledger.history(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overflow_is_inconsistency() {
        let ledger = funded(1, i64::MAX as u64).await;
        let result = ledger.credit(1, 1, "grant", "").await;
        assert!(matches!(result, Err(LedgerError::Inconsistency { .. })));
        assert_eq!(ledger.balance(1).await.unwrap(), i64::MAX);
        assert_eq!(ledger.history(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_conservation() {
        let ledger = funded(1, 500).await;
        let policy = policy();
        for i in 0..50u64 {
            match i % 4 {
                0 => {
                    ledger.debit(1, 7 * i + 1, "risk", "stake").await.unwrap();
                }
                1 => {
                    ledger.credit(1, 3 * i + 1, "risk", "win").await.unwrap();
                }
                2 => {
                    ledger
                        .settle_win(1, 11 * i, i % 8 == 2, &policy, "risk")
                        .await
                        .unwrap();
                }
                _ => {
                    ledger.debit(1, 10_000, "risk", "too much").await.unwrap();
                }
            }
        }

        let history = ledger.history(1).await.unwrap();
        let sum: i64 = history.iter().map(|e| e.amount).sum();
        assert_eq!(ledger.balance(1).await.unwrap(), sum);
        assert!(history.iter().all(Entry::is_consistent));
        assert!(history.windows(2).all(|w| w[0].id < w[1].id));
        assert!(history.windows(2).all(|w| w[0].balance_after == w[1].balance_before));
    }

    #[tokio::test]
    async fn test_settle_win_taxes_and_caps() {
        let ledger = funded(1, 80).await;
        let policy = policy();

        let settlement = ledger.settle_win(1, 150, false, &policy, "slot").await.unwrap();
        assert!(settlement.applied);
        assert_eq!(settlement.capped, 150);
        assert_eq!(settlement.net, 142);
        assert_eq!(settlement.tax, 8);
        assert_eq!(ledger.balance(1).await.unwrap(), 222);

        let settlement = ledger.settle_win(1, 5_000, false, &policy, "slot").await.unwrap();
        assert_eq!(settlement.capped, 1_000);
        assert_eq!(settlement.net, 950);
        assert_eq!(ledger.balance(1).await.unwrap(), 1_172);
    }

    #[tokio::test]
    async fn test_settle_win_without_net_is_noop() {
        let ledger = funded(1, 10).await;
        let settlement = ledger.settle_win(1, 0, false, &policy(), "slot").await.unwrap();
        assert!(!settlement.applied);
        assert_eq!(settlement.balance_after, 10);

        // One coin at 5% tax truncates to nothing.
        let settlement = ledger.settle_win(1, 1, false, &policy(), "slot").await.unwrap();
        assert!(!settlement.applied);
        assert_eq!(ledger.history(1).await.unwrap().len(), 1);
    }

    #[test]
    fn test_cap_and_tax_monotonic() {
        let policy = policy();
        assert!(policy.premium_tax_bps <= policy.tax_bps);
        let mut previous = 0;
        for gross in (0..3_000).step_by(7) {
            let (capped, net, tax) = policy.split(gross, false);
            let (_, premium_net, _) = policy.split(gross, true);
            assert!(capped <= policy.max_payout);
            assert_eq!(net + tax, capped);
            assert!(net <= policy.max_payout - policy.max_payout * policy.tax_bps / BASIS_POINTS);
            assert!(premium_net >= net);
            assert!(net >= previous);
            previous = net;
        }
    }

    #[tokio::test]
    async fn test_transfer() {
        let ledger = funded(1, 100).await;
        ledger.transfer(1, 2, 40, "duel", "bet").await.unwrap();
        assert_eq!(ledger.balance(1).await.unwrap(), 60);
        assert_eq!(ledger.balance(2).await.unwrap(), 40);

        let result = ledger.transfer(1, 2, 61, "duel", "bet").await;
        assert_eq!(
            result,
            Err(LedgerError::InsufficientFunds { have: 60, need: 61 })
        );
        assert_eq!(ledger.balance(1).await.unwrap(), 60);
    }

    #[tokio::test]
    async fn test_transfer_rolls_back_failed_credit() {
        let ledger = funded(1, 100).await;
        ledger.store().await.fail_next(2, 1);

        let result = ledger.transfer(1, 2, 40, "duel", "bet").await;
        assert!(matches!(result, Err(LedgerError::Store(_))));
        assert_eq!(ledger.balance(1).await.unwrap(), 100);
        assert_eq!(ledger.balance(2).await.unwrap(), 0);

        let history = ledger.history(1).await.unwrap();
        let rollback = history.last().unwrap();
        assert_eq!(rollback.source, ROLLBACK_SOURCE);
        assert_eq!(rollback.amount, 40);
    }
}
