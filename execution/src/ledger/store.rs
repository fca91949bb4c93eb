use arcade_types::UserId;
use std::{collections::HashMap, future::Future};
use thiserror::Error;

/// Direction of a ledger entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Income,
    Expense,
}

/// Whether an entry moved coins or only recorded an attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryStatus {
    Applied,
    /// Refused for lack of funds: `amount` is zero and the balance is unchanged.
    Rejected,
}

/// One row of the append-only transaction log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub id: u64,
    pub user: UserId,
    /// Signed change actually applied to the balance.
    pub amount: i64,
    /// Signed change that was asked for.
    pub requested: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub kind: EntryKind,
    pub status: EntryStatus,
    pub source: String,
    pub comment: String,
    pub timestamp_ms: u64,
}

impl Entry {
    /// `balance_after == balance_before + amount`.
    pub fn is_consistent(&self) -> bool {
        self.balance_before.checked_add(self.amount) == Some(self.balance_after)
    }
}

/// Spendable balance of one user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub user: UserId,
    pub balance: i64,
}

impl Account {
    pub fn new(user: UserId) -> Self {
        Self { user, balance: 0 }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("ledger store unavailable: {0}")]
    Unavailable(String),
}

/// Durable storage behind the [super::Ledger].
///
/// The ledger serializes every call, so implementations only need to make a
/// single `commit` atomic (account row and log row together).
pub trait Store: Send + Sync + 'static {
    fn load(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Option<Account>, StoreError>> + Send;
    fn commit(
        &mut self,
        account: Account,
        entry: Entry,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
    fn history(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<Entry>, StoreError>> + Send;
}

/// In-process store, used by the node and by tests.
#[derive(Default)]
pub struct Memory {
    accounts: HashMap<UserId, Account>,
    entries: HashMap<UserId, Vec<Entry>>,
    failures: HashMap<UserId, usize>,
}

impl Memory {
    /// Make the next `count` commits touching `user` fail.
    #[cfg(any(test, feature = "mocks"))]
    pub fn fail_next(&mut self, user: UserId, count: usize) {
        self.failures.insert(user, count);
    }
}

impl Store for Memory {
    async fn load(&self, user: UserId) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.get(&user).cloned())
    }

    async fn commit(&mut self, account: Account, entry: Entry) -> Result<(), StoreError> {
        if let Some(remaining) = self.failures.get_mut(&account.user) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Unavailable(format!(
                    "injected failure for user {}",
                    account.user
                )));
            }
        }
        self.entries.entry(account.user).or_default().push(entry);
        self.accounts.insert(account.user, account);
        Ok(())
    }

    async fn history(&self, user: UserId) -> Result<Vec<Entry>, StoreError> {
        Ok(self.entries.get(&user).cloned().unwrap_or_default())
    }
}
