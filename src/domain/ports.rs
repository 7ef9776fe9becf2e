use super::account::{Account, AccountNumber, AccountSnapshot, Balance, BalanceId};
use super::owner::{Email, Owner};
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Durable keyed storage for owners, accounts and balances.
///
/// Reads on the store itself observe committed state only. Mutations go through a
/// [`StoreTransaction`] opened with [`AccountStore::begin`].
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
    async fn account_number_exists(&self, number: &AccountNumber) -> Result<bool, StoreError>;
    async fn find_account(&self, number: &AccountNumber) -> Result<Option<Account>, StoreError>;
    async fn find_account_by_owner(&self, email: &Email) -> Result<Option<Account>, StoreError>;
    async fn snapshot(&self, number: &AccountNumber) -> Result<Option<AccountSnapshot>, StoreError>;
    /// All accounts, ordered by account id.
    async fn all_accounts(&self) -> Result<Vec<AccountSnapshot>, StoreError>;
}

/// A unit of work against an [`AccountStore`].
///
/// Staged writes become visible only on [`commit`](StoreTransaction::commit), all
/// together or not at all. Balance locks taken through
/// [`lock_balance`](StoreTransaction::lock_balance) are held until the unit of work
/// commits or is dropped; dropping without committing discards every staged write.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Next value of the store's surrogate id sequence.
    async fn next_id(&mut self) -> Result<u64, StoreError>;

    async fn find_account(&mut self, number: &AccountNumber)
    -> Result<Option<Account>, StoreError>;

    async fn owner_exists(&mut self, email: &Email) -> Result<bool, StoreError>;

    async fn account_number_exists(&mut self, number: &AccountNumber) -> Result<bool, StoreError>;

    /// Waits for the exclusive lock on a balance, then reads its committed value.
    async fn lock_balance(&mut self, id: BalanceId) -> Result<Balance, StoreError>;

    /// Locks several balances in ascending id order.
    async fn lock_balances(
        &mut self,
        ids: &[BalanceId],
    ) -> Result<BTreeMap<BalanceId, Balance>, StoreError> {
        let mut ordered = ids.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut locked = BTreeMap::new();
        for id in ordered {
            let balance = self.lock_balance(id).await?;
            locked.insert(id, balance);
        }
        Ok(locked)
    }

    fn stage_owner(&mut self, owner: Owner);

    /// Stages a newly created balance.
    fn stage_balance(&mut self, balance: Balance);

    fn stage_account(&mut self, account: Account);

    /// Stages a new value for an existing balance locked by this unit of work.
    fn stage_balance_update(&mut self, balance: Balance);

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        drop(self);
        Ok(())
    }
}

/// Candidate draws one provisioning may spend, shared across its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptBudget {
    limit: u32,
    spent: u32,
}

impl AttemptBudget {
    pub fn new(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
            spent: 0,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn spent(&self) -> u32 {
        self.spent
    }

    /// Charges one attempt; `false` once the budget is used up.
    pub fn take(&mut self) -> bool {
        if self.spent < self.limit {
            self.spent += 1;
            true
        } else {
            false
        }
    }
}

/// Produces fresh, unused account numbers for provisioning.
#[async_trait]
pub trait AccountNumberAllocator: Send + Sync {
    /// Attempts a single provisioning may spend over all of its allocations.
    fn max_attempts(&self) -> u32;

    /// Draws a number unused as of `tx`, charging every draw to `budget`.
    async fn allocate(
        &self,
        tx: &mut dyn StoreTransaction,
        budget: &mut AttemptBudget,
    ) -> Result<AccountNumber>;
}

pub type AccountStoreBox = Box<dyn AccountStore>;
pub type SharedAccountStore = Arc<dyn AccountStore>;
pub type AccountStoreFactory = Box<dyn Fn() -> AccountStoreBox + Send + Sync>;
