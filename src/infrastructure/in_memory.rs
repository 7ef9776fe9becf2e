use super::unit_of_work::{CommittedState, HeldLocks, LockTable, StagedWrites};
use crate::domain::account::{
    Account, AccountId, AccountNumber, AccountSnapshot, Balance, BalanceId,
};
use crate::domain::owner::{Email, Owner, OwnerId};
use crate::domain::ports::{AccountStore, StoreTransaction};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    owners: HashMap<OwnerId, Owner>,
    owners_by_email: HashMap<Email, OwnerId>,
    accounts: BTreeMap<AccountId, Account>,
    accounts_by_number: HashMap<AccountNumber, AccountId>,
    balances: HashMap<BalanceId, Balance>,
    balance_refs: HashMap<BalanceId, AccountId>,
}

impl Tables {
    fn account_by_number(&self, number: &AccountNumber) -> Option<&Account> {
        self.accounts_by_number
            .get(number)
            .and_then(|id| self.accounts.get(id))
    }

    fn snapshot(&self, account: &Account) -> Result<AccountSnapshot, StoreError> {
        let owner = self
            .owners
            .get(&account.owner)
            .ok_or_else(|| StoreError::Codec(format!("owner {} missing", account.owner)))?;
        let balance = self
            .balances
            .get(&account.balance)
            .ok_or(StoreError::MissingBalance(account.balance))?;
        Ok(AccountSnapshot {
            account_id: account.id,
            account_number: account.account_number.clone(),
            owner_email: owner.email.clone(),
            balance: balance.amount,
        })
    }

    fn apply(&mut self, staged: StagedWrites) {
        for owner in staged.owners {
            self.owners_by_email.insert(owner.email.clone(), owner.id);
            self.owners.insert(owner.id, owner);
        }
        for balance in staged.balances {
            self.balances.insert(balance.id, balance);
        }
        for account in staged.accounts {
            self.accounts_by_number
                .insert(account.account_number.clone(), account.id);
            self.balance_refs.insert(account.balance, account.id);
            self.accounts.insert(account.id, account);
        }
        for (id, balance) in staged.balance_updates {
            self.balances.insert(id, balance);
        }
    }
}

impl CommittedState for Tables {
    fn account_number_taken(&self, number: &AccountNumber) -> Result<bool, StoreError> {
        Ok(self.accounts_by_number.contains_key(number))
    }

    fn email_taken(&self, email: &Email) -> Result<bool, StoreError> {
        Ok(self.owners_by_email.contains_key(email))
    }

    fn balance_exists(&self, id: BalanceId) -> Result<bool, StoreError> {
        Ok(self.balances.contains_key(&id))
    }

    fn balance_referenced(&self, id: BalanceId) -> Result<bool, StoreError> {
        Ok(self.balance_refs.contains_key(&id))
    }
}

/// A thread-safe in-memory account store.
///
/// Committed state lives behind `Arc<RwLock<..>>`; balance locks come from a shared
/// [`LockTable`]. Cloning yields another handle onto the same data.
/// Ideal for testing or when persistence is not required.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAccountStore {
    tables: Arc<RwLock<Tables>>,
    sequence: Arc<AtomicU64>,
    locks: LockTable,
}

impl InMemoryAccountStore {
    /// Creates a new, empty in-memory account store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        Ok(Box::new(InMemoryTransaction {
            store: self.clone(),
            held: HeldLocks::default(),
            staged: StagedWrites::default(),
        }))
    }

    async fn account_number_exists(&self, number: &AccountNumber) -> Result<bool, StoreError> {
        self.tables.read().await.account_number_taken(number)
    }

    async fn find_account(&self, number: &AccountNumber) -> Result<Option<Account>, StoreError> {
        Ok(self.tables.read().await.account_by_number(number).cloned())
    }

    async fn find_account_by_owner(&self, email: &Email) -> Result<Option<Account>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .owners_by_email
            .get(email)
            .and_then(|id| tables.owners.get(id))
            .and_then(|owner| owner.account)
            .and_then(|id| tables.accounts.get(&id))
            .cloned())
    }

    async fn snapshot(&self, number: &AccountNumber) -> Result<Option<AccountSnapshot>, StoreError> {
        let tables = self.tables.read().await;
        tables
            .account_by_number(number)
            .map(|account| tables.snapshot(account))
            .transpose()
    }

    async fn all_accounts(&self) -> Result<Vec<AccountSnapshot>, StoreError> {
        let tables = self.tables.read().await;
        tables
            .accounts
            .values()
            .map(|account| tables.snapshot(account))
            .collect()
    }
}

struct InMemoryTransaction {
    store: InMemoryAccountStore,
    held: HeldLocks,
    staged: StagedWrites,
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn next_id(&mut self) -> Result<u64, StoreError> {
        Ok(self.store.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn find_account(
        &mut self,
        number: &AccountNumber,
    ) -> Result<Option<Account>, StoreError> {
        self.store.find_account(number).await
    }

    async fn owner_exists(&mut self, email: &Email) -> Result<bool, StoreError> {
        self.store.tables.read().await.email_taken(email)
    }

    async fn account_number_exists(&mut self, number: &AccountNumber) -> Result<bool, StoreError> {
        self.store.account_number_exists(number).await
    }

    async fn lock_balance(&mut self, id: BalanceId) -> Result<Balance, StoreError> {
        self.held.acquire(&self.store.locks, id).await;
        if let Some(staged) = self.staged.updated_balance(id) {
            return Ok(staged.clone());
        }
        self.store
            .tables
            .read()
            .await
            .balances
            .get(&id)
            .cloned()
            .ok_or(StoreError::MissingBalance(id))
    }

    fn stage_owner(&mut self, owner: Owner) {
        self.staged.owners.push(owner);
    }

    fn stage_balance(&mut self, balance: Balance) {
        self.staged.balances.push(balance);
    }

    fn stage_account(&mut self, account: Account) {
        self.staged.accounts.push(account);
    }

    fn stage_balance_update(&mut self, balance: Balance) {
        self.staged.balance_updates.insert(balance.id, balance);
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTransaction {
            store,
            held,
            staged,
        } = *self;
        if staged.is_empty() {
            return Ok(());
        }

        let mut tables = store.tables.write().await;
        staged.validate(&held, &*tables)?;
        tables.apply(staged);
        // Writes are visible before the balance locks in `held` are released.
        drop(tables);
        drop(held);
        Ok(())
    }
}
