//! Pieces shared by every store backend: the exclusive balance lock table and the
//! buffer of writes staged by a unit of work.

use crate::domain::account::{Account, AccountNumber, Balance, BalanceId};
use crate::domain::owner::{Email, Owner};
use crate::error::{Constraint, StoreError};
use dashmap::DashMap;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Grants exclusive "for update" locks on balances.
///
/// One async mutex per balance id, created on first use. Cloning shares the table.
#[derive(Debug, Default, Clone)]
pub struct LockTable {
    slots: Arc<DashMap<BalanceId, Arc<Mutex<()>>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the lock on `id` is free and takes it.
    pub async fn acquire(&self, id: BalanceId) -> OwnedMutexGuard<()> {
        // The map guard must be released before awaiting the mutex.
        let slot = Arc::clone(&self.slots.entry(id).or_default());
        slot.lock_owned().await
    }
}

/// Locks held by a single unit of work, released when it is dropped.
#[derive(Debug, Default)]
pub struct HeldLocks {
    guards: BTreeMap<BalanceId, OwnedMutexGuard<()>>,
}

impl HeldLocks {
    pub async fn acquire(&mut self, table: &LockTable, id: BalanceId) {
        if !self.guards.contains_key(&id) {
            let guard = table.acquire(id).await;
            self.guards.insert(id, guard);
        }
    }

    pub fn holds(&self, id: BalanceId) -> bool {
        self.guards.contains_key(&id)
    }
}

/// Read access to committed state needed to validate a commit.
pub trait CommittedState {
    fn account_number_taken(&self, number: &AccountNumber) -> Result<bool, StoreError>;
    fn email_taken(&self, email: &Email) -> Result<bool, StoreError>;
    fn balance_exists(&self, id: BalanceId) -> Result<bool, StoreError>;
    /// Whether some committed account already references this balance.
    fn balance_referenced(&self, id: BalanceId) -> Result<bool, StoreError>;
}

/// Writes buffered by a unit of work until commit.
#[derive(Debug, Default)]
pub struct StagedWrites {
    pub owners: Vec<Owner>,
    pub balances: Vec<Balance>,
    pub accounts: Vec<Account>,
    pub balance_updates: BTreeMap<BalanceId, Balance>,
}

impl StagedWrites {
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
            && self.balances.is_empty()
            && self.accounts.is_empty()
            && self.balance_updates.is_empty()
    }

    /// Staged value of a balance, if this unit of work already changed it.
    pub fn updated_balance(&self, id: BalanceId) -> Option<&Balance> {
        self.balance_updates.get(&id)
    }

    /// Checks every store constraint the staged writes would touch.
    ///
    /// Must run while the backend prevents concurrent commits, so the answer still
    /// holds when the writes are applied.
    pub fn validate(
        &self,
        locks: &HeldLocks,
        state: &impl CommittedState,
    ) -> Result<(), StoreError> {
        let mut emails = HashSet::new();
        for owner in &self.owners {
            if !emails.insert(&owner.email) || state.email_taken(&owner.email)? {
                return Err(StoreError::UniqueViolation {
                    constraint: Constraint::OwnerEmail,
                });
            }
        }

        let mut numbers = HashSet::new();
        for account in &self.accounts {
            if !numbers.insert(&account.account_number)
                || state.account_number_taken(&account.account_number)?
            {
                return Err(StoreError::UniqueViolation {
                    constraint: Constraint::AccountNumber,
                });
            }
        }

        let new_balances: HashSet<BalanceId> = self.balances.iter().map(|b| b.id).collect();
        let mut referenced = HashSet::new();
        for account in &self.accounts {
            let id = account.balance;
            let known = new_balances.contains(&id) || state.balance_exists(id)?;
            if !known {
                return Err(StoreError::MissingBalance(id));
            }
            if !referenced.insert(id) || state.balance_referenced(id)? {
                return Err(StoreError::UniqueViolation {
                    constraint: Constraint::AccountBalance,
                });
            }
        }
        // A new balance nobody owns would be an orphan.
        if let Some(orphan) = new_balances.iter().find(|id| !referenced.contains(*id)) {
            tracing::debug!(balance = %orphan, "orphan balance staged");
            return Err(StoreError::UniqueViolation {
                constraint: Constraint::AccountBalance,
            });
        }

        for balance in &self.balances {
            if balance.amount.value().is_sign_negative() {
                return Err(StoreError::NegativeBalance(balance.id));
            }
        }
        for (id, balance) in &self.balance_updates {
            if !locks.holds(*id) {
                return Err(StoreError::NotLocked(*id));
            }
            if !state.balance_exists(*id)? {
                return Err(StoreError::MissingBalance(*id));
            }
            if balance.amount.value().is_sign_negative() {
                return Err(StoreError::NegativeBalance(*id));
            }
        }
        Ok(())
    }
}
