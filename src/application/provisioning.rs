use super::allocator::{BoundedRetryAllocator, DateRandomGenerator};
use crate::config::EngineConfig;
use crate::domain::account::{Account, AccountId, AccountSnapshot, Balance, BalanceId};
use crate::domain::owner::{Email, Owner, OwnerId};
use crate::domain::ports::{AccountNumberAllocator, AttemptBudget, SharedAccountStore};
use crate::error::{Constraint, Result, StoreError, WalletError};
use std::sync::Arc;
use tracing::{debug, info};

/// Creates an owner's account together with its zero balance.
#[derive(Clone)]
pub struct ProvisioningService {
    store: SharedAccountStore,
    allocator: Arc<dyn AccountNumberAllocator>,
}

impl ProvisioningService {
    pub fn new(store: SharedAccountStore, allocator: Arc<dyn AccountNumberAllocator>) -> Self {
        Self { store, allocator }
    }

    /// Uses the date-prefixed random allocator with the configured retry budget.
    pub fn with_config(store: SharedAccountStore, config: &EngineConfig) -> Self {
        let allocator =
            BoundedRetryAllocator::new(DateRandomGenerator, config.max_allocation_attempts);
        Self::new(store, Arc::new(allocator))
    }

    /// Provisions a new account for the owner identified by `email`.
    ///
    /// Owner, balance and account are committed as one unit; on any failure
    /// nothing is persisted. A number that another provisioning commits between
    /// allocation and commit is drawn again, within the same attempt budget.
    pub async fn provision(&self, email: &str) -> Result<AccountSnapshot> {
        let email = Email::parse(email)?;
        info!(%email, "Creating owner and account");

        let mut budget = AttemptBudget::new(self.allocator.max_attempts());
        loop {
            match self.try_provision(&email, &mut budget).await {
                Err(WalletError::Storage(StoreError::UniqueViolation {
                    constraint: Constraint::AccountNumber,
                })) => {
                    debug!(%email, attempts = budget.spent(), "Account number taken at commit");
                }
                result => return result,
            }
        }
    }

    async fn try_provision(
        &self,
        email: &Email,
        budget: &mut AttemptBudget,
    ) -> Result<AccountSnapshot> {
        let mut tx = self.store.begin().await?;
        if tx.owner_exists(email).await? {
            return Err(duplicate_owner(email));
        }

        let account_number = self.allocator.allocate(tx.as_mut(), budget).await?;
        let owner_id = OwnerId(tx.next_id().await?);
        let balance_id = BalanceId(tx.next_id().await?);
        let account_id = AccountId(tx.next_id().await?);

        let balance = Balance::new(balance_id);
        let snapshot = AccountSnapshot {
            account_id,
            account_number: account_number.clone(),
            owner_email: email.clone(),
            balance: balance.amount,
        };

        tx.stage_balance(balance);
        tx.stage_account(Account {
            id: account_id,
            account_number,
            owner: owner_id,
            balance: balance_id,
        });
        tx.stage_owner(Owner {
            id: owner_id,
            email: email.clone(),
            account: Some(account_id),
        });

        tx.commit().await.map_err(|err| match err {
            // Another provisioning for the same owner committed first.
            StoreError::UniqueViolation {
                constraint: Constraint::OwnerEmail,
            } => duplicate_owner(email),
            other => WalletError::from(other),
        })?;

        info!(
            account_number = %snapshot.account_number,
            "Owner and account created"
        );
        Ok(snapshot)
    }
}

fn duplicate_owner(email: &Email) -> WalletError {
    WalletError::DuplicateOwner {
        email: email.to_string(),
    }
}
