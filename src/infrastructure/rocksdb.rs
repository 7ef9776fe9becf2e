use super::unit_of_work::{CommittedState, HeldLocks, LockTable, StagedWrites};
use crate::domain::account::{Account, AccountId, AccountNumber, AccountSnapshot, Balance, BalanceId};
use crate::domain::owner::{Email, Owner, OwnerId};
use crate::domain::ports::{AccountStore, StoreTransaction};
use crate::error::StoreError;
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Column Family for owner records, keyed by owner id.
pub const CF_OWNERS: &str = "owners";
/// Column Family for account records, keyed by account id.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for balance records, keyed by balance id.
pub const CF_BALANCES: &str = "balances";
/// Unique index: account number -> account id.
pub const CF_ACCOUNT_NUMBERS: &str = "account_numbers";
/// Unique index: owner email -> owner id.
pub const CF_OWNER_EMAILS: &str = "owner_emails";
/// Unique foreign key: balance id -> owning account id.
pub const CF_BALANCE_REFS: &str = "balance_refs";
/// Store metadata such as the id sequence.
pub const CF_META: &str = "meta";

const SEQUENCE_KEY: &[u8] = b"next_id";

const COLUMN_FAMILIES: [&str; 7] = [
    CF_OWNERS,
    CF_ACCOUNTS,
    CF_BALANCES,
    CF_ACCOUNT_NUMBERS,
    CF_OWNER_EMAILS,
    CF_BALANCE_REFS,
    CF_META,
];

impl From<rocksdb::Error> for StoreError {
    fn from(err: rocksdb::Error) -> Self {
        StoreError::Backend(Box::new(err))
    }
}

/// A persistent account store backed by RocksDB.
///
/// Each entity and each secondary index gets its own Column Family. A commit is a
/// single `WriteBatch`, so it lands atomically; commits are serialized so that the
/// uniqueness checks and the batch write see the same state.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    sequence: Arc<AtomicU64>,
    commit_gate: Arc<Mutex<()>>,
    locks: LockTable,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that all column families exist and restores the id sequence.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        let store = Self {
            db: Arc::new(db),
            sequence: Arc::new(AtomicU64::new(0)),
            commit_gate: Arc::new(Mutex::new(())),
            locks: LockTable::new(),
        };
        let last_id = store.get_json::<u64>(CF_META, SEQUENCE_KEY)?.unwrap_or(0);
        store.sequence.store(last_id, Ordering::SeqCst);
        Ok(store)
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StoreError> {
        self.db.cf_handle(name).ok_or_else(|| {
            StoreError::Backend(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        cf: &str,
        key: impl AsRef<[u8]>,
    ) -> Result<Option<T>, StoreError> {
        let handle = self.cf(cf)?;
        match self.db.get_pinned_cf(handle, key)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Codec(format!("Deserialization error: {e}"))),
            None => Ok(None),
        }
    }

    fn contains(&self, cf: &str, key: impl AsRef<[u8]>) -> Result<bool, StoreError> {
        let handle = self.cf(cf)?;
        Ok(self.db.get_pinned_cf(handle, key)?.is_some())
    }

    fn put_json<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf: &str,
        key: impl AsRef<[u8]>,
        value: &T,
    ) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| StoreError::Codec(format!("Serialization error: {e}")))?;
        batch.put_cf(self.cf(cf)?, key, bytes);
        Ok(())
    }

    fn account_by_number(&self, number: &AccountNumber) -> Result<Option<Account>, StoreError> {
        match self.get_json::<AccountId>(CF_ACCOUNT_NUMBERS, number.as_str())? {
            Some(id) => self.get_json(CF_ACCOUNTS, id.0.to_be_bytes()),
            None => Ok(None),
        }
    }

    fn load_snapshot(&self, account: &Account) -> Result<AccountSnapshot, StoreError> {
        let owner: Owner = self
            .get_json(CF_OWNERS, account.owner.0.to_be_bytes())?
            .ok_or_else(|| StoreError::Codec(format!("owner {} missing", account.owner)))?;
        let balance: Balance = self
            .get_json(CF_BALANCES, account.balance.0.to_be_bytes())?
            .ok_or(StoreError::MissingBalance(account.balance))?;
        Ok(AccountSnapshot {
            account_id: account.id,
            account_number: account.account_number.clone(),
            owner_email: owner.email,
            balance: balance.amount,
        })
    }

    fn write_staged(&self, staged: &StagedWrites) -> Result<(), StoreError> {
        let mut batch = WriteBatch::default();
        for owner in &staged.owners {
            self.put_json(&mut batch, CF_OWNERS, owner.id.0.to_be_bytes(), owner)?;
            self.put_json(&mut batch, CF_OWNER_EMAILS, owner.email.as_str(), &owner.id)?;
        }
        for balance in staged.balances.iter().chain(staged.balance_updates.values()) {
            self.put_json(&mut batch, CF_BALANCES, balance.id.0.to_be_bytes(), balance)?;
        }
        for account in &staged.accounts {
            self.put_json(&mut batch, CF_ACCOUNTS, account.id.0.to_be_bytes(), account)?;
            self.put_json(
                &mut batch,
                CF_ACCOUNT_NUMBERS,
                account.account_number.as_str(),
                &account.id,
            )?;
            self.put_json(
                &mut batch,
                CF_BALANCE_REFS,
                account.balance.0.to_be_bytes(),
                &account.id,
            )?;
        }
        let sequence = self.sequence.load(Ordering::SeqCst);
        self.put_json(&mut batch, CF_META, SEQUENCE_KEY, &sequence)?;

        self.db.write(batch)?;
        Ok(())
    }
}

impl CommittedState for RocksDBStore {
    fn account_number_taken(&self, number: &AccountNumber) -> Result<bool, StoreError> {
        self.contains(CF_ACCOUNT_NUMBERS, number.as_str())
    }

    fn email_taken(&self, email: &Email) -> Result<bool, StoreError> {
        self.contains(CF_OWNER_EMAILS, email.as_str())
    }

    fn balance_exists(&self, id: BalanceId) -> Result<bool, StoreError> {
        self.contains(CF_BALANCES, id.0.to_be_bytes())
    }

    fn balance_referenced(&self, id: BalanceId) -> Result<bool, StoreError> {
        self.contains(CF_BALANCE_REFS, id.0.to_be_bytes())
    }
}

#[async_trait]
impl AccountStore for RocksDBStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        Ok(Box::new(RocksDBTransaction {
            store: self.clone(),
            held: HeldLocks::default(),
            staged: StagedWrites::default(),
        }))
    }

    async fn account_number_exists(&self, number: &AccountNumber) -> Result<bool, StoreError> {
        self.account_number_taken(number)
    }

    async fn find_account(&self, number: &AccountNumber) -> Result<Option<Account>, StoreError> {
        self.account_by_number(number)
    }

    async fn find_account_by_owner(&self, email: &Email) -> Result<Option<Account>, StoreError> {
        let Some(owner_id) = self.get_json::<OwnerId>(CF_OWNER_EMAILS, email.as_str())? else {
            return Ok(None);
        };
        let owner: Option<Owner> = self.get_json(CF_OWNERS, owner_id.0.to_be_bytes())?;
        match owner.and_then(|owner| owner.account) {
            Some(id) => self.get_json(CF_ACCOUNTS, id.0.to_be_bytes()),
            None => Ok(None),
        }
    }

    async fn snapshot(&self, number: &AccountNumber) -> Result<Option<AccountSnapshot>, StoreError> {
        self.account_by_number(number)?
            .map(|account| self.load_snapshot(&account))
            .transpose()
    }

    async fn all_accounts(&self) -> Result<Vec<AccountSnapshot>, StoreError> {
        let handle = self.cf(CF_ACCOUNTS)?;

        // Big-endian id keys iterate in ascending id order.
        let mut accounts = Vec::new();
        for item in self.db.iterator_cf(handle, IteratorMode::Start) {
            let (_key, value) = item?;
            let account: Account = serde_json::from_slice(&value)
                .map_err(|e| StoreError::Codec(format!("Failed to deserialize account: {e}")))?;
            accounts.push(self.load_snapshot(&account)?);
        }
        Ok(accounts)
    }
}

struct RocksDBTransaction {
    store: RocksDBStore,
    held: HeldLocks,
    staged: StagedWrites,
}

#[async_trait]
impl StoreTransaction for RocksDBTransaction {
    async fn next_id(&mut self) -> Result<u64, StoreError> {
        Ok(self.store.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn find_account(
        &mut self,
        number: &AccountNumber,
    ) -> Result<Option<Account>, StoreError> {
        self.store.account_by_number(number)
    }

    async fn owner_exists(&mut self, email: &Email) -> Result<bool, StoreError> {
        self.store.email_taken(email)
    }

    async fn account_number_exists(&mut self, number: &AccountNumber) -> Result<bool, StoreError> {
        self.store.account_number_taken(number)
    }

    async fn lock_balance(&mut self, id: BalanceId) -> Result<Balance, StoreError> {
        self.held.acquire(&self.store.locks, id).await;
        if let Some(staged) = self.staged.updated_balance(id) {
            return Ok(staged.clone());
        }
        self.store
            .get_json(CF_BALANCES, id.0.to_be_bytes())?
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
        let RocksDBTransaction {
            store,
            held,
            staged,
        } = *self;
        if staged.is_empty() {
            return Ok(());
        }

        let gate = store.commit_gate.lock().await;
        staged.validate(&held, &store)?;
        store.write_staged(&staged)?;
        drop(gate);
        drop(held);
        Ok(())
    }
}
