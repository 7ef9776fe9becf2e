use crate::domain::account::{AccountNumber, BalanceId};
use crate::domain::money::Money;
use std::fmt;
use thiserror::Error;

pub type Result<T, E = WalletError> = std::result::Result<T, E>;

/// Which account of a request a failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountSide {
    Source,
    Destination,
    Target,
}

impl fmt::Display for AccountSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountSide::Source => f.write_str("Source"),
            AccountSide::Destination => f.write_str("Destination"),
            AccountSide::Target => f.write_str("Target"),
        }
    }
}

/// Store-level uniqueness constraints checked at commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    AccountNumber,
    OwnerEmail,
    /// Each balance belongs to exactly one account.
    AccountBalance,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::AccountNumber => f.write_str("account_number"),
            Constraint::OwnerEmail => f.write_str("owner_email"),
            Constraint::AccountBalance => f.write_str("account_balance"),
        }
    }
}

/// Failures raised by an `AccountStore` backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),
    #[error("Record codec error: {0}")]
    Codec(String),
    #[error("Unique constraint `{constraint}` violated")]
    UniqueViolation { constraint: Constraint },
    #[error("Balance {0} would become negative")]
    NegativeBalance(BalanceId),
    #[error("Balance {0} is not locked by this unit of work")]
    NotLocked(BalanceId),
    #[error("Balance {0} does not exist")]
    MissingBalance(BalanceId),
}

/// Every failure a wallet operation can report to its caller.
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Owner with email {email} already exists")]
    DuplicateOwner { email: String },
    #[error("Invalid owner: {0}")]
    InvalidOwner(String),
    #[error("Unable to generate unique account number after {attempts} attempts")]
    IdentifierExhausted { attempts: u32 },
    #[error("{side} account not found: {account_number}")]
    AccountNotFound {
        side: AccountSide,
        account_number: AccountNumber,
    },
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: &'static str },
    #[error("Cannot transfer to the same account")]
    SameAccount,
    #[error("Insufficient balance. Available: {available}, Requested: {requested}")]
    InsufficientBalance { available: Money, requested: Money },
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl WalletError {
    pub(crate) fn not_found(side: AccountSide, account_number: &AccountNumber) -> Self {
        Self::AccountNotFound {
            side,
            account_number: account_number.clone(),
        }
    }
}
