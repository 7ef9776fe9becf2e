use super::money::{Amount, Money};
use super::owner::{Email, OwnerId};
use crate::error::{Result, WalletError};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BalanceId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for BalanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Externally visible account identifier.
///
/// Numbers issued by the allocator are ten ASCII digits (`YYMMDD` + four random
/// digits). Numbers supplied by callers are only trimmed: an unknown number must
/// surface as "account not found", never as a format error.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountNumber(String);

impl AccountNumber {
    pub const LEN: usize = 10;

    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this number has the shape the allocator produces.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == Self::LEN && self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl From<&str> for AccountNumber {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for AccountNumber {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A wallet account. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub account_number: AccountNumber,
    pub owner: OwnerId,
    /// The one balance this account exclusively owns.
    pub balance: BalanceId,
}

/// The mutable monetary state of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub id: BalanceId,
    pub amount: Money,
}

impl Balance {
    pub fn new(id: BalanceId) -> Self {
        Self {
            id,
            amount: Money::ZERO,
        }
    }

    /// Adds `amount` and returns the new value.
    pub fn credit(&mut self, amount: Amount) -> Result<Money> {
        self.amount = self
            .amount
            .checked_add(amount)
            .ok_or(WalletError::InvalidAmount {
                reason: "amount overflows the balance",
            })?;
        Ok(self.amount)
    }

    /// Subtracts `amount` if the balance covers it and returns the new value.
    pub fn debit(&mut self, amount: Amount) -> Result<Money> {
        self.amount =
            self.amount
                .checked_sub(amount)
                .ok_or(WalletError::InsufficientBalance {
                    available: self.amount,
                    requested: amount.into(),
                })?;
        Ok(self.amount)
    }
}

/// Read model joining an account with its owner and current balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub account_id: AccountId,
    pub account_number: AccountNumber,
    pub owner_email: Email,
    pub balance: Money,
}
