//! Translation of wallet failures into what an untrusted caller may see.

use crate::error::WalletError;
use rand::Rng;
use std::fmt;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Conflict,
    NotFound,
    InvalidOwner,
    InvalidAmount,
    SameAccount,
    InsufficientBalance,
    Unavailable,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::InvalidOwner => "invalid_owner",
            ErrorCategory::InvalidAmount => "invalid_amount",
            ErrorCategory::SameAccount => "same_account",
            ErrorCategory::InsufficientBalance => "insufficient_balance",
            ErrorCategory::Unavailable => "unavailable",
            ErrorCategory::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// A failure as reported across the adapter boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicError {
    pub category: ErrorCategory,
    pub message: String,
    /// Correlation reference for failures whose detail is only logged.
    pub reference: Option<String>,
}

impl PublicError {
    pub fn from_wallet_error(err: &WalletError) -> Self {
        let category = match err {
            WalletError::DuplicateOwner { .. } => ErrorCategory::Conflict,
            WalletError::AccountNotFound { .. } => ErrorCategory::NotFound,
            WalletError::InvalidOwner(_) => ErrorCategory::InvalidOwner,
            WalletError::InvalidAmount { .. } => ErrorCategory::InvalidAmount,
            WalletError::SameAccount => ErrorCategory::SameAccount,
            WalletError::InsufficientBalance { .. } => ErrorCategory::InsufficientBalance,
            WalletError::IdentifierExhausted { .. } => ErrorCategory::Unavailable,
            WalletError::Storage(_) => ErrorCategory::Internal,
        };

        match err {
            WalletError::Storage(source) => {
                let reference = correlation_reference();
                error!(%reference, error = %source, "Storage failure");
                Self {
                    category,
                    message: "An internal storage error occurred".to_string(),
                    reference: Some(reference),
                }
            }
            other => Self {
                category,
                message: other.to_string(),
                reference: None,
            },
        }
    }
}

impl fmt::Display for PublicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)?;
        if let Some(reference) = &self.reference {
            write!(f, " (ref {reference})")?;
        }
        Ok(())
    }
}

fn correlation_reference() -> String {
    format!("ERR-{:08X}", rand::thread_rng().r#gen::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::AccountNumber;
    use crate::domain::money::Money;
    use crate::error::{AccountSide, StoreError};
    use rust_decimal_macros::dec;

    #[test]
    fn test_categories_are_distinct_per_kind() {
        let cases = [
            (
                WalletError::DuplicateOwner {
                    email: "a@x.com".into(),
                },
                ErrorCategory::Conflict,
            ),
            (
                WalletError::AccountNotFound {
                    side: AccountSide::Source,
                    account_number: AccountNumber::from("ACCT1"),
                },
                ErrorCategory::NotFound,
            ),
            (
                WalletError::InvalidOwner("missing '@'".into()),
                ErrorCategory::InvalidOwner,
            ),
            (
                WalletError::InvalidAmount {
                    reason: "amount is required",
                },
                ErrorCategory::InvalidAmount,
            ),
            (WalletError::SameAccount, ErrorCategory::SameAccount),
            (
                WalletError::InsufficientBalance {
                    available: Money::ZERO,
                    requested: Money::new(dec!(5)).unwrap(),
                },
                ErrorCategory::InsufficientBalance,
            ),
            (
                WalletError::IdentifierExhausted { attempts: 10 },
                ErrorCategory::Unavailable,
            ),
        ];
        let mut seen = std::collections::HashSet::new();
        for (err, category) in cases {
            assert_eq!(PublicError::from_wallet_error(&err).category, category);
            assert!(seen.insert(category.to_string()), "{category} reused");
        }
    }

    #[test]
    fn test_business_messages_are_passed_through() {
        let err = WalletError::AccountNotFound {
            side: AccountSide::Destination,
            account_number: AccountNumber::from("ACCT9"),
        };
        let public = PublicError::from_wallet_error(&err);
        assert_eq!(public.message, "Destination account not found: ACCT9");
        assert_eq!(public.reference, None);
    }

    #[test]
    fn test_storage_detail_is_hidden() {
        let err = WalletError::Storage(StoreError::Codec("secret table layout".into()));
        let public = PublicError::from_wallet_error(&err);

        assert_eq!(public.category, ErrorCategory::Internal);
        assert!(!public.message.contains("secret"));
        let reference = public.reference.clone().unwrap();
        assert!(reference.starts_with("ERR-"));
        assert_eq!(reference.len(), 12);
        assert!(public.to_string().contains(&reference));
    }
}
