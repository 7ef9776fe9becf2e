use crate::domain::account::{Account, AccountNumber, AccountSnapshot};
use crate::domain::money::{Amount, Money};
use crate::domain::ports::{SharedAccountStore, StoreTransaction};
use crate::error::{AccountSide, Result, StoreError, WalletError};
use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Applies funding and transfers to account balances.
///
/// Every operation runs in its own unit of work: balances are locked for update,
/// changed, and committed together, or nothing is written. Transfers lock both
/// balances in ascending id order, so opposing transfers cannot deadlock and
/// concurrent credits to the same account are serialized.
#[derive(Clone)]
pub struct BalanceEngine {
    store: SharedAccountStore,
}

impl BalanceEngine {
    pub fn new(store: SharedAccountStore) -> Self {
        Self { store }
    }

    /// Adds `amount` to the account and returns its new balance.
    pub async fn fund(
        &self,
        account_number: &AccountNumber,
        amount: Option<Decimal>,
    ) -> Result<Money> {
        let amount = Amount::new(amount)?;
        info!(%account_number, %amount, "Funding account");

        let mut tx = self.store.begin().await?;
        let account = require(tx.as_mut(), account_number, AccountSide::Target).await?;

        let mut balance = tx.lock_balance(account.balance).await?;
        debug!(balance = %balance.id, "Balance locked");
        let new_balance = balance.credit(amount)?;
        tx.stage_balance_update(balance);
        tx.commit().await?;

        info!(%account_number, %new_balance, "Account funded");
        Ok(new_balance)
    }

    /// Moves `amount` from one account to another.
    ///
    /// Checks, in order: the amount, the source, the destination, that the two
    /// differ, and that the source covers the amount.
    pub async fn transfer(
        &self,
        from: &AccountNumber,
        to: &AccountNumber,
        amount: Option<Decimal>,
    ) -> Result<()> {
        let amount = Amount::new(amount)?;
        info!(%from, %to, %amount, "Processing transfer");

        let mut tx = self.store.begin().await?;
        let source = require(tx.as_mut(), from, AccountSide::Source).await?;
        let destination = require(tx.as_mut(), to, AccountSide::Destination).await?;
        if source.account_number == destination.account_number {
            return Err(WalletError::SameAccount);
        }

        let mut locked = tx
            .lock_balances(&[source.balance, destination.balance])
            .await?;
        let mut from_balance = locked
            .remove(&source.balance)
            .ok_or(StoreError::MissingBalance(source.balance))?;
        let mut to_balance = locked
            .remove(&destination.balance)
            .ok_or(StoreError::MissingBalance(destination.balance))?;
        debug!(source = %from_balance.id, destination = %to_balance.id, "Balances locked");

        from_balance.debit(amount)?;
        to_balance.credit(amount)?;
        tx.stage_balance_update(from_balance);
        tx.stage_balance_update(to_balance);
        tx.commit().await?;

        info!(reference = %transfer_reference(), "Transfer completed");
        Ok(())
    }

    /// Committed view of an account.
    pub async fn account(&self, account_number: &AccountNumber) -> Result<AccountSnapshot> {
        self.store
            .snapshot(account_number)
            .await?
            .ok_or_else(|| WalletError::not_found(AccountSide::Target, account_number))
    }
}

async fn require(
    tx: &mut dyn StoreTransaction,
    account_number: &AccountNumber,
    side: AccountSide,
) -> Result<Account> {
    tx.find_account(account_number)
        .await?
        .ok_or_else(|| WalletError::not_found(side, account_number))
}

/// Log-only reference for a completed transfer.
fn transfer_reference() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..0x100_0000);
    format!("TXN{}{:06X}", Utc::now().timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::provisioning::ProvisioningService;
    use crate::config::EngineConfig;
    use crate::infrastructure::in_memory::InMemoryAccountStore;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn setup(balances: &[Decimal]) -> (BalanceEngine, Vec<AccountNumber>) {
        let store: SharedAccountStore = Arc::new(InMemoryAccountStore::new());
        let provisioning = ProvisioningService::with_config(store.clone(), &EngineConfig::default());
        let engine = BalanceEngine::new(store);

        let mut numbers = Vec::new();
        for (i, initial) in balances.iter().enumerate() {
            let snapshot = provisioning
                .provision(&format!("owner{i}@x.com"))
                .await
                .unwrap();
            if *initial > Decimal::ZERO {
                engine
                    .fund(&snapshot.account_number, Some(*initial))
                    .await
                    .unwrap();
            }
            numbers.push(snapshot.account_number);
        }
        (engine, numbers)
    }

    async fn balance_of(engine: &BalanceEngine, number: &AccountNumber) -> Decimal {
        engine.account(number).await.unwrap().balance.value()
    }

    #[tokio::test]
    async fn test_fund_returns_new_balance() {
        let (engine, numbers) = setup(&[dec!(1000)]).await;
        let new_balance = engine.fund(&numbers[0], Some(dec!(300))).await.unwrap();
        assert_eq!(new_balance.value(), dec!(1300));
        assert_eq!(balance_of(&engine, &numbers[0]).await, dec!(1300));
    }

    #[tokio::test]
    async fn test_fund_rejects_bad_amounts() {
        let (engine, numbers) = setup(&[dec!(10)]).await;
        for amount in [None, Some(dec!(0)), Some(dec!(-5))] {
            let err = engine.fund(&numbers[0], amount).await.unwrap_err();
            assert!(matches!(err, WalletError::InvalidAmount { .. }));
        }
        assert_eq!(balance_of(&engine, &numbers[0]).await, dec!(10));
    }

    #[tokio::test]
    async fn test_fund_unknown_account() {
        let (engine, _) = setup(&[]).await;
        let err = engine
            .fund(&AccountNumber::from("0000000000"), Some(dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WalletError::AccountNotFound {
                side: AccountSide::Target,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_transfer_moves_value() {
        let (engine, numbers) = setup(&[dec!(1000), dec!(500)]).await;
        engine
            .transfer(&numbers[0], &numbers[1], Some(dec!(300)))
            .await
            .unwrap();
        assert_eq!(balance_of(&engine, &numbers[0]).await, dec!(700));
        assert_eq!(balance_of(&engine, &numbers[1]).await, dec!(800));
    }

    #[tokio::test]
    async fn test_transfer_of_entire_balance() {
        let (engine, numbers) = setup(&[dec!(1000), dec!(0)]).await;
        engine
            .transfer(&numbers[0], &numbers[1], Some(dec!(1000)))
            .await
            .unwrap();
        assert_eq!(balance_of(&engine, &numbers[0]).await, dec!(0));
        assert_eq!(balance_of(&engine, &numbers[1]).await, dec!(1000));
    }

    #[tokio::test]
    async fn test_transfer_checks_run_in_order() {
        let (engine, numbers) = setup(&[dec!(1000), dec!(500)]).await;
        let missing = AccountNumber::from("missing");

        // Invalid amount wins over a missing account.
        let err = engine
            .transfer(&missing, &missing, Some(dec!(0)))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount { .. }));

        let err = engine
            .transfer(&missing, &missing, Some(dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WalletError::AccountNotFound {
                side: AccountSide::Source,
                ..
            }
        ));

        let err = engine
            .transfer(&numbers[0], &missing, Some(dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WalletError::AccountNotFound {
                side: AccountSide::Destination,
                ref account_number
            } if account_number == &missing
        ));

        // Same-account wins over insufficient funds.
        let err = engine
            .transfer(&numbers[1], &numbers[1], Some(dec!(5000)))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::SameAccount));
    }

    #[tokio::test]
    async fn test_insufficient_balance_changes_nothing() {
        let (engine, numbers) = setup(&[dec!(1000), dec!(500)]).await;
        let err = engine
            .transfer(&numbers[0], &numbers[1], Some(dec!(5000)))
            .await
            .unwrap_err();
        match err {
            WalletError::InsufficientBalance {
                available,
                requested,
            } => {
                assert_eq!(available.value(), dec!(1000));
                assert_eq!(requested.value(), dec!(5000));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(balance_of(&engine, &numbers[0]).await, dec!(1000));
        assert_eq!(balance_of(&engine, &numbers[1]).await, dec!(500));
    }

    #[test]
    fn test_transfer_reference_shape() {
        let reference = transfer_reference();
        assert!(reference.starts_with("TXN"));
        let suffix = &reference[reference.len() - 6..];
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
