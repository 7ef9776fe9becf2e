use super::csv::command_reader::{CommandKind, CommandRecord};
use crate::application::engine::BalanceEngine;
use crate::application::provisioning::ProvisioningService;
use crate::config::EngineConfig;
use crate::domain::account::{AccountNumber, AccountSnapshot};
use crate::domain::money::{Amount, Money};
use crate::domain::owner::Email;
use crate::domain::ports::SharedAccountStore;
use crate::error::{AccountSide, Result, WalletError};
use rust_decimal::Decimal;

/// Result of a successfully executed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Provisioned(AccountSnapshot),
    Funded {
        account_number: AccountNumber,
        new_balance: Money,
    },
    Transferred {
        from: AccountNumber,
        to: AccountNumber,
        amount: Decimal,
    },
}

/// Executes script commands that address accounts by owner email.
pub struct ScriptRunner {
    store: SharedAccountStore,
    engine: BalanceEngine,
    provisioning: ProvisioningService,
}

impl ScriptRunner {
    pub fn new(store: SharedAccountStore, config: &EngineConfig) -> Self {
        Self {
            engine: BalanceEngine::new(store.clone()),
            provisioning: ProvisioningService::with_config(store.clone(), config),
            store,
        }
    }

    /// Runs one command. Amounts are checked before owners are resolved, in the
    /// same order the engine applies its checks.
    pub async fn execute(&self, command: CommandRecord) -> Result<Outcome> {
        match command.op {
            CommandKind::Provision => {
                let snapshot = self.provisioning.provision(&command.owner).await?;
                Ok(Outcome::Provisioned(snapshot))
            }
            CommandKind::Fund => {
                Amount::new(command.amount)?;
                let account_number = self.resolve(&command.owner, AccountSide::Target).await?;
                let new_balance = self.engine.fund(&account_number, command.amount).await?;
                Ok(Outcome::Funded {
                    account_number,
                    new_balance,
                })
            }
            CommandKind::Transfer => {
                Amount::new(command.amount)?;
                let from = self.resolve(&command.owner, AccountSide::Source).await?;
                let counterparty = command.counterparty.as_deref().unwrap_or_default();
                let to = self.resolve(counterparty, AccountSide::Destination).await?;
                self.engine.transfer(&from, &to, command.amount).await?;
                Ok(Outcome::Transferred {
                    from,
                    to,
                    amount: command.amount.unwrap_or_default(),
                })
            }
        }
    }

    /// Maps an owner email to its account number.
    async fn resolve(&self, owner: &str, side: AccountSide) -> Result<AccountNumber> {
        let unknown = || WalletError::AccountNotFound {
            side,
            account_number: AccountNumber::new(owner),
        };
        let Ok(email) = Email::parse(owner) else {
            return Err(unknown());
        };
        self.store
            .find_account_by_owner(&email)
            .await?
            .map(|account| account.account_number)
            .ok_or_else(unknown)
    }
}
