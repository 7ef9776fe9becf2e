#![allow(dead_code)]

use rust_decimal::Decimal;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use wallet_engine::application::engine::BalanceEngine;
use wallet_engine::application::provisioning::ProvisioningService;
use wallet_engine::config::EngineConfig;
use wallet_engine::domain::account::AccountNumber;
use wallet_engine::domain::ports::SharedAccountStore;
use wallet_engine::infrastructure::in_memory::InMemoryAccountStore;

pub struct Wallet {
    pub store: SharedAccountStore,
    pub engine: BalanceEngine,
    pub provisioning: ProvisioningService,
}

pub fn wallet() -> Wallet {
    let store: SharedAccountStore = Arc::new(InMemoryAccountStore::new());
    Wallet {
        engine: BalanceEngine::new(store.clone()),
        provisioning: ProvisioningService::with_config(store.clone(), &EngineConfig::default()),
        store,
    }
}

impl Wallet {
    /// Provisions an account for `email` and funds it with `initial`.
    pub async fn open(&self, email: &str, initial: Decimal) -> AccountNumber {
        let snapshot = self.provisioning.provision(email).await.unwrap();
        if initial > Decimal::ZERO {
            self.engine
                .fund(&snapshot.account_number, Some(initial))
                .await
                .unwrap();
        }
        snapshot.account_number
    }

    pub async fn balance(&self, number: &AccountNumber) -> Decimal {
        self.engine.account(number).await.unwrap().balance.value()
    }
}

/// Writes a command script with the standard header followed by `rows`.
pub fn script(rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op, owner, counterparty, amount").unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
    file.flush().unwrap();
    file
}
