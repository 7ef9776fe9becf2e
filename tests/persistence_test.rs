#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::process::Command;
use std::sync::Arc;
use tempfile::tempdir;
use wallet_engine::application::engine::BalanceEngine;
use wallet_engine::application::provisioning::ProvisioningService;
use wallet_engine::config::EngineConfig;
use wallet_engine::domain::ports::SharedAccountStore;
use wallet_engine::error::WalletError;
use wallet_engine::infrastructure::rocksdb::RocksDBStore;

mod common;

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: provision and fund
    let script1 = common::script(&["provision, a@x.com, ,", "fund, a@x.com, , 100.0"]);

    let mut cmd1 = Command::new(cargo_bin!("wallet-engine"));
    cmd1.arg(script1.path()).arg("--db-path").arg(&db_path);

    let output1 = cmd1.output().expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains("a@x.com,100.0"));

    // 2. Second run: the owner already exists, funding continues from the stored balance
    let script2 = common::script(&[
        "provision, a@x.com, ,",
        "provision, b@x.com, ,",
        "fund, a@x.com, , 50.0",
        "transfer, a@x.com, b@x.com, 25",
    ]);

    let mut cmd2 = Command::new(cargo_bin!("wallet-engine"));
    cmd2.arg(script2.path()).arg("--db-path").arg(&db_path);

    let output2 = cmd2.output().expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);
    let stderr2 = String::from_utf8_lossy(&output2.stderr);

    assert!(stderr2.contains("already exists"));
    assert!(stdout2.contains("a@x.com,125.0"));
    assert!(stdout2.contains("b@x.com,25"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rocksdb_concurrent_funding_and_transfers() {
    let dir = tempdir().unwrap();
    let store: SharedAccountStore = Arc::new(RocksDBStore::open(dir.path()).unwrap());
    let provisioning = ProvisioningService::with_config(store.clone(), &EngineConfig::default());
    let engine = BalanceEngine::new(store);

    let a = provisioning.provision("a@x.com").await.unwrap().account_number;
    let b = provisioning.provision("b@x.com").await.unwrap().account_number;
    engine.fund(&b, Some(dec!(1000))).await.unwrap();

    let mut handles = Vec::new();
    for i in 1..=50u32 {
        let engine = engine.clone();
        let a = a.clone();
        handles.push(tokio::spawn(async move {
            engine.fund(&a, Some(Decimal::from(i))).await.map(|_| ())
        }));
    }
    for i in 0..50 {
        let engine = engine.clone();
        let (from, to) = if i % 2 == 0 {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        };
        handles.push(tokio::spawn(async move {
            engine.transfer(&from, &to, Some(dec!(3))).await
        }));
    }
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) | Err(WalletError::InsufficientBalance { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    // 1000 funded into b, plus 1 + 2 + ... + 50 into a; transfers only move value.
    let total = engine.account(&a).await.unwrap().balance.value()
        + engine.account(&b).await.unwrap().balance.value();
    assert_eq!(total, dec!(2275));
}
