use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wallet_engine::config::EngineConfig;
use wallet_engine::domain::ports::SharedAccountStore;
use wallet_engine::infrastructure::in_memory::InMemoryAccountStore;
use wallet_engine::interfaces::csv::account_writer::AccountWriter;
use wallet_engine::interfaces::csv::command_reader::CommandReader;
use wallet_engine::interfaces::response::PublicError;
use wallet_engine::interfaces::script::{Outcome, ScriptRunner};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Command script CSV file (`op, owner, counterparty, amount`)
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "WALLET_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Candidates the account number allocator tries before giving up
    #[arg(
        long,
        env = "WALLET_MAX_ALLOCATION_ATTEMPTS",
        default_value_t = EngineConfig::DEFAULT_MAX_ALLOCATION_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    max_allocation_attempts: u32,
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<PathBuf>) -> Result<SharedAccountStore> {
    use wallet_engine::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => Ok(Arc::new(RocksDBStore::open(path).into_diagnostic()?)),
        None => Ok(Arc::new(InMemoryAccountStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<PathBuf>) -> Result<SharedAccountStore> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Arc::new(InMemoryAccountStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::new(cli.max_allocation_attempts);
    let store = open_store(cli.db_path)?;
    let runner = ScriptRunner::new(store.clone(), &config);

    let file = File::open(cli.input).into_diagnostic()?;
    for command in CommandReader::new(file).commands() {
        match command {
            Ok(command) => match runner.execute(command).await {
                Ok(Outcome::Provisioned(snapshot)) => {
                    info!(account_number = %snapshot.account_number, owner = %snapshot.owner_email, "Provisioned");
                }
                Ok(Outcome::Funded {
                    account_number,
                    new_balance,
                }) => {
                    info!(%account_number, %new_balance, "Funded");
                }
                Ok(Outcome::Transferred { from, to, amount }) => {
                    info!(%from, %to, %amount, "Transferred");
                }
                Err(e) => {
                    let public = PublicError::from_wallet_error(&e);
                    warn!(category = %public.category, "Command rejected");
                    eprintln!("Command rejected: {}", public);
                }
            },
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    let accounts = store.all_accounts().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = AccountWriter::new(stdout.lock());
    writer.write_accounts(accounts).into_diagnostic()?;

    Ok(())
}
