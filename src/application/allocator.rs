use crate::domain::account::AccountNumber;
use crate::domain::ports::{AccountNumberAllocator, AttemptBudget, StoreTransaction};
use crate::error::{Result, WalletError};
use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate};
use rand::Rng;
use tracing::debug;

/// Source of candidate account numbers. Candidates need not be unique.
pub trait CandidateGenerator: Send + Sync {
    fn candidate(&self) -> AccountNumber;
}

/// `YYMMDD` of the local date followed by a random suffix in `1000..=9999`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DateRandomGenerator;

impl DateRandomGenerator {
    pub fn candidate_for(date: NaiveDate, suffix: u16) -> AccountNumber {
        AccountNumber::new(format!(
            "{:02}{:02}{:02}{:04}",
            date.year().rem_euclid(100),
            date.month(),
            date.day(),
            suffix
        ))
    }
}

impl CandidateGenerator for DateRandomGenerator {
    fn candidate(&self) -> AccountNumber {
        let suffix = rand::thread_rng().gen_range(1000..=9999);
        Self::candidate_for(Local::now().date_naive(), suffix)
    }
}

/// Draws candidates until one is unused in the store, up to `max_attempts` times
/// per provisioning.
#[derive(Debug, Clone)]
pub struct BoundedRetryAllocator<G = DateRandomGenerator> {
    generator: G,
    max_attempts: u32,
}

impl<G: CandidateGenerator> BoundedRetryAllocator<G> {
    pub fn new(generator: G, max_attempts: u32) -> Self {
        Self {
            generator,
            max_attempts: max_attempts.max(1),
        }
    }
}

#[async_trait]
impl<G: CandidateGenerator> AccountNumberAllocator for BoundedRetryAllocator<G> {
    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    async fn allocate(
        &self,
        tx: &mut dyn StoreTransaction,
        budget: &mut AttemptBudget,
    ) -> Result<AccountNumber> {
        while budget.take() {
            let candidate = self.generator.candidate();
            if !tx.account_number_exists(&candidate).await? {
                return Ok(candidate);
            }
            debug!(%candidate, attempt = budget.spent(), "Account number collision");
        }
        Err(WalletError::IdentifierExhausted {
            attempts: budget.limit(),
        })
    }
}
