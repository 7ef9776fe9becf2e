//! Application layer containing the core business logic orchestration.
//!
//! `BalanceEngine` funds accounts and moves value between them;
//! `ProvisioningService` creates accounts, drawing account numbers from a
//! `BoundedRetryAllocator`. Both work only through the store ports, so any
//! backend can sit underneath.

pub mod allocator;
pub mod engine;
pub mod provisioning;
