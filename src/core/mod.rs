//! Core business logic module
//!
//! This module contains the batch reconciliation components:
//! - `traits` - Storage and collaborator seams
//! - `reconciler` - Batch-transaction status transitions to counter deltas
//! - `retry` - Bounded retry of rate-limited storage calls
//! - `batch_service` - Batch lifecycle and bulk transaction status operations
//! - `query_service` - Merchant-facing listings

pub mod batch_service;
pub mod query_service;
pub mod reconciler;
pub mod retry;
pub mod traits;

pub use batch_service::{RewardBatchService, TransactionsRequest};
pub use query_service::{
    CachedPointOfSaleLookup, RewardQueryService, TransactionQuery, TransactionView,
};
pub use retry::RetryPolicy;
