//! Reward Batch Engine Library
//! # Overview
//!
//! This library groups reward transactions of an incentive programme into
//! monthly, per-merchant reward batches and keeps the batch counters
//! reconciled with the statuses of the transactions they hold.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (RewardBatch, RewardTransaction, counters, errors)
//! - [`core`] - Business logic components:
//!   - [`core::batch_service`] - Batch lifecycle and bulk transaction status operations
//!   - [`core::reconciler`] - Status change to counter delta table
//!   - [`core::retry`] - Bounded retry of rate-limited storage calls
//!   - [`core::query_service`] - Merchant-facing listings with enrichment
//!   - [`core::traits`] - Storage and collaborator seams
//! - [`store`] - In-memory repositories with atomic per-document operations
//! - [`ingest`] - Stream ingestion with fault isolation and batched offset commits
//! - [`io`] - JSON-lines input, operations script and CSV report
//! - [`cli`] - CLI arguments parsing
//! - [`app`] - Wiring of a file-driven run
//!
//! # Batch lifecycle
//!
//! - **CREATED**: Opened lazily by the first transaction of its merchant,
//!   point-of-sale type, month and kind
//! - **SENT**: Submitted by the merchant for evaluation
//! - **APPROVED**: Confirmed by the initiative operator; suspended
//!   transactions are carried over to the batch of the following month
//!
//! # Counters
//!
//! Each batch carries the approved and initial reward amounts, the number of
//! linked transactions and the elaborated, suspended and rejected counts.
//! Counters only move by signed deltas applied atomically by the store.

// Module declarations
pub mod app;
pub mod cli;
pub mod core;
pub mod ingest;
pub mod io;
pub mod store;
pub mod types;

#[cfg(test)]
mod fixtures;

pub use app::{AppConfig, RewardBatchEngine, RunReport};
pub use core::{RetryPolicy, RewardBatchService, RewardQueryService, TransactionsRequest};
pub use io::write_batches_csv;
pub use store::{InMemoryBatchRepository, InMemoryTransactionRepository};
pub use types::{
    BatchCounters, BatchError, BatchKey, BatchKind, BatchMonth, BatchStatus, PosType,
    RewardBatch, RewardBatchTrxStatus, RewardTransaction, TransactionStatus,
};
