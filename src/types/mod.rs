//! Types module
//!
//! Contains the data structures used throughout the engine:
//! - `batch`: reward batches, their key, status and month
//! - `transaction`: reward transactions and their statuses
//! - `counters`: batch aggregate counters and signed deltas
//! - `event`: inbound stream payloads
//! - `query`: filters, sorting and pagination
//! - `fields`: persisted field names
//! - `error`: error types

pub mod batch;
pub mod counters;
pub mod error;
pub mod event;
pub mod fields;
pub mod query;
pub mod transaction;

pub use batch::{
    BatchId, BatchKey, BatchKind, BatchMonth, BatchStatus, MerchantId, PosType, RewardBatch,
};
pub use counters::{BatchCounters, CounterDelta};
pub use error::{BatchError, StoreError};
pub use event::{
    CommandEnvelope, ErrorNotification, RecordPosition, TransactionOutcome, DELETE_INITIATIVE,
};
pub use query::{
    BatchFilter, BatchSortField, Direction, Page, PageRequest, Sort, TransactionFilter,
    TransactionSortField,
};
pub use transaction::{
    derive_transaction_id, InitiativeId, Reward, RewardBatchTrxStatus, RewardTransaction,
    TransactionId, TransactionStatus,
};
