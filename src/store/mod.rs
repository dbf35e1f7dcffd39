//! In-memory storage adapters
//!
//! `DashMap`-backed implementations of the repository traits in
//! `core::traits`. They honour the same atomicity contract a document store
//! would: every trait method is one atomic step per document.

pub mod batch_store;
pub mod sorting;
pub mod transaction_store;

pub use batch_store::InMemoryBatchRepository;
pub use transaction_store::InMemoryTransactionRepository;
