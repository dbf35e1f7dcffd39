//! Stream ingestion
//!
//! - `mediator` - Concurrent record processing with batched offset commits
//! - `acks` - Per-partition ordering of committable positions
//! - `handlers` - Transaction-outcome and command handlers
//! - `notifier` - Error notifier and offset committer implementations
//! - `record` - Inbound record model
//! - `config` - Ingestion and purge configuration

mod acks;
pub mod config;
pub mod handlers;
pub mod mediator;
pub mod notifier;
pub mod record;

pub use config::{DeleteConfig, IngestConfig};
pub use handlers::{CommandHandler, RecordHandler, TransactionOutcomeHandler};
pub use mediator::{IngestionMediator, RunSummary};
pub use notifier::{InMemoryErrorNotifier, InMemoryOffsetCommitter, LoggingErrorNotifier};
pub use record::InboundRecord;

/// Topic of the transaction-outcome stream
pub const TRANSACTIONS_TOPIC: &str = "rewards-transactions";

/// Topic of the commands stream
pub const COMMANDS_TOPIC: &str = "rewards-commands";
