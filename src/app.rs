//! Application wiring
//!
//! Builds the in-memory stores, the services and the two ingestion mediators,
//! then drives a file-based run:
//!
//! ```text
//! events file   ──► IngestionMediator<TransactionOutcomeHandler> ─┐
//! commands file ──► IngestionMediator<CommandHandler>            ─┼─► stores ──► CSV report
//! operations    ──► RewardBatchService                           ─┘
//! ```
//!
//! Inputs are consumed in that order. Failures of individual records or
//! operations are logged and counted; only I/O failures and a failed final
//! offset commit abort the run.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use futures::Stream;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::CliArgs;
use crate::core::{RetryPolicy, RewardBatchService};
use crate::ingest::{
    CommandHandler, DeleteConfig, InMemoryOffsetCommitter, InboundRecord, IngestConfig,
    IngestionMediator, LoggingErrorNotifier, RunSummary, TransactionOutcomeHandler,
    COMMANDS_TOPIC, TRANSACTIONS_TOPIC,
};
use crate::io::operations::request;
use crate::io::{read_operations, write_batches_csv, JsonLinesReader, Operation};
use crate::store::{InMemoryBatchRepository, InMemoryTransactionRepository};
use crate::types::{BatchError, RewardBatch};

/// Name reported as the source server of error notifications
pub const SOURCE_SERVER: &str = "reward-batch-engine";

/// Install the global tracing subscriber
///
/// Log level is read from `REWARD_BATCH_LOG`, defaulting to `info`. Logs go
/// to stderr so that stdout carries only the report.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("REWARD_BATCH_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Inputs and settings of one run
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub events_file: PathBuf,
    pub commands_file: Option<PathBuf>,
    pub operations_file: Option<PathBuf>,
    pub ingest: IngestConfig,
    pub delete: DeleteConfig,
    pub retry: RetryPolicy,
}

impl AppConfig {
    /// Run over `events_file` alone, with default settings
    pub fn new(events_file: impl Into<PathBuf>) -> Self {
        Self {
            events_file: events_file.into(),
            commands_file: None,
            operations_file: None,
            ingest: IngestConfig::default(),
            delete: DeleteConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&CliArgs> for AppConfig {
    fn from(args: &CliArgs) -> Self {
        Self {
            events_file: args.events_file.clone(),
            commands_file: args.commands_file.clone(),
            operations_file: args.operations_file.clone(),
            ingest: args.to_ingest_config(),
            delete: args.to_delete_config(),
            retry: args.to_retry_policy(),
        }
    }
}

/// What a run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub events: RunSummary,
    pub commands: Option<RunSummary>,
    pub operations_applied: usize,
    pub operations_failed: usize,
}

/// Stores, services and mediators of one engine instance
pub struct RewardBatchEngine {
    batches: Arc<InMemoryBatchRepository>,
    transactions: Arc<InMemoryTransactionRepository>,
    service: RewardBatchService,
    outcomes: IngestionMediator<TransactionOutcomeHandler>,
    commands: IngestionMediator<CommandHandler>,
}

impl RewardBatchEngine {
    pub fn new(ingest: IngestConfig, delete: DeleteConfig, retry: RetryPolicy) -> Self {
        let batches = Arc::new(InMemoryBatchRepository::new());
        let transactions = Arc::new(InMemoryTransactionRepository::new());
        let service = RewardBatchService::new(batches.clone(), transactions.clone(), retry);

        let notifier = Arc::new(LoggingErrorNotifier);
        let committer = Arc::new(InMemoryOffsetCommitter::new());

        let outcomes = IngestionMediator::new(
            Arc::new(TransactionOutcomeHandler::new(
                service.clone(),
                transactions.clone(),
                retry,
            )),
            notifier.clone(),
            committer.clone(),
            ingest.clone(),
            SOURCE_SERVER,
        );
        let commands = IngestionMediator::new(
            Arc::new(CommandHandler::new(transactions.clone(), delete, retry)),
            notifier,
            committer,
            ingest,
            SOURCE_SERVER,
        );

        Self {
            batches,
            transactions,
            service,
            outcomes,
            commands,
        }
    }

    pub fn service(&self) -> &RewardBatchService {
        &self.service
    }

    pub fn transactions(&self) -> &Arc<InMemoryTransactionRepository> {
        &self.transactions
    }

    /// Every batch currently stored
    pub fn batches(&self) -> Vec<RewardBatch> {
        self.batches.all()
    }

    pub async fn ingest_events<S>(&self, records: S) -> Result<RunSummary, BatchError>
    where
        S: Stream<Item = InboundRecord>,
    {
        self.outcomes.run(records).await
    }

    pub async fn ingest_commands<S>(&self, records: S) -> Result<RunSummary, BatchError>
    where
        S: Stream<Item = InboundRecord>,
    {
        self.commands.run(records).await
    }

    /// Apply one scripted operation
    pub async fn apply(&self, operation: &Operation) -> Result<RewardBatch, BatchError> {
        let batch_id = operation.batch().batch_id();
        match operation {
            Operation::Send { merchant_id, .. } => {
                self.service.send_reward_batch(merchant_id, &batch_id).await
            }
            Operation::Suspend {
                initiative_id,
                transaction_ids,
                reason,
                ..
            } => {
                let request = request(transaction_ids, reason.as_deref());
                self.service
                    .suspend_transactions(&batch_id, initiative_id, &request)
                    .await
            }
            Operation::Reject {
                initiative_id,
                transaction_ids,
                reason,
                ..
            } => {
                let request = request(transaction_ids, reason.as_deref());
                self.service
                    .reject_transactions(&batch_id, initiative_id, &request)
                    .await
            }
            Operation::Approve {
                merchant_id,
                initiative_id,
                transaction_ids,
                ..
            } => {
                let request = request(transaction_ids, None);
                self.service
                    .approved_transactions(&batch_id, &request, initiative_id, merchant_id)
                    .await
            }
            Operation::Confirm { initiative_id, .. } => {
                self.service
                    .reward_batch_confirmation(initiative_id, &batch_id)
                    .await
            }
        }
    }
}

/// Run the engine over the configured files and write the batch report
///
/// # Returns
///
/// * `Ok(RunReport)` - The run completed, possibly with failed records or
///   operations
/// * `Err(String)` - An input could not be read, the final offset commit
///   failed, or the report could not be written
pub fn run(config: &AppConfig, output: &mut dyn Write) -> Result<RunReport, String> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.ingest.max_concurrent)
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

    let (report, batches) = runtime.block_on(run_async(config))?;
    write_batches_csv(&batches, output)?;
    Ok(report)
}

async fn run_async(config: &AppConfig) -> Result<(RunReport, Vec<RewardBatch>), String> {
    let engine = RewardBatchEngine::new(
        config.ingest.clone(),
        config.delete.clone(),
        config.retry,
    );
    let mut report = RunReport::default();

    let events = JsonLinesReader::open(&config.events_file, TRANSACTIONS_TOPIC).await?;
    report.events = engine
        .ingest_events(events.into_stream())
        .await
        .map_err(|e| format!("Event ingestion failed: {}", e))?;

    if let Some(path) = &config.commands_file {
        let commands = JsonLinesReader::open(path, COMMANDS_TOPIC).await?;
        let summary = engine
            .ingest_commands(commands.into_stream())
            .await
            .map_err(|e| format!("Command ingestion failed: {}", e))?;
        report.commands = Some(summary);
    }

    if let Some(path) = &config.operations_file {
        for operation in read_operations(path).await? {
            match engine.apply(&operation).await {
                Ok(batch) => {
                    report.operations_applied += 1;
                    info!(
                        operation = operation.name(),
                        batch_id = %batch.id,
                        status = %batch.status,
                        "Operation applied"
                    );
                }
                Err(error) => {
                    report.operations_failed += 1;
                    warn!(
                        operation = operation.name(),
                        kind = error.kind(),
                        status_code = error.status_code(),
                        error = %error,
                        "Operation failed"
                    );
                }
            }
        }
    }

    Ok((report, engine.batches()))
}
