//! Ingestion mediator
//!
//! This module provides `IngestionMediator`, which drives records from a
//! source stream through a `RecordHandler` with fault isolation and batched
//! offset commits.
//!
//! # Record lifecycle
//!
//! ```text
//! RECEIVED -> DESERIALIZED -> PROCESSED -> ACK-PENDING -> COMMITTED
//!          \-> DESERIALIZATION_FAILED -> NOTIFIED (non retryable) -> ACK-PENDING
//!                           \-> HANDLER_FAILED -> NOTIFIED (retryable), never acked
//! ```
//!
//! # Design
//!
//! Up to `max_concurrent` records are in flight at once and may complete in
//! any order. A failing record is notified on its own and does not affect its
//! siblings, but it is never committed past: positions are released per
//! partition in delivery order, and everything behind a failed record stays
//! uncommitted so the partition is redelivered from it. Released positions
//! are buffered and committed together every `commit_delay`, then once more
//! when the stream ends; a crash between two commits only causes redelivery,
//! which the handlers tolerate.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::{pin_mut, Stream, StreamExt};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::core::traits::{ErrorNotifier, OffsetCommitter};
use crate::types::{BatchError, ErrorNotification, RecordPosition, StoreError};

use super::acks::{Ack, AckTracker};
use super::config::IngestConfig;
use super::handlers::RecordHandler;
use super::record::InboundRecord;

/// Counters of one ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records pulled from the stream
    pub received: usize,
    /// Records handled successfully
    pub processed: usize,
    /// Records whose handler failed; left uncommitted for redelivery
    pub failed: usize,
    /// Records that could not be deserialized; notified and committed
    pub malformed: usize,
    /// Records done but queued behind a failed record of their partition
    pub held_back: usize,
    /// Positions committed
    pub committed: usize,
    /// Commit calls issued
    pub commits: usize,
}

/// What happened to one record
#[derive(Debug)]
enum Outcome {
    Processed(RecordPosition),
    Malformed(RecordPosition),
    Failed(RecordPosition),
}

/// Drives a stream of records through a handler
pub struct IngestionMediator<H> {
    handler: Arc<H>,
    notifier: Arc<dyn ErrorNotifier>,
    committer: Arc<dyn OffsetCommitter>,
    config: IngestConfig,
    /// Name reported as `sourceServer` in notifications
    source_server: String,
}

impl<H: RecordHandler> IngestionMediator<H> {
    pub fn new(
        handler: Arc<H>,
        notifier: Arc<dyn ErrorNotifier>,
        committer: Arc<dyn OffsetCommitter>,
        config: IngestConfig,
        source_server: impl Into<String>,
    ) -> Self {
        Self {
            handler,
            notifier,
            committer,
            config,
            source_server: source_server.into(),
        }
    }

    /// Consume `records` until the stream ends
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - Once every record was handled and the last
    ///   acknowledgements committed
    /// * `Err(BatchError::Commit)` - The final commit failed; acknowledged
    ///   records will be redelivered
    pub async fn run<S>(&self, records: S) -> Result<RunSummary, BatchError>
    where
        S: Stream<Item = InboundRecord>,
    {
        let acks = Mutex::new(AckTracker::default());
        let outcomes = records
            .map(|record| {
                lock(&acks).register(&record.position());
                self.process(record)
            })
            .buffer_unordered(self.config.max_concurrent);
        pin_mut!(outcomes);

        let mut ticker = tokio::time::interval(self.config.commit_delay);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        let mut pending = Vec::new();
        let mut summary = RunSummary::default();

        loop {
            tokio::select! {
                outcome = outcomes.next() => match outcome {
                    Some(outcome) => {
                        summary.received += 1;
                        let (position, ack) = match outcome {
                            Outcome::Processed(position) => {
                                summary.processed += 1;
                                (position, Ack::Done)
                            }
                            Outcome::Malformed(position) => {
                                summary.malformed += 1;
                                (position, Ack::Done)
                            }
                            Outcome::Failed(position) => {
                                summary.failed += 1;
                                (position, Ack::Failed)
                            }
                        };
                        pending.extend(lock(&acks).complete(&position, ack));
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    if let Err(error) = self.flush(&mut pending, &mut summary).await {
                        error!(error = %error, "Offset commit failed, retrying on next window");
                    }
                }
            }
        }

        self.flush(&mut pending, &mut summary).await?;
        summary.held_back = lock(&acks).held_back();
        if summary.held_back > 0 {
            warn!(
                held_back = summary.held_back,
                "Records left uncommitted behind a failed record"
            );
        }
        info!(
            received = summary.received,
            processed = summary.processed,
            failed = summary.failed,
            malformed = summary.malformed,
            commits = summary.commits,
            "Ingestion run completed"
        );
        Ok(summary)
    }

    async fn process(&self, record: InboundRecord) -> Outcome {
        let position = record.position();

        let payload = match serde_json::from_str::<H::Payload>(&record.payload) {
            Ok(payload) => payload,
            Err(e) => {
                let error = BatchError::deserialization(&record.topic, e.to_string());
                warn!(
                    topic = %record.topic,
                    offset = record.offset,
                    error = %error,
                    "Malformed record"
                );
                // A record that cannot be notified is not acknowledged either.
                return if self.notify(&record, &error, false).await {
                    Outcome::Malformed(position)
                } else {
                    Outcome::Failed(position)
                };
            }
        };

        match self.handler.handle(payload).await {
            Ok(()) => {
                debug!(topic = %record.topic, offset = record.offset, "Record processed");
                Outcome::Processed(position)
            }
            Err(error) => {
                warn!(
                    topic = %record.topic,
                    offset = record.offset,
                    error = %error,
                    "Record processing failed"
                );
                self.notify(&record, &error, true).await;
                Outcome::Failed(position)
            }
        }
    }

    async fn notify(&self, record: &InboundRecord, error: &BatchError, retryable: bool) -> bool {
        let notification = notification(&self.source_server, record, error, retryable);
        match self.notifier.notify(notification).await {
            Ok(()) => true,
            Err(notify_error) => {
                error!(
                    topic = %record.topic,
                    offset = record.offset,
                    error = %notify_error,
                    "Error notification failed"
                );
                false
            }
        }
    }

    async fn flush(
        &self,
        pending: &mut Vec<RecordPosition>,
        summary: &mut RunSummary,
    ) -> Result<(), BatchError> {
        if pending.is_empty() {
            return Ok(());
        }

        let batch = pending.clone();
        let count = batch.len();
        self.committer.commit(batch).await?;

        pending.clear();
        summary.committed += count;
        summary.commits += 1;
        debug!(count, "Offsets committed");
        Ok(())
    }
}

fn lock(acks: &Mutex<AckTracker>) -> MutexGuard<'_, AckTracker> {
    acks.lock().unwrap_or_else(PoisonError::into_inner)
}

fn notification(
    source_server: &str,
    record: &InboundRecord,
    error: &BatchError,
    retryable: bool,
) -> ErrorNotification {
    let (root_cause_class, root_cause_message) = match error {
        BatchError::Store(inner) => (store_error_class(inner), inner.to_string()),
        other => (other.kind(), other.to_string()),
    };

    ErrorNotification {
        source_server: source_server.to_string(),
        source_topic: record.topic.clone(),
        source_partition: record.partition,
        source_offset: record.offset,
        description: format!("[{}] Error processing record", record.topic),
        retryable,
        stacktrace: format!("{:?}", error),
        root_cause_class: root_cause_class.to_string(),
        root_cause_message,
        cause_class: error.kind().to_string(),
        cause_message: error.to_string(),
        payload: record.payload.clone(),
    }
}

fn store_error_class(error: &StoreError) -> &'static str {
    match error {
        StoreError::DuplicateKey { .. } => "DuplicateKey",
        StoreError::RateLimited { .. } => "RateLimited",
        StoreError::Unavailable { .. } => "StoreUnavailable",
    }
}
