//! Record handlers for the transaction-outcome and commands streams

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::core::traits::RewardTransactionRepository;
use crate::core::{RetryPolicy, RewardBatchService};
use crate::types::{BatchError, CommandEnvelope, TransactionOutcome, DELETE_INITIATIVE};

use super::config::DeleteConfig;

/// Business processing of one deserialized record
#[async_trait]
pub trait RecordHandler: Send + Sync {
    type Payload: DeserializeOwned + Send + 'static;

    async fn handle(&self, payload: Self::Payload) -> Result<(), BatchError>;
}

/// Persists transaction outcomes and links them to their batch
#[derive(Clone)]
pub struct TransactionOutcomeHandler {
    service: RewardBatchService,
    transactions: Arc<dyn RewardTransactionRepository>,
    retry: RetryPolicy,
}

impl TransactionOutcomeHandler {
    pub fn new(
        service: RewardBatchService,
        transactions: Arc<dyn RewardTransactionRepository>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            service,
            transactions,
            retry,
        }
    }
}

#[async_trait]
impl RecordHandler for TransactionOutcomeHandler {
    type Payload = TransactionOutcome;

    /// Upsert by derived id, then link if the transaction is new to batching
    ///
    /// A redelivered event finds its transaction already linked: linkage and
    /// counters are left as they are. A delivery whose counter update failed
    /// left no link behind, so its redelivery is linked and counted.
    async fn handle(&self, outcome: TransactionOutcome) -> Result<(), BatchError> {
        let trx = outcome.into_transaction(Utc::now());

        let previous = self
            .retry
            .run("upsert_transaction", || self.transactions.upsert(trx.clone()))
            .await?;

        if previous.is_some_and(|p| p.reward_batch_id.is_some()) {
            debug!(trx_id = %trx.id, "Redelivered transaction already in a batch");
            return Ok(());
        }

        self.service.link_transaction(&trx).await?;
        Ok(())
    }
}

/// Handles the commands stream
#[derive(Clone)]
pub struct CommandHandler {
    transactions: Arc<dyn RewardTransactionRepository>,
    config: DeleteConfig,
    retry: RetryPolicy,
}

impl CommandHandler {
    pub fn new(
        transactions: Arc<dyn RewardTransactionRepository>,
        config: DeleteConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transactions,
            config,
            retry,
        }
    }

    /// Delete every transaction rewarded by the initiative, page by page
    async fn delete_initiative(&self, initiative_id: &str) -> Result<u64, BatchError> {
        let page_size = self.config.page_size;
        let mut deleted = 0u64;

        loop {
            let ids = self
                .retry
                .run("find_ids_by_initiative", || {
                    self.transactions
                        .find_ids_by_initiative(initiative_id, page_size)
                })
                .await?;
            if ids.is_empty() {
                break;
            }

            deleted += self
                .retry
                .run("delete_by_ids", || self.transactions.delete_by_ids(&ids))
                .await?;
            debug!(initiative_id, deleted, "Deleted page of transactions");

            if ids.len() < page_size {
                break;
            }
            if !self.config.delay.is_zero() {
                tokio::time::sleep(self.config.delay).await;
            }
        }

        Ok(deleted)
    }
}

#[async_trait]
impl RecordHandler for CommandHandler {
    type Payload = CommandEnvelope;

    async fn handle(&self, command: CommandEnvelope) -> Result<(), BatchError> {
        if command.operation_type != DELETE_INITIATIVE {
            info!(
                operation_type = %command.operation_type,
                entity_id = %command.entity_id,
                "Command not handled, skipped"
            );
            return Ok(());
        }

        let deleted = self.delete_initiative(&command.entity_id).await?;
        info!(
            initiative_id = %command.entity_id,
            deleted,
            "Initiative transactions deleted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::RewardBatchRepository;
    use crate::fixtures;
    use crate::store::{InMemoryBatchRepository, InMemoryTransactionRepository};
    use crate::types::{
        BatchFilter, BatchKey, BatchSortField, BatchStatus, CounterDelta, Page, PageRequest,
        RewardBatch, RewardBatchTrxStatus, StoreError,
    };
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Batch store refusing the first `failures` counter updates
    #[derive(Default)]
    struct FlakyBatches {
        inner: InMemoryBatchRepository,
        failures: AtomicU32,
    }

    #[async_trait]
    impl RewardBatchRepository for FlakyBatches {
        async fn insert(&self, batch: RewardBatch) -> Result<RewardBatch, StoreError> {
            self.inner.insert(batch).await
        }

        async fn find_by_id(&self, batch_id: &str) -> Result<Option<RewardBatch>, StoreError> {
            self.inner.find_by_id(batch_id).await
        }

        async fn find_by_key(&self, key: &BatchKey) -> Result<Option<RewardBatch>, StoreError> {
            self.inner.find_by_key(key).await
        }

        async fn find_by_id_and_status(
            &self,
            batch_id: &str,
            status: BatchStatus,
        ) -> Result<Option<RewardBatch>, StoreError> {
            self.inner.find_by_id_and_status(batch_id, status).await
        }

        async fn increment_totals(
            &self,
            batch_id: &str,
            delta: CounterDelta,
        ) -> Result<Option<RewardBatch>, StoreError> {
            let refused = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if refused {
                return Err(StoreError::Unavailable {
                    message: "increment refused".to_string(),
                });
            }
            self.inner.increment_totals(batch_id, delta).await
        }

        async fn update_status(
            &self,
            batch_id: &str,
            from: &[BatchStatus],
            to: BatchStatus,
        ) -> Result<Option<RewardBatch>, StoreError> {
            self.inner.update_status(batch_id, from, to).await
        }

        async fn find_page(
            &self,
            filter: &BatchFilter,
            page: &PageRequest<BatchSortField>,
        ) -> Result<Page<RewardBatch>, StoreError> {
            self.inner.find_page(filter, page).await
        }
    }

    struct Harness {
        outcomes: TransactionOutcomeHandler,
        commands: CommandHandler,
        batches: Arc<InMemoryBatchRepository>,
        transactions: Arc<InMemoryTransactionRepository>,
    }

    fn harness() -> Harness {
        let batches = Arc::new(InMemoryBatchRepository::new());
        let transactions = Arc::new(InMemoryTransactionRepository::new());
        let service =
            RewardBatchService::new(batches.clone(), transactions.clone(), RetryPolicy::none());
        Harness {
            outcomes: TransactionOutcomeHandler::new(
                service,
                transactions.clone(),
                RetryPolicy::none(),
            ),
            commands: CommandHandler::new(
                transactions.clone(),
                DeleteConfig::new(2, Duration::from_millis(1)),
                RetryPolicy::none(),
            ),
            batches,
            transactions,
        }
    }

    fn command(operation_type: &str, entity_id: &str) -> CommandEnvelope {
        CommandEnvelope {
            operation_type: operation_type.to_string(),
            entity_id: entity_id.to_string(),
            operation_time: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_outcome_is_persisted_and_linked() {
        let h = harness();
        let outcome = fixtures::outcome("TRX1", 300);
        let trx_id = outcome.transaction_id();

        h.outcomes.handle(outcome).await.unwrap();

        let stored = h.transactions.find_by_id(&trx_id).await.unwrap().unwrap();
        assert_eq!(stored.reward_batch_trx_status, Some(RewardBatchTrxStatus::ToCheck));
        let batch = h
            .batches
            .find_by_id(stored.reward_batch_id.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(batch.counters.total_approved_amount_cents, 300);
    }

    #[tokio::test]
    async fn test_redelivery_does_not_double_count() {
        let h = harness();

        for _ in 0..3 {
            h.outcomes
                .handle(fixtures::outcome("TRX1", 300))
                .await
                .unwrap();
        }

        let batches = h.batches.all();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].counters.number_of_transactions, 1);
        assert_eq!(batches[0].counters.total_approved_amount_cents, 300);
        assert_eq!(h.transactions.len(), 1);
    }

    #[tokio::test]
    async fn test_redelivery_after_failed_counter_update_counts_once() {
        let batches = Arc::new(FlakyBatches {
            failures: AtomicU32::new(1),
            ..Default::default()
        });
        let transactions = Arc::new(InMemoryTransactionRepository::new());
        let service =
            RewardBatchService::new(batches.clone(), transactions.clone(), RetryPolicy::none());
        let handler = TransactionOutcomeHandler::new(service, transactions, RetryPolicy::none());

        assert!(handler.handle(fixtures::outcome("TRX1", 300)).await.is_err());
        handler
            .handle(fixtures::outcome("TRX1", 300))
            .await
            .unwrap();
        handler
            .handle(fixtures::outcome("TRX1", 300))
            .await
            .unwrap();

        let stored = batches.inner.all();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].counters.number_of_transactions, 1);
        assert_eq!(stored[0].counters.total_approved_amount_cents, 300);
    }

    #[tokio::test]
    async fn test_delete_initiative_purges_in_pages() {
        let h = harness();
        for i in 0..5 {
            h.outcomes
                .handle(fixtures::outcome(&format!("TRX{}", i), 10))
                .await
                .unwrap();
        }

        h.commands
            .handle(command(DELETE_INITIATIVE, fixtures::INITIATIVE))
            .await
            .unwrap();

        assert!(h.transactions.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_command_is_skipped() {
        let h = harness();
        h.outcomes
            .handle(fixtures::outcome("TRX1", 10))
            .await
            .unwrap();

        h.commands
            .handle(command("SUSPEND_MERCHANT", "M1"))
            .await
            .unwrap();

        assert_eq!(h.transactions.len(), 1);
    }
}
