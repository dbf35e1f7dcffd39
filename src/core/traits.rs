//! Core traits for persistence, notification and collaborator lookups
//!
//! Every repository method is a single atomic storage round trip. Callers
//! never read a document, modify it in memory and write it back: anything that
//! must stay consistent under concurrent writers is expressed as one of these
//! calls.

use async_trait::async_trait;

use crate::types::{
    BatchError, BatchFilter, BatchKey, BatchSortField, BatchStatus, CounterDelta,
    ErrorNotification, Page, PageRequest, RecordPosition, RewardBatch, RewardBatchTrxStatus,
    RewardTransaction, StoreError, TransactionFilter, TransactionId, TransactionSortField,
};

/// Outcome of a bulk status update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkUpdate {
    /// Identifiers of the documents actually modified
    pub modified_ids: Vec<TransactionId>,
}

impl BulkUpdate {
    pub fn modified_count(&self) -> u64 {
        self.modified_ids.len() as u64
    }
}

/// Transactions re-pointed from one batch to another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovedTransactions {
    pub ids: Vec<TransactionId>,
    /// Accrued reward of the moved transactions for the requested initiative
    pub accrued_cents: i64,
}

impl MovedTransactions {
    pub fn count(&self) -> u64 {
        self.ids.len() as u64
    }
}

/// Persistence of reward batches
#[async_trait]
pub trait RewardBatchRepository: Send + Sync {
    /// Insert a batch, failing with `StoreError::DuplicateKey` if its key exists
    async fn insert(&self, batch: RewardBatch) -> Result<RewardBatch, StoreError>;

    async fn find_by_id(&self, batch_id: &str) -> Result<Option<RewardBatch>, StoreError>;

    async fn find_by_key(&self, key: &BatchKey) -> Result<Option<RewardBatch>, StoreError>;

    /// Fetch a batch only if it currently holds `status`
    async fn find_by_id_and_status(
        &self,
        batch_id: &str,
        status: BatchStatus,
    ) -> Result<Option<RewardBatch>, StoreError>;

    /// Atomically add `delta` to the batch counters, returning the updated batch
    async fn increment_totals(
        &self,
        batch_id: &str,
        delta: CounterDelta,
    ) -> Result<Option<RewardBatch>, StoreError>;

    /// Move the batch to `to` if its current status is one of `from`
    ///
    /// Returns the updated batch, or `None` when the batch is missing or its
    /// status did not match.
    async fn update_status(
        &self,
        batch_id: &str,
        from: &[BatchStatus],
        to: BatchStatus,
    ) -> Result<Option<RewardBatch>, StoreError>;

    async fn find_page(
        &self,
        filter: &BatchFilter,
        page: &PageRequest<BatchSortField>,
    ) -> Result<Page<RewardBatch>, StoreError>;
}

/// Persistence of reward transactions
#[async_trait]
pub trait RewardTransactionRepository: Send + Sync {
    /// Insert or replace a transaction by id, returning the previous document
    ///
    /// An existing batch linkage (batch id, batch status, rejection reason)
    /// survives the replacement.
    async fn upsert(
        &self,
        trx: RewardTransaction,
    ) -> Result<Option<RewardTransaction>, StoreError>;

    async fn find_by_id(&self, trx_id: &str) -> Result<Option<RewardTransaction>, StoreError>;

    /// Link an unlinked transaction to a batch; false if it was already linked
    async fn link_to_batch(
        &self,
        trx_id: &str,
        batch_id: &str,
        status: RewardBatchTrxStatus,
    ) -> Result<bool, StoreError>;

    /// Clear the batch linkage of a transaction linked to `batch_id`
    ///
    /// Returns false when the transaction is not linked to that batch.
    async fn unlink_from_batch(&self, trx_id: &str, batch_id: &str) -> Result<bool, StoreError>;

    /// Set `to` on the listed transactions of the batch whose status is in `from`
    async fn update_transactions_status(
        &self,
        batch_id: &str,
        trx_ids: &[TransactionId],
        from: &[RewardBatchTrxStatus],
        to: RewardBatchTrxStatus,
        reason: Option<&str>,
    ) -> Result<BulkUpdate, StoreError>;

    /// Set `to` on every transaction of the batch whose status is in `from`
    async fn update_batch_transactions_status(
        &self,
        batch_id: &str,
        from: &[RewardBatchTrxStatus],
        to: RewardBatchTrxStatus,
    ) -> Result<BulkUpdate, StoreError>;

    /// Sum the accrued reward of one initiative over the listed transactions
    async fn sum_accrued_rewards(
        &self,
        initiative_id: &str,
        trx_ids: &[TransactionId],
    ) -> Result<i64, StoreError>;

    /// Compare-and-set of one transaction's batch status, returning the pre-image
    ///
    /// The write only happens when `current -> to` is a defined transition;
    /// the pre-image is returned either way so the caller can reconcile it.
    /// `None` when the transaction is not linked to the batch.
    async fn update_status_and_return_old(
        &self,
        batch_id: &str,
        trx_id: &str,
        to: RewardBatchTrxStatus,
        reason: Option<&str>,
    ) -> Result<Option<RewardTransaction>, StoreError>;

    /// Re-point every transaction of `from_batch` in `status` to `to_batch`
    /// with batch status `reset_to`, summing their accrued reward for
    /// `initiative_id`
    async fn move_to_batch(
        &self,
        from_batch: &str,
        to_batch: &str,
        status: RewardBatchTrxStatus,
        reset_to: RewardBatchTrxStatus,
        initiative_id: &str,
    ) -> Result<MovedTransactions, StoreError>;

    /// Re-point the listed transactions of `from_batch` to `to_batch` with
    /// batch status `to`, returning how many moved
    async fn relink(
        &self,
        trx_ids: &[TransactionId],
        from_batch: &str,
        to_batch: &str,
        to: RewardBatchTrxStatus,
    ) -> Result<u64, StoreError>;

    async fn count_by_batch(
        &self,
        batch_id: &str,
        status: Option<RewardBatchTrxStatus>,
    ) -> Result<u64, StoreError>;

    async fn find_page(
        &self,
        filter: &TransactionFilter,
        page: &PageRequest<TransactionSortField>,
    ) -> Result<Page<RewardTransaction>, StoreError>;

    /// Up to `limit` ids of transactions rewarded by the initiative
    async fn find_ids_by_initiative(
        &self,
        initiative_id: &str,
        limit: usize,
    ) -> Result<Vec<TransactionId>, StoreError>;

    async fn delete_by_ids(&self, trx_ids: &[TransactionId]) -> Result<u64, StoreError>;
}

/// Receiver of failure descriptions for alerting and retry topics
#[async_trait]
pub trait ErrorNotifier: Send + Sync {
    async fn notify(&self, notification: ErrorNotification) -> Result<(), BatchError>;
}

/// Acknowledges processed record positions to the source stream
#[async_trait]
pub trait OffsetCommitter: Send + Sync {
    async fn commit(&self, positions: Vec<RecordPosition>) -> Result<(), BatchError>;
}

/// Personal data of a citizen, as returned by the PII vault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub user_id: String,
    pub fiscal_code: String,
}

/// Resolves users to PII and back; unknown values resolve to `None`
#[async_trait]
pub trait UserResolver: Send + Sync {
    async fn resolve_user(&self, user_id: &str) -> Result<Option<UserInfo>, BatchError>;

    async fn resolve_token(&self, fiscal_code: &str) -> Result<Option<String>, BatchError>;
}

/// Point-of-sale registry entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointOfSale {
    pub id: String,
    pub merchant_id: String,
    pub name: String,
}

/// Merchant point-of-sale registry lookup
#[async_trait]
pub trait PointOfSaleLookup: Send + Sync {
    async fn get_point_of_sale(
        &self,
        merchant_id: &str,
        pos_id: &str,
    ) -> Result<Option<PointOfSale>, BatchError>;
}
