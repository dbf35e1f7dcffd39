//! Reward batch lifecycle
//!
//! This module provides `RewardBatchService`, which owns the batch state
//! machine (`CREATED -> SENT -> APPROVED`) and the bulk transaction status
//! operations run against a batch.
//!
//! # Design
//!
//! The service never reads a batch, changes its counters in memory and writes
//! it back. Transaction statuses are changed with conditional updates that
//! report what they touched, the reconciler turns that into a `CounterDelta`,
//! and the delta is applied with a single `increment_totals` call per request.
//!
//! Every storage call goes through the configured `RetryPolicy`, so rate
//! limiting is absorbed here and exhaustion surfaces as
//! `BatchError::RetryExpired`.
//!
//! # Architecture
//!
//! ```text
//! RewardBatchService
//!     ├── Arc<dyn RewardBatchRepository>
//!     ├── Arc<dyn RewardTransactionRepository>
//!     └── RetryPolicy
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::types::RewardBatchTrxStatus::{Approved, Rejected, Suspended, ToCheck};
use crate::types::{
    BatchError, BatchKey, BatchKind, BatchMonth, BatchStatus, CounterDelta, RewardBatch,
    RewardBatchTrxStatus, RewardTransaction, StoreError, TransactionId,
};

use super::reconciler;
use super::retry::RetryPolicy;
use super::traits::{RewardBatchRepository, RewardTransactionRepository};

/// Transactions targeted by a bulk status operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionsRequest {
    pub transaction_ids: Vec<TransactionId>,
    /// Reason recorded on suspended or rejected transactions
    pub reason: Option<String>,
}

impl TransactionsRequest {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            transaction_ids: ids.into_iter().map(Into::into).collect(),
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Batch lifecycle manager
///
/// Cheap to clone; clones share the same repositories.
#[derive(Clone)]
pub struct RewardBatchService {
    batches: Arc<dyn RewardBatchRepository>,
    transactions: Arc<dyn RewardTransactionRepository>,
    retry: RetryPolicy,
}

impl RewardBatchService {
    pub fn new(
        batches: Arc<dyn RewardBatchRepository>,
        transactions: Arc<dyn RewardTransactionRepository>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            batches,
            transactions,
            retry,
        }
    }

    /// Return the batch for `key`, creating it if it does not exist
    ///
    /// Creation is attempted first; a writer that loses the race on the
    /// unique key reads back the winner's batch instead of failing. All
    /// concurrent callers therefore observe the same batch.
    pub async fn find_or_create_batch(&self, key: &BatchKey) -> Result<RewardBatch, BatchError> {
        let batch = RewardBatch::new(key, Utc::now());

        match self
            .retry
            .run("insert_batch", || self.batches.insert(batch.clone()))
            .await
        {
            Ok(created) => {
                info!(batch_id = %created.id, key = %key, "Reward batch created");
                Ok(created)
            }
            Err(BatchError::Store(StoreError::DuplicateKey { .. })) => {
                debug!(key = %key, "Reward batch already exists, reading it back");
                self.retry
                    .run("find_batch_by_key", || self.batches.find_by_key(key))
                    .await?
                    .ok_or_else(|| BatchError::batch_not_found(&key.batch_id()))
            }
            Err(error) => Err(error),
        }
    }

    /// Link an ingested transaction to the batch of its month
    ///
    /// Transactions without merchant or point-of-sale type, or in a business
    /// status that is not rewarded, are not batched. Transactions carrying
    /// rejection reasons go to the `REJECTED` batch kind already rejected;
    /// the others join the regular batch as `TO_CHECK` with their accrued
    /// reward added to the batch amounts.
    ///
    /// A linked transaction is always counted: when the counter update fails
    /// the link is undone, so a redelivery of the same event links it again.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(RewardBatch))` - The batch after its counters were updated
    /// * `Ok(None)` - Not eligible, or already linked by an earlier delivery
    pub async fn link_transaction(
        &self,
        trx: &RewardTransaction,
    ) -> Result<Option<RewardBatch>, BatchError> {
        let Some((key, status, delta)) = placement(trx) else {
            debug!(trx_id = %trx.id, status = %trx.status, "Transaction not eligible for a batch");
            return Ok(None);
        };

        let batch = self.find_or_create_batch(&key).await?;
        let linked = self
            .retry
            .run("link_to_batch", || {
                self.transactions.link_to_batch(&trx.id, &batch.id, status)
            })
            .await?;

        if !linked {
            debug!(trx_id = %trx.id, "Transaction already linked");
            return Ok(None);
        }

        debug!(trx_id = %trx.id, batch_id = %batch.id, %status, "Transaction linked");
        match self.increment(&batch.id, delta).await {
            Ok(updated) => Ok(Some(updated)),
            Err(error) => {
                self.undo_link(&trx.id, &batch.id).await;
                Err(error)
            }
        }
    }

    /// Send a batch for evaluation on behalf of its merchant
    ///
    /// # Returns
    ///
    /// * `Ok(RewardBatch)` - The batch, now `SENT`
    /// * `Err(BatchError::NotFound)` - No batch with this id
    /// * `Err(BatchError::Forbidden)` - The batch belongs to another merchant
    /// * `Err(BatchError::InvalidState)` - The batch is not `CREATED`
    pub async fn send_reward_batch(
        &self,
        merchant_id: &str,
        batch_id: &str,
    ) -> Result<RewardBatch, BatchError> {
        let batch = self.require_batch(batch_id).await?;
        if batch.merchant_id != merchant_id {
            return Err(BatchError::forbidden(merchant_id, batch_id));
        }
        if batch.status != BatchStatus::Created {
            return Err(BatchError::invalid_state(batch_id, batch.status, "send"));
        }

        let sent = self
            .retry
            .run("update_batch_status", || {
                self.batches
                    .update_status(batch_id, &[BatchStatus::Created], BatchStatus::Sent)
            })
            .await?;

        match sent {
            Some(sent) => {
                info!(batch_id, merchant_id, "Reward batch sent");
                Ok(sent)
            }
            // Another writer moved the batch between the check and the update.
            None => {
                let current = self.require_batch(batch_id).await?;
                Err(BatchError::invalid_state(batch_id, current.status, "send"))
            }
        }
    }

    /// Suspend pending transactions of a batch
    ///
    /// Only transactions still `TO_CHECK` or `CONSULTABLE` are touched. When
    /// none is, the batch is returned as is and no counter is written.
    /// Otherwise the suspended count grows by the number of modified
    /// transactions and their accrued reward for `initiative_id` is removed
    /// from the approved amount.
    pub async fn suspend_transactions(
        &self,
        batch_id: &str,
        initiative_id: &str,
        request: &TransactionsRequest,
    ) -> Result<RewardBatch, BatchError> {
        let batch = self.require_open_batch(batch_id, "suspend transactions").await?;

        let update = self
            .retry
            .run("update_transactions_status", || {
                self.transactions.update_transactions_status(
                    batch_id,
                    &request.transaction_ids,
                    &RewardBatchTrxStatus::PENDING,
                    Suspended,
                    request.reason.as_deref(),
                )
            })
            .await?;

        if update.modified_ids.is_empty() {
            debug!(batch_id, "No transaction suspended");
            return Ok(batch);
        }

        let suspended_sum = self
            .retry
            .run("sum_accrued_rewards", || {
                self.transactions
                    .sum_accrued_rewards(initiative_id, &update.modified_ids)
            })
            .await?;

        let delta = reconciler::bulk_delta(
            batch_id,
            ToCheck,
            Suspended,
            update.modified_count(),
            suspended_sum,
        )?;

        info!(
            batch_id,
            initiative_id,
            suspended = update.modified_count(),
            suspended_sum,
            "Transactions suspended"
        );
        self.increment(batch_id, delta).await
    }

    /// Reject transactions of a batch that is not yet approved
    ///
    /// Each transaction is moved with a compare-and-set returning its previous
    /// status; the per-transaction deltas are summed and written once.
    pub async fn reject_transactions(
        &self,
        batch_id: &str,
        initiative_id: &str,
        request: &TransactionsRequest,
    ) -> Result<RewardBatch, BatchError> {
        let batch = self.require_open_batch(batch_id, "reject transactions").await?;
        let updated = self
            .transition_each(batch, initiative_id, request, Rejected)
            .await?;

        info!(batch_id, initiative_id, "Transactions rejected");
        Ok(updated)
    }

    /// Approve transactions of a confirmed batch
    ///
    /// The batch must already be `APPROVED`. Transactions are moved one by one
    /// with compare-and-set and their previous statuses reconciled:
    /// pending ones count as elaborated, suspended and rejected ones give their
    /// accrued reward back to the approved amount. The summed delta is applied
    /// in a single call after every transaction has been processed; a storage
    /// failure on any of them aborts before that call.
    pub async fn approved_transactions(
        &self,
        batch_id: &str,
        request: &TransactionsRequest,
        initiative_id: &str,
        merchant_id: &str,
    ) -> Result<RewardBatch, BatchError> {
        let batch = self
            .retry
            .run("find_batch_by_status", || {
                self.batches
                    .find_by_id_and_status(batch_id, BatchStatus::Approved)
            })
            .await?
            .ok_or_else(|| {
                BatchError::bad_request(format!(
                    "Reward batch {} not found in status {}",
                    batch_id,
                    BatchStatus::Approved
                ))
            })?;

        if batch.merchant_id != merchant_id {
            return Err(BatchError::forbidden(merchant_id, batch_id));
        }

        let updated = self
            .transition_each(batch, initiative_id, request, Approved)
            .await?;

        info!(batch_id, initiative_id, "Transactions approved");
        Ok(updated)
    }

    /// Confirm a batch
    ///
    /// The batch becomes `APPROVED` and its pending transactions are approved
    /// with it. Suspended transactions cannot be closed: they are moved, back
    /// to `TO_CHECK`, to the batch of the following month (created if needed),
    /// and that successor batch is returned instead of the confirmed one.
    ///
    /// When a later step fails the batch is reopened in its previous status,
    /// so the confirmation can be issued again. A carry-over that completed
    /// before the failure is kept; it moves transactions and counters together.
    ///
    /// # Returns
    ///
    /// * `Ok(RewardBatch)` - The confirmed batch, or its successor when
    ///   suspended transactions were carried over
    /// * `Err(BatchError::NotFound)` - No batch with this id
    /// * `Err(BatchError::BadRequest)` - The batch is already approved
    /// * `Err(BatchError::InvalidState)` - The successor batch was already sent
    pub async fn reward_batch_confirmation(
        &self,
        initiative_id: &str,
        batch_id: &str,
    ) -> Result<RewardBatch, BatchError> {
        let batch = self.require_batch(batch_id).await?;
        if batch.status == BatchStatus::Approved {
            return Err(already_approved(batch_id));
        }

        let suspended = self
            .retry
            .run("count_by_batch", || {
                self.transactions.count_by_batch(batch_id, Some(Suspended))
            })
            .await?;

        // The successor is secured before the batch closes, so a failure here
        // leaves the batch untouched.
        let successor = if suspended > 0 {
            let key = batch.key().successor().ok_or_else(|| {
                BatchError::bad_request(format!("No month follows {}", batch.month))
            })?;
            let successor = self.find_or_create_batch(&key).await?;
            if successor.status != BatchStatus::Created {
                return Err(BatchError::invalid_state(
                    &successor.id,
                    successor.status,
                    "receive suspended transactions",
                ));
            }
            Some(successor)
        } else {
            None
        };

        let approved = self
            .retry
            .run("update_batch_status", || {
                self.batches.update_status(
                    batch_id,
                    &[BatchStatus::Created, BatchStatus::Sent],
                    BatchStatus::Approved,
                )
            })
            .await?
            .ok_or_else(|| already_approved(batch_id))?;
        info!(batch_id, initiative_id, suspended, "Reward batch approved");

        let closed = self
            .close(approved, successor.as_ref(), initiative_id)
            .await;
        if closed.is_err() {
            self.reopen(batch_id, batch.status).await;
        }
        closed
    }

    /// Carry suspended transactions over, then approve the pending ones
    async fn close(
        &self,
        approved: RewardBatch,
        successor: Option<&RewardBatch>,
        initiative_id: &str,
    ) -> Result<RewardBatch, BatchError> {
        let carried = match successor {
            Some(successor) => Some(
                self.carry_over(&approved.id, successor, initiative_id)
                    .await?,
            ),
            None => None,
        };

        let approved = self.approve_pending(approved).await?;
        Ok(carried.unwrap_or(approved))
    }

    /// Move the suspended transactions of `batch_id` to `successor` as `TO_CHECK`
    ///
    /// Either both batches get their counter update or the transactions are
    /// moved back.
    async fn carry_over(
        &self,
        batch_id: &str,
        successor: &RewardBatch,
        initiative_id: &str,
    ) -> Result<RewardBatch, BatchError> {
        let moved = self
            .retry
            .run("move_to_batch", || {
                self.transactions.move_to_batch(
                    batch_id,
                    &successor.id,
                    Suspended,
                    ToCheck,
                    initiative_id,
                )
            })
            .await?;

        let count = moved.count() as i64;
        let released = CounterDelta {
            suspended: -count,
            transactions: -count,
            initial_amount_cents: -moved.accrued_cents,
            ..CounterDelta::ZERO
        };
        let carried = CounterDelta {
            amount_cents: moved.accrued_cents,
            initial_amount_cents: moved.accrued_cents,
            transactions: count,
            ..CounterDelta::ZERO
        };

        let updated = match self.increment(&successor.id, carried).await {
            Ok(updated) => updated,
            Err(error) => {
                self.undo_move(&moved.ids, &successor.id, batch_id).await;
                return Err(error);
            }
        };
        if let Err(error) = self.increment(batch_id, released).await {
            if let Err(undo) = self.increment(&successor.id, carried.negate()).await {
                error!(
                    batch_id = %successor.id,
                    error = %undo,
                    "Could not take back carried counters"
                );
            }
            self.undo_move(&moved.ids, &successor.id, batch_id).await;
            return Err(error);
        }

        info!(
            batch_id,
            successor_id = %updated.id,
            moved = count,
            "Suspended transactions carried over"
        );
        Ok(updated)
    }

    /// Approve every pending transaction of a just-approved batch
    ///
    /// If any step fails the transactions already approved get their previous
    /// status back.
    async fn approve_pending(&self, batch: RewardBatch) -> Result<RewardBatch, BatchError> {
        let batch_id = batch.id.clone();
        let mut approved = Vec::new();
        let result = self.approve_pending_groups(batch, &mut approved).await;
        if result.is_err() {
            for (from, ids) in &approved {
                self.restore_statuses(&batch_id, ids, *from).await;
            }
        }
        result
    }

    /// Approve pending transactions one source status at a time, recording
    /// each group in `approved`
    async fn approve_pending_groups(
        &self,
        batch: RewardBatch,
        approved: &mut Vec<(RewardBatchTrxStatus, Vec<TransactionId>)>,
    ) -> Result<RewardBatch, BatchError> {
        let mut delta = CounterDelta::ZERO;

        for from in RewardBatchTrxStatus::PENDING {
            let statuses = [from];
            let update = self
                .retry
                .run("update_batch_transactions_status", || {
                    self.transactions
                        .update_batch_transactions_status(&batch.id, &statuses, Approved)
                })
                .await?;
            if update.modified_ids.is_empty() {
                continue;
            }

            let count = update.modified_count();
            approved.push((from, update.modified_ids));
            delta += reconciler::bulk_delta(&batch.id, from, Approved, count, 0)?;
        }

        if delta.is_zero() {
            return Ok(batch);
        }
        self.increment(&batch.id, delta).await
    }

    async fn restore_statuses(
        &self,
        batch_id: &str,
        trx_ids: &[TransactionId],
        to: RewardBatchTrxStatus,
    ) {
        let restored = self
            .retry
            .run("update_transactions_status", || {
                self.transactions
                    .update_transactions_status(batch_id, trx_ids, &[Approved], to, None)
            })
            .await;
        if let Err(error) = restored {
            error!(batch_id, %to, error = %error, "Could not restore transaction statuses");
        }
    }

    async fn undo_link(&self, trx_id: &str, batch_id: &str) {
        let undone = self
            .retry
            .run("unlink_from_batch", || {
                self.transactions.unlink_from_batch(trx_id, batch_id)
            })
            .await;
        if let Err(error) = undone {
            error!(trx_id, batch_id, error = %error, "Could not undo transaction link");
        }
    }

    async fn undo_move(&self, trx_ids: &[TransactionId], from_batch: &str, to_batch: &str) {
        let undone = self
            .retry
            .run("relink", || {
                self.transactions
                    .relink(trx_ids, from_batch, to_batch, Suspended)
            })
            .await;
        if let Err(error) = undone {
            error!(
                from_batch,
                to_batch,
                error = %error,
                "Could not move suspended transactions back"
            );
        }
    }

    /// Put a batch whose confirmation failed back in `status`
    async fn reopen(&self, batch_id: &str, status: BatchStatus) {
        let reopened = self
            .retry
            .run("update_batch_status", || {
                self.batches
                    .update_status(batch_id, &[BatchStatus::Approved], status)
            })
            .await;
        match reopened {
            Ok(_) => warn!(batch_id, %status, "Confirmation failed, batch reopened"),
            Err(error) => {
                error!(batch_id, error = %error, "Confirmation failed, batch left approved")
            }
        }
    }

    /// Move each requested transaction to `to` and apply the summed delta once
    ///
    /// Transactions not linked to the batch are skipped. A pre-image whose
    /// status cannot reach `to` was left unchanged by the store; it is reported
    /// as `IllegalTransition` after the deltas of the others are applied.
    async fn transition_each(
        &self,
        batch: RewardBatch,
        initiative_id: &str,
        request: &TransactionsRequest,
        to: RewardBatchTrxStatus,
    ) -> Result<RewardBatch, BatchError> {
        let batch_id = batch.id.as_str();
        let mut total = CounterDelta::ZERO;
        let mut illegal = None;

        for trx_id in &request.transaction_ids {
            let previous = self
                .retry
                .run("update_status_and_return_old", || {
                    self.transactions.update_status_and_return_old(
                        batch_id,
                        trx_id,
                        to,
                        request.reason.as_deref(),
                    )
                })
                .await?;

            let Some(previous) = previous else {
                debug!(batch_id, trx_id = %trx_id, "Transaction not in batch, skipped");
                continue;
            };
            let Some(from) = previous.reward_batch_trx_status else {
                continue;
            };

            match reconciler::delta(trx_id, from, to, previous.accrued_for(initiative_id)) {
                Ok(delta) => total += delta,
                Err(error) => {
                    warn!(batch_id, error = %error, "Transaction left unchanged");
                    illegal.get_or_insert(error);
                }
            }
        }

        let updated = if total.is_zero() {
            batch
        } else {
            self.increment(batch_id, total).await?
        };

        match illegal {
            Some(error) => Err(error),
            None => Ok(updated),
        }
    }

    async fn increment(
        &self,
        batch_id: &str,
        delta: CounterDelta,
    ) -> Result<RewardBatch, BatchError> {
        self.retry
            .run("increment_totals", || {
                self.batches.increment_totals(batch_id, delta)
            })
            .await?
            .ok_or_else(|| BatchError::batch_not_found(batch_id))
    }

    async fn require_batch(&self, batch_id: &str) -> Result<RewardBatch, BatchError> {
        self.retry
            .run("find_batch", || self.batches.find_by_id(batch_id))
            .await?
            .ok_or_else(|| BatchError::batch_not_found(batch_id))
    }

    /// Batch that still accepts transaction status changes
    async fn require_open_batch(
        &self,
        batch_id: &str,
        operation: &str,
    ) -> Result<RewardBatch, BatchError> {
        let batch = self.require_batch(batch_id).await?;
        if batch.status == BatchStatus::Approved {
            return Err(BatchError::invalid_state(batch_id, batch.status, operation));
        }
        Ok(batch)
    }
}

/// Batch key, initial batch status and counter delta of a new transaction
fn placement(trx: &RewardTransaction) -> Option<(BatchKey, RewardBatchTrxStatus, CounterDelta)> {
    let merchant_id = trx.merchant_id.as_deref()?;
    let pos_type = trx.pos_type?;
    if !trx.status.is_batch_eligible() {
        return None;
    }
    let month = BatchMonth::of(trx.trx_date.date_naive());

    if trx.rejection_reasons.is_empty() {
        let key = BatchKey::new(merchant_id, pos_type, month, BatchKind::Regular);
        Some((key, ToCheck, CounterDelta::linked(trx.accrued_total())))
    } else {
        let key = BatchKey::new(merchant_id, pos_type, month, BatchKind::Rejected);
        let delta = CounterDelta {
            transactions: 1,
            rejected: 1,
            ..CounterDelta::ZERO
        };
        Some((key, Rejected, delta))
    }
}

fn already_approved(batch_id: &str) -> BatchError {
    BatchError::bad_request(format!("Reward batch {} is already approved", batch_id))
}
