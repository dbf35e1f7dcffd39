//! Thread-safe in-memory reward transaction repository
//!
//! `InMemoryTransactionRepository` keeps transactions in a `DashMap` keyed by
//! transaction id. Each per-document method runs under that document's entry
//! lock, which makes compare-and-set updates such as `link_to_batch` and
//! `update_status_and_return_old` atomic with respect to concurrent callers.
//!
//! Bulk methods visit documents one at a time, each under its own lock, the
//! same guarantee a document store gives for a multi-document update.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::core::reconciler;
use crate::core::traits::{BulkUpdate, MovedTransactions, RewardTransactionRepository};
use crate::types::{
    Page, PageRequest, RewardBatchTrxStatus, RewardTransaction, StoreError, TransactionFilter,
    TransactionId, TransactionSortField,
};

use super::sorting::sort_transactions;

/// Thread-safe reward transaction store
#[derive(Debug, Default)]
pub struct InMemoryTransactionRepository {
    transactions: DashMap<TransactionId, RewardTransaction>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every transaction linked to the batch
    pub fn by_batch(&self, batch_id: &str) -> Vec<RewardTransaction> {
        self.transactions
            .iter()
            .filter(|entry| entry.in_batch(batch_id))
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

fn matches(trx: &RewardTransaction, filter: &TransactionFilter) -> bool {
    filter
        .merchant_id
        .as_ref()
        .map_or(true, |m| trx.merchant_id.as_ref() == Some(m))
        && filter
            .initiative_id
            .as_ref()
            .map_or(true, |i| trx.rewards.contains_key(i))
        && filter
            .user_id
            .as_ref()
            .map_or(true, |u| trx.user_id.as_ref() == Some(u))
        && filter
            .reward_batch_id
            .as_ref()
            .map_or(true, |b| trx.in_batch(b))
        && filter.status.map_or(true, |s| trx.status == s)
        && filter
            .reward_batch_trx_status
            .map_or(true, |s| trx.reward_batch_trx_status == Some(s))
}

fn set_batch_status(
    trx: &mut RewardTransaction,
    to: RewardBatchTrxStatus,
    reason: Option<&str>,
) {
    trx.reward_batch_trx_status = Some(to);
    trx.reward_batch_rejection_reason = reason.map(str::to_string);
    trx.update_date = Utc::now();
}

#[async_trait]
impl RewardTransactionRepository for InMemoryTransactionRepository {
    async fn upsert(
        &self,
        mut trx: RewardTransaction,
    ) -> Result<Option<RewardTransaction>, StoreError> {
        match self.transactions.entry(trx.id.clone()) {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.get().clone();
                trx.reward_batch_id = previous.reward_batch_id.clone();
                trx.reward_batch_trx_status = previous.reward_batch_trx_status;
                trx.reward_batch_rejection_reason = previous.reward_batch_rejection_reason.clone();
                occupied.insert(trx);
                Ok(Some(previous))
            }
            Entry::Vacant(slot) => {
                slot.insert(trx);
                Ok(None)
            }
        }
    }

    async fn find_by_id(&self, trx_id: &str) -> Result<Option<RewardTransaction>, StoreError> {
        Ok(self.transactions.get(trx_id).map(|t| t.value().clone()))
    }

    async fn link_to_batch(
        &self,
        trx_id: &str,
        batch_id: &str,
        status: RewardBatchTrxStatus,
    ) -> Result<bool, StoreError> {
        let Some(mut trx) = self.transactions.get_mut(trx_id) else {
            return Ok(false);
        };
        if trx.reward_batch_id.is_some() {
            return Ok(false);
        }
        trx.reward_batch_id = Some(batch_id.to_string());
        set_batch_status(&mut trx, status, None);
        Ok(true)
    }

    async fn unlink_from_batch(&self, trx_id: &str, batch_id: &str) -> Result<bool, StoreError> {
        let Some(mut trx) = self.transactions.get_mut(trx_id) else {
            return Ok(false);
        };
        if !trx.in_batch(batch_id) {
            return Ok(false);
        }
        trx.reward_batch_id = None;
        trx.reward_batch_trx_status = None;
        trx.reward_batch_rejection_reason = None;
        trx.update_date = Utc::now();
        Ok(true)
    }

    async fn update_transactions_status(
        &self,
        batch_id: &str,
        trx_ids: &[TransactionId],
        from: &[RewardBatchTrxStatus],
        to: RewardBatchTrxStatus,
        reason: Option<&str>,
    ) -> Result<BulkUpdate, StoreError> {
        let mut modified_ids = Vec::new();
        for trx_id in trx_ids {
            let Some(mut trx) = self.transactions.get_mut(trx_id) else {
                continue;
            };
            let eligible = trx.in_batch(batch_id)
                && trx
                    .reward_batch_trx_status
                    .map_or(false, |status| from.contains(&status));
            if eligible {
                set_batch_status(&mut trx, to, reason);
                modified_ids.push(trx_id.clone());
            }
        }
        Ok(BulkUpdate { modified_ids })
    }

    async fn update_batch_transactions_status(
        &self,
        batch_id: &str,
        from: &[RewardBatchTrxStatus],
        to: RewardBatchTrxStatus,
    ) -> Result<BulkUpdate, StoreError> {
        let mut modified_ids = Vec::new();
        for mut entry in self.transactions.iter_mut() {
            let trx = entry.value_mut();
            let eligible = trx.in_batch(batch_id)
                && trx
                    .reward_batch_trx_status
                    .map_or(false, |status| from.contains(&status));
            if eligible {
                set_batch_status(trx, to, None);
                modified_ids.push(trx.id.clone());
            }
        }
        Ok(BulkUpdate { modified_ids })
    }

    async fn sum_accrued_rewards(
        &self,
        initiative_id: &str,
        trx_ids: &[TransactionId],
    ) -> Result<i64, StoreError> {
        Ok(trx_ids
            .iter()
            .filter_map(|id| self.transactions.get(id))
            .map(|trx| trx.accrued_for(initiative_id))
            .sum())
    }

    async fn update_status_and_return_old(
        &self,
        batch_id: &str,
        trx_id: &str,
        to: RewardBatchTrxStatus,
        reason: Option<&str>,
    ) -> Result<Option<RewardTransaction>, StoreError> {
        let Some(mut trx) = self.transactions.get_mut(trx_id) else {
            return Ok(None);
        };
        if !trx.in_batch(batch_id) {
            return Ok(None);
        }

        let previous = trx.value().clone();
        if let Some(current) = previous.reward_batch_trx_status {
            if current != to && reconciler::is_defined(current, to) {
                set_batch_status(&mut trx, to, reason);
            }
        }
        Ok(Some(previous))
    }

    async fn move_to_batch(
        &self,
        from_batch: &str,
        to_batch: &str,
        status: RewardBatchTrxStatus,
        reset_to: RewardBatchTrxStatus,
        initiative_id: &str,
    ) -> Result<MovedTransactions, StoreError> {
        let mut moved = MovedTransactions::default();
        for mut entry in self.transactions.iter_mut() {
            let trx = entry.value_mut();
            if trx.in_batch(from_batch) && trx.reward_batch_trx_status == Some(status) {
                trx.reward_batch_id = Some(to_batch.to_string());
                set_batch_status(trx, reset_to, None);
                moved.ids.push(trx.id.clone());
                moved.accrued_cents += trx.accrued_for(initiative_id);
            }
        }
        Ok(moved)
    }

    async fn relink(
        &self,
        trx_ids: &[TransactionId],
        from_batch: &str,
        to_batch: &str,
        to: RewardBatchTrxStatus,
    ) -> Result<u64, StoreError> {
        let mut moved = 0u64;
        for trx_id in trx_ids {
            let Some(mut trx) = self.transactions.get_mut(trx_id) else {
                continue;
            };
            if trx.in_batch(from_batch) {
                trx.reward_batch_id = Some(to_batch.to_string());
                set_batch_status(&mut trx, to, None);
                moved += 1;
            }
        }
        Ok(moved)
    }

    async fn count_by_batch(
        &self,
        batch_id: &str,
        status: Option<RewardBatchTrxStatus>,
    ) -> Result<u64, StoreError> {
        Ok(self
            .transactions
            .iter()
            .filter(|trx| {
                trx.in_batch(batch_id)
                    && status.map_or(true, |s| trx.reward_batch_trx_status == Some(s))
            })
            .count() as u64)
    }

    async fn find_page(
        &self,
        filter: &TransactionFilter,
        page: &PageRequest<TransactionSortField>,
    ) -> Result<Page<RewardTransaction>, StoreError> {
        let mut selected: Vec<RewardTransaction> = self
            .transactions
            .iter()
            .filter(|entry| matches(entry.value(), filter))
            .map(|entry| entry.value().clone())
            .collect();

        sort_transactions(&mut selected, page.sort);
        Ok(Page::from_sorted(selected, page.page, page.size))
    }

    async fn find_ids_by_initiative(
        &self,
        initiative_id: &str,
        limit: usize,
    ) -> Result<Vec<TransactionId>, StoreError> {
        Ok(self
            .transactions
            .iter()
            .filter(|trx| trx.rewards.contains_key(initiative_id))
            .take(limit)
            .map(|trx| trx.key().clone())
            .collect())
    }

    async fn delete_by_ids(&self, trx_ids: &[TransactionId]) -> Result<u64, StoreError> {
        Ok(trx_ids
            .iter()
            .filter(|id| self.transactions.remove(*id).is_some())
            .count() as u64)
    }
}
