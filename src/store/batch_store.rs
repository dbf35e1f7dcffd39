//! Thread-safe in-memory reward batch repository
//!
//! This module provides `InMemoryBatchRepository`, a `RewardBatchRepository`
//! backed by `DashMap`.
//!
//! # Design
//!
//! Batches live in one map keyed by id; a second map from `BatchKey` to id is
//! the uniqueness constraint. An insert claims the key through the key map's
//! entry lock, so of two concurrent inserts for the same key exactly one wins
//! and the other receives `StoreError::DuplicateKey`.
//!
//! Every other write happens under the batch entry lock: counter increments
//! and conditional status changes are single atomic operations, never a
//! read followed by a separate write.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::core::traits::RewardBatchRepository;
use crate::types::{
    BatchFilter, BatchId, BatchKey, BatchSortField, BatchStatus, CounterDelta, Page, PageRequest,
    RewardBatch, StoreError,
};

use super::sorting::sort_batches;

const COLLECTION: &str = "reward_batch";

/// Thread-safe reward batch store
///
/// Operations on different batches proceed in parallel; operations on the
/// same batch are serialized by its `DashMap` shard lock.
#[derive(Debug, Default)]
pub struct InMemoryBatchRepository {
    /// Batches by id
    batches: DashMap<BatchId, RewardBatch>,

    /// Unique index over `(merchant, pos type, month, kind)`
    keys: DashMap<BatchKey, BatchId>,
}

impl InMemoryBatchRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored batch, in no particular order
    pub fn all(&self) -> Vec<RewardBatch> {
        self.batches
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

fn matches(batch: &RewardBatch, filter: &BatchFilter) -> bool {
    filter
        .merchant_id
        .as_ref()
        .map_or(true, |m| &batch.merchant_id == m)
        && filter.month.map_or(true, |m| batch.month == m)
        && filter.pos_type.map_or(true, |p| batch.pos_type == p)
        && filter.status.map_or(true, |s| batch.status == s)
}

#[async_trait]
impl RewardBatchRepository for InMemoryBatchRepository {
    async fn insert(&self, batch: RewardBatch) -> Result<RewardBatch, StoreError> {
        let key = batch.key();
        match self.keys.entry(key) {
            Entry::Occupied(occupied) => Err(StoreError::duplicate_key(
                COLLECTION,
                occupied.key().to_string(),
            )),
            Entry::Vacant(slot) => {
                // The batch is visible by id before the key slot is released.
                self.batches.insert(batch.id.clone(), batch.clone());
                slot.insert(batch.id.clone());
                Ok(batch)
            }
        }
    }

    async fn find_by_id(&self, batch_id: &str) -> Result<Option<RewardBatch>, StoreError> {
        Ok(self.batches.get(batch_id).map(|b| b.value().clone()))
    }

    async fn find_by_key(&self, key: &BatchKey) -> Result<Option<RewardBatch>, StoreError> {
        let id = match self.keys.get(key) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };
        Ok(self.batches.get(&id).map(|b| b.value().clone()))
    }

    async fn find_by_id_and_status(
        &self,
        batch_id: &str,
        status: BatchStatus,
    ) -> Result<Option<RewardBatch>, StoreError> {
        Ok(self
            .batches
            .get(batch_id)
            .filter(|b| b.status == status)
            .map(|b| b.value().clone()))
    }

    async fn increment_totals(
        &self,
        batch_id: &str,
        delta: CounterDelta,
    ) -> Result<Option<RewardBatch>, StoreError> {
        Ok(self.batches.get_mut(batch_id).map(|mut batch| {
            batch.counters.apply(&delta);
            batch.update_date = Utc::now();
            batch.value().clone()
        }))
    }

    async fn update_status(
        &self,
        batch_id: &str,
        from: &[BatchStatus],
        to: BatchStatus,
    ) -> Result<Option<RewardBatch>, StoreError> {
        let Some(mut batch) = self.batches.get_mut(batch_id) else {
            return Ok(None);
        };
        if !from.contains(&batch.status) {
            return Ok(None);
        }
        batch.transition(to, Utc::now());
        Ok(Some(batch.value().clone()))
    }

    async fn find_page(
        &self,
        filter: &BatchFilter,
        page: &PageRequest<BatchSortField>,
    ) -> Result<Page<RewardBatch>, StoreError> {
        let mut selected: Vec<RewardBatch> = self
            .batches
            .iter()
            .filter(|entry| matches(entry.value(), filter))
            .map(|entry| entry.value().clone())
            .collect();

        sort_batches(&mut selected, page.sort);
        Ok(Page::from_sorted(selected, page.page, page.size))
    }
}
