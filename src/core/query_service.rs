//! Merchant-facing listings of batches and transactions
//!
//! Listings are always scoped to the calling merchant. Transactions can be
//! filtered by the citizen's fiscal code, which is first exchanged for the
//! user token stored on transactions; results are enriched with the fiscal
//! code and the point-of-sale name.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use crate::types::{
    BatchError, BatchFilter, BatchSortField, Page, PageRequest, RewardBatch, RewardBatchTrxStatus,
    RewardTransaction, TransactionFilter, TransactionSortField, TransactionStatus,
};

use super::retry::RetryPolicy;
use super::traits::{
    PointOfSale, PointOfSaleLookup, RewardBatchRepository, RewardTransactionRepository,
    UserResolver,
};

/// Transaction listing criteria, on top of merchant and initiative
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionQuery {
    pub reward_batch_id: Option<String>,
    pub status: Option<TransactionStatus>,
    pub reward_batch_trx_status: Option<RewardBatchTrxStatus>,
    pub fiscal_code: Option<String>,
}

/// Transaction as shown to the merchant
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: RewardTransaction,
    pub fiscal_code: Option<String>,
    pub point_of_sale_name: Option<String>,
}

/// `PointOfSaleLookup` remembering every point of sale it has found
///
/// Misses and failures are not cached.
pub struct CachedPointOfSaleLookup {
    inner: Arc<dyn PointOfSaleLookup>,
    cache: DashMap<(String, String), PointOfSale>,
}

impl CachedPointOfSaleLookup {
    pub fn new(inner: Arc<dyn PointOfSaleLookup>) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }
}

#[async_trait]
impl PointOfSaleLookup for CachedPointOfSaleLookup {
    async fn get_point_of_sale(
        &self,
        merchant_id: &str,
        pos_id: &str,
    ) -> Result<Option<PointOfSale>, BatchError> {
        let key = (merchant_id.to_string(), pos_id.to_string());
        if let Some(hit) = self.cache.get(&key) {
            return Ok(Some(hit.value().clone()));
        }

        let found = self.inner.get_point_of_sale(merchant_id, pos_id).await?;
        if let Some(pos) = &found {
            self.cache.insert(key, pos.clone());
        }
        Ok(found)
    }
}

/// Read side of the batch and transaction collections
#[derive(Clone)]
pub struct RewardQueryService {
    batches: Arc<dyn RewardBatchRepository>,
    transactions: Arc<dyn RewardTransactionRepository>,
    users: Arc<dyn UserResolver>,
    points_of_sale: Arc<dyn PointOfSaleLookup>,
    retry: RetryPolicy,
}

impl RewardQueryService {
    pub fn new(
        batches: Arc<dyn RewardBatchRepository>,
        transactions: Arc<dyn RewardTransactionRepository>,
        users: Arc<dyn UserResolver>,
        points_of_sale: Arc<dyn PointOfSaleLookup>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            batches,
            transactions,
            users,
            points_of_sale,
            retry,
        }
    }

    /// Page of the merchant's batches, month ascending unless sorted otherwise
    pub async fn find_batches(
        &self,
        merchant_id: &str,
        filter: BatchFilter,
        page: &PageRequest<BatchSortField>,
    ) -> Result<Page<RewardBatch>, BatchError> {
        let filter = BatchFilter {
            merchant_id: Some(merchant_id.to_string()),
            ..filter
        };
        self.retry
            .run("find_batches", || self.batches.find_page(&filter, page))
            .await
    }

    /// Page of the merchant's transactions for an initiative
    ///
    /// A fiscal code unknown to the resolver yields an empty page.
    pub async fn find_transactions(
        &self,
        merchant_id: &str,
        initiative_id: &str,
        query: TransactionQuery,
        page: &PageRequest<TransactionSortField>,
    ) -> Result<Page<TransactionView>, BatchError> {
        let user_id = match &query.fiscal_code {
            Some(fiscal_code) => match self.users.resolve_token(fiscal_code).await? {
                Some(token) => Some(token),
                None => {
                    debug!(merchant_id, "Unknown fiscal code, empty result");
                    return Ok(Page::empty(page.page, page.size));
                }
            },
            None => None,
        };

        let filter = TransactionFilter {
            merchant_id: Some(merchant_id.to_string()),
            initiative_id: Some(initiative_id.to_string()),
            user_id,
            reward_batch_id: query.reward_batch_id,
            status: query.status,
            reward_batch_trx_status: query.reward_batch_trx_status,
        };

        let Page {
            content,
            page_no,
            page_size,
            total_elements,
            total_pages,
        } = self
            .retry
            .run("find_transactions", || self.transactions.find_page(&filter, page))
            .await?;

        let mut views = Vec::with_capacity(content.len());
        for trx in content {
            views.push(self.enrich(trx).await?);
        }
        Ok(Page {
            content: views,
            page_no,
            page_size,
            total_elements,
            total_pages,
        })
    }

    /// One transaction of the merchant
    ///
    /// # Returns
    ///
    /// * `Err(BatchError::NotFound)` - No transaction with this id
    /// * `Err(BatchError::Forbidden)` - The transaction belongs to another merchant
    pub async fn get_transaction(
        &self,
        merchant_id: &str,
        trx_id: &str,
    ) -> Result<TransactionView, BatchError> {
        let trx = self
            .retry
            .run("find_transaction", || self.transactions.find_by_id(trx_id))
            .await?
            .ok_or_else(|| BatchError::transaction_not_found(trx_id))?;

        if trx.merchant_id.as_deref() != Some(merchant_id) {
            return Err(BatchError::forbidden(
                merchant_id,
                trx.reward_batch_id.as_deref().unwrap_or_default(),
            ));
        }
        self.enrich(trx).await
    }

    async fn enrich(&self, transaction: RewardTransaction) -> Result<TransactionView, BatchError> {
        let fiscal_code = match &transaction.user_id {
            Some(user_id) => self
                .users
                .resolve_user(user_id)
                .await?
                .map(|user| user.fiscal_code),
            None => None,
        };

        let point_of_sale_name = match (&transaction.merchant_id, &transaction.point_of_sale_id) {
            (Some(merchant_id), Some(pos_id)) => self
                .points_of_sale
                .get_point_of_sale(merchant_id, pos_id)
                .await?
                .map(|pos| pos.name),
            _ => None,
        };

        Ok(TransactionView {
            transaction,
            fiscal_code,
            point_of_sale_name,
        })
    }
}
