//! Reward transaction types
//!
//! A reward transaction is the persisted outcome of one upstream payment
//! event. Apart from its batch linkage, batch status, rejection reason and
//! reward map it is immutable.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use super::batch::{BatchId, MerchantId, PosType};

/// Transaction identifier
pub type TransactionId = String;

/// Initiative identifier
pub type InitiativeId = String;

/// Status of a transaction inside its reward batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RewardBatchTrxStatus {
    ToCheck,
    Consultable,
    Suspended,
    Approved,
    Rejected,
}

impl RewardBatchTrxStatus {
    pub const ALL: [RewardBatchTrxStatus; 5] = [
        RewardBatchTrxStatus::ToCheck,
        RewardBatchTrxStatus::Consultable,
        RewardBatchTrxStatus::Suspended,
        RewardBatchTrxStatus::Approved,
        RewardBatchTrxStatus::Rejected,
    ];

    /// Statuses still awaiting an evaluation outcome
    pub const PENDING: [RewardBatchTrxStatus; 2] =
        [RewardBatchTrxStatus::ToCheck, RewardBatchTrxStatus::Consultable];

    pub fn is_pending(&self) -> bool {
        Self::PENDING.contains(self)
    }
}

impl fmt::Display for RewardBatchTrxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RewardBatchTrxStatus::ToCheck => "TO_CHECK",
            RewardBatchTrxStatus::Consultable => "CONSULTABLE",
            RewardBatchTrxStatus::Suspended => "SUSPENDED",
            RewardBatchTrxStatus::Approved => "APPROVED",
            RewardBatchTrxStatus::Rejected => "REJECTED",
        };
        write!(f, "{}", s)
    }
}

/// Business status of the payment itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Authorized,
    Captured,
    Rewarded,
    Cancelled,
    Refunded,
    Invoiced,
    Rejected,
}

impl TransactionStatus {
    /// Position in merchant-facing listings sorted by status
    ///
    /// `CANCELLED < REWARDED < REFUNDED < everything else`.
    pub fn rank(&self) -> u8 {
        match self {
            TransactionStatus::Cancelled => 0,
            TransactionStatus::Rewarded => 1,
            TransactionStatus::Refunded => 2,
            _ => 3,
        }
    }

    /// Whether a transaction in this status belongs in a reward batch
    pub fn is_batch_eligible(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Authorized
                | TransactionStatus::Captured
                | TransactionStatus::Rewarded
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Authorized => "AUTHORIZED",
            TransactionStatus::Captured => "CAPTURED",
            TransactionStatus::Rewarded => "REWARDED",
            TransactionStatus::Cancelled => "CANCELLED",
            TransactionStatus::Refunded => "REFUNDED",
            TransactionStatus::Invoiced => "INVOICED",
            TransactionStatus::Rejected => "REJECTED",
        };
        write!(f, "{}", s)
    }
}

/// Reward granted by one initiative
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub provided_reward_cents: i64,
    pub accrued_reward_cents: i64,
    #[serde(default)]
    pub capped: bool,
    #[serde(default)]
    pub threshold_capped: bool,
}

/// Persisted reward transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardTransaction {
    pub id: TransactionId,
    pub id_trx_acquirer: String,
    pub acquirer_code: String,
    pub acquirer_id: String,
    pub id_trx_issuer: Option<String>,
    pub operation_type: String,
    pub trx_date: DateTime<FixedOffset>,
    pub amount_cents: i64,
    pub amount_currency: String,
    pub merchant_id: Option<MerchantId>,
    pub point_of_sale_id: Option<String>,
    pub pos_type: Option<PosType>,
    pub user_id: Option<String>,
    pub status: TransactionStatus,
    pub rewards: BTreeMap<InitiativeId, Reward>,
    pub rejection_reasons: Vec<String>,
    pub reward_batch_id: Option<BatchId>,
    pub reward_batch_trx_status: Option<RewardBatchTrxStatus>,
    pub reward_batch_rejection_reason: Option<String>,
    pub update_date: DateTime<Utc>,
}

impl RewardTransaction {
    /// Accrued reward for one initiative, zero when the initiative is absent
    pub fn accrued_for(&self, initiative_id: &str) -> i64 {
        self.rewards
            .get(initiative_id)
            .map(|reward| reward.accrued_reward_cents)
            .unwrap_or(0)
    }

    /// Accrued reward across every initiative
    pub fn accrued_total(&self) -> i64 {
        self.rewards.values().map(|r| r.accrued_reward_cents).sum()
    }

    /// Whether the transaction is linked to the given batch
    pub fn in_batch(&self, batch_id: &str) -> bool {
        self.reward_batch_id.as_deref() == Some(batch_id)
    }
}

/// Derive the idempotency key of an upstream event
///
/// Re-ingesting the same event yields the same identifier.
pub fn derive_transaction_id(
    id_trx_acquirer: &str,
    acquirer_code: &str,
    trx_date: &DateTime<FixedOffset>,
    operation_type: &str,
    acquirer_id: &str,
) -> TransactionId {
    format!(
        "{}{}{}{}{}",
        id_trx_acquirer,
        acquirer_code,
        trx_date.format("%Y%m%d%H%M%S"),
        operation_type,
        acquirer_id
    )
}
