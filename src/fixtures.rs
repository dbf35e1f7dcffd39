//! Builders shared by unit tests

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::types::{
    BatchKey, BatchKind, BatchMonth, PosType, Reward, RewardTransaction, TransactionOutcome,
    TransactionStatus,
};

pub const INITIATIVE: &str = "INIT";

pub fn key(merchant: &str, month: &str) -> BatchKey {
    BatchKey::new(
        merchant,
        PosType::Physical,
        BatchMonth::parse(month).unwrap(),
        BatchKind::Regular,
    )
}

pub fn rewards(accrued: i64) -> BTreeMap<String, Reward> {
    let mut rewards = BTreeMap::new();
    rewards.insert(
        INITIATIVE.to_string(),
        Reward {
            provided_reward_cents: accrued,
            accrued_reward_cents: accrued,
            ..Default::default()
        },
    );
    rewards
}

/// Unlinked rewarded transaction of merchant `M1` dated 2025-01-15
pub fn transaction(id: &str, accrued: i64) -> RewardTransaction {
    RewardTransaction {
        id: id.to_string(),
        id_trx_acquirer: id.to_string(),
        acquirer_code: "ACQ".to_string(),
        acquirer_id: "ACQ_ID".to_string(),
        id_trx_issuer: None,
        operation_type: "00".to_string(),
        trx_date: DateTime::parse_from_rfc3339("2025-01-15T10:00:00+01:00").unwrap(),
        amount_cents: 10_000,
        amount_currency: "EUR".to_string(),
        merchant_id: Some("M1".to_string()),
        point_of_sale_id: Some("POS1".to_string()),
        pos_type: Some(PosType::Physical),
        user_id: Some("U1".to_string()),
        status: TransactionStatus::Rewarded,
        rewards: rewards(accrued),
        rejection_reasons: Vec::new(),
        reward_batch_id: None,
        reward_batch_trx_status: None,
        reward_batch_rejection_reason: None,
        update_date: Utc::now(),
    }
}

/// Batch-eligible outcome of merchant `M1`
pub fn outcome(id_trx_acquirer: &str, accrued: i64) -> TransactionOutcome {
    TransactionOutcome {
        id_trx_acquirer: id_trx_acquirer.to_string(),
        acquirer_code: "ACQ".to_string(),
        acquirer_id: "ACQ_ID".to_string(),
        id_trx_issuer: None,
        operation_type: "00".to_string(),
        trx_date: DateTime::parse_from_rfc3339("2025-01-15T10:00:00+01:00").unwrap(),
        amount_cents: 10_000,
        amount_currency: "EUR".to_string(),
        merchant_id: Some("M1".to_string()),
        point_of_sale_id: Some("POS1".to_string()),
        pos_type: Some(PosType::Physical),
        user_id: Some("U1".to_string()),
        status: TransactionStatus::Rewarded,
        rewards: rewards(accrued),
        rejection_reasons: Vec::new(),
    }
}
