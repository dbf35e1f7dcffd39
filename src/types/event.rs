//! Inbound event payloads
//!
//! Shapes of the records carried by the transaction-outcome and commands
//! streams, and their mapping onto persisted types.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use super::batch::PosType;
use super::transaction::{
    derive_transaction_id, InitiativeId, Reward, RewardTransaction, TransactionStatus,
};

/// Command operation purging an initiative's transactions
pub const DELETE_INITIATIVE: &str = "DELETE_INITIATIVE";

/// Transaction outcome published by the upstream reward calculator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutcome {
    pub id_trx_acquirer: String,
    pub acquirer_code: String,
    pub acquirer_id: String,
    #[serde(default)]
    pub id_trx_issuer: Option<String>,
    pub operation_type: String,
    pub trx_date: DateTime<FixedOffset>,
    pub amount_cents: i64,
    #[serde(default = "default_currency")]
    pub amount_currency: String,
    #[serde(default)]
    pub merchant_id: Option<String>,
    #[serde(default)]
    pub point_of_sale_id: Option<String>,
    #[serde(default)]
    pub pos_type: Option<PosType>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub status: TransactionStatus,
    #[serde(default)]
    pub rewards: BTreeMap<InitiativeId, Reward>,
    #[serde(default)]
    pub rejection_reasons: Vec<String>,
}

fn default_currency() -> String {
    "EUR".to_string()
}

impl TransactionOutcome {
    /// Idempotency key of this event
    pub fn transaction_id(&self) -> String {
        derive_transaction_id(
            &self.id_trx_acquirer,
            &self.acquirer_code,
            &self.trx_date,
            &self.operation_type,
            &self.acquirer_id,
        )
    }

    /// Map the event onto an unlinked reward transaction
    pub fn into_transaction(self, now: DateTime<Utc>) -> RewardTransaction {
        RewardTransaction {
            id: self.transaction_id(),
            id_trx_acquirer: self.id_trx_acquirer,
            acquirer_code: self.acquirer_code,
            acquirer_id: self.acquirer_id,
            id_trx_issuer: self.id_trx_issuer,
            operation_type: self.operation_type,
            trx_date: self.trx_date,
            amount_cents: self.amount_cents,
            amount_currency: self.amount_currency,
            merchant_id: self.merchant_id,
            point_of_sale_id: self.point_of_sale_id,
            pos_type: self.pos_type,
            user_id: self.user_id,
            status: self.status,
            rewards: self.rewards,
            rejection_reasons: self.rejection_reasons,
            reward_batch_id: None,
            reward_batch_trx_status: None,
            reward_batch_rejection_reason: None,
            update_date: now,
        }
    }
}

/// Envelope carried by the commands stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    pub operation_type: String,
    pub entity_id: String,
    pub operation_time: DateTime<Utc>,
}

/// Position of a record in its source stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordPosition {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// Failure description published to the error-notification channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorNotification {
    pub source_server: String,
    pub source_topic: String,
    pub source_partition: i32,
    pub source_offset: i64,
    pub description: String,
    pub retryable: bool,
    pub stacktrace: String,
    pub root_cause_class: String,
    pub root_cause_message: String,
    pub cause_class: String,
    pub cause_message: String,
    /// Raw record payload, kept so the record can be replayed
    pub payload: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_deserializes_with_defaults() {
        let json = r#"{
            "idTrxAcquirer": "TRX1",
            "acquirerCode": "ACQ",
            "acquirerId": "ACQ_ID",
            "operationType": "00",
            "trxDate": "2025-01-15T10:30:00+01:00",
            "amountCents": 1000,
            "status": "REWARDED"
        }"#;

        let outcome: TransactionOutcome = serde_json::from_str(json).unwrap();

        assert_eq!(outcome.amount_currency, "EUR");
        assert!(outcome.rewards.is_empty());
        assert!(outcome.merchant_id.is_none());
        assert_eq!(outcome.transaction_id(), "TRX1ACQ2025011510300000ACQ_ID");
    }

    #[test]
    fn test_into_transaction_is_unlinked() {
        let json = r#"{
            "idTrxAcquirer": "TRX1",
            "acquirerCode": "ACQ",
            "acquirerId": "ACQ_ID",
            "operationType": "00",
            "trxDate": "2025-01-15T10:30:00+01:00",
            "amountCents": 1000,
            "merchantId": "M1",
            "posType": "PHYSICAL",
            "status": "REWARDED",
            "rewards": {"I1": {"providedRewardCents": 300, "accruedRewardCents": 250}}
        }"#;

        let outcome: TransactionOutcome = serde_json::from_str(json).unwrap();
        let trx = outcome.into_transaction(Utc::now());

        assert_eq!(trx.accrued_for("I1"), 250);
        assert_eq!(trx.accrued_for("I2"), 0);
        assert!(trx.reward_batch_id.is_none());
        assert!(trx.reward_batch_trx_status.is_none());
    }

    #[test]
    fn test_command_envelope() {
        let json = r#"{"operationType":"DELETE_INITIATIVE","entityId":"I1","operationTime":"2025-02-01T00:00:00Z"}"#;
        let command: CommandEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(command.operation_type, DELETE_INITIATIVE);
        assert_eq!(command.entity_id, "I1");
    }
}
