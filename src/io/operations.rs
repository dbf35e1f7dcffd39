//! Batch operations script
//!
//! A JSON-lines file of merchant and operator actions replayed against the
//! batches after ingestion. Batches are addressed by their key rather than
//! their identifier; the identifier is derived from the key.
//!
//! ```text
//! {"op":"send","merchantId":"M1","batch":{"merchantId":"M1","posType":"PHYSICAL","month":"2025-01"}}
//! {"op":"suspend","initiativeId":"I1","batch":{...},"transactionIds":["T1"],"reason":"Check"}
//! {"op":"confirm","initiativeId":"I1","batch":{...}}
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::core::TransactionsRequest;
use crate::types::{BatchId, BatchKey, BatchKind, BatchMonth, PosType, TransactionId};

use super::event_reader::JsonLinesReader;

/// Key of the batch an operation targets
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRef {
    pub merchant_id: String,
    pub pos_type: PosType,
    pub month: BatchMonth,
    #[serde(default = "regular")]
    pub batch_kind: BatchKind,
}

fn regular() -> BatchKind {
    BatchKind::Regular
}

impl BatchRef {
    pub fn key(&self) -> BatchKey {
        BatchKey::new(&self.merchant_id, self.pos_type, self.month, self.batch_kind)
    }

    pub fn batch_id(&self) -> BatchId {
        self.key().batch_id()
    }
}

/// One scripted batch operation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Operation {
    Send {
        merchant_id: String,
        batch: BatchRef,
    },
    Suspend {
        initiative_id: String,
        batch: BatchRef,
        transaction_ids: Vec<TransactionId>,
        #[serde(default)]
        reason: Option<String>,
    },
    Reject {
        initiative_id: String,
        batch: BatchRef,
        transaction_ids: Vec<TransactionId>,
        #[serde(default)]
        reason: Option<String>,
    },
    Approve {
        merchant_id: String,
        initiative_id: String,
        batch: BatchRef,
        transaction_ids: Vec<TransactionId>,
    },
    Confirm {
        initiative_id: String,
        batch: BatchRef,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Send { .. } => "send",
            Operation::Suspend { .. } => "suspend",
            Operation::Reject { .. } => "reject",
            Operation::Approve { .. } => "approve",
            Operation::Confirm { .. } => "confirm",
        }
    }

    pub fn batch(&self) -> &BatchRef {
        match self {
            Operation::Send { batch, .. }
            | Operation::Suspend { batch, .. }
            | Operation::Reject { batch, .. }
            | Operation::Approve { batch, .. }
            | Operation::Confirm { batch, .. } => batch,
        }
    }
}

/// Build the bulk request carried by an operation's id list and reason
pub fn request(transaction_ids: &[TransactionId], reason: Option<&str>) -> TransactionsRequest {
    let request = TransactionsRequest::new(transaction_ids.iter().cloned());
    match reason {
        Some(reason) => request.with_reason(reason),
        None => request,
    }
}

/// Read every operation of a script, in file order
///
/// Lines that do not parse are logged and skipped.
pub async fn read_operations(path: &Path) -> Result<Vec<Operation>, String> {
    let mut reader = JsonLinesReader::open(path, "operations").await?;
    let mut operations = Vec::new();

    while let Some(record) = reader.next_record().await? {
        match serde_json::from_str::<Operation>(&record.payload) {
            Ok(operation) => operations.push(operation),
            Err(e) => warn!(line = record.offset + 1, error = %e, "Invalid operation skipped"),
        }
    }

    Ok(operations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BATCH: &str = r#"{"merchantId":"M1","posType":"PHYSICAL","month":"2025-01"}"#;

    #[test]
    fn test_parse_suspend() {
        let json = format!(
            r#"{{"op":"suspend","initiativeId":"I1","batch":{},"transactionIds":["T1","T2"],"reason":"Check"}}"#,
            BATCH
        );

        let operation: Operation = serde_json::from_str(&json).unwrap();

        match &operation {
            Operation::Suspend {
                initiative_id,
                transaction_ids,
                reason,
                ..
            } => {
                assert_eq!(initiative_id, "I1");
                assert_eq!(transaction_ids, &vec!["T1".to_string(), "T2".to_string()]);
                assert_eq!(reason.as_deref(), Some("Check"));
            }
            other => panic!("unexpected operation {:?}", other),
        }
        assert_eq!(operation.batch().batch_kind, BatchKind::Regular);
    }

    #[test]
    fn test_batch_ref_derives_batch_id() {
        let batch: BatchRef = serde_json::from_str(BATCH).unwrap();
        let key = BatchKey::new(
            "M1",
            PosType::Physical,
            BatchMonth::parse("2025-01").unwrap(),
            BatchKind::Regular,
        );

        assert_eq!(batch.batch_id(), key.batch_id());
    }

    #[test]
    fn test_request_carries_reason() {
        let ids = vec!["T1".to_string()];
        assert_eq!(request(&ids, None).reason, None);
        assert_eq!(request(&ids, Some("Check")).reason.as_deref(), Some("Check"));
    }

    #[tokio::test]
    async fn test_read_operations_skips_invalid_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"op":"confirm","initiativeId":"I1","batch":{}}}"#, BATCH).unwrap();
        writeln!(file, r#"{{"op":"explode"}}"#).unwrap();
        writeln!(file, r#"{{"op":"send","merchantId":"M1","batch":{}}}"#, BATCH).unwrap();

        let operations = read_operations(file.path()).await.unwrap();

        let names: Vec<&str> = operations.iter().map(Operation::name).collect();
        assert_eq!(names, vec!["confirm", "send"]);
    }
}
