//! Error types for the reward batch engine
//!
//! This module defines the errors raised by the storage adapter and by the
//! batch lifecycle, reconciliation and ingestion layers built on top of it.
//!
//! # Error Categories
//!
//! - **Business errors**: batch missing, wrong merchant, wrong status for the
//!   requested transition. Never retried.
//! - **Storage errors**: duplicate keys, rate limiting, unavailable backend.
//! - **Retry exhaustion**: the bounded rate-limit retry ran out of budget.
//! - **Ingestion errors**: malformed inbound records, notifier and commit failures.
//! - **Integrity errors**: illegal batch-transaction status transitions.

use thiserror::Error;

use super::transaction::RewardBatchTrxStatus;

/// Errors raised by a repository implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected an insert
    #[error("Duplicate key on {collection}: {key}")]
    DuplicateKey {
        /// Collection the insert targeted
        collection: String,
        /// Rendered unique key
        key: String,
    },

    /// The store signalled overload; the call may succeed if retried later
    #[error("Request rate too large on {operation}")]
    RateLimited {
        /// Storage operation that was throttled
        operation: String,
    },

    /// The store could not be reached or failed unexpectedly
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Backend-provided description
        message: String,
    },
}

impl StoreError {
    /// Create a DuplicateKey error
    pub fn duplicate_key(collection: &str, key: impl Into<String>) -> Self {
        StoreError::DuplicateKey {
            collection: collection.to_string(),
            key: key.into(),
        }
    }

    /// Create a RateLimited error
    pub fn rate_limited(operation: &str) -> Self {
        StoreError::RateLimited {
            operation: operation.to_string(),
        }
    }

    /// Whether this error signals storage overload
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, StoreError::RateLimited { .. })
    }
}

/// Main error type for batch lifecycle, reconciliation and ingestion
///
/// Each variant carries enough context to be logged or turned into an
/// error notification without access to the failing call site.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// The requested entity does not exist
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind ("Reward batch", "Transaction")
        entity: String,
        /// Identifier that was looked up
        id: String,
    },

    /// The caller does not own the batch
    #[error("Merchant {merchant_id} is not allowed to operate on reward batch {batch_id}")]
    Forbidden {
        /// Merchant performing the request
        merchant_id: String,
        /// Batch the merchant tried to operate on
        batch_id: String,
    },

    /// The batch is not in a status that allows the operation
    #[error("Reward batch {batch_id} is {status}, cannot {operation}")]
    InvalidState {
        /// Batch identifier
        batch_id: String,
        /// Current status of the batch
        status: String,
        /// Rejected operation
        operation: String,
    },

    /// The request itself is not acceptable
    #[error("Bad request: {message}")]
    BadRequest {
        /// Description of the problem
        message: String,
    },

    /// A batch-transaction status transition has no defined counter delta
    #[error("Illegal transition {from} -> {to} for transaction {trx_id}")]
    IllegalTransition {
        /// Transaction identifier
        trx_id: String,
        /// Status the transaction held
        from: RewardBatchTrxStatus,
        /// Requested status
        to: RewardBatchTrxStatus,
    },

    /// The rate-limit retry budget was exhausted
    #[error("Retry expired after {max_retry} retries in {elapsed_millis}ms (max elapsed {max_elapsed_millis:?}ms)")]
    RetryExpired {
        /// Configured number of retries
        max_retry: u32,
        /// Configured elapsed-time budget, if any
        max_elapsed_millis: Option<u64>,
        /// Time spent before giving up
        elapsed_millis: u64,
    },

    /// An inbound record could not be deserialized
    #[error("Cannot deserialize record from {topic}: {message}")]
    Deserialization {
        /// Source topic of the record
        topic: String,
        /// Parser message
        message: String,
    },

    /// A storage call failed
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// The error notifier could not deliver a notification
    #[error("Error notification failed: {message}")]
    Notification {
        /// Description of the delivery failure
        message: String,
    },

    /// Acknowledged offsets could not be committed
    #[error("Offset commit failed: {message}")]
    Commit {
        /// Description of the commit failure
        message: String,
    },

    /// A collaborator (PII resolver, point-of-sale lookup) failed
    #[error("{service} call failed: {message}")]
    Collaborator {
        /// Collaborator name
        service: String,
        /// Description of the failure
        message: String,
    },
}

impl BatchError {
    /// Create a NotFound error for a reward batch
    pub fn batch_not_found(batch_id: &str) -> Self {
        BatchError::NotFound {
            entity: "Reward batch".to_string(),
            id: batch_id.to_string(),
        }
    }

    /// Create a NotFound error for a transaction
    pub fn transaction_not_found(trx_id: &str) -> Self {
        BatchError::NotFound {
            entity: "Transaction".to_string(),
            id: trx_id.to_string(),
        }
    }

    /// Create a Forbidden error
    pub fn forbidden(merchant_id: &str, batch_id: &str) -> Self {
        BatchError::Forbidden {
            merchant_id: merchant_id.to_string(),
            batch_id: batch_id.to_string(),
        }
    }

    /// Create an InvalidState error
    pub fn invalid_state(batch_id: &str, status: impl ToString, operation: &str) -> Self {
        BatchError::InvalidState {
            batch_id: batch_id.to_string(),
            status: status.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Create a BadRequest error
    pub fn bad_request(message: impl Into<String>) -> Self {
        BatchError::BadRequest {
            message: message.into(),
        }
    }

    /// Create an IllegalTransition error
    pub fn illegal_transition(
        trx_id: &str,
        from: RewardBatchTrxStatus,
        to: RewardBatchTrxStatus,
    ) -> Self {
        BatchError::IllegalTransition {
            trx_id: trx_id.to_string(),
            from,
            to,
        }
    }

    /// Create a Deserialization error
    pub fn deserialization(topic: &str, message: impl Into<String>) -> Self {
        BatchError::Deserialization {
            topic: topic.to_string(),
            message: message.into(),
        }
    }

    /// Create a Collaborator error
    pub fn collaborator(service: &str, message: impl Into<String>) -> Self {
        BatchError::Collaborator {
            service: service.to_string(),
            message: message.into(),
        }
    }

    /// Stable class name used in failure notifications
    pub fn kind(&self) -> &'static str {
        match self {
            BatchError::NotFound { .. } => "NotFound",
            BatchError::Forbidden { .. } => "Forbidden",
            BatchError::InvalidState { .. } => "InvalidState",
            BatchError::BadRequest { .. } => "BadRequest",
            BatchError::IllegalTransition { .. } => "IllegalTransition",
            BatchError::RetryExpired { .. } => "RetryExpired",
            BatchError::Deserialization { .. } => "Deserialization",
            BatchError::Store(StoreError::DuplicateKey { .. }) => "DuplicateKey",
            BatchError::Store(StoreError::RateLimited { .. }) => "RateLimited",
            BatchError::Store(StoreError::Unavailable { .. }) => "StoreUnavailable",
            BatchError::Notification { .. } => "Notification",
            BatchError::Commit { .. } => "Commit",
            BatchError::Collaborator { .. } => "Collaborator",
        }
    }

    /// Whether redelivering the work that raised this error could succeed
    ///
    /// Business errors and malformed records are final; everything that
    /// depends on infrastructure health is retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            BatchError::NotFound { .. }
                | BatchError::Forbidden { .. }
                | BatchError::InvalidState { .. }
                | BatchError::BadRequest { .. }
                | BatchError::IllegalTransition { .. }
                | BatchError::Deserialization { .. }
        )
    }

    /// HTTP status an API boundary should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            BatchError::NotFound { .. } => 404,
            BatchError::Forbidden { .. } => 403,
            BatchError::InvalidState { .. } | BatchError::BadRequest { .. } => 400,
            BatchError::IllegalTransition { .. } => 409,
            BatchError::RetryExpired { .. } | BatchError::Store(StoreError::RateLimited { .. }) => {
                429
            }
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::not_found(
        BatchError::batch_not_found("B1"),
        "Reward batch B1 not found"
    )]
    #[case::forbidden(
        BatchError::forbidden("M2", "B1"),
        "Merchant M2 is not allowed to operate on reward batch B1"
    )]
    #[case::invalid_state(
        BatchError::invalid_state("B1", "SENT", "send"),
        "Reward batch B1 is SENT, cannot send"
    )]
    #[case::illegal_transition(
        BatchError::illegal_transition(
            "T1",
            RewardBatchTrxStatus::Approved,
            RewardBatchTrxStatus::Suspended
        ),
        "Illegal transition APPROVED -> SUSPENDED for transaction T1"
    )]
    #[case::retry_expired(
        BatchError::RetryExpired {
            max_retry: 3,
            max_elapsed_millis: Some(500),
            elapsed_millis: 12
        },
        "Retry expired after 3 retries in 12ms (max elapsed Some(500)ms)"
    )]
    #[case::store(
        BatchError::Store(StoreError::rate_limited("increment_totals")),
        "Storage error: Request rate too large on increment_totals"
    )]
    fn test_error_display(#[case] error: BatchError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case::not_found(BatchError::batch_not_found("B1"), false, 404)]
    #[case::forbidden(BatchError::forbidden("M", "B"), false, 403)]
    #[case::invalid_state(BatchError::invalid_state("B", "APPROVED", "suspend"), false, 400)]
    #[case::deserialization(BatchError::deserialization("trx", "eof"), false, 500)]
    #[case::retry_expired(
        BatchError::RetryExpired { max_retry: 1, max_elapsed_millis: None, elapsed_millis: 1 },
        true,
        429
    )]
    #[case::unavailable(
        BatchError::Store(StoreError::Unavailable { message: "down".to_string() }),
        true,
        500
    )]
    fn test_classification(
        #[case] error: BatchError,
        #[case] retryable: bool,
        #[case] status: u16,
    ) {
        assert_eq!(error.is_retryable(), retryable);
        assert_eq!(error.status_code(), status);
    }

    #[test]
    fn test_store_error_conversion() {
        let error: BatchError = StoreError::duplicate_key("reward_batch", "M1|PHYSICAL").into();
        assert_eq!(error.kind(), "DuplicateKey");
        assert!(matches!(error, BatchError::Store(StoreError::DuplicateKey { .. })));
    }
}
