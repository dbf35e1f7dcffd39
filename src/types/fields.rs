//! Persisted field names
//!
//! Names used by sort expressions and reports. The serde representation of
//! `RewardBatch` and `RewardTransaction` must produce the same keys; the tests
//! in this module pin that.

pub const BATCH_ID: &str = "id";
pub const MERCHANT_ID: &str = "merchantId";
pub const MONTH: &str = "month";
pub const POS_TYPE: &str = "posType";
pub const BATCH_KIND: &str = "batchKind";
pub const STATUS: &str = "status";
pub const PARTIAL: &str = "partial";
pub const NAME: &str = "name";
pub const TOTAL_APPROVED_AMOUNT_CENTS: &str = "totalApprovedAmountCents";
pub const INITIAL_AMOUNT_CENTS: &str = "initialAmountCents";
pub const NUMBER_OF_TRANSACTIONS: &str = "numberOfTransactions";
pub const TRX_ELABORATED: &str = "trxElaborated";
pub const TRX_SUSPENDED: &str = "trxSuspended";
pub const TRX_REJECTED: &str = "trxRejected";
pub const CREATION_DATE: &str = "creationDate";
pub const UPDATE_DATE: &str = "updateDate";

pub const TRX_DATE: &str = "trxDate";
pub const AMOUNT_CENTS: &str = "amountCents";
pub const REWARD_BATCH_ID: &str = "rewardBatchId";
pub const REWARD_BATCH_TRX_STATUS: &str = "rewardBatchTrxStatus";
pub const REWARD_BATCH_REJECTION_REASON: &str = "rewardBatchRejectionReason";
