//! Batch-transaction status reconciliation
//!
//! Translates a change of a transaction's batch status into the counter
//! delta its batch must receive. The table is total over every
//! `(previous, next)` pair: a pair without a defined effect is an error,
//! never a silent zero.
//!
//! | previous \ next   | effect                                          |
//! |-------------------|-------------------------------------------------|
//! | same status       | none                                            |
//! | pending -> pending| none (TO_CHECK and CONSULTABLE swap freely)     |
//! | pending -> APPROVED | elaborated +1                                 |
//! | pending -> SUSPENDED | suspended +1, amount -accrued                |
//! | pending -> REJECTED | rejected +1, amount -accrued                  |
//! | SUSPENDED -> APPROVED | suspended -1, amount +accrued               |
//! | SUSPENDED -> REJECTED | suspended -1, rejected +1                   |
//! | SUSPENDED -> TO_CHECK | suspended -1, amount +accrued               |
//! | REJECTED -> APPROVED | rejected -1, amount +accrued                 |
//! | REJECTED -> SUSPENDED | rejected -1, suspended +1                   |
//! | anything else     | illegal                                         |

use crate::types::{BatchError, CounterDelta, RewardBatchTrxStatus};

use crate::types::RewardBatchTrxStatus::{Approved, Consultable, Rejected, Suspended, ToCheck};

/// Per-transaction effect of a status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Effect {
    elaborated: i64,
    suspended: i64,
    rejected: i64,
    /// Sign applied to the accrued amount
    amount_sign: i64,
}

const NONE: Effect = Effect {
    elaborated: 0,
    suspended: 0,
    rejected: 0,
    amount_sign: 0,
};

fn effect(from: RewardBatchTrxStatus, to: RewardBatchTrxStatus) -> Option<Effect> {
    if from == to {
        return Some(NONE);
    }
    let effect = match (from, to) {
        (ToCheck | Consultable, ToCheck | Consultable) => NONE,
        (ToCheck | Consultable, Approved) => Effect {
            elaborated: 1,
            ..NONE
        },
        (ToCheck | Consultable, Suspended) => Effect {
            suspended: 1,
            amount_sign: -1,
            ..NONE
        },
        (ToCheck | Consultable, Rejected) => Effect {
            rejected: 1,
            amount_sign: -1,
            ..NONE
        },
        (Suspended, Approved) | (Suspended, ToCheck) => Effect {
            suspended: -1,
            amount_sign: 1,
            ..NONE
        },
        (Suspended, Rejected) => Effect {
            suspended: -1,
            rejected: 1,
            ..NONE
        },
        (Rejected, Approved) => Effect {
            rejected: -1,
            amount_sign: 1,
            ..NONE
        },
        (Rejected, Suspended) => Effect {
            rejected: -1,
            suspended: 1,
            ..NONE
        },
        _ => return None,
    };
    Some(effect)
}

/// Whether `from -> to` has a defined effect
pub fn is_defined(from: RewardBatchTrxStatus, to: RewardBatchTrxStatus) -> bool {
    effect(from, to).is_some()
}

/// Counter delta for one transaction moving `from -> to`
///
/// # Errors
///
/// `BatchError::IllegalTransition` when the pair has no defined effect.
pub fn delta(
    trx_id: &str,
    from: RewardBatchTrxStatus,
    to: RewardBatchTrxStatus,
    accrued_cents: i64,
) -> Result<CounterDelta, BatchError> {
    bulk_delta(trx_id, from, to, 1, accrued_cents)
}

/// Counter delta for `count` transactions all moving `from -> to`, whose
/// accrued rewards sum to `accrued_sum`
pub fn bulk_delta(
    trx_id: &str,
    from: RewardBatchTrxStatus,
    to: RewardBatchTrxStatus,
    count: u64,
    accrued_sum: i64,
) -> Result<CounterDelta, BatchError> {
    let effect = effect(from, to).ok_or_else(|| BatchError::illegal_transition(trx_id, from, to))?;
    let count = count as i64;

    Ok(CounterDelta {
        amount_cents: effect.amount_sign * accrued_sum,
        elaborated: effect.elaborated * count,
        suspended: effect.suspended * count,
        rejected: effect.rejected * count,
        ..CounterDelta::ZERO
    })
}
