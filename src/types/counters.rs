//! Aggregate counters embedded in a reward batch
//!
//! Counters are only ever moved by signed deltas applied atomically by the
//! store. `CounterDelta` is the unit of that adjustment; it is produced by the
//! reconciler and by ingestion, summed in memory, and written once.

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Aggregate counters of a reward batch
///
/// `trx_elaborated + trx_suspended + trx_rejected` tracks the transactions of
/// the batch whose batch status has left `TO_CHECK`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCounters {
    /// Reward amount currently approved, in euro cents
    pub total_approved_amount_cents: i64,

    /// Reward amount accrued at ingestion, in euro cents
    pub initial_amount_cents: i64,

    /// Transactions linked to the batch
    pub number_of_transactions: i64,

    /// Transactions elaborated by the initiative operator
    pub trx_elaborated: i64,

    /// Transactions currently suspended
    pub trx_suspended: i64,

    /// Transactions currently rejected
    pub trx_rejected: i64,
}

impl BatchCounters {
    /// Apply a signed delta to every counter
    pub fn apply(&mut self, delta: &CounterDelta) {
        self.total_approved_amount_cents += delta.amount_cents;
        self.initial_amount_cents += delta.initial_amount_cents;
        self.number_of_transactions += delta.transactions;
        self.trx_elaborated += delta.elaborated;
        self.trx_suspended += delta.suspended;
        self.trx_rejected += delta.rejected;
    }

    /// Transactions accounted as evaluated (elaborated, suspended or rejected)
    pub fn evaluated(&self) -> i64 {
        self.trx_elaborated + self.trx_suspended + self.trx_rejected
    }
}

/// Signed adjustment of batch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterDelta {
    pub amount_cents: i64,
    pub initial_amount_cents: i64,
    pub transactions: i64,
    pub elaborated: i64,
    pub suspended: i64,
    pub rejected: i64,
}

impl CounterDelta {
    /// The delta that changes nothing
    pub const ZERO: CounterDelta = CounterDelta {
        amount_cents: 0,
        initial_amount_cents: 0,
        transactions: 0,
        elaborated: 0,
        suspended: 0,
        rejected: 0,
    };

    /// Delta recorded when a transaction joins a batch with an accrued reward
    pub fn linked(accrued_cents: i64) -> Self {
        CounterDelta {
            amount_cents: accrued_cents,
            initial_amount_cents: accrued_cents,
            transactions: 1,
            ..Self::ZERO
        }
    }

    /// Whether applying this delta would be a no-op
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Same delta with every component negated
    pub fn negate(self) -> Self {
        CounterDelta {
            amount_cents: -self.amount_cents,
            initial_amount_cents: -self.initial_amount_cents,
            transactions: -self.transactions,
            elaborated: -self.elaborated,
            suspended: -self.suspended,
            rejected: -self.rejected,
        }
    }
}

impl Add for CounterDelta {
    type Output = CounterDelta;

    fn add(self, rhs: CounterDelta) -> CounterDelta {
        CounterDelta {
            amount_cents: self.amount_cents + rhs.amount_cents,
            initial_amount_cents: self.initial_amount_cents + rhs.initial_amount_cents,
            transactions: self.transactions + rhs.transactions,
            elaborated: self.elaborated + rhs.elaborated,
            suspended: self.suspended + rhs.suspended,
            rejected: self.rejected + rhs.rejected,
        }
    }
}

impl AddAssign for CounterDelta {
    fn add_assign(&mut self, rhs: CounterDelta) {
        *self = *self + rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_moves_every_counter() {
        let mut counters = BatchCounters {
            total_approved_amount_cents: 1000,
            number_of_transactions: 4,
            ..Default::default()
        };

        counters.apply(&CounterDelta {
            amount_cents: -300,
            suspended: 2,
            ..CounterDelta::ZERO
        });

        assert_eq!(counters.total_approved_amount_cents, 700);
        assert_eq!(counters.trx_suspended, 2);
        assert_eq!(counters.number_of_transactions, 4);
        assert_eq!(counters.evaluated(), 2);
    }

    #[test]
    fn test_sum_and_negate() {
        let mut total = CounterDelta::ZERO;
        total += CounterDelta::linked(250);
        total += CounterDelta {
            elaborated: 1,
            ..CounterDelta::ZERO
        };

        assert_eq!(total.amount_cents, 250);
        assert_eq!(total.transactions, 1);
        assert_eq!(total.elaborated, 1);
        assert!((total + total.negate()).is_zero());
    }
}
