//! Sorting of query results
//!
//! Batches default to month ascending. Transactions sorted by business
//! status follow the status rank (`CANCELLED < REWARDED < REFUNDED < others`)
//! instead of the lexical order of the status names. Ties are broken by id so
//! pages are stable across calls.

use std::cmp::Ordering;

use crate::types::{
    BatchSortField, Direction, RewardBatch, RewardTransaction, Sort, TransactionSortField,
};

fn directed(ordering: Ordering, direction: Direction) -> Ordering {
    match direction {
        Direction::Asc => ordering,
        Direction::Desc => ordering.reverse(),
    }
}

/// Sort batches in place, month ascending when no sort is requested
pub fn sort_batches(batches: &mut [RewardBatch], sort: Option<Sort<BatchSortField>>) {
    let sort = sort.unwrap_or(Sort::asc(BatchSortField::Month));

    batches.sort_by(|a, b| {
        let ordering = match sort.field {
            BatchSortField::Month => a.month.cmp(&b.month),
            BatchSortField::Name => a.name.cmp(&b.name),
            BatchSortField::Status => a.status.cmp(&b.status),
            BatchSortField::TotalApprovedAmount => a
                .counters
                .total_approved_amount_cents
                .cmp(&b.counters.total_approved_amount_cents),
            BatchSortField::CreationDate => a.creation_date.cmp(&b.creation_date),
        };
        directed(ordering, sort.direction).then_with(|| a.id.cmp(&b.id))
    });
}

/// Sort transactions in place, most recent first when no sort is requested
pub fn sort_transactions(
    transactions: &mut [RewardTransaction],
    sort: Option<Sort<TransactionSortField>>,
) {
    let sort = sort.unwrap_or(Sort::desc(TransactionSortField::TrxDate));

    transactions.sort_by(|a, b| {
        let ordering = match sort.field {
            TransactionSortField::TrxDate => a.trx_date.cmp(&b.trx_date),
            TransactionSortField::Amount => a.amount_cents.cmp(&b.amount_cents),
            TransactionSortField::Status => a.status.rank().cmp(&b.status.rank()),
            TransactionSortField::UpdateDate => a.update_date.cmp(&b.update_date),
        };
        directed(ordering, sort.direction).then_with(|| a.id.cmp(&b.id))
    });
}
