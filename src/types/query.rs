//! Query, sort and pagination types shared by the store and query services

use std::str::FromStr;

use serde::Serialize;

use super::batch::{BatchMonth, BatchStatus, PosType};
use super::fields;
use super::transaction::{RewardBatchTrxStatus, TransactionStatus};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Sortable batch fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSortField {
    Month,
    Name,
    Status,
    TotalApprovedAmount,
    CreationDate,
}

impl FromStr for BatchSortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            fields::MONTH => Ok(BatchSortField::Month),
            fields::NAME => Ok(BatchSortField::Name),
            fields::STATUS => Ok(BatchSortField::Status),
            fields::TOTAL_APPROVED_AMOUNT_CENTS => Ok(BatchSortField::TotalApprovedAmount),
            fields::CREATION_DATE => Ok(BatchSortField::CreationDate),
            other => Err(format!("unsupported batch sort field '{}'", other)),
        }
    }
}

/// Sortable transaction fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionSortField {
    TrxDate,
    Amount,
    /// Business status, ordered by rank rather than by name
    Status,
    UpdateDate,
}

impl FromStr for TransactionSortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            fields::TRX_DATE => Ok(TransactionSortField::TrxDate),
            fields::AMOUNT_CENTS => Ok(TransactionSortField::Amount),
            fields::STATUS => Ok(TransactionSortField::Status),
            fields::UPDATE_DATE => Ok(TransactionSortField::UpdateDate),
            other => Err(format!("unsupported transaction sort field '{}'", other)),
        }
    }
}

/// One sort criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort<F> {
    pub field: F,
    pub direction: Direction,
}

impl<F> Sort<F> {
    pub fn asc(field: F) -> Self {
        Sort {
            field,
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: F) -> Self {
        Sort {
            field,
            direction: Direction::Desc,
        }
    }
}

/// Zero-based page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest<F> {
    pub page: usize,
    pub size: usize,
    pub sort: Option<Sort<F>>,
}

impl<F> PageRequest<F> {
    pub fn of(page: usize, size: usize) -> Self {
        PageRequest {
            page,
            size,
            sort: None,
        }
    }

    pub fn sorted(mut self, sort: Sort<F>) -> Self {
        self.sort = Some(sort);
        self
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page_no: usize,
    pub page_size: usize,
    pub total_elements: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    /// Slice an already sorted result set
    pub fn from_sorted(items: Vec<T>, page: usize, size: usize) -> Self {
        let total_elements = items.len();
        let total_pages = if size == 0 {
            0
        } else {
            total_elements.div_ceil(size)
        };
        let content = items
            .into_iter()
            .skip(page.saturating_mul(size))
            .take(size)
            .collect();

        Page {
            content,
            page_no: page,
            page_size: size,
            total_elements,
            total_pages,
        }
    }

    pub fn empty(page: usize, size: usize) -> Self {
        Page::from_sorted(Vec::new(), page, size)
    }

    /// Transform the page content keeping the paging metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page_no: self.page_no,
            page_size: self.page_size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
        }
    }
}

/// Batch listing filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchFilter {
    pub merchant_id: Option<String>,
    pub month: Option<BatchMonth>,
    pub pos_type: Option<PosType>,
    pub status: Option<BatchStatus>,
}

/// Transaction listing filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub merchant_id: Option<String>,
    pub initiative_id: Option<String>,
    pub user_id: Option<String>,
    pub reward_batch_id: Option<String>,
    pub status: Option<TransactionStatus>,
    pub reward_batch_trx_status: Option<RewardBatchTrxStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::first_page(0, 2, vec![1, 2], 3)]
    #[case::last_page(2, 2, vec![5], 3)]
    #[case::past_end(5, 2, vec![], 3)]
    fn test_page_slicing(
        #[case] page: usize,
        #[case] size: usize,
        #[case] expected: Vec<i32>,
        #[case] total_pages: usize,
    ) {
        let result = Page::from_sorted(vec![1, 2, 3, 4, 5], page, size);
        assert_eq!(result.content, expected);
        assert_eq!(result.total_elements, 5);
        assert_eq!(result.total_pages, total_pages);
    }

    #[test]
    fn test_sort_fields_parse_from_field_names() {
        assert_eq!("month".parse::<BatchSortField>(), Ok(BatchSortField::Month));
        assert_eq!(
            "status".parse::<TransactionSortField>(),
            Ok(TransactionSortField::Status)
        );
        assert!("amount".parse::<BatchSortField>().is_err());
    }
}
