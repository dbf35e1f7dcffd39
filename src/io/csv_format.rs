//! Batch report in CSV format
//!
//! Amounts are stored in euro cents and rendered in euro with two decimals.
//! Rows are sorted by merchant, month, point-of-sale type and batch kind so
//! that the output is deterministic regardless of store iteration order.

use std::io::Write;

use csv::Writer;
use rust_decimal::Decimal;

use crate::types::RewardBatch;

const HEADER: [&str; 12] = [
    "merchant_id",
    "month",
    "pos_type",
    "batch_kind",
    "status",
    "name",
    "total_approved_amount",
    "initial_amount",
    "number_of_transactions",
    "trx_elaborated",
    "trx_suspended",
    "trx_rejected",
];

/// Render a cent amount in euro, e.g. `1050` as `10.50`
pub fn format_cents(cents: i64) -> String {
    format!("{:.2}", Decimal::new(cents, 2))
}

/// Write reward batches to CSV
///
/// # Arguments
///
/// * `batches` - Batches to report, in any order
/// * `output` - Destination of the CSV text
///
/// # Returns
///
/// * `Ok(())` if writing succeeded
/// * `Err(String)` if a write error occurred
pub fn write_batches_csv(batches: &[RewardBatch], output: &mut dyn Write) -> Result<(), String> {
    let mut writer = Writer::from_writer(output);

    writer
        .write_record(HEADER)
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted: Vec<&RewardBatch> = batches.iter().collect();
    sorted.sort_by(|a, b| {
        (&a.merchant_id, a.month, a.pos_type, a.batch_kind).cmp(&(
            &b.merchant_id,
            b.month,
            b.pos_type,
            b.batch_kind,
        ))
    });

    for batch in sorted {
        let counters = &batch.counters;
        writer
            .write_record(&[
                batch.merchant_id.clone(),
                batch.month.to_string(),
                batch.pos_type.to_string(),
                batch.batch_kind.to_string(),
                batch.status.to_string(),
                batch.name.clone(),
                format_cents(counters.total_approved_amount_cents),
                format_cents(counters.initial_amount_cents),
                counters.number_of_transactions.to_string(),
                counters.trx_elaborated.to_string(),
                counters.trx_suspended.to_string(),
                counters.trx_rejected.to_string(),
            ])
            .map_err(|e| format!("Failed to write batch record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BatchCounters, BatchKey, BatchKind, BatchMonth, BatchStatus, PosType};
    use chrono::Utc;
    use rstest::rstest;

    const HEADER_LINE: &str = "merchant_id,month,pos_type,batch_kind,status,name,total_approved_amount,initial_amount,number_of_transactions,trx_elaborated,trx_suspended,trx_rejected\n";

    fn batch(merchant: &str, month: &str, pos_type: PosType, kind: BatchKind) -> RewardBatch {
        let key = BatchKey::new(merchant, pos_type, BatchMonth::parse(month).unwrap(), kind);
        RewardBatch::new(&key, Utc::now())
    }

    fn render(batches: &[RewardBatch]) -> String {
        let mut output = Vec::new();
        write_batches_csv(batches, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[rstest]
    #[case::zero(0, "0.00")]
    #[case::cents_only(5, "0.05")]
    #[case::whole(1000, "10.00")]
    #[case::mixed(12345, "123.45")]
    #[case::negative(-250, "-2.50")]
    fn test_format_cents(#[case] cents: i64, #[case] expected: &str) {
        assert_eq!(format_cents(cents), expected);
    }

    #[test]
    fn test_empty_report_has_header_only() {
        assert_eq!(render(&[]), HEADER_LINE);
    }

    #[test]
    fn test_row_layout() {
        let mut b = batch("M1", "2025-01", PosType::Physical, BatchKind::Regular);
        b.status = BatchStatus::Sent;
        b.counters = BatchCounters {
            total_approved_amount_cents: 700,
            initial_amount_cents: 1000,
            number_of_transactions: 4,
            trx_elaborated: 1,
            trx_suspended: 2,
            trx_rejected: 0,
        };

        let expected = format!(
            "{}M1,2025-01,PHYSICAL,REGULAR,SENT,gennaio 2025 - Fisico,7.00,10.00,4,1,2,0\n",
            HEADER_LINE
        );
        assert_eq!(render(&[b]), expected);
    }

    #[test]
    fn test_rows_are_sorted() {
        let batches = vec![
            batch("M2", "2025-01", PosType::Physical, BatchKind::Regular),
            batch("M1", "2025-02", PosType::Physical, BatchKind::Regular),
            batch("M1", "2025-01", PosType::Online, BatchKind::Regular),
            batch("M1", "2025-01", PosType::Physical, BatchKind::Rejected),
            batch("M1", "2025-01", PosType::Physical, BatchKind::Regular),
        ];

        let rendered = render(&batches);
        let keys: Vec<String> = rendered
            .lines()
            .skip(1)
            .map(|line| line.split(',').take(4).collect::<Vec<_>>().join(","))
            .collect();

        assert_eq!(
            keys,
            vec![
                "M1,2025-01,PHYSICAL,REGULAR",
                "M1,2025-01,PHYSICAL,REJECTED",
                "M1,2025-01,ONLINE,REGULAR",
                "M1,2025-02,PHYSICAL,REGULAR",
                "M2,2025-01,PHYSICAL,REGULAR",
            ]
        );
    }
}
