//! Benchmark suite for event ingestion
//!
//! Measures how fast transaction events are deserialized, persisted and
//! linked to their batches, with one and with several records in flight.
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench
//! ```
//!
//! Events are generated in memory: `merchants` merchants, spread over three
//! months and both point-of-sale types, so that batch creation races are
//! part of the measurement.

use std::time::Duration;

use reward_batch_engine::ingest::{DeleteConfig, InboundRecord, IngestConfig, TRANSACTIONS_TOPIC};
use reward_batch_engine::{RetryPolicy, RewardBatchEngine};

fn main() {
    divan::main();
}

fn events(count: usize, merchants: usize) -> Vec<InboundRecord> {
    (0..count)
        .map(|i| {
            let pos_type = if i % 2 == 0 { "PHYSICAL" } else { "ONLINE" };
            let payload = format!(
                r#"{{"idTrxAcquirer":"T{i}","acquirerCode":"ACQ","acquirerId":"A","operationType":"00","trxDate":"2025-0{month}-10T10:00:00+01:00","amountCents":1000,"merchantId":"M{merchant}","pointOfSaleId":"POS{merchant}","posType":"{pos_type}","status":"REWARDED","rewards":{{"I1":{{"providedRewardCents":100,"accruedRewardCents":100}}}}}}"#,
                i = i,
                month = i % 3 + 1,
                merchant = i % merchants,
                pos_type = pos_type,
            );
            InboundRecord::new(TRANSACTIONS_TOPIC, 0, i as i64, payload)
        })
        .collect()
}

fn ingest(records: Vec<InboundRecord>, max_concurrent: usize) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create runtime");

    runtime.block_on(async {
        let engine = RewardBatchEngine::new(
            IngestConfig::new(Duration::from_millis(100), max_concurrent),
            DeleteConfig::default(),
            RetryPolicy::none(),
        );
        engine
            .ingest_events(futures::stream::iter(records))
            .await
            .expect("Ingestion failed");
    });
}

/// 1,000 events over 10 merchants
#[divan::bench(args = [1, 4, 16])]
fn ingest_small(bencher: divan::Bencher, max_concurrent: usize) {
    bencher
        .with_inputs(|| events(1_000, 10))
        .bench_values(|records| ingest(records, max_concurrent));
}

/// 10,000 events over 100 merchants
#[divan::bench(args = [1, 4, 16])]
fn ingest_medium(bencher: divan::Bencher, max_concurrent: usize) {
    bencher
        .with_inputs(|| events(10_000, 100))
        .bench_values(|records| ingest(records, max_concurrent));
}
