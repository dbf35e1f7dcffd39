use crate::core::RetryPolicy;
use crate::ingest::{DeleteConfig, IngestConfig};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Ingest reward transaction events and report the resulting reward batches
#[derive(Parser, Debug)]
#[command(name = "reward-batch-engine")]
#[command(about = "Ingest reward transaction events and report reward batches", long_about = None)]
pub struct CliArgs {
    /// Transaction outcome events, one JSON document per line
    #[arg(value_name = "EVENTS", help = "Path to the transaction events file (JSON lines)")]
    pub events_file: PathBuf,

    /// Commands stream, one JSON envelope per line
    #[arg(
        long = "commands",
        value_name = "FILE",
        help = "Path to a commands file (JSON lines), ingested after the events"
    )]
    pub commands_file: Option<PathBuf>,

    /// Batch operations replayed once ingestion completes
    #[arg(
        long = "operations",
        value_name = "FILE",
        help = "Path to a batch operations script (JSON lines)"
    )]
    pub operations_file: Option<PathBuf>,

    #[arg(
        long = "commit-delay-ms",
        value_name = "MILLIS",
        env = "REWARD_BATCH_COMMIT_DELAY_MS",
        help = "Offset commit window in milliseconds (default: 1000)"
    )]
    pub commit_delay_ms: Option<u64>,

    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        env = "REWARD_BATCH_MAX_CONCURRENT",
        help = "Records processed concurrently (default: CPU cores)"
    )]
    pub max_concurrent: Option<usize>,

    #[arg(
        long = "delete-page-size",
        value_name = "SIZE",
        env = "REWARD_BATCH_DELETE_PAGE_SIZE",
        help = "Transactions deleted per page by DELETE_INITIATIVE (default: 100)"
    )]
    pub delete_page_size: Option<usize>,

    #[arg(
        long = "delete-delay-ms",
        value_name = "MILLIS",
        env = "REWARD_BATCH_DELETE_DELAY_MS",
        help = "Pause between deleted pages in milliseconds (default: 0)"
    )]
    pub delete_delay_ms: Option<u64>,

    #[arg(
        long = "retry-max",
        value_name = "COUNT",
        env = "REWARD_BATCH_RETRY_MAX",
        help = "Retries of a rate-limited storage call (default: 3)"
    )]
    pub retry_max: Option<u32>,

    #[arg(
        long = "retry-delay-ms",
        value_name = "MILLIS",
        env = "REWARD_BATCH_RETRY_DELAY_MS",
        help = "Delay between storage retries in milliseconds (default: 100)"
    )]
    pub retry_delay_ms: Option<u64>,

    #[arg(
        long = "retry-max-elapsed-ms",
        value_name = "MILLIS",
        env = "REWARD_BATCH_RETRY_MAX_ELAPSED_MS",
        help = "Give up retrying after this many milliseconds (default: no limit)"
    )]
    pub retry_max_elapsed_ms: Option<u64>,
}

impl CliArgs {
    /// Ingestion settings, unset values taken from `IngestConfig::default()`
    pub fn to_ingest_config(&self) -> IngestConfig {
        let default = IngestConfig::default();
        IngestConfig::new(
            self.commit_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(default.commit_delay),
            self.max_concurrent.unwrap_or(default.max_concurrent),
        )
    }

    pub fn to_delete_config(&self) -> DeleteConfig {
        let default = DeleteConfig::default();
        DeleteConfig::new(
            self.delete_page_size.unwrap_or(default.page_size),
            self.delete_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(default.delay),
        )
    }

    pub fn to_retry_policy(&self) -> RetryPolicy {
        let default = RetryPolicy::default();
        RetryPolicy::new(
            self.retry_max.unwrap_or(default.max_retry),
            self.retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(default.delay),
            self.retry_max_elapsed_ms
                .map(Duration::from_millis)
                .or(default.max_elapsed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::events_only(&["program", "events.jsonl"], None, None)]
    #[case::with_commands(
        &["program", "--commands", "commands.jsonl", "events.jsonl"],
        Some("commands.jsonl"),
        None
    )]
    #[case::with_operations(
        &["program", "events.jsonl", "--operations", "ops.jsonl"],
        None,
        Some("ops.jsonl")
    )]
    fn test_input_files(
        #[case] args: &[&str],
        #[case] commands: Option<&str>,
        #[case] operations: Option<&str>,
    ) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.events_file, PathBuf::from("events.jsonl"));
        assert_eq!(parsed.commands_file, commands.map(PathBuf::from));
        assert_eq!(parsed.operations_file, operations.map(PathBuf::from));
    }

    #[rstest]
    #[case::defaults(&["program", "events.jsonl"], 1000, num_cpus::get())]
    #[case::commit_delay(
        &["program", "--commit-delay-ms", "250", "events.jsonl"],
        250,
        num_cpus::get()
    )]
    #[case::max_concurrent(&["program", "--max-concurrent", "8", "events.jsonl"], 1000, 8)]
    #[case::zero_values_fall_back(
        &["program", "--commit-delay-ms", "0", "--max-concurrent", "0", "events.jsonl"],
        1000,
        num_cpus::get()
    )]
    fn test_ingest_config_conversion(
        #[case] args: &[&str],
        #[case] expected_delay_ms: u64,
        #[case] expected_max_concurrent: usize,
    ) {
        let config = CliArgs::try_parse_from(args).unwrap().to_ingest_config();

        assert_eq!(config.commit_delay, Duration::from_millis(expected_delay_ms));
        assert_eq!(config.max_concurrent, expected_max_concurrent);
    }

    #[rstest]
    #[case::defaults(&["program", "events.jsonl"], 100, 0)]
    #[case::custom(
        &["program", "--delete-page-size", "10", "--delete-delay-ms", "5", "events.jsonl"],
        10,
        5
    )]
    #[case::zero_page_size(&["program", "--delete-page-size", "0", "events.jsonl"], 100, 0)]
    fn test_delete_config_conversion(
        #[case] args: &[&str],
        #[case] expected_page_size: usize,
        #[case] expected_delay_ms: u64,
    ) {
        let config = CliArgs::try_parse_from(args).unwrap().to_delete_config();

        assert_eq!(config.page_size, expected_page_size);
        assert_eq!(config.delay, Duration::from_millis(expected_delay_ms));
    }

    #[rstest]
    #[case::defaults(&["program", "events.jsonl"], RetryPolicy::default())]
    #[case::custom(
        &[
            "program",
            "--retry-max",
            "5",
            "--retry-delay-ms",
            "20",
            "--retry-max-elapsed-ms",
            "1000",
            "events.jsonl"
        ],
        RetryPolicy::new(5, Duration::from_millis(20), Some(Duration::from_secs(1)))
    )]
    #[case::no_retry(
        &["program", "--retry-max", "0", "events.jsonl"],
        RetryPolicy::new(0, Duration::from_millis(100), None)
    )]
    fn test_retry_policy_conversion(#[case] args: &[&str], #[case] expected: RetryPolicy) {
        let policy = CliArgs::try_parse_from(args).unwrap().to_retry_policy();
        assert_eq!(policy, expected);
    }

    #[rstest]
    #[case::missing_events(&["program"])]
    #[case::invalid_number(&["program", "--max-concurrent", "many", "events.jsonl"])]
    #[case::negative_delay(&["program", "--commit-delay-ms", "-5", "events.jsonl"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        let result = CliArgs::try_parse_from(args);
        assert!(result.is_err());
    }
}
