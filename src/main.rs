//! Reward Batch Engine CLI
//!
//! Command-line interface ingesting reward transaction events from JSON-lines
//! files and reporting the resulting reward batches.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- events.jsonl > batches.csv
//! cargo run -- --commands commands.jsonl events.jsonl > batches.csv
//! cargo run -- --operations operations.jsonl --commit-delay-ms 200 events.jsonl > batches.csv
//! ```
//!
//! Events are ingested first, then commands, then the operations script is
//! replayed. The batch report is written to stdout; logs go to stderr and
//! are filtered with `REWARD_BATCH_LOG` (default `info`).
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, file not readable, failed offset commit, etc.)

use reward_batch_engine::app::{self, AppConfig};
use reward_batch_engine::cli;
use std::process;
use tracing::error;

fn main() {
    app::init_tracing();

    let args = cli::parse_args();
    let config = AppConfig::from(&args);

    let mut output = std::io::stdout();
    if let Err(e) = app::run(&config, &mut output) {
        error!(error = %e, "Run failed");
        process::exit(1);
    }
}
