//! Ingestion and purge configuration

use std::time::Duration;

use tracing::warn;

/// Configuration of an ingestion run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestConfig {
    /// Window after which acknowledged offsets are committed together
    pub commit_delay: Duration,
    /// Records processed concurrently
    pub max_concurrent: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            commit_delay: Duration::from_millis(1000),
            max_concurrent: num_cpus::get(),
        }
    }
}

impl IngestConfig {
    /// Create an IngestConfig, replacing zero values with defaults
    pub fn new(commit_delay: Duration, max_concurrent: usize) -> Self {
        let default = Self::default();

        let commit_delay = if commit_delay.is_zero() {
            warn!(
                default_ms = default.commit_delay.as_millis() as u64,
                "Invalid commit_delay (0), using default"
            );
            default.commit_delay
        } else {
            commit_delay
        };

        let max_concurrent = if max_concurrent == 0 {
            warn!(
                default = default.max_concurrent,
                "Invalid max_concurrent (0), using default"
            );
            default.max_concurrent
        } else {
            max_concurrent
        };

        Self {
            commit_delay,
            max_concurrent,
        }
    }
}

/// Paging of the initiative purge command
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteConfig {
    /// Transactions deleted per round trip
    pub page_size: usize,
    /// Pause between two pages
    pub delay: Duration,
}

impl Default for DeleteConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            delay: Duration::ZERO,
        }
    }
}

impl DeleteConfig {
    /// Create a DeleteConfig, replacing a zero page size with the default
    pub fn new(page_size: usize, delay: Duration) -> Self {
        let page_size = if page_size == 0 {
            let default = Self::default().page_size;
            warn!(default, "Invalid delete page_size (0), using default");
            default
        } else {
            page_size
        };

        Self { page_size, delay }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::valid(250, 4, 250, 4)]
    #[case::zero_delay(0, 4, 1000, 4)]
    #[case::zero_concurrency(250, 0, 250, num_cpus::get())]
    fn test_ingest_config_fallbacks(
        #[case] delay_ms: u64,
        #[case] concurrent: usize,
        #[case] expected_ms: u64,
        #[case] expected_concurrent: usize,
    ) {
        let config = IngestConfig::new(Duration::from_millis(delay_ms), concurrent);
        assert_eq!(config.commit_delay, Duration::from_millis(expected_ms));
        assert_eq!(config.max_concurrent, expected_concurrent);
    }

    #[test]
    fn test_delete_config_fallback() {
        assert_eq!(DeleteConfig::new(0, Duration::ZERO).page_size, 100);
        assert_eq!(DeleteConfig::new(20, Duration::ZERO).page_size, 20);
    }
}
