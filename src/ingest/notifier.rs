//! Error notifier and offset committer implementations
//!
//! `LoggingErrorNotifier` publishes failures as structured log events.
//! `InMemoryErrorNotifier` and `InMemoryOffsetCommitter` keep what they
//! receive so a run can be inspected afterwards.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::error;

use crate::core::traits::{ErrorNotifier, OffsetCommitter};
use crate::types::{BatchError, ErrorNotification, RecordPosition};

/// Publishes notifications to the log at error level
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingErrorNotifier;

#[async_trait]
impl ErrorNotifier for LoggingErrorNotifier {
    async fn notify(&self, notification: ErrorNotification) -> Result<(), BatchError> {
        error!(
            source_topic = %notification.source_topic,
            source_partition = notification.source_partition,
            source_offset = notification.source_offset,
            retryable = notification.retryable,
            cause = %notification.cause_class,
            root_cause = %notification.root_cause_message,
            "{}",
            notification.description
        );
        Ok(())
    }
}

/// Collects notifications in memory
#[derive(Debug, Default)]
pub struct InMemoryErrorNotifier {
    notifications: Mutex<Vec<ErrorNotification>>,
}

impl InMemoryErrorNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<ErrorNotification> {
        self.notifications
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ErrorNotifier for InMemoryErrorNotifier {
    async fn notify(&self, notification: ErrorNotification) -> Result<(), BatchError> {
        self.notifications
            .lock()
            .map_err(|e| BatchError::Notification {
                message: e.to_string(),
            })?
            .push(notification);
        Ok(())
    }
}

/// Tracks the highest committed offset per topic partition
#[derive(Debug, Default)]
pub struct InMemoryOffsetCommitter {
    state: Mutex<CommitState>,
}

#[derive(Debug, Default)]
struct CommitState {
    offsets: BTreeMap<(String, i32), i64>,
    commits: usize,
}

impl InMemoryOffsetCommitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest committed offset of a partition
    pub fn committed(&self, topic: &str, partition: i32) -> Option<i64> {
        self.state
            .lock()
            .ok()?
            .offsets
            .get(&(topic.to_string(), partition))
            .copied()
    }

    /// Number of commit calls received
    pub fn commits(&self) -> usize {
        self.state.lock().map(|s| s.commits).unwrap_or_default()
    }
}

#[async_trait]
impl OffsetCommitter for InMemoryOffsetCommitter {
    async fn commit(&self, positions: Vec<RecordPosition>) -> Result<(), BatchError> {
        let mut state = self.state.lock().map_err(|e| BatchError::Commit {
            message: e.to_string(),
        })?;
        for position in positions {
            let offset = state
                .offsets
                .entry((position.topic, position.partition))
                .or_insert(position.offset);
            *offset = (*offset).max(position.offset);
        }
        state.commits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(partition: i32, offset: i64) -> RecordPosition {
        RecordPosition {
            topic: "trx".to_string(),
            partition,
            offset,
        }
    }

    #[tokio::test]
    async fn test_committer_keeps_highest_offset() {
        let committer = InMemoryOffsetCommitter::new();

        committer
            .commit(vec![position(0, 5), position(0, 3), position(1, 1)])
            .await
            .unwrap();
        committer.commit(vec![position(0, 4)]).await.unwrap();

        assert_eq!(committer.committed("trx", 0), Some(5));
        assert_eq!(committer.committed("trx", 1), Some(1));
        assert_eq!(committer.committed("trx", 2), None);
        assert_eq!(committer.commits(), 2);
    }
}
