//! Per-partition acknowledgement ordering
//!
//! Records complete out of order, but a partition's committed offset may only
//! move over records that are all done. `AckTracker` keeps the records of each
//! partition in delivery order and releases the leading run of done records.
//! A failed record stays at the head of its partition and holds back every
//! record delivered after it, so the partition resumes from it on redelivery.

use std::collections::{HashMap, VecDeque};

use crate::types::RecordPosition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ack {
    Pending,
    /// Processed or malformed; safe to commit past
    Done,
    /// Must be redelivered
    Failed,
}

#[derive(Debug, Default)]
pub(crate) struct AckTracker {
    partitions: HashMap<(String, i32), VecDeque<(i64, Ack)>>,
}

impl AckTracker {
    /// Record that `position` was handed to a worker
    pub(crate) fn register(&mut self, position: &RecordPosition) {
        self.partitions
            .entry((position.topic.clone(), position.partition))
            .or_default()
            .push_back((position.offset, Ack::Pending));
    }

    /// Settle a registered record and return the positions now committable
    ///
    /// The returned positions belong to the record's partition and are in
    /// delivery order.
    pub(crate) fn complete(&mut self, position: &RecordPosition, ack: Ack) -> Vec<RecordPosition> {
        let Some(queue) = self
            .partitions
            .get_mut(&(position.topic.clone(), position.partition))
        else {
            return Vec::new();
        };

        if let Some(entry) = queue
            .iter_mut()
            .find(|(offset, state)| *offset == position.offset && *state == Ack::Pending)
        {
            entry.1 = ack;
        }

        let mut ready = Vec::new();
        while let Some(&(offset, Ack::Done)) = queue.front() {
            queue.pop_front();
            ready.push(RecordPosition {
                topic: position.topic.clone(),
                partition: position.partition,
                offset,
            });
        }
        ready
    }

    /// Done records that cannot be committed because an earlier one failed
    pub(crate) fn held_back(&self) -> usize {
        self.partitions
            .values()
            .map(|queue| queue.iter().filter(|(_, state)| *state == Ack::Done).count())
            .sum()
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

    fn offsets(positions: &[RecordPosition]) -> Vec<i64> {
        positions.iter().map(|p| p.offset).collect()
    }

    #[test]
    fn test_out_of_order_completion_releases_in_order() {
        let mut acks = AckTracker::default();
        for offset in 0..3 {
            acks.register(&position(0, offset));
        }

        assert!(acks.complete(&position(0, 2), Ack::Done).is_empty());
        assert!(acks.complete(&position(0, 1), Ack::Done).is_empty());
        assert_eq!(offsets(&acks.complete(&position(0, 0), Ack::Done)), vec![0, 1, 2]);
        assert_eq!(acks.held_back(), 0);
    }

    #[test]
    fn test_failure_holds_back_later_records() {
        let mut acks = AckTracker::default();
        for offset in [0, 1, 3] {
            acks.register(&position(0, offset));
        }

        assert_eq!(offsets(&acks.complete(&position(0, 0), Ack::Done)), vec![0]);
        assert!(acks.complete(&position(0, 1), Ack::Failed).is_empty());
        assert!(acks.complete(&position(0, 3), Ack::Done).is_empty());
        assert_eq!(acks.held_back(), 1);
    }

    #[test]
    fn test_partitions_are_independent() {
        let mut acks = AckTracker::default();
        acks.register(&position(0, 0));
        acks.register(&position(1, 0));
        acks.register(&position(1, 1));

        acks.complete(&position(0, 0), Ack::Failed);
        let ready = acks.complete(&position(1, 0), Ack::Done);

        assert_eq!(ready, vec![position(1, 0)]);
    }
}
