//! Inbound stream records

use crate::types::RecordPosition;

/// One record as delivered by a source stream, payload still serialized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: String,
}

impl InboundRecord {
    pub fn new(topic: &str, partition: i32, offset: i64, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.to_string(),
            partition,
            offset,
            payload: payload.into(),
        }
    }

    pub fn position(&self) -> RecordPosition {
        RecordPosition {
            topic: self.topic.clone(),
            partition: self.partition,
            offset: self.offset,
        }
    }
}
