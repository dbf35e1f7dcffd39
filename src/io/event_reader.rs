//! JSON-lines record reader
//!
//! Turns a file holding one serialized payload per line into a stream of
//! `InboundRecord`s, the way a broker partition would deliver them. The line
//! index is used as the record offset, so redelivering a file reproduces the
//! same positions. Blank lines are skipped but still consume an offset.
//!
//! Payloads are not parsed here; the mediator owns deserialization and the
//! handling of malformed records.

use std::path::Path;

use futures::Stream;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::error;

use crate::ingest::InboundRecord;

/// Reads records line by line from an async buffered reader
pub struct JsonLinesReader<R> {
    lines: Lines<R>,
    topic: String,
    partition: i32,
    next_offset: i64,
}

impl JsonLinesReader<BufReader<File>> {
    /// Open `path` as partition 0 of `topic`
    pub async fn open(path: &Path, topic: &str) -> Result<Self, String> {
        let file = File::open(path)
            .await
            .map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
        Ok(Self::new(BufReader::new(file), topic, 0))
    }
}

impl<R: AsyncBufRead + Unpin> JsonLinesReader<R> {
    pub fn new(reader: R, topic: &str, partition: i32) -> Self {
        Self {
            lines: reader.lines(),
            topic: topic.to_string(),
            partition,
            next_offset: 0,
        }
    }

    /// Next non-blank record, `None` at end of input
    pub async fn next_record(&mut self) -> Result<Option<InboundRecord>, String> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| format!("Failed to read {}: {}", self.topic, e))?;
            let Some(line) = line else {
                return Ok(None);
            };

            let offset = self.next_offset;
            self.next_offset += 1;

            let payload = line.trim();
            if payload.is_empty() {
                continue;
            }
            return Ok(Some(InboundRecord::new(
                &self.topic,
                self.partition,
                offset,
                payload,
            )));
        }
    }

    /// Consume the reader as a stream
    ///
    /// A read error ends the stream after being logged.
    pub fn into_stream(self) -> impl Stream<Item = InboundRecord> {
        futures::stream::unfold(self, |mut reader| async move {
            match reader.next_record().await {
                Ok(Some(record)) => Some((record, reader)),
                Ok(None) => None,
                Err(e) => {
                    error!(topic = %reader.topic, error = %e, "Record stream interrupted");
                    None
                }
            }
        })
    }
}
