//! I/O module
//!
//! Handles file input and report output.
//!
//! # Components
//!
//! - `event_reader` - JSON-lines reader producing inbound records
//! - `operations` - Scripted batch operations replayed after ingestion
//! - `csv_format` - Batch report serialization

pub mod csv_format;
pub mod event_reader;
pub mod operations;

pub use csv_format::{format_cents, write_batches_csv};
pub use event_reader::JsonLinesReader;
pub use operations::{read_operations, BatchRef, Operation};
