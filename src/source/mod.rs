//! Record source abstraction for feeding the pipeline.
//!
//! This module provides a trait-based abstraction for receiving event
//! records from various backends (newline-delimited JSON files, network
//! streams, in-process channels).

mod channel;
mod file;
mod stream;

pub use channel::ChannelSource;
pub use file::FileSource;
pub use stream::StreamSource;

use std::fmt::Debug;

use crate::record::EventRecord;

/// Trait for receiving event records from various backends.
///
/// Implementations yield one record per poll without blocking, so the
/// pipeline can interleave record intake with periodic drains.
///
/// # Example
///
/// ```
/// use metricsplit::{FileSource, RecordSource};
///
/// let mut source = FileSource::new("records.jsonl");
/// while let Some(record) = source.poll() {
///     println!("got {} fields", record.len());
/// }
/// ```
pub trait RecordSource: Send + Debug {
    /// Poll for the next record.
    ///
    /// Returns `Some(record)` if one is available, `None` otherwise.
    /// This method must not block.
    fn poll(&mut self) -> Option<EventRecord>;

    /// Returns a human-readable description of the source.
    fn description(&self) -> &str;

    /// Check if the source has encountered an error.
    ///
    /// Returns the error message if an error occurred during the last poll.
    fn error(&self) -> Option<&str>;

    /// Returns true once the source will never produce another record.
    ///
    /// The pipeline uses this to terminate after a final drain.
    fn closed(&self) -> bool;
}
