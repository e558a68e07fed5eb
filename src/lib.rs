// Library crate: public API items may not be used by the binary
#![allow(unused)]

//! # metricsplit
//!
//! A streaming filter that splits dotted metric fields in event records
//! into derived metric records.
//!
//! Input records are flat name/value maps. Every field whose name matches
//! the three-segment pattern `priority.instance.period` is expanded into
//! its own derived record carrying the decomposed key parts and the
//! original value; the input record itself is consumed and never forwarded.
//! When a period filter is configured, the splitter additionally computes a
//! running diff between successive values observed for each
//! (priority, instance) pair.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Pipeline                             │
//! │  ┌─────────┐     ┌──────────────────┐     ┌──────────────┐  │
//! │  │ source  │────▶│ KeyMetricSplitter│────▶│ sink (JSON   │  │
//! │  │ (input) │poll │ process / drain  │flush│  lines out)  │  │
//! │  └─────────┘     └──────────────────┘     └──────────────┘  │
//! │       ▲                                                      │
//! │       └── FileSource | StreamSource | ChannelSource          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`splitter`]**: the core engine - key decomposition, the period
//!   filter, per-pair diff state, and the pending/drain buffer protocol
//! - **[`record`]**: data model - insertion-ordered [`EventRecord`] input,
//!   [`MetricKey`] decomposition, and the tagged [`DerivedRecord`] output
//! - **[`source`]**: record ingestion behind the [`RecordSource`] trait,
//!   with file, async-stream, and channel implementations
//! - **[`pipeline`]**: the synchronous host loop that feeds records to the
//!   splitter and writes drained records as newline-delimited JSON
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Expand every dotted field from a JSON-lines file
//! metricsplit --file records.jsonl
//!
//! # Filter to one period and compute running diffs, reading from a socket
//! metricsplit --connect localhost:9090 --field cpu
//! ```
//!
//! ### As a library
//!
//! ```
//! use metricsplit::{EventRecord, KeyMetricSplitter};
//!
//! let mut splitter = KeyMetricSplitter::new();
//!
//! let record: EventRecord =
//!     serde_json::from_str(r#"{"10.app1.cpu": "5", "uptime": "3600"}"#).unwrap();
//! splitter.process(&record);
//!
//! let derived = splitter.drain();
//! assert_eq!(derived.len(), 1);
//! assert_eq!(derived[0].period, "cpu");
//! ```
//!
//! ### Behind an in-process producer
//!
//! ```
//! use metricsplit::{ChannelSource, KeyMetricSplitter, Pipeline};
//!
//! # tokio_test::block_on(async {
//! let (tx, source) = ChannelSource::create("collector");
//! let pipeline = Pipeline::new(
//!     Box::new(source),
//!     KeyMetricSplitter::with_field("cpu"),
//!     Vec::new(),
//! );
//! # drop(tx); drop(pipeline);
//! # });
//! ```

pub mod pipeline;
pub mod record;
pub mod source;
pub mod splitter;

// Re-export main types for convenience
pub use pipeline::Pipeline;
pub use record::{DerivedRecord, EventRecord, MetricKey, PARSED_METRIC_TAG};
pub use source::{ChannelSource, FileSource, RecordSource, StreamSource};
pub use splitter::KeyMetricSplitter;
