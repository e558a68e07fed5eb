//! The host loop that drives a splitter over a record source.
//!
//! The pipeline is the synchronous, call-by-call host for
//! [`KeyMetricSplitter`]: it polls a [`RecordSource`] for input records,
//! hands each to `process` exactly once, and periodically drains the
//! splitter, writing every derived record as one JSON line to the sink.
//! Input records are consumed by processing and are never forwarded.

use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, info};

use crate::record::DerivedRecord;
use crate::source::RecordSource;
use crate::splitter::KeyMetricSplitter;

/// Sleep between polls when the source has nothing to offer.
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Drain early once this many derived records are pending, regardless of
/// the flush interval.
const PENDING_HIGH_WATER: usize = 10_000;

/// Drives a [`KeyMetricSplitter`] over a record source, writing drained
/// derived records to a sink as newline-delimited JSON.
#[derive(Debug)]
pub struct Pipeline<W: Write> {
    source: Box<dyn RecordSource>,
    splitter: KeyMetricSplitter,
    sink: W,
    records_in: u64,
    records_out: u64,
}

impl<W: Write> Pipeline<W> {
    /// Create a pipeline from a source, a configured splitter, and a sink.
    pub fn new(source: Box<dyn RecordSource>, splitter: KeyMetricSplitter, sink: W) -> Self {
        Self {
            source,
            splitter,
            sink,
            records_in: 0,
            records_out: 0,
        }
    }

    /// Number of input records processed so far.
    pub fn records_in(&self) -> u64 {
        self.records_in
    }

    /// Number of derived records written so far.
    pub fn records_out(&self) -> u64 {
        self.records_out
    }

    /// Poll the source once and process the record if one was available.
    ///
    /// Returns true if a record was processed.
    pub fn poll_once(&mut self) -> bool {
        let Some(record) = self.source.poll() else {
            return false;
        };
        self.splitter.process(&record);
        self.records_in += 1;
        true
    }

    /// Drain the splitter and write each derived record as one JSON line.
    ///
    /// Returns the number of records written. Writing nothing is not an
    /// error; the sink is only flushed when something was written.
    pub fn flush(&mut self) -> Result<usize> {
        let drained = self.splitter.drain();
        if drained.is_empty() {
            return Ok(0);
        }

        for derived in &drained {
            self.write_record(derived)?;
        }
        self.sink.flush()?;

        self.records_out += drained.len() as u64;
        debug!("Flushed {} derived records", drained.len());
        Ok(drained.len())
    }

    fn write_record(&mut self, record: &DerivedRecord) -> Result<()> {
        serde_json::to_writer(&mut self.sink, record)?;
        self.sink.write_all(b"\n")?;
        Ok(())
    }

    /// Run until the source closes, draining every `flush_interval`.
    ///
    /// Also drains when the pending buffer grows past a high-water mark,
    /// and once more after the source closes so nothing is left behind.
    pub fn run(&mut self, flush_interval: Duration) -> Result<()> {
        info!("Reading records from {}", self.source.description());
        let mut last_flush = Instant::now();

        loop {
            let mut worked = false;
            while self.poll_once() {
                worked = true;
                if self.splitter.pending_len() >= PENDING_HIGH_WATER {
                    self.flush()?;
                    last_flush = Instant::now();
                }
            }

            if last_flush.elapsed() >= flush_interval {
                self.flush()?;
                last_flush = Instant::now();
            }

            if self.source.closed() {
                break;
            }
            if !worked {
                thread::sleep(IDLE_POLL);
            }
        }

        self.flush()?;

        if let Some(error) = self.source.error() {
            info!("Source reported: {}", error);
        }
        info!(
            "Done: {} records in, {} derived records out",
            self.records_in, self.records_out
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ChannelSource;
    use serde_json::json;

    fn record(fields: &[(&str, &str)]) -> crate::record::EventRecord {
        fields
            .iter()
            .map(|(name, value)| (name.to_string(), json!(value)))
            .collect()
    }

    #[tokio::test]
    async fn pipeline_emits_only_derived_records() {
        let (tx, source) = ChannelSource::create("test");
        let mut pipeline =
            Pipeline::new(Box::new(source), KeyMetricSplitter::new(), Vec::new());

        tx.send(record(&[("10.app1.cpu", "5"), ("plain", "x")]))
            .await
            .unwrap();

        assert!(pipeline.poll_once());
        assert!(!pipeline.poll_once());
        assert_eq!(pipeline.flush().unwrap(), 1);

        let output = String::from_utf8(pipeline.sink.clone()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 1);

        let emitted: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(emitted["priority"], "10");
        assert_eq!(emitted["tag"], "parsedMetric");
        // The original record and its non-matching field are suppressed.
        assert!(!output.contains("plain"));
    }

    #[tokio::test]
    async fn pipeline_counts_records() {
        let (tx, source) = ChannelSource::create("test");
        let mut pipeline =
            Pipeline::new(Box::new(source), KeyMetricSplitter::with_field("cpu"), Vec::new());

        tx.send(record(&[("10.app1.cpu", "5")])).await.unwrap();
        tx.send(record(&[("10.app1.mem", "100")])).await.unwrap();

        assert!(pipeline.poll_once());
        assert!(pipeline.poll_once());
        pipeline.flush().unwrap();

        assert_eq!(pipeline.records_in(), 2);
        // The mem field was filtered out, so only the cpu record emerged.
        assert_eq!(pipeline.records_out(), 1);
    }

    #[tokio::test]
    async fn pipeline_run_drains_everything_before_exit() {
        let (tx, source) = ChannelSource::create("test");
        let mut pipeline =
            Pipeline::new(Box::new(source), KeyMetricSplitter::with_field("cpu"), Vec::new());

        tx.send(record(&[("10.app1.cpu", "5")])).await.unwrap();
        tx.send(record(&[("10.app1.cpu", "8")])).await.unwrap();
        drop(tx);

        pipeline.run(Duration::from_secs(3600)).unwrap();

        let output = String::from_utf8(pipeline.sink.clone()).unwrap();
        let diffs: Vec<i64> = output
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["diff"].as_i64().unwrap()
            })
            .collect();
        assert_eq!(diffs, vec![5, 3]);
    }

    #[tokio::test]
    async fn pipeline_flush_with_nothing_pending_is_ok() {
        let (_tx, source) = ChannelSource::create("test");
        let mut pipeline =
            Pipeline::new(Box::new(source), KeyMetricSplitter::new(), Vec::new());
        assert_eq!(pipeline.flush().unwrap(), 0);
    }
}
