//! Stream-based record source.
//!
//! Receives event records from an async byte stream. This is how records
//! arrive over TCP connections or standard input.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

use super::{EventRecord, RecordSource};

/// A record source that reads newline-delimited JSON from an async stream.
///
/// This source spawns a background task that reads lines from the provided
/// reader, parses each as an [`EventRecord`], and makes records available
/// via `poll()`. Unparseable lines are logged and skipped.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use metricsplit::StreamSource;
///
/// # tokio_test::block_on(async {
/// let data = b"{\"10.app1.cpu\": \"5\"}\n";
/// let stream = Cursor::new(data.to_vec());
/// let source = StreamSource::spawn(stream, "example");
/// # });
/// ```
#[derive(Debug)]
pub struct StreamSource {
    receiver: mpsc::Receiver<EventRecord>,
    description: String,
    last_error: Arc<Mutex<Option<String>>>,
    eof: Arc<AtomicBool>,
    disconnected: bool,
}

impl StreamSource {
    /// Spawn a background task that reads from the given async reader.
    ///
    /// The reader should provide one JSON event record per line. Must be
    /// called from within a tokio runtime, and the runtime must outlive
    /// the source.
    pub fn spawn<R>(reader: R, description: &str) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(256);
        let last_error = Arc::new(Mutex::new(None));
        let eof = Arc::new(AtomicBool::new(false));
        let error_handle = last_error.clone();
        let eof_handle = eof.clone();

        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        eof_handle.store(true, Ordering::Release);
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<EventRecord>(trimmed) {
                            Ok(record) => {
                                if tx.send(record).await.is_err() {
                                    // Receiver dropped, stop reading.
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("Skipping unparseable record line: {}", e);
                                *error_handle.lock().unwrap() =
                                    Some(format!("Parse error: {}", e));
                            }
                        }
                    }
                    Err(e) => {
                        *error_handle.lock().unwrap() = Some(format!("Read error: {}", e));
                        eof_handle.store(true, Ordering::Release);
                        break;
                    }
                }
            }
        });

        Self {
            receiver: rx,
            description: format!("stream: {}", description),
            last_error,
            eof,
            disconnected: false,
        }
    }

    /// Get the last error message, if any.
    ///
    /// Returns an owned string because the error is written from the
    /// reader task behind a mutex.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }
}

impl RecordSource for StreamSource {
    fn poll(&mut self) -> Option<EventRecord> {
        match self.receiver.try_recv() {
            Ok(record) => Some(record),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                self.disconnected = true;
                None
            }
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        // The underlying error lives behind a mutex; use
        // [`StreamSource::last_error`] for the owned message.
        None
    }

    fn closed(&self) -> bool {
        self.disconnected || (self.eof.load(Ordering::Acquire) && self.receiver.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_line() -> &'static str {
        r#"{"10.app1.cpu": "5", "10.app1.mem": "100"}"#
    }

    #[tokio::test]
    async fn stream_source_delivers_records() {
        let data = format!("{}\n", sample_line());
        let mut source = StreamSource::spawn(Cursor::new(data), "test");

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        let record = source.poll().unwrap();
        assert_eq!(record.len(), 2);
        assert!(record.contains_key("10.app1.cpu"));
    }

    #[tokio::test]
    async fn stream_source_delivers_multiple_records() {
        let data = format!("{}\n{}\n", sample_line(), sample_line());
        let mut source = StreamSource::spawn(Cursor::new(data), "test");

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert!(source.poll().is_some());
        assert!(source.poll().is_some());
        assert!(source.poll().is_none());
    }

    #[tokio::test]
    async fn stream_source_skips_invalid_lines() {
        let data = format!("not valid json\n{}\n", sample_line());
        let mut source = StreamSource::spawn(Cursor::new(data), "test");

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert!(source.poll().is_some());
        assert!(source.poll().is_none());
        assert!(source.last_error().unwrap().contains("Parse error"));
    }

    #[tokio::test]
    async fn stream_source_closes_at_eof() {
        let data = format!("{}\n", sample_line());
        let mut source = StreamSource::spawn(Cursor::new(data), "test");

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert!(!source.closed());
        assert!(source.poll().is_some());
        assert!(source.closed());
    }

    #[tokio::test]
    async fn stream_source_description() {
        let source = StreamSource::spawn(Cursor::new(""), "tcp://localhost:9090");
        assert_eq!(source.description(), "stream: tcp://localhost:9090");
    }
}
