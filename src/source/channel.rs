//! Channel-based record source.
//!
//! Receives event records via a tokio mpsc channel. This is useful for
//! embedding the pipeline behind an in-process producer (a collector task,
//! a message bus subscriber) that pushes records rather than writing them
//! to a file or socket.

use tokio::sync::mpsc;

use super::{EventRecord, RecordSource};

/// A record source that receives event records via a channel.
///
/// The producer sends records through the channel and this source hands
/// them to the pipeline one per poll. The source reports itself closed
/// once every sender has been dropped and the queue is empty.
///
/// # Example
///
/// ```
/// use metricsplit::ChannelSource;
///
/// # tokio_test::block_on(async {
/// let (tx, source) = ChannelSource::create("collector");
/// # drop(tx); drop(source);
/// # });
/// ```
#[derive(Debug)]
pub struct ChannelSource {
    receiver: mpsc::Receiver<EventRecord>,
    description: String,
    disconnected: bool,
}

impl ChannelSource {
    /// Create a new channel source from a receiver.
    pub fn new(receiver: mpsc::Receiver<EventRecord>, source_description: &str) -> Self {
        let description = format!("channel: {}", source_description);
        Self {
            receiver,
            description,
            disconnected: false,
        }
    }

    /// Create a channel pair for sending records to a ChannelSource.
    ///
    /// Returns (sender, source) where the sender is handed to the producer
    /// and the source is handed to the pipeline.
    pub fn create(source_description: &str) -> (mpsc::Sender<EventRecord>, Self) {
        let (tx, rx) = mpsc::channel(256);
        let source = Self::new(rx, source_description);
        (tx, source)
    }
}

impl RecordSource for ChannelSource {
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
        // Producer-side failures surface on the producer, not here.
        None
    }

    fn closed(&self) -> bool {
        self.disconnected
    }
}
