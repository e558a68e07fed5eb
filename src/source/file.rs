//! File-based record source.
//!
//! Reads event records from a newline-delimited JSON file.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use super::{EventRecord, RecordSource};

/// A record source that reads event records from a JSON-lines file.
///
/// The file is read in full on the first poll and its records are yielded
/// one per poll in file order. Lines that fail to parse are skipped and
/// reported via [`error`](RecordSource::error). Once the last record has
/// been yielded the source reports itself closed.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    description: String,
    queue: VecDeque<EventRecord>,
    loaded: bool,
    last_error: Option<String>,
}

impl FileSource {
    /// Create a new file source for the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("file: {}", path.display());
        Self {
            path,
            description,
            queue: VecDeque::new(),
            loaded: false,
            last_error: None,
        }
    }

    /// Returns the path being read.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the whole file into the queue.
    fn load(&mut self) {
        self.loaded = true;

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                self.last_error = Some(format!("Read error: {}", e));
                return;
            }
        };

        let mut skipped = 0usize;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<EventRecord>(line) {
                Ok(record) => self.queue.push_back(record),
                Err(_) => skipped += 1,
            }
        }

        if skipped > 0 {
            self.last_error = Some(format!("Skipped {} unparseable lines", skipped));
        }
    }
}

impl RecordSource for FileSource {
    fn poll(&mut self) -> Option<EventRecord> {
        if !self.loaded {
            self.load();
        }
        self.queue.pop_front()
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn closed(&self) -> bool {
        self.loaded && self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn file_source_new() {
        let source = FileSource::new("/tmp/records.jsonl");
        assert_eq!(source.path(), Path::new("/tmp/records.jsonl"));
        assert_eq!(source.description(), "file: /tmp/records.jsonl");
        assert!(source.error().is_none());
        assert!(!source.closed());
    }

    #[test]
    fn file_source_yields_records_in_file_order() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"10.app1.cpu": "5"}}"#).unwrap();
        writeln!(file, r#"{{"10.app1.cpu": "8"}}"#).unwrap();

        let mut source = FileSource::new(file.path());

        let first = source.poll().unwrap();
        assert_eq!(first["10.app1.cpu"], "5");
        let second = source.poll().unwrap();
        assert_eq!(second["10.app1.cpu"], "8");

        assert!(source.poll().is_none());
        assert!(source.closed());
    }

    #[test]
    fn file_source_skips_blank_and_invalid_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"10.app1.cpu": "5"}}"#).unwrap();

        let mut source = FileSource::new(file.path());

        assert!(source.poll().is_some());
        assert!(source.poll().is_none());
        assert!(source.error().unwrap().contains("Skipped 1"));
    }

    #[test]
    fn file_source_missing_file() {
        let mut source = FileSource::new("/nonexistent/path/records.jsonl");

        assert!(source.poll().is_none());
        assert!(source.error().unwrap().contains("Read error"));
        assert!(source.closed());
    }
}
