//! Append-only CSV event log.
//!
//! Each record is `timestamp,action,type,url,tab`. Writers append whole records
//! with a single write; readers take no lock, so a reader racing a writer can
//! see a final record that is still being written.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info, warn};

use crate::entry::{Entry, Event};
use crate::error::{Error, Result};

const FIELD_COUNT: usize = 5;

#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a fresh pass over the log from its first record.
    pub fn entries(&self) -> Result<Entries> {
        let file = File::open(&self.path).map_err(|e| Error::io(&self.path, e))?;
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);
        debug!(
            action = "open",
            component = "event_log",
            file_path = ?self.path,
            "Opened event log for reading"
        );
        Ok(Entries {
            records: reader.into_records(),
            failed: false,
        })
    }

    /// Appends one event stamped with the current UTC time.
    pub fn append(&self, event: &Event) -> Result<()> {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        self.append_at(event, &timestamp)
    }

    pub fn append_at(&self, event: &Event, timestamp: &str) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record([
            timestamp,
            event.action.as_str(),
            event.resource_type.as_str(),
            event.url.as_str(),
            event.tab_url.as_str(),
        ])?;
        let record = writer
            .into_inner()
            .map_err(|e| Error::io(&self.path, e.into_error()))?;

        let mut file = open_append(&self.path)?;
        file.write_all(&record)
            .map_err(|e| Error::io(&self.path, e))
    }

    /// Appends every newline-delimited JSON event read from `input`.
    ///
    /// Lines that do not decode as an [`Event`] are logged and skipped.
    pub fn record_stream<R: BufRead>(&self, input: R) -> Result<RecordSummary> {
        let start_time = Instant::now();
        let mut summary = RecordSummary::default();

        for line in input.lines() {
            let line = line.map_err(|e| Error::io("<input>", e))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Event>(line) {
                Ok(event) => {
                    self.append(&event)?;
                    summary.written += 1;
                }
                Err(e) => {
                    warn!(
                        action = "decode",
                        component = "event_log",
                        error = %e,
                        payload = line,
                        "Skipping undecodable event"
                    );
                    summary.skipped += 1;
                }
            }
        }

        info!(
            action = "complete",
            component = "event_log",
            written = summary.written,
            skipped = summary.skipped,
            duration_ms = start_time.elapsed().as_millis(),
            "Recorded events"
        );
        Ok(summary)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecordSummary {
    pub written: usize,
    pub skipped: usize,
}

#[cfg(unix)]
fn open_append(path: &Path) -> Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| Error::io(path, e))
}

#[cfg(not(unix))]
fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::io(path, e))
}

/// Lazy pass over the log. Yields at most one error, then stops.
pub struct Entries {
    records: csv::StringRecordsIntoIter<File>,
    failed: bool,
}

impl Iterator for Entries {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = match self.records.next()? {
            Ok(record) => parse_record(&record),
            Err(e) => Err(Error::from(e)),
        };
        self.failed = item.is_err();
        Some(item)
    }
}

fn parse_record(record: &csv::StringRecord) -> Result<Entry> {
    if record.len() != FIELD_COUNT {
        return Err(Error::MalformedRecord {
            line: record.position().map(|p| p.line()).unwrap_or_default(),
            expected: FIELD_COUNT,
            found: record.len(),
        });
    }

    Ok(Entry {
        timestamp: record[0].to_string(),
        action: record[1].parse()?,
        resource_type: record[2].parse()?,
        request_url: record[3].to_string(),
        tab_url: record[4].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Action, ResourceType};
    use std::fs;
    use tempfile::TempDir;

    fn event(action: Action, kind: ResourceType, url: &str, tab: &str) -> Event {
        Event {
            action,
            resource_type: kind,
            url: url.to_string(),
            tab_url: tab.to_string(),
        }
    }

    #[test]
    fn test_append_then_read() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(dir.path().join("log.txt"));

        let tab = "http://site.test/";
        let png = "http://ads.example.com/a.png?x=1,2";
        log.append_at(
            &event(Action::Allow, ResourceType::Image, png, tab),
            "2024-01-01T00:00:00Z",
        )
        .unwrap();
        log.append(&event(Action::Block, ResourceType::Script, "http://t.test/s.js", tab))
            .unwrap();

        let entries: Vec<Entry> = log.entries().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].timestamp, "2024-01-01T00:00:00Z");
        assert_eq!(entries[0].request_url, "http://ads.example.com/a.png?x=1,2");
        assert_eq!(entries[1].action, Action::Block);
        assert_eq!(entries[1].resource_type, ResourceType::Script);
    }

    #[test]
    fn test_restartable() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(dir.path().join("log.txt"));
        log.append(&event(Action::Allow, ResourceType::Other, "http://a.test/", "http://b.test/"))
            .unwrap();

        assert_eq!(log.entries().unwrap().count(), 1);
        assert_eq!(log.entries().unwrap().count(), 1);
    }

    #[test]
    fn test_missing_log_is_io_error() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(dir.path().join("log.txt"));
        let err = log.entries().err().unwrap();
        assert!(matches!(err, Error::Io { .. }));
        assert!(!err.is_corrupt_input());
    }

    #[test]
    fn test_wrong_field_count_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.txt");
        fs::write(
            &path,
            concat!(
                "t,allow,image,http://a.test/x,http://b.test/\n",
                "t,allow,image,http://a.test/x\n",
                "t,allow,image,http://a.test/y,http://b.test/\n",
            ),
        )
        .unwrap();

        let results: Vec<Result<Entry>> = EventLog::new(&path).entries().unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(Error::MalformedRecord { line: 2, expected: 5, found: 4 })
        ));
    }

    #[test]
    fn test_unknown_type_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.txt");
        fs::write(&path, "t,allow,object,http://a.test/x,http://b.test/\n").unwrap();

        let first = EventLog::new(&path).entries().unwrap().next().unwrap();
        assert!(matches!(first, Err(Error::UnknownResourceType(v)) if v == "object"));
    }

    #[test]
    fn test_record_stream_skips_bad_lines() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(dir.path().join("log.txt"));
        let input = concat!(
            r#"{"action":"allow","type":"image","url":"http://a.test/i","tab":"http://b.test/"}"#,
            "\n",
            "not json\n",
            "\n",
            r#"{"action":"allow","type":"object","url":"http://a.test/o","tab":"http://b.test/"}"#,
            "\n",
        );

        let summary = log.record_stream(input.as_bytes()).unwrap();
        assert_eq!(summary, RecordSummary { written: 1, skipped: 2 });
        assert_eq!(log.entries().unwrap().count(), 1);
    }
}
