//! Error types for log reading, pattern loading and aggregation.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by an aggregation run or by the log/pattern writers.
#[derive(Debug, Error)]
pub enum Error {
    /// A file could not be opened, read or written.
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV layer failed before a record could be produced.
    #[error("log read failed: {0}")]
    Csv(#[from] csv::Error),

    /// A log record did not have the expected number of fields.
    #[error("malformed log record at line {line}: expected {expected} fields, found {found}")]
    MalformedRecord {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("unknown action {0:?}")]
    UnknownAction(String),

    /// The resource type taxonomy is closed; anything else is an upstream bug.
    #[error("unknown resource type {0:?}")]
    UnknownResourceType(String),

    /// A URL inside an entry could not be parsed during aggregation.
    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid domain pattern {0:?}")]
    InvalidPattern(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the failure comes from bad data rather than from the filesystem.
    ///
    /// Corrupt input will fail the same way on every retry; I/O failures may not.
    pub fn is_corrupt_input(&self) -> bool {
        match self {
            Error::Io { .. } => false,
            Error::Csv(e) => !matches!(e.kind(), csv::ErrorKind::Io(_)),
            _ => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
