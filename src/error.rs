//! Error types for zipstream

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for zipstream operations
pub type Result<T> = std::result::Result<T, Error>;

/// Which finalization step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseStage {
    /// Writing the central directory and end records
    Archive,
    /// Flushing the trailing base64 group and padding
    Base64,
}

impl std::fmt::Display for CloseStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseStage::Archive => f.write_str("zip writer"),
            CloseStage::Base64 => f.write_str("base64 relay"),
        }
    }
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    DuplicateEntry,
    PathEscape,
    SourceUnavailable,
    Cancelled,
    Io,
    Close,
    Archive,
}

/// Error types that can occur while assembling an archive
#[derive(Debug, Error)]
pub enum Error {
    /// Entry name is empty or unsafe to extract
    #[error("invalid entry name {name:?}: {reason}")]
    Validation { name: String, reason: &'static str },

    /// Two entries share the same logical name
    #[error("duplicate entry name: {0}")]
    DuplicateEntry(String),

    /// Resolved source path would leave the base directory
    #[error("path escapes base dir{}: {}", in_entry(.entry), .path.display())]
    PathEscape { entry: Option<String>, path: PathBuf },

    /// Source could not be opened
    #[error("open source failed for entry {entry} ({}): {source}", .path.display())]
    SourceUnavailable {
        entry: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Cancellation was observed between units of work
    #[error("operation cancelled{}", in_entry(.entry))]
    Cancelled { entry: Option<String> },

    /// Read or write failure while streaming
    #[error("I/O error{}: {source}", in_entry(.entry))]
    Io {
        entry: Option<String>,
        #[source]
        source: io::Error,
    },

    /// Finalizing the archive writer or the base64 relay failed
    #[error("close {stage}: {source}")]
    Close {
        stage: CloseStage,
        #[source]
        source: Box<Error>,
    },

    /// Archive writer used out of order
    #[error("archive writer: {0}")]
    Archive(String),
}

fn in_entry(entry: &Option<String>) -> String {
    match entry {
        Some(name) => format!(" (entry {name})"),
        None => String::new(),
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } => ErrorKind::Validation,
            Error::DuplicateEntry(_) => ErrorKind::DuplicateEntry,
            Error::PathEscape { .. } => ErrorKind::PathEscape,
            Error::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            Error::Cancelled { .. } => ErrorKind::Cancelled,
            Error::Io { .. } => ErrorKind::Io,
            Error::Close { .. } => ErrorKind::Close,
            Error::Archive(_) => ErrorKind::Archive,
        }
    }

    /// True for errors raised before any source is opened
    pub fn is_validation(&self) -> bool {
        matches!(self.kind(), ErrorKind::Validation | ErrorKind::DuplicateEntry)
    }

    /// Name of the entry involved, if the failure is tied to one
    pub fn entry(&self) -> Option<&str> {
        match self {
            Error::Validation { name, .. } | Error::DuplicateEntry(name) => Some(name.as_str()),
            Error::SourceUnavailable { entry, .. } => Some(entry.as_str()),
            Error::PathEscape { entry, .. }
            | Error::Cancelled { entry }
            | Error::Io { entry, .. } => entry.as_deref(),
            Error::Close { source, .. } => source.entry(),
            Error::Archive(_) => None,
        }
    }

    /// Attach an entry name to errors that were raised without one.
    pub(crate) fn with_entry(mut self, name: &str) -> Self {
        match &mut self {
            Error::PathEscape { entry, .. }
            | Error::Cancelled { entry }
            | Error::Io { entry, .. } => {
                if entry.is_none() {
                    *entry = Some(name.to_string());
                }
            }
            _ => {}
        }
        self
    }

    pub(crate) fn cancelled() -> Self {
        Error::Cancelled { entry: None }
    }

    pub(crate) fn close(stage: CloseStage, source: Error) -> Self {
        Error::Close {
            stage,
            source: Box::new(source),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io {
            entry: None,
            source: err,
        }
    }
}
