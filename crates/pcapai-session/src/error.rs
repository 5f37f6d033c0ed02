//! Error types for the session cache.

use std::path::PathBuf;

use pcapai_core::error::PcapAiError;

/// Failure to turn a capture file into raw events.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Cannot read capture {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },
    #[error("Unsupported capture format: {0}")]
    UnsupportedFormat(String),
    #[error("Capture parser failed: {0}")]
    ParserFailed(String),
    #[error("Malformed parser output: {0}")]
    Malformed(String),
}

/// Errors from session lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("No capture loaded")]
    NoActiveSession,
    #[error("Snapshot is stale or corrupt: {0}")]
    SnapshotStaleOrCorrupt(String),
    #[error("Snapshot storage error: {0}")]
    Storage(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for SessionError {
    fn from(err: rusqlite::Error) -> Self {
        SessionError::Storage(err.to_string())
    }
}

impl From<SessionError> for PcapAiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Parse(e) => PcapAiError::Parse(e.to_string()),
            SessionError::NoActiveSession => PcapAiError::NoCapture,
            SessionError::Io(e) => PcapAiError::Io(e),
            SessionError::Storage(msg) => PcapAiError::Storage(msg),
            other => PcapAiError::Session(other.to_string()),
        }
    }
}
