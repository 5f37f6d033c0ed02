//! Session cache for pcapai.
//!
//! Owns the single active capture session: parses a capture at most once per
//! content fingerprint, and persists the parsed records to a SQLite snapshot
//! so a later process can resume without re-parsing.

pub mod cache;
pub mod error;
pub mod fingerprint;
pub mod parser;
pub mod snapshot;

pub use cache::{CaptureSession, SessionCache, SessionInfo};
pub use error::{ParseError, SessionError};
pub use fingerprint::capture_identity;
pub use parser::{
    decode_tshark_json, AutoParser, CaptureParser, JsonExportParser, TsharkParser,
};
pub use snapshot::{SessionSnapshot, SnapshotStore};
