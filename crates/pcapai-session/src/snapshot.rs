//! Durable session snapshot.
//!
//! SQLite rows keyed by capture fingerprint, each holding the identity,
//! focus and full record sequence as JSON. At most one row is active: the
//! session to reinstate on restart. Inactive rows let a capture that was
//! evicted from the active slot come back without a re-parse.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use pcapai_core::{CaptureIdentity, PacketRecord};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SessionError;

/// Bumped whenever the stored record encoding changes shape.
const SNAPSHOT_FORMAT: i64 = 2;

/// Snapshots kept per store, the active one included.
pub const RETAINED_SNAPSHOTS: usize = 8;

/// Everything needed to reinstate a session without re-parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub identity: CaptureIdentity,
    pub focus: Option<String>,
    pub records: Vec<PacketRecord>,
    pub skipped: usize,
    pub timestamp_adjustments: usize,
    pub saved_at: DateTime<Utc>,
}

/// Thread-safe snapshot store.
///
/// The connection is wrapped in a Mutex since rusqlite Connection is not Sync.
pub struct SnapshotStore {
    conn: Mutex<Connection>,
    location: Option<PathBuf>,
}

impl SnapshotStore {
    /// Open (or create) a snapshot database at the given path.
    pub fn new(path: &Path) -> Result<Self, SessionError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| SessionError::Storage(format!("Failed to open snapshot db: {}", e)))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
            .map_err(|e| SessionError::Storage(format!("Failed to set pragmas: {}", e)))?;
        create_schema(&conn)?;
        info!("Snapshot store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            location: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory store (for testing).
    pub fn in_memory() -> Result<Self, SessionError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SessionError::Storage(format!("Failed to open in-memory db: {}", e)))?;
        create_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: None,
        })
    }

    /// Database file backing this store, if on disk.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T, SessionError>
    where
        F: FnOnce(&Connection) -> Result<T, SessionError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SessionError::Storage(format!("Snapshot lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Store `snapshot` under its fingerprint and mark it active.
    ///
    /// Inactive snapshots beyond [`RETAINED_SNAPSHOTS`] are pruned, oldest
    /// first.
    pub fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SessionError> {
        let records = serde_json::to_string(&snapshot.records)
            .map_err(|e| SessionError::Storage(format!("Failed to encode records: {}", e)))?;
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("UPDATE capture_snapshots SET active = 0 WHERE active = 1", [])?;
            tx.execute(
                "INSERT OR REPLACE INTO capture_snapshots
                    (fingerprint, format, path, size_bytes, focus, skipped,
                     timestamp_adjustments, records, saved_at, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1)",
                params![
                    snapshot.identity.fingerprint,
                    SNAPSHOT_FORMAT,
                    snapshot.identity.path.to_string_lossy().into_owned(),
                    snapshot.identity.size_bytes as i64,
                    snapshot.focus,
                    snapshot.skipped as i64,
                    snapshot.timestamp_adjustments as i64,
                    records,
                    snapshot.saved_at.to_rfc3339(),
                ],
            )?;
            tx.execute(
                "DELETE FROM capture_snapshots
                 WHERE active = 0 AND fingerprint NOT IN (
                     SELECT fingerprint FROM capture_snapshots
                     WHERE active = 0
                     ORDER BY saved_at DESC
                     LIMIT ?1
                 )",
                params![RETAINED_SNAPSHOTS as i64 - 1],
            )?;
            tx.commit()?;
            Ok(())
        })?;
        debug!(
            fingerprint = %snapshot.identity.fingerprint,
            records = snapshot.records.len(),
            "Snapshot saved"
        );
        Ok(())
    }

    /// Read the active snapshot.
    ///
    /// Returns `Ok(None)` when nothing is active and
    /// [`SessionError::SnapshotStaleOrCorrupt`] when the row cannot be decoded.
    pub fn load(&self) -> Result<Option<SessionSnapshot>, SessionError> {
        self.load_where("active = 1", None)
    }

    /// Read the snapshot stored for `fingerprint`, active or not.
    pub fn load_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<SessionSnapshot>, SessionError> {
        self.load_where("fingerprint = ?1", Some(fingerprint))
    }

    fn load_where(
        &self,
        condition: &str,
        fingerprint: Option<&str>,
    ) -> Result<Option<SessionSnapshot>, SessionError> {
        let sql = format!(
            "SELECT format, path, fingerprint, size_bytes, focus, skipped,
                    timestamp_adjustments, records, saved_at
             FROM capture_snapshots WHERE {}",
            condition
        );
        let row = self.with_conn(|conn| {
            let read = |row: &rusqlite::Row<'_>| -> rusqlite::Result<StoredRow> {
                Ok(StoredRow {
                    format: row.get(0)?,
                    path: row.get(1)?,
                    fingerprint: row.get(2)?,
                    size_bytes: row.get(3)?,
                    focus: row.get(4)?,
                    skipped: row.get(5)?,
                    timestamp_adjustments: row.get(6)?,
                    records: row.get(7)?,
                    saved_at: row.get(8)?,
                })
            };
            match fingerprint {
                Some(fp) => conn.query_row(&sql, params![fp], read),
                None => conn.query_row(&sql, [], read),
            }
            .optional()
            .map_err(SessionError::from)
        })?;

        let Some(row) = row else {
            return Ok(None);
        };
        row.decode().map(Some)
    }

    /// Mark the snapshot for `fingerprint` active. Returns `false` when no
    /// such snapshot is stored.
    pub fn activate(&self, fingerprint: &str) -> Result<bool, SessionError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let stored: bool = tx
                .query_row(
                    "SELECT 1 FROM capture_snapshots WHERE fingerprint = ?1",
                    params![fingerprint],
                    |_| Ok(true),
                )
                .optional()?
                .unwrap_or(false);
            if stored {
                tx.execute(
                    "UPDATE capture_snapshots SET active = (fingerprint = ?1)",
                    params![fingerprint],
                )?;
            }
            tx.commit()?;
            Ok(stored)
        })
    }

    /// Update the focus stored for `fingerprint` without rewriting its
    /// records. Returns `false` when no such snapshot is stored.
    pub fn set_focus(
        &self,
        fingerprint: &str,
        focus: Option<&str>,
    ) -> Result<bool, SessionError> {
        let changed = self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE capture_snapshots SET focus = ?2 WHERE fingerprint = ?1",
                params![fingerprint, focus],
            )?)
        })?;
        Ok(changed > 0)
    }

    /// Fingerprint of the active snapshot, without decoding its records.
    pub fn stored_fingerprint(&self) -> Result<Option<String>, SessionError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT fingerprint FROM capture_snapshots WHERE active = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(SessionError::from)
        })
    }

    /// Delete the active snapshot. Snapshots of other captures stay
    /// available to `load_fingerprint`. A missing snapshot is not an error.
    pub fn clear(&self) -> Result<(), SessionError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM capture_snapshots WHERE active = 1", [])?;
            Ok(())
        })?;
        debug!("Snapshot cleared");
        Ok(())
    }

    /// Number of stored snapshots, active or not.
    pub fn len(&self) -> Result<usize, SessionError> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM capture_snapshots", [], |row| row.get(0))?;
            Ok(count.max(0) as usize)
        })
    }

    pub fn is_empty(&self) -> Result<bool, SessionError> {
        Ok(self.len()? == 0)
    }
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("location", &self.location)
            .finish()
    }
}

fn create_schema(conn: &Connection) -> Result<(), SessionError> {
    conn.execute_batch(
        "DROP TABLE IF EXISTS session_snapshot;
         CREATE TABLE IF NOT EXISTS capture_snapshots (
            fingerprint            TEXT PRIMARY KEY,
            format                 INTEGER NOT NULL,
            path                   TEXT NOT NULL,
            size_bytes             INTEGER NOT NULL,
            focus                  TEXT,
            skipped                INTEGER NOT NULL DEFAULT 0,
            timestamp_adjustments  INTEGER NOT NULL DEFAULT 0,
            records                TEXT NOT NULL,
            saved_at               TEXT NOT NULL,
            active                 INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_capture_snapshots_active
            ON capture_snapshots(active);",
    )
    .map_err(|e| SessionError::Storage(format!("Failed to create snapshot table: {}", e)))
}

struct StoredRow {
    format: i64,
    path: String,
    fingerprint: String,
    size_bytes: i64,
    focus: Option<String>,
    skipped: i64,
    timestamp_adjustments: i64,
    records: String,
    saved_at: String,
}

impl StoredRow {
    fn decode(self) -> Result<SessionSnapshot, SessionError> {
        if self.format != SNAPSHOT_FORMAT {
            return Err(SessionError::SnapshotStaleOrCorrupt(format!(
                "unsupported snapshot format {}",
                self.format
            )));
        }
        let records: Vec<PacketRecord> = serde_json::from_str(&self.records).map_err(|e| {
            SessionError::SnapshotStaleOrCorrupt(format!("records do not decode: {}", e))
        })?;
        let saved_at = DateTime::parse_from_rfc3339(&self.saved_at)
            .map_err(|e| SessionError::SnapshotStaleOrCorrupt(format!("bad saved_at: {}", e)))?
            .with_timezone(&Utc);
        Ok(SessionSnapshot {
            identity: CaptureIdentity {
                path: PathBuf::from(self.path),
                fingerprint: self.fingerprint,
                size_bytes: self.size_bytes.max(0) as u64,
            },
            focus: self.focus,
            records,
            skipped: self.skipped.max(0) as usize,
            timestamp_adjustments: self.timestamp_adjustments.max(0) as usize,
            saved_at,
        })
    }
}
