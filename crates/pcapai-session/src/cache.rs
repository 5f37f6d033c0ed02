//! Single-slot session cache.
//!
//! Lifecycle operations (`load`, `clear`, `restore`, `set_focus`) take
//! `&mut self`, so they can never interleave with a query holding a shared
//! borrow. Queries work on an `Arc<CaptureSession>` whose records are never
//! mutated.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use pcapai_core::{CaptureIdentity, PacketRecord};
use pcapai_protocol::{ingest, PluginRegistry};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::fingerprint::capture_identity;
use crate::parser::CaptureParser;
use crate::snapshot::{SessionSnapshot, SnapshotStore};

/// One parsed capture and its optional protocol focus.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    identity: CaptureIdentity,
    focus: Option<String>,
    records: Arc<Vec<PacketRecord>>,
    skipped: usize,
    timestamp_adjustments: usize,
    created_at: DateTime<Utc>,
}

impl CaptureSession {
    pub fn new(identity: CaptureIdentity, records: Vec<PacketRecord>) -> Self {
        Self {
            identity,
            focus: None,
            records: Arc::new(records),
            skipped: 0,
            timestamp_adjustments: 0,
            created_at: Utc::now(),
        }
    }

    pub fn identity(&self) -> &CaptureIdentity {
        &self.identity
    }

    pub fn focus(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    pub fn records(&self) -> &[PacketRecord] {
        &self.records
    }

    /// Raw events rejected during ingestion.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn timestamp_adjustments(&self) -> usize {
        self.timestamp_adjustments
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// A copy sharing the same records with a different focus.
    pub fn with_focus(&self, focus: Option<String>) -> Self {
        Self {
            focus,
            ..self.clone()
        }
    }

    fn to_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            identity: self.identity.clone(),
            focus: self.focus.clone(),
            records: self.records.as_ref().clone(),
            skipped: self.skipped,
            timestamp_adjustments: self.timestamp_adjustments,
            saved_at: Utc::now(),
        }
    }

    fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        Self {
            identity: snapshot.identity,
            focus: snapshot.focus,
            records: Arc::new(snapshot.records),
            skipped: snapshot.skipped,
            timestamp_adjustments: snapshot.timestamp_adjustments,
            created_at: snapshot.saved_at,
        }
    }
}

/// Summary of the cache state for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub path: PathBuf,
    pub fingerprint: String,
    pub size_bytes: u64,
    pub records: usize,
    pub skipped: usize,
    pub timestamp_adjustments: usize,
    pub focus: Option<String>,
    pub parse_count: usize,
    pub snapshot_present: bool,
}

/// Owns the single active session.
///
/// With a [`SnapshotStore`] attached, sessions are persisted after every
/// lifecycle change and a capture is parsed at most once per content
/// fingerprint, across loads of other captures and across processes.
/// Without one, only the active capture is remembered.
pub struct SessionCache {
    parser: Box<dyn CaptureParser>,
    registry: PluginRegistry,
    snapshots: Option<SnapshotStore>,
    current: Option<Arc<CaptureSession>>,
    parse_count: usize,
}

impl SessionCache {
    pub fn new(parser: Box<dyn CaptureParser>) -> Self {
        Self {
            parser,
            registry: PluginRegistry::with_builtins(),
            snapshots: None,
            current: None,
            parse_count: 0,
        }
    }

    /// Attach a snapshot store for `persist`/`restore`.
    pub fn with_snapshots(mut self, store: SnapshotStore) -> Self {
        self.snapshots = Some(store);
        self
    }

    /// Make the capture at `path` the active session.
    ///
    /// Returns the cached session when its fingerprint matches, else a
    /// persisted snapshot of the same content, else parses the file. A failure
    /// leaves the previously active session in place.
    pub fn load(&mut self, path: &Path) -> Result<Arc<CaptureSession>, SessionError> {
        let identity = capture_identity(path)?;

        if let Some(current) = &self.current {
            if current.identity.fingerprint == identity.fingerprint {
                info!(fingerprint = %identity.fingerprint, "Session cache hit");
                return Ok(Arc::clone(current));
            }
        }

        if let Some(session) = self.snapshot_for(&identity) {
            info!(
                fingerprint = %identity.fingerprint,
                records = session.records().len(),
                "Session reused from snapshot"
            );
            let session = Arc::new(session);
            self.current = Some(Arc::clone(&session));
            return Ok(session);
        }

        info!(path = %identity.path.display(), "Session cache miss, parsing capture");
        let started = Instant::now();
        let events = self.parser.parse(path)?;
        self.parse_count += 1;
        let report = ingest(events, &self.registry);
        info!(
            records = report.records.len(),
            skipped = report.skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Capture parsed"
        );

        let session = Arc::new(CaptureSession {
            identity,
            focus: None,
            records: Arc::new(report.records),
            skipped: report.skipped,
            timestamp_adjustments: report.timestamp_adjustments,
            created_at: Utc::now(),
        });
        self.current = Some(Arc::clone(&session));
        self.persist_quietly();
        Ok(session)
    }

    /// The active session, if any.
    pub fn current(&self) -> Option<Arc<CaptureSession>> {
        self.current.clone()
    }

    /// Discard the active session and its persisted snapshot.
    pub fn clear(&mut self) -> Result<(), SessionError> {
        if self.current.take().is_some() {
            info!("Session cleared");
        }
        if let Some(store) = &self.snapshots {
            store.clear()?;
        }
        Ok(())
    }

    /// Write the active session to the snapshot store.
    ///
    /// Without a store attached this is a no-op.
    pub fn persist(&self) -> Result<(), SessionError> {
        let session = self.current.as_ref().ok_or(SessionError::NoActiveSession)?;
        match &self.snapshots {
            Some(store) => store.save(&session.to_snapshot()),
            None => {
                debug!("No snapshot store attached, skipping persist");
                Ok(())
            }
        }
    }

    /// Reinstate the persisted session.
    ///
    /// A missing, corrupt or stale snapshot (the file it references is gone
    /// or its content changed) yields `None` and leaves the cache untouched.
    pub fn restore(&mut self) -> Option<Arc<CaptureSession>> {
        let store = self.snapshots.as_ref()?;
        let snapshot = match store.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!("No session snapshot to restore");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable session snapshot");
                return None;
            }
        };

        match capture_identity(&snapshot.identity.path) {
            Ok(identity) if identity.fingerprint == snapshot.identity.fingerprint => {}
            Ok(_) => {
                warn!(
                    path = %snapshot.identity.path.display(),
                    "Session snapshot is stale: capture content changed, reload required"
                );
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Session snapshot is stale: capture unavailable");
                return None;
            }
        }

        info!(
            path = %snapshot.identity.path.display(),
            records = snapshot.records.len(),
            "Session restored from snapshot"
        );
        let session = Arc::new(CaptureSession::from_snapshot(snapshot));
        self.current = Some(Arc::clone(&session));
        Some(session)
    }

    /// Set or clear the protocol focus of the active session.
    pub fn set_focus(&mut self, focus: Option<&str>) -> Result<Arc<CaptureSession>, SessionError> {
        let current = self.current.as_ref().ok_or(SessionError::NoActiveSession)?;
        let focus = focus
            .map(|f| f.trim().to_ascii_lowercase())
            .filter(|f| !f.is_empty() && f != "none");
        let session = Arc::new(current.with_focus(focus));
        info!(focus = ?session.focus(), "Session focus set");
        self.current = Some(Arc::clone(&session));
        if let Some(store) = &self.snapshots {
            match store.set_focus(&session.identity.fingerprint, session.focus()) {
                Ok(true) => {}
                Ok(false) => self.persist_quietly(),
                Err(e) => warn!(error = %e, "Failed to persist session focus"),
            }
        }
        Ok(session)
    }

    /// How many times the external parser has run.
    pub fn parse_count(&self) -> usize {
        self.parse_count
    }

    pub fn info(&self) -> Option<SessionInfo> {
        let session = self.current.as_ref()?;
        let snapshot_present = self
            .snapshots
            .as_ref()
            .and_then(|s| s.stored_fingerprint().ok().flatten())
            .is_some_and(|fp| fp == session.identity.fingerprint);
        Some(SessionInfo {
            path: session.identity.path.clone(),
            fingerprint: session.identity.fingerprint.clone(),
            size_bytes: session.identity.size_bytes,
            records: session.records.len(),
            skipped: session.skipped,
            timestamp_adjustments: session.timestamp_adjustments,
            focus: session.focus.clone(),
            parse_count: self.parse_count,
            snapshot_present,
        })
    }

    /// A stored snapshot holding the same content as `identity`, made the
    /// active one.
    fn snapshot_for(&self, identity: &CaptureIdentity) -> Option<CaptureSession> {
        let store = self.snapshots.as_ref()?;
        let snapshot = match store.load_fingerprint(&identity.fingerprint) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Ignoring corrupt session snapshot");
                return None;
            }
        };
        if let Err(e) = store.activate(&identity.fingerprint) {
            warn!(error = %e, "Failed to mark snapshot active");
        }
        let mut session = CaptureSession::from_snapshot(snapshot);
        session.identity = identity.clone();
        Some(session)
    }

    fn persist_quietly(&self) {
        if self.snapshots.is_none() {
            return;
        }
        if let Err(e) = self.persist() {
            warn!(error = %e, "Failed to persist session snapshot");
        }
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("current", &self.current.as_ref().map(|s| &s.identity))
            .field("parse_count", &self.parse_count)
            .field("snapshots", &self.snapshots)
            .finish()
    }
}
