//! Durable recovery state for one workspace: the snapshot and the pending marker.
//!
//! Capture writes `RECENT.md` and then `.compaction-recovery-pending`. The
//! next [`RecoveryStore::take_pending`] deletes the marker first and only
//! then reads the snapshot, so a snapshot is injected at most once per
//! capture. The snapshot itself stays on disk until the next capture
//! overwrites it.
//!
//! ```text
//! ABSENT  --capture(non-empty)--> PRESENT --take_pending--> ABSENT
//! ABSENT  --capture(empty)------> ABSENT
//! PRESENT --capture(any)--------> PRESENT   (snapshot refreshed)
//! ```

use crate::transcript::Turn;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, warn};

/// Snapshot file name, relative to the workspace.
pub const SNAPSHOT_FILE: &str = "RECENT.md";

/// Pending-recovery marker file name, relative to the workspace.
pub const MARKER_FILE: &str = ".compaction-recovery-pending";

/// Opening tag around injected context.
pub const RECOVERED_OPEN_TAG: &str = "<recovered-context>";

/// Closing tag around injected context.
pub const RECOVERED_CLOSE_TAG: &str = "</recovered-context>";

/// Result of [`RecoveryStore::capture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Snapshot and marker were written.
    Written { turns: usize },
    /// Nothing to capture; no file was touched.
    Skipped,
}

/// Render the snapshot document for `turns` (oldest first).
pub fn render_snapshot(turns: &[Turn]) -> String {
    let mut doc = format!(
        "# Recent Messages\n\n_Last {} messages before compaction._\n",
        turns.len()
    );
    for turn in turns {
        doc.push_str(&format!("\n**{}**: {}\n", turn.role, turn.text));
    }
    doc
}

/// Wrap snapshot text in the recovered-context tags.
pub fn wrap_recovered(snapshot: &str) -> String {
    format!(
        "{RECOVERED_OPEN_TAG}\n{}\n{RECOVERED_CLOSE_TAG}",
        snapshot.trim_end()
    )
}

/// Snapshot and marker storage bound to one workspace directory.
#[derive(Debug, Clone)]
pub struct RecoveryStore {
    workspace: PathBuf,
}

impl RecoveryStore {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.workspace.join(SNAPSHOT_FILE)
    }

    pub fn marker_path(&self) -> PathBuf {
        self.workspace.join(MARKER_FILE)
    }

    /// Whether a captured snapshot is waiting to be injected.
    pub fn is_pending(&self) -> bool {
        self.marker_path().is_file()
    }

    /// Timestamp stored in the marker, if one is pending.
    pub fn pending_since(&self) -> Result<Option<String>, String> {
        match std::fs::read_to_string(self.marker_path()) {
            Ok(ts) => Ok(Some(ts.trim().to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(format!("Failed to read recovery marker: {e}")),
        }
    }

    /// Write the snapshot for `turns`, then set the marker.
    ///
    /// An empty `turns` slice writes nothing and leaves the marker as it was.
    pub fn capture(&self, turns: &[Turn]) -> Result<CaptureOutcome, String> {
        if turns.is_empty() {
            return Ok(CaptureOutcome::Skipped);
        }

        let lock = workspace_lock(&self.workspace);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        std::fs::create_dir_all(&self.workspace)
            .map_err(|e| format!("Failed to create workspace dir: {e}"))?;

        write_atomic(&self.snapshot_path(), &render_snapshot(turns))
            .map_err(|e| format!("Failed to write snapshot: {e}"))?;
        let stamp = chrono::Utc::now().to_rfc3339();
        write_atomic(&self.marker_path(), &stamp)
            .map_err(|e| format!("Failed to write recovery marker: {e}"))?;

        debug!(
            "[compaction-recovery] wrote {} turns to {}",
            turns.len(),
            self.snapshot_path().display()
        );
        Ok(CaptureOutcome::Written { turns: turns.len() })
    }

    /// Consume the marker and return the wrapped snapshot.
    ///
    /// Returns `Ok(None)` when no marker is set. The marker is removed before
    /// the snapshot is read and is not restored if the read fails.
    pub fn take_pending(&self) -> Result<Option<String>, String> {
        let lock = workspace_lock(&self.workspace);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        match std::fs::remove_file(self.marker_path()) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(format!("Failed to remove recovery marker: {e}")),
        }

        let snapshot = match std::fs::read_to_string(self.snapshot_path()) {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    "[compaction-recovery] marker was set but {} is missing",
                    self.snapshot_path().display()
                );
                return Ok(None);
            }
            Err(e) => return Err(format!("Failed to read snapshot: {e}")),
        };

        if snapshot.trim().is_empty() {
            warn!("[compaction-recovery] marker was set but snapshot is empty");
            return Ok(None);
        }

        Ok(Some(wrap_recovered(&snapshot)))
    }
}

/// Temp file in the same directory, then rename into place.
fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{name}.tmp"));
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)
}

/// Process-wide mutex for `workspace`, serializing capture and consume.
fn workspace_lock(workspace: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
    let mut table = LOCKS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    table.entry(workspace.to_path_buf()).or_default().clone()
}

// ── Tests ──────────────────────────────────────────────────────────
