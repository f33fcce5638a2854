//! Locating the active transcript for an agent.
//!
//! Directory layout (host-owned, read-only here):
//! ```text
//! sessions_dir/
//!   sessions.json          index: sessionKey -> { sessionId, ... }
//!   3f2a….jsonl            one turn log per session
//!   9c41….jsonl
//! ```

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Extension of turn log files.
const TRANSCRIPT_EXTENSION: &str = "jsonl";

/// Session index file. Lists sessions, holds no turns.
pub const SESSION_INDEX_FILE: &str = "sessions.json";

/// File stem shared by the index and any line-delimited export of it.
const SESSION_INDEX_STEM: &str = "sessions";

/// Whether `path` names a turn log rather than the index or another file.
fn is_transcript(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == TRANSCRIPT_EXTENSION)
        && path
            .file_stem()
            .is_some_and(|stem| stem != SESSION_INDEX_STEM)
}

/// Find the transcript most likely to be active in `sessions_dir`.
///
/// When `session_key` maps to a session id through the index and that
/// session's turn log exists, it is returned. Otherwise the most recently
/// modified turn log wins. A missing directory or one without turn logs
/// yields `Ok(None)`.
pub fn locate_transcript(
    sessions_dir: &Path,
    session_key: Option<&str>,
) -> Result<Option<PathBuf>, String> {
    if !sessions_dir.is_dir() {
        return Ok(None);
    }

    if let Some(key) = session_key
        && let Some(path) = transcript_for_session_key(sessions_dir, key)
    {
        debug!("[compaction-recovery] session {key} -> {}", path.display());
        return Ok(Some(path));
    }

    most_recent_transcript(sessions_dir)
}

/// The turn log with the latest modification time.
pub fn most_recent_transcript(sessions_dir: &Path) -> Result<Option<PathBuf>, String> {
    let entries = std::fs::read_dir(sessions_dir)
        .map_err(|e| format!("Failed to read sessions dir {}: {e}", sessions_dir.display()))?;

    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry.map_err(|e| format!("Failed to read entry: {e}"))?;
        let path = entry.path();
        if !entry.file_type().is_ok_and(|ft| ft.is_file()) || !is_transcript(&path) {
            continue;
        }
        // Files removed or unreadable mid-scan are simply not candidates.
        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        if latest.as_ref().is_none_or(|(t, _)| modified > *t) {
            latest = Some((modified, path));
        }
    }

    Ok(latest.map(|(_, path)| path))
}

/// Resolve `session_key` through the session index.
///
/// Any problem with the index (missing, malformed, unknown key, stale id)
/// yields `None` so the caller falls back to modification time.
fn transcript_for_session_key(sessions_dir: &Path, session_key: &str) -> Option<PathBuf> {
    let json = std::fs::read_to_string(sessions_dir.join(SESSION_INDEX_FILE)).ok()?;
    let index: Value = serde_json::from_str(&json).ok()?;
    let session_id = index
        .get(session_key)?
        .get("sessionId")?
        .as_str()
        .filter(|id| !id.is_empty() && !id.contains(['/', '\\']))?;
    let path = sessions_dir.join(format!("{session_id}.{TRANSCRIPT_EXTENSION}"));
    path.is_file().then_some(path)
}
