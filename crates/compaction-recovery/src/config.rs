//! Configuration for the compaction recovery hook.
//!
//! The host keeps one global JSON configuration document. This crate reads
//! two places in it, once, when the hook is registered:
//!
//! ```json
//! {
//!   "agents": { "defaults": { "workspace": "/home/me/agent-workspace" } },
//!   "plugins": {
//!     "entries": {
//!       "compaction-recovery": {
//!         "config": { "messageCount": 20, "maxCharsPerMessage": 500 }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Every field is optional. Missing or invalid values fall back to the
//! defaults below, and the resolved [`RecoveryConfig`] is then passed by
//! value into the hook.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Key of this hook's options block under `plugins.entries`.
pub const PLUGIN_ID: &str = "compaction-recovery";

/// Default number of turns kept in the snapshot.
pub const DEFAULT_MESSAGE_COUNT: usize = 20;

/// Default per-turn character limit.
pub const DEFAULT_MAX_CHARS_PER_MESSAGE: usize = 500;

/// Agent whose sessions are read when the invocation names none.
pub const DEFAULT_AGENT_ID: &str = "main";

/// Host state directory name under `$HOME`.
const STATE_DIR_NAME: &str = ".openclaw";

/// Resolved configuration for [`CompactionRecovery`](crate::hooks::CompactionRecovery).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryConfig {
    /// Number of most recent turns kept in the snapshot. Default: `20`.
    pub message_count: usize,
    /// Per-turn truncation limit, in characters. Default: `500`.
    pub max_chars_per_message: usize,
    /// Workspace used when the invocation context carries none.
    pub default_workspace: Option<PathBuf>,
    /// Host state directory containing `agents/<id>/sessions/`.
    pub state_dir: PathBuf,
    /// Agent used when the invocation context carries none. Default: `"main"`.
    pub agent_id: String,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            message_count: DEFAULT_MESSAGE_COUNT,
            max_chars_per_message: DEFAULT_MAX_CHARS_PER_MESSAGE,
            default_workspace: None,
            state_dir: default_state_dir(),
            agent_id: DEFAULT_AGENT_ID.to_string(),
        }
    }
}

impl RecoveryConfig {
    /// Resolve configuration from the host's global configuration document.
    pub fn from_global(global: &Value) -> Self {
        let options = global
            .get("plugins")
            .and_then(|p| p.get("entries"))
            .and_then(|e| e.get(PLUGIN_ID))
            .and_then(|entry| entry.get("config"));

        let message_count = positive_field(options, "messageCount").unwrap_or_else(|reason| {
            if let Some(reason) = reason {
                warn!("[compaction-recovery] {reason}; using default {DEFAULT_MESSAGE_COUNT}");
            }
            DEFAULT_MESSAGE_COUNT
        });
        let max_chars_per_message = positive_field(options, "maxCharsPerMessage")
            .unwrap_or_else(|reason| {
                if let Some(reason) = reason {
                    warn!(
                        "[compaction-recovery] {reason}; using default {DEFAULT_MAX_CHARS_PER_MESSAGE}"
                    );
                }
                DEFAULT_MAX_CHARS_PER_MESSAGE
            });

        let default_workspace = global
            .get("agents")
            .and_then(|a| a.get("defaults"))
            .and_then(|d| d.get("workspace"))
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(expand_home);

        Self {
            message_count,
            max_chars_per_message,
            default_workspace,
            ..Self::default()
        }
    }

    /// Load the global configuration file at `path` and resolve it.
    ///
    /// A missing file yields defaults. An unreadable or unparseable file is
    /// logged and also yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!("Failed to read config {}: {e}", path.display());
                return Self::default();
            }
        };
        match serde_json::from_str::<Value>(&contents) {
            Ok(global) => Self::from_global(&global),
            Err(e) => {
                warn!("Failed to parse config {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn with_message_count(mut self, count: usize) -> Self {
        self.message_count = count;
        self
    }

    pub fn with_max_chars_per_message(mut self, max: usize) -> Self {
        self.max_chars_per_message = max;
        self
    }

    pub fn with_default_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.default_workspace = Some(workspace.into());
        self
    }

    pub fn with_state_dir(mut self, state_dir: impl Into<PathBuf>) -> Self {
        self.state_dir = state_dir.into();
        self
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    /// Session storage area for `agent_id`.
    pub fn sessions_dir(&self, agent_id: &str) -> PathBuf {
        self.state_dir.join("agents").join(agent_id).join("sessions")
    }

    /// Workspace used when neither the context nor the config names one.
    pub fn fallback_workspace(&self) -> PathBuf {
        self.state_dir.join("workspace")
    }

    /// Path of the global configuration file inside the state directory.
    pub fn global_config_path(state_dir: &Path) -> PathBuf {
        state_dir.join("openclaw.json")
    }
}

/// Read a strictly positive integer field.
///
/// `Err(None)` means the field is absent; `Err(Some(reason))` means it is
/// present but unusable.
fn positive_field(options: Option<&Value>, key: &str) -> Result<usize, Option<String>> {
    let value = options.and_then(|o| o.get(key)).ok_or(None)?;
    if value.is_null() {
        return Err(None);
    }
    match value.as_u64() {
        Some(n) if n > 0 => usize::try_from(n).map_err(|_| Some(format!("{key} is too large"))),
        _ => Err(Some(format!("{key} must be a positive integer, got {value}"))),
    }
}

/// `$HOME/.openclaw`, or a relative `.openclaw` when `HOME` is unset.
pub fn default_state_dir() -> PathBuf {
    match home_dir() {
        Some(home) => home.join(STATE_DIR_NAME),
        None => PathBuf::from(STATE_DIR_NAME),
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Expand a leading `~/` against `$HOME`.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}
