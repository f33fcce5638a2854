//! Host lifecycle hooks and the compaction recovery hook.
//!
//! The host fires two events this crate cares about:
//!
//! 1. **before compaction** — [`LifecycleHook::before_compaction`]. The
//!    [`CompactionRecovery`] hook locates the active transcript, extracts the
//!    last turns and writes the snapshot plus the pending marker.
//! 2. **before agent start** — [`LifecycleHook::before_agent_start`]. If the
//!    marker is set, it is consumed and the snapshot is returned as
//!    `prependContext` for the agent's next turn.
//!
//! Both entry points are best-effort: every failure is logged here and
//! turned into the no-op result, so the host's compaction or turn always
//! proceeds.

use crate::config::RecoveryConfig;
use crate::recovery::{CaptureOutcome, RecoveryStore};
use crate::transcript::{extract_recent_turns, locate_transcript};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

// ── Context and results ────────────────────────────────────────────

/// Invocation context supplied by the host with each event.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HookContext {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub session_key: Option<String>,
    #[serde(default)]
    pub workspace_dir: Option<PathBuf>,
}

/// Result of the before-agent-start event.
///
/// `prepend_context` is `None` when nothing was injected.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentStartResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepend_context: Option<String>,
}

impl AgentStartResult {
    pub fn prepend(text: String) -> Self {
        Self {
            prepend_context: Some(text),
        }
    }
}

// ── LifecycleHook trait ────────────────────────────────────────────

/// Typed host lifecycle hook. All methods default to no-ops.
pub trait LifecycleHook: Send + Sync {
    /// Called right before the host compacts the conversation.
    fn before_compaction(&self, _event: &Value, _ctx: &HookContext) {}

    /// Called before the agent's next turn starts.
    fn before_agent_start(&self, _event: &Value, _ctx: &HookContext) -> AgentStartResult {
        AgentStartResult::default()
    }
}

/// Host events routed to a [`LifecycleHook`].
#[derive(Debug, Clone, Copy)]
pub enum HookEvent<'a> {
    BeforeCompaction { payload: &'a Value },
    BeforeAgentStart { payload: &'a Value },
}

impl HookEvent<'_> {
    /// Host-facing event name.
    pub fn name(&self) -> &'static str {
        match self {
            HookEvent::BeforeCompaction { .. } => "before_compaction",
            HookEvent::BeforeAgentStart { .. } => "before_agent_start",
        }
    }
}

/// Route `event` to the matching hook method.
///
/// Returns `Some` only for events that produce a result for the host.
pub fn dispatch(
    hook: &dyn LifecycleHook,
    event: HookEvent<'_>,
    ctx: &HookContext,
) -> Option<AgentStartResult> {
    debug!("[compaction-recovery] dispatching {}", event.name());
    match event {
        HookEvent::BeforeCompaction { payload } => {
            hook.before_compaction(payload, ctx);
            None
        }
        HookEvent::BeforeAgentStart { payload } => Some(hook.before_agent_start(payload, ctx)),
    }
}

// ── CompactionRecovery ─────────────────────────────────────────────

/// Captures recent turns before compaction and re-injects them once afterwards.
#[derive(Debug, Clone)]
pub struct CompactionRecovery {
    config: RecoveryConfig,
}

impl CompactionRecovery {
    pub fn new(config: RecoveryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Workspace for `ctx`: the context's own, then the configured default,
    /// then the state directory's `workspace/`.
    pub fn resolve_workspace(&self, ctx: &HookContext) -> PathBuf {
        ctx.workspace_dir
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(|| self.config.default_workspace.clone())
            .unwrap_or_else(|| self.config.fallback_workspace())
    }

    pub fn resolve_agent_id<'a>(&'a self, ctx: &'a HookContext) -> &'a str {
        ctx.agent_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(self.config.agent_id.as_str())
    }

    pub fn store(&self, ctx: &HookContext) -> RecoveryStore {
        RecoveryStore::new(self.resolve_workspace(ctx))
    }

    /// Locate, extract and store the most recent turns.
    ///
    /// A `sessionFile` in the event payload names the transcript directly;
    /// otherwise it is located in the agent's session directory.
    pub fn capture(&self, event: &Value, ctx: &HookContext) -> Result<CaptureOutcome, String> {
        let transcript = match event.get("sessionFile").and_then(Value::as_str) {
            Some(file) if !file.is_empty() => Some(PathBuf::from(file)),
            _ => {
                let sessions_dir = self.config.sessions_dir(self.resolve_agent_id(ctx));
                let found = locate_transcript(&sessions_dir, ctx.session_key.as_deref())?;
                if found.is_none() {
                    warn!(
                        "[compaction-recovery] no transcript found in {}",
                        sessions_dir.display()
                    );
                }
                found
            }
        };
        let Some(transcript) = transcript else {
            return Ok(CaptureOutcome::Skipped);
        };

        let turns = extract_recent_turns(
            &transcript,
            self.config.message_count,
            self.config.max_chars_per_message,
        )?;
        if turns.is_empty() {
            info!(
                "[compaction-recovery] nothing to capture in {}",
                transcript.display()
            );
            return Ok(CaptureOutcome::Skipped);
        }

        self.store(ctx).capture(&turns)
    }

    /// Consume a pending snapshot for `ctx`, if any.
    pub fn inject(&self, ctx: &HookContext) -> Result<Option<String>, String> {
        self.store(ctx).take_pending()
    }
}

impl LifecycleHook for CompactionRecovery {
    fn before_compaction(&self, event: &Value, ctx: &HookContext) {
        match self.capture(event, ctx) {
            Ok(CaptureOutcome::Written { turns }) => info!(
                "[compaction-recovery] saved {turns} messages to {}",
                self.store(ctx).snapshot_path().display()
            ),
            Ok(CaptureOutcome::Skipped) => {}
            Err(e) => error!("[compaction-recovery] capture failed: {e}"),
        }
    }

    fn before_agent_start(&self, _event: &Value, ctx: &HookContext) -> AgentStartResult {
        match self.inject(ctx) {
            Ok(Some(text)) => {
                info!(
                    "[compaction-recovery] injecting recovered context ({} chars)",
                    text.chars().count()
                );
                AgentStartResult::prepend(text)
            }
            Ok(None) => AgentStartResult::default(),
            Err(e) => {
                error!("[compaction-recovery] inject failed: {e}");
                AgentStartResult::default()
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
