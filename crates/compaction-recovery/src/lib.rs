//! Recover the last few conversation turns across context compaction.
//!
//! Compaction can drop the newest exchanges before the summary reflects
//! them, leaving the agent unable to resolve references like "all three".
//! This crate closes that gap with a two-phase protocol:
//!
//! 1. **Capture** — right before compaction, the active transcript is
//!    located ([`transcript::locator`]), its last N user/assistant turns are
//!    extracted ([`transcript::extract`]) and written to `RECENT.md` in the
//!    workspace together with a pending marker ([`recovery`]).
//! 2. **Inject** — before the next agent turn, a set marker is consumed and
//!    the snapshot is handed back as context to prepend, exactly once.
//!
//! [`hooks::CompactionRecovery`] wires both phases to the host's lifecycle
//! events; [`config::RecoveryConfig`] holds the resolved options.
//!
//! ```ignore
//! use compaction_recovery::prelude::*;
//!
//! let hook = CompactionRecovery::new(RecoveryConfig::load("/home/me/.openclaw/openclaw.json"));
//! let ctx = HookContext { workspace_dir: Some("/home/me/ws".into()), ..Default::default() };
//!
//! hook.before_compaction(&serde_json::Value::Null, &ctx);
//! let result = hook.before_agent_start(&serde_json::Value::Null, &ctx);
//! if let Some(text) = result.prepend_context {
//!     // prepend `text` to the agent's context
//! }
//! ```

pub mod config;
pub mod hooks;
pub mod recovery;
pub mod transcript;

pub mod prelude {
    pub use crate::config::RecoveryConfig;
    pub use crate::hooks::{
        AgentStartResult, CompactionRecovery, HookContext, HookEvent, LifecycleHook, dispatch,
    };
    pub use crate::recovery::{CaptureOutcome, RecoveryStore};
    pub use crate::transcript::{Role, Turn};
}
