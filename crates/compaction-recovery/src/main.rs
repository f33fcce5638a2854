//! Drive the compaction recovery hooks from the command line.
//!
//! The host runs one subcommand per lifecycle event. The event payload, if
//! any, is read as JSON from stdin. Results go to stdout as JSON, logs go
//! to stderr.
//!
//! # Examples
//!
//! ```sh
//! # Before compaction: snapshot the recent turns
//! echo '{"tokenCount": 180000}' | compaction-recovery \
//!   --agent-id main --workspace ~/ws before-compaction
//!
//! # Before the next agent turn: prints {"prependContext": "..."} or {}
//! compaction-recovery --workspace ~/ws before-agent-start < /dev/null
//!
//! # Is a recovery waiting?
//! compaction-recovery --workspace ~/ws status
//! ```

use clap::{Parser, Subcommand};
use compaction_recovery::config::{RecoveryConfig, default_state_dir};
use compaction_recovery::prelude::*;
use serde_json::Value;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::process;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Snapshot recent turns before compaction and restore them afterwards.
#[derive(Parser)]
#[command(name = "compaction-recovery")]
struct Cli {
    /// Host state directory (holds agents/<id>/sessions and the global config)
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Global JSON config file (default: <state-dir>/openclaw.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Agent whose transcript is captured
    #[arg(long, global = true)]
    agent_id: Option<String>,

    /// Session key used to resolve the transcript through the session index
    #[arg(long, global = true)]
    session_key: Option<String>,

    /// Workspace holding RECENT.md and the pending marker
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Capture the most recent turns (run before compaction)
    BeforeCompaction,
    /// Inject a pending snapshot (run before the agent's next turn)
    BeforeAgentStart,
    /// Report whether a snapshot is waiting to be injected
    Status,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let state_dir = cli.state_dir.clone().unwrap_or_else(default_state_dir);
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| RecoveryConfig::global_config_path(&state_dir));
    let config = RecoveryConfig::load(&config_path).with_state_dir(&state_dir);

    let ctx = HookContext {
        agent_id: cli.agent_id,
        session_key: cli.session_key,
        workspace_dir: cli.workspace,
    };
    let hook = CompactionRecovery::new(config);

    match cli.command {
        Command::BeforeCompaction => {
            let payload = read_payload();
            dispatch(&hook, HookEvent::BeforeCompaction { payload: &payload }, &ctx);
        }
        Command::BeforeAgentStart => {
            let payload = read_payload();
            let result = dispatch(&hook, HookEvent::BeforeAgentStart { payload: &payload }, &ctx)
                .unwrap_or_default();
            print_json(&result);
        }
        Command::Status => {
            let store = hook.store(&ctx);
            let pending_since = store.pending_since().unwrap_or_else(|e| {
                warn!("{e}");
                None
            });
            print_json(&serde_json::json!({
                "workspace": store.workspace(),
                "snapshot": store.snapshot_path(),
                "snapshotExists": store.snapshot_path().is_file(),
                "pending": pending_since.is_some(),
                "pendingSince": pending_since,
            }));
        }
    }
}

/// Event payload from stdin. Absent, empty or invalid input yields `null`.
fn read_payload() -> Value {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Value::Null;
    }
    let mut input = String::new();
    if let Err(e) = stdin.lock().read_to_string(&mut input) {
        warn!("Failed to read event payload: {e}");
        return Value::Null;
    }
    if input.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&input).unwrap_or_else(|e| {
        warn!("Ignoring unparseable event payload: {e}");
        Value::Null
    })
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: failed to serialize result: {e}");
            process::exit(1);
        }
    }
}
