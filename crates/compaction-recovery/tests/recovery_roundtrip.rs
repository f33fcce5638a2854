//! End-to-end tests for capture before compaction and injection afterwards.
//!
//! Each test lays out a host state directory with an agent session log in a
//! temp dir and drives the public hook API against it.

use compaction_recovery::prelude::*;
use compaction_recovery::recovery::{
    MARKER_FILE, RECOVERED_CLOSE_TAG, RECOVERED_OPEN_TAG, SNAPSHOT_FILE,
};
use compaction_recovery::transcript::TRUNCATION_MARKER;
use serde_json::{Value, json};
use std::path::PathBuf;

struct Host {
    _dir: tempfile::TempDir,
    state_dir: PathBuf,
    workspace: PathBuf,
}

impl Host {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().join("state");
        let workspace = dir.path().join("workspace");
        Self {
            _dir: dir,
            state_dir,
            workspace,
        }
    }

    fn sessions_dir(&self) -> PathBuf {
        self.state_dir.join("agents").join("main").join("sessions")
    }

    fn write_session(&self, name: &str, lines: &[String]) -> PathBuf {
        let dir = self.sessions_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, lines.join("\n") + "\n").unwrap();
        path
    }

    fn hook(&self, config: RecoveryConfig) -> CompactionRecovery {
        CompactionRecovery::new(config.with_state_dir(&self.state_dir))
    }

    fn ctx(&self) -> HookContext {
        HookContext {
            agent_id: Some("main".into()),
            session_key: Some("agent:main:main".into()),
            workspace_dir: Some(self.workspace.clone()),
        }
    }

    fn snapshot(&self) -> String {
        std::fs::read_to_string(self.workspace.join(SNAPSHOT_FILE)).unwrap()
    }
}

fn turn_line(i: usize, text: &str) -> String {
    let role = if i % 2 == 0 { "user" } else { "assistant" };
    json!({
        "type": "message",
        "message": { "role": role, "content": [{ "type": "text", "text": text }] }
    })
    .to_string()
}

fn count_turns(doc: &str) -> usize {
    doc.lines()
        .filter(|l| l.starts_with("**user**: ") || l.starts_with("**assistant**: "))
        .count()
}

#[test]
fn twenty_five_short_turns_keeps_last_twenty_verbatim() {
    let host = Host::new();
    let lines: Vec<String> = (0..25).map(|i| turn_line(i, &format!("turn-{i:04}"))).collect();
    host.write_session("s.jsonl", &lines);

    let hook = host.hook(RecoveryConfig::default());
    hook.before_compaction(&Value::Null, &host.ctx());

    let doc = host.snapshot();
    assert_eq!(count_turns(&doc), 20);
    assert!(doc.contains("_Last 20 messages before compaction._"));
    assert!(!doc.contains("turn-0004"));
    assert!(doc.contains("**assistant**: turn-0005\n"));
    assert!(doc.contains("**user**: turn-0024\n"));
    assert!(!doc.contains(TRUNCATION_MARKER));

    let first = doc.find("turn-0005").unwrap();
    let last = doc.find("turn-0024").unwrap();
    assert!(first < last);
}

#[test]
fn six_hundred_char_turn_is_cut_to_five_hundred() {
    let host = Host::new();
    let long: String = ('a'..='z').cycle().take(600).collect();
    host.write_session("s.jsonl", &[turn_line(0, &long)]);

    let hook = host.hook(RecoveryConfig::default().with_max_chars_per_message(500));
    hook.before_compaction(&Value::Null, &host.ctx());

    let doc = host.snapshot();
    let expected: String = long.chars().take(500).collect();
    assert!(doc.contains(&format!("**user**: {expected}{TRUNCATION_MARKER}\n")));
    assert!(!doc.contains(&long));
}

#[test]
fn missing_transcript_dir_leaves_state_untouched() {
    let host = Host::new();
    let hook = host.hook(RecoveryConfig::default());

    hook.before_compaction(&Value::Null, &host.ctx());

    assert!(!host.workspace.join(SNAPSHOT_FILE).exists());
    assert!(!host.workspace.join(MARKER_FILE).exists());
    let result = hook.before_agent_start(&Value::Null, &host.ctx());
    assert!(result.prepend_context.is_none());
}

#[test]
fn round_trip_injects_exactly_once() {
    let host = Host::new();
    let lines = vec![
        turn_line(0, "Give me three refactors"),
        turn_line(1, "1. split parser 2. cache lookups 3. drop clones"),
        turn_line(2, "Do all three"),
    ];
    host.write_session("s.jsonl", &lines);
    let hook = host.hook(RecoveryConfig::default());

    hook.before_compaction(&json!({ "tokenCount": 190_000 }), &host.ctx());
    assert!(host.workspace.join(MARKER_FILE).exists());

    let first = hook.before_agent_start(&Value::Null, &host.ctx());
    let text = first.prepend_context.expect("snapshot should be injected");
    assert!(text.starts_with(RECOVERED_OPEN_TAG));
    assert!(text.ends_with(RECOVERED_CLOSE_TAG));
    assert!(text.contains("**user**: Give me three refactors"));
    assert!(text.contains("**assistant**: 1. split parser 2. cache lookups 3. drop clones"));
    assert!(text.contains("**user**: Do all three"));

    let second = hook.before_agent_start(&Value::Null, &host.ctx());
    assert!(second.prepend_context.is_none());
    // Snapshot stays on disk after consumption.
    assert!(host.workspace.join(SNAPSHOT_FILE).exists());
}

#[test]
fn inject_without_capture_returns_nothing() {
    let host = Host::new();
    std::fs::create_dir_all(&host.workspace).unwrap();
    std::fs::write(host.workspace.join(SNAPSHOT_FILE), "# Recent Messages\n\n**user**: old\n")
        .unwrap();
    let hook = host.hook(RecoveryConfig::default());

    let result = hook.before_agent_start(&Value::Null, &host.ctx());
    assert!(result.prepend_context.is_none());
}

#[test]
fn capture_without_qualifying_turns_sets_no_marker() {
    let host = Host::new();
    host.write_session(
        "s.jsonl",
        &[
            json!({ "type": "session", "version": 3 }).to_string(),
            json!({ "role": "toolResult", "content": "ok" }).to_string(),
            json!({ "role": "assistant", "content": [{ "type": "toolCall", "name": "ls" }] })
                .to_string(),
        ],
    );
    let hook = host.hook(RecoveryConfig::default());

    hook.before_compaction(&Value::Null, &host.ctx());

    assert!(!host.workspace.join(MARKER_FILE).exists());
    let result = hook.before_agent_start(&Value::Null, &host.ctx());
    assert!(result.prepend_context.is_none());
}

#[test]
fn corrupt_line_does_not_reduce_turn_count() {
    let host = Host::new();
    let mut lines: Vec<String> = (0..6).map(|i| turn_line(i, &format!("ok-{i}"))).collect();
    lines.insert(3, "{\"type\":\"message\",\"message\":{\"role\":".to_string());
    host.write_session("s.jsonl", &lines);

    let hook = host.hook(RecoveryConfig::default());
    hook.before_compaction(&Value::Null, &host.ctx());

    assert_eq!(count_turns(&host.snapshot()), 6);
}

#[test]
fn window_size_bounds_snapshot() {
    let host = Host::new();
    let lines: Vec<String> = (0..10).map(|i| turn_line(i, &format!("w-{i}"))).collect();
    host.write_session("s.jsonl", &lines);

    let hook = host.hook(RecoveryConfig::default().with_message_count(3));
    hook.before_compaction(&Value::Null, &host.ctx());

    let doc = host.snapshot();
    assert_eq!(count_turns(&doc), 3);
    assert!(doc.contains("w-7") && doc.contains("w-8") && doc.contains("w-9"));
    assert!(!doc.contains("w-6"));
}

#[test]
fn second_compaction_before_injection_refreshes_snapshot() {
    let host = Host::new();
    let path = host.write_session("s.jsonl", &[turn_line(0, "first round")]);
    let hook = host.hook(RecoveryConfig::default().with_message_count(1));

    hook.before_compaction(&Value::Null, &host.ctx());
    std::fs::write(&path, turn_line(1, "second round") + "\n").unwrap();
    hook.before_compaction(&Value::Null, &host.ctx());

    let text = hook
        .before_agent_start(&Value::Null, &host.ctx())
        .prepend_context
        .unwrap();
    assert!(text.contains("second round"));
    assert!(!text.contains("first round"));
    assert!(
        hook.before_agent_start(&Value::Null, &host.ctx())
            .prepend_context
            .is_none()
    );
}

#[test]
fn config_file_drives_window_and_default_workspace() {
    let host = Host::new();
    let lines: Vec<String> = (0..5).map(|i| turn_line(i, &format!("c-{i}"))).collect();
    host.write_session("s.jsonl", &lines);

    let config_path = host.state_dir.join("openclaw.json");
    std::fs::write(
        &config_path,
        json!({
            "agents": { "defaults": { "workspace": host.workspace } },
            "plugins": { "entries": { "compaction-recovery": {
                "config": { "messageCount": 2, "maxCharsPerMessage": 2 }
            }}}
        })
        .to_string(),
    )
    .unwrap();

    let hook = host.hook(RecoveryConfig::load(&config_path));
    let ctx = HookContext::default();
    hook.before_compaction(&Value::Null, &ctx);

    let doc = host.snapshot();
    assert_eq!(count_turns(&doc), 2);
    assert!(doc.contains("**assistant**: c-...\n"));
    assert!(doc.contains("**user**: c-...\n"));
    assert!(
        hook.before_agent_start(&Value::Null, &ctx)
            .prepend_context
            .is_some()
    );
}

#[test]
fn dispatch_drives_both_phases() {
    let host = Host::new();
    host.write_session("s.jsonl", &[turn_line(0, "via dispatch")]);
    let hook = host.hook(RecoveryConfig::default());
    let payload = Value::Null;

    let none = dispatch(&hook, HookEvent::BeforeCompaction { payload: &payload }, &host.ctx());
    assert!(none.is_none());

    let result = dispatch(&hook, HookEvent::BeforeAgentStart { payload: &payload }, &host.ctx())
        .unwrap();
    assert!(result.prepend_context.unwrap().contains("via dispatch"));
}
