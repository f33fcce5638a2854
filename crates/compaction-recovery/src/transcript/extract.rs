//! Selection of the most recent user/assistant turns from a transcript.

use super::record::TranscriptRecord;
use std::collections::VecDeque;
use std::fmt;
use std::path::Path;

/// Appended to a turn whose text was cut at the character limit.
pub const TRUNCATION_MARKER: &str = "...";

/// Role of a captured turn. Other transcript roles are never captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role-tagged message, with text already truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// Cut `text` to its first `max_chars` characters, appending
/// [`TRUNCATION_MARKER`] when anything was removed.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().nth(max_chars).is_none() {
        return text.to_string();
    }
    let mut s: String = text.chars().take(max_chars).collect();
    s.push_str(TRUNCATION_MARKER);
    s
}

/// Parse one transcript line into a qualifying turn.
///
/// Returns `None` for unparseable lines, other roles, and records whose
/// text is empty.
fn parse_turn(line: &str, max_chars: usize) -> Option<Turn> {
    let record = TranscriptRecord::parse(line)?;
    let role = Role::parse(record.role()?)?;
    let text = record.text();
    if text.is_empty() {
        return None;
    }
    Some(Turn::new(role, truncate_text(&text, max_chars)))
}

/// Keep the last `count` qualifying turns of `lines`, oldest first.
///
/// Malformed lines are skipped without logging.
pub fn select_recent_turns<'a>(
    lines: impl IntoIterator<Item = &'a str>,
    count: usize,
    max_chars: usize,
) -> Vec<Turn> {
    if count == 0 {
        return Vec::new();
    }
    let mut window: VecDeque<Turn> = VecDeque::with_capacity(count);
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(turn) = parse_turn(line, max_chars) {
            if window.len() == count {
                window.pop_front();
            }
            window.push_back(turn);
        }
    }
    window.into()
}

/// Read the transcript at `path` and return its last `count` turns.
///
/// An empty result means the transcript holds nothing worth capturing; it
/// is not an error.
pub fn extract_recent_turns(
    path: &Path,
    count: usize,
    max_chars: usize,
) -> Result<Vec<Turn>, String> {
    let bytes = std::fs::read(path)
        .map_err(|e| format!("Failed to read transcript {}: {e}", path.display()))?;
    // Invalid UTF-8 only ever damages the lines it touches.
    let contents = String::from_utf8_lossy(&bytes);
    Ok(select_recent_turns(contents.lines(), count, max_chars))
}
