//! Typed view of one transcript line.
//!
//! The host writes one JSON object per line. Conversation records come in
//! two shapes, flat and wrapped:
//!
//! ```text
//! {"role":"user","content":"hello"}
//! {"type":"message","message":{"role":"assistant","content":[{"type":"text","text":"hi"}]}}
//! ```
//!
//! Anything else (session headers, tool results, custom entries) still parses
//! but yields no role this crate cares about.

use serde::Deserialize;

/// Content of a message: a plain string or a list of typed blocks.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// One typed content block. Only `text` blocks contribute to a turn.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ContentBlock {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl ContentBlock {
    pub fn is_text(&self) -> bool {
        self.kind == "text"
    }
}

impl MessageContent {
    /// Text of this content: the string itself, or all text blocks joined
    /// with newlines in order. Non-text blocks are ignored.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter(|b| b.is_text())
                .filter_map(|b| b.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
struct MessageBody {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<MessageContent>,
}

/// A parsed transcript line.
#[derive(Deserialize, Debug, Default)]
pub struct TranscriptRecord {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<MessageContent>,
    #[serde(default)]
    message: Option<MessageBody>,
}

impl TranscriptRecord {
    /// Parse one line. Returns `None` for anything that is not a JSON object
    /// of a recognizable shape.
    pub fn parse(line: &str) -> Option<Self> {
        serde_json::from_str(line).ok()
    }

    /// Role of the record, preferring the wrapped message over flat fields.
    pub fn role(&self) -> Option<&str> {
        self.message
            .as_ref()
            .and_then(|m| m.role.as_deref())
            .or(self.role.as_deref())
    }

    pub fn content(&self) -> Option<&MessageContent> {
        self.message
            .as_ref()
            .and_then(|m| m.content.as_ref())
            .or(self.content.as_ref())
    }

    /// Extracted text, empty when the record carries no content.
    pub fn text(&self) -> String {
        self.content().map(MessageContent::text).unwrap_or_default()
    }
}
