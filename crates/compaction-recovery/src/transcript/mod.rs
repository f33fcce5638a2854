//! Reading host transcripts: finding the active one and pulling recent turns.
//!
//! - [`locator`] — picks the active turn log in an agent's session directory.
//! - [`record`] — typed view of a single transcript line.
//! - [`extract`] — last-N turn selection and per-turn truncation.

pub mod extract;
pub mod locator;
pub mod record;

pub use extract::{
    Role, TRUNCATION_MARKER, Turn, extract_recent_turns, select_recent_turns, truncate_text,
};
pub use locator::{SESSION_INDEX_FILE, locate_transcript};
pub use record::{ContentBlock, MessageContent, TranscriptRecord};
