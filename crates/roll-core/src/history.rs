//! Roll history entry types and rendering.
//!
//! The log itself lives in the daemon; this module only defines the
//! immutable entry value and how a sequence of entries becomes the
//! newline-delimited display body.

use crate::roll::RollMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Line returned for an empty history.
///
/// Clients expect an explicit placeholder, never an empty body.
pub const EMPTY_HISTORY_PLACEHOLDER: &str = "No rolls recorded yet.";

/// One recorded roll, immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When the roll was evaluated.
    pub timestamp: DateTime<Utc>,
    /// The expression as the caller submitted it.
    pub prompt: String,
    /// Mode the roll was made under.
    pub mode: RollMode,
    /// The formatted single-line result.
    pub result: String,
}

impl HistoryEntry {
    /// Creates an entry stamped with the current time.
    ///
    /// Newlines in the prompt or result are replaced with spaces:
    /// newline is the entry delimiter and must never appear inside
    /// one.
    pub fn new(prompt: impl Into<String>, mode: RollMode, result: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            prompt: flatten_newlines(prompt.into()),
            mode,
            result: flatten_newlines(result.into()),
        }
    }

    /// The display line for this entry.
    pub fn display_line(&self) -> &str {
        &self.result
    }
}

fn flatten_newlines(s: String) -> String {
    if s.contains(['\n', '\r']) {
        s.replace(['\n', '\r'], " ")
    } else {
        s
    }
}

/// Renders entries into the newline-delimited history body, oldest
/// first. An empty slice yields [`EMPTY_HISTORY_PLACEHOLDER`].
pub fn render_history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return EMPTY_HISTORY_PLACEHOLDER.to_string();
    }

    entries
        .iter()
        .map(HistoryEntry::display_line)
        .collect::<Vec<_>>()
        .join("\n")
}
