//! Restrict R065 rows to the business-configured set of validation messages.

use tracing::debug;

use crate::config::{FilterConfig, MessageMatch};
use crate::header::normalize_label;
use crate::model::R065Record;

/// Normalized `{code: include}` table plus the comparison mode.
#[derive(Debug, Clone)]
pub struct AllowList {
    mode: MessageMatch,
    entries: Vec<(String, bool)>,
}

impl AllowList {
    pub fn new(mode: MessageMatch, entries: impl IntoIterator<Item = (String, bool)>) -> Self {
        let mut entries: Vec<(String, bool)> = entries
            .into_iter()
            .map(|(code, include)| (normalize_message(&code), include))
            .collect();
        // Longest code first, so prefix lookups hit the most specific entry.
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        entries.dedup_by(|a, b| a.0 == b.0);
        Self { mode, entries }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(
            config.mode,
            config.messages.iter().map(|(code, include)| (code.clone(), *include)),
        )
    }

    /// Whether `message` is allow-listed. Under prefix matching the longest
    /// matching code decides.
    pub fn allows(&self, message: &str) -> bool {
        let message = normalize_message(message);
        self.entries
            .iter()
            .find(|(code, _)| message_matches(self.mode, &message, code))
            .map_or(false, |(_, include)| *include)
    }
}

/// Messages compare like header labels: trimmed, whitespace-collapsed, case-folded.
pub fn normalize_message(s: &str) -> String {
    normalize_label(s)
}

/// Compare an already-normalized message against an already-normalized pattern.
pub(crate) fn message_matches(mode: MessageMatch, message: &str, pattern: &str) -> bool {
    match mode {
        MessageMatch::Exact => message == pattern,
        MessageMatch::Prefix => message.starts_with(pattern),
    }
}

/// Keep the rows whose message is allow-listed, preserving order.
pub fn filter_messages(rows: Vec<R065Record>, allow: &AllowList) -> Vec<R065Record> {
    let before = rows.len();
    let kept: Vec<R065Record> = rows.into_iter().filter(|r| allow.allows(&r.message)).collect();
    debug!(kept = kept.len(), dropped = before - kept.len(), "message filter applied");
    kept
}
