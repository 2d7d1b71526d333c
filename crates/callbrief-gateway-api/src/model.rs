use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// One call discovered for an account. Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Opaque, unique within an account and stable across runs
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub participants: Vec<String>,
}

/// Summary of one work item as persisted in the account document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub item_id: String,
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub participants: Vec<String>,
    pub body: String,
}

impl ItemSummary {
    #[must_use]
    pub fn for_item(item: &WorkItem, body: impl Into<String>) -> Self {
        Self {
            item_id: item.id.clone(),
            timestamp: item.timestamp,
            title: item.title.clone(),
            participants: item.participants.clone(),
            body: body.into(),
        }
    }
}

/// Half-open search window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Where an account's documents live in the store.
///
/// `key` is the normalized account name and is what makes resolution
/// idempotent; `reference` is store specific (a directory path, a map key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageLocation {
    pub account: String,
    pub key: String,
    pub reference: String,
}

/// Outcome of the semantic account classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Index into the candidate list
    Chosen(usize),
    /// Several candidates are plausible; indices into the candidate list
    Ambiguous(Vec<usize>),
    NoMatch,
}

/// One line of the call history section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallHistoryEntry {
    pub date: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub one_sentence: String,
}

/// Cross-call synthesis with a fixed set of sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisResult {
    #[serde(rename = "quick_context")]
    pub current_state: Vec<String>,
    #[serde(rename = "blocking_progress")]
    pub blockers: Vec<String>,
    pub next_actions: Vec<String>,
    pub risks: Vec<String>,
    #[serde(rename = "call_history")]
    pub item_index: Vec<CallHistoryEntry>,
}

impl SynthesisResult {
    /// Reject results that parsed but carry no usable content.
    pub fn validate(&self) -> Result<(), String> {
        if self.current_state.iter().all(|line| line.trim().is_empty()) {
            return Err("quick_context is empty".to_string());
        }
        if let Some(entry) = self
            .item_index
            .iter()
            .find(|e| e.date.trim().is_empty() || e.one_sentence.trim().is_empty())
        {
            return Err(format!("call_history entry is incomplete: {entry:?}"));
        }
        Ok(())
    }
}

/// Canonical form of an account or folder name used for matching.
///
/// NFKC-normalized, lowercased, alphanumerics only.
///
/// ```rust
/// use callbrief_gateway_api::normalize_name;
///
/// assert_eq!(normalize_name("Foo Inc."), normalize_name("foo inc"));
/// assert_ne!(normalize_name("Acme Corp"), normalize_name("acme.io"));
/// ```
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.nfkc()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect()
}
