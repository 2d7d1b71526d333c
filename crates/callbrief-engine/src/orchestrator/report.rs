//! What a run did, item by item.

use serde::Serialize;

use callbrief_gateway_api::{StorageLocation, SynthesisResult};

use super::state::Stage;

/// Terminal status of one work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// A new record was appended this run
    Summarized,
    /// A record for this item already existed
    AlreadyPresent,
    /// The call has no content to summarize
    Skipped,
    /// Retries were exhausted or the failure was permanent
    Unresolved { error: String },
    Cancelled,
}

impl ItemOutcome {
    /// Whether the item has a record in the document after this run.
    #[must_use]
    pub fn has_summary(&self) -> bool {
        matches!(self, Self::Summarized | Self::AlreadyPresent)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    pub item_id: String,
    pub title: String,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub account: String,
    pub location: StorageLocation,
    /// Matching calls found before truncation to `max_items`
    pub total_matches: usize,
    pub items: Vec<ItemReport>,
    /// Records fed to synthesis (includes history from earlier runs)
    pub reduced: usize,
    pub malformed: usize,
    /// `None` when synthesis was skipped because nothing changed
    pub synthesis: Option<SynthesisResult>,
    pub stages: Vec<Stage>,
}

impl RunReport {
    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.outcome)).count()
    }

    #[must_use]
    pub fn summarized(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Summarized))
    }

    #[must_use]
    pub fn already_present(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::AlreadyPresent))
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Skipped))
    }

    #[must_use]
    pub fn unresolved(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Unresolved { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_outcome_serializes_flat() {
        let item = ItemReport {
            item_id: "42".into(),
            title: "Demo".into(),
            outcome: ItemOutcome::Unresolved {
                error: "timed out".into(),
            },
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["status"], "unresolved");
        assert_eq!(json["error"], "timed out");
        assert_eq!(json["item_id"], "42");
    }

    #[test]
    fn test_has_summary() {
        assert!(ItemOutcome::Summarized.has_summary());
        assert!(ItemOutcome::AlreadyPresent.has_summary());
        assert!(!ItemOutcome::Skipped.has_summary());
        assert!(!ItemOutcome::Cancelled.has_summary());
    }
}
