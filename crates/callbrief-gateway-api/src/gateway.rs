//! The three collaborators the orchestrator depends on.
//!
//! Implementations are constructed explicitly and passed into the engine as
//! `Arc<dyn ...>`; nothing here holds process-wide state.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::GatewayError;
use crate::model::{Classification, StorageLocation, SynthesisResult, TimeWindow, WorkItem};

/// Lists calls for an account and fetches their raw content.
#[async_trait]
pub trait SearchGateway: Send + Sync {
    /// Calls for `account` inside `window`, optionally restricted to calls
    /// hosted by the users in `team_filter`.
    async fn list_items(
        &self,
        account: &str,
        window: TimeWindow,
        team_filter: Option<&[String]>,
    ) -> Result<Vec<WorkItem>, GatewayError>;

    /// Raw content (transcript) of a call. `Ok(None)` means the call exists
    /// but has no content to summarize.
    async fn get_content(&self, item_id: &str) -> Result<Option<String>, GatewayError>;
}

/// Stateless text-to-text operations backed by a language model.
#[async_trait]
pub trait SynthesisGateway: Send + Sync {
    /// Short narrative summary of a single call.
    async fn summarize(&self, text: &str) -> Result<String, GatewayError>;

    /// Structured synthesis over all summaries, oldest first, as of `today`.
    async fn synthesize(
        &self,
        account: &str,
        ordered_texts: &[String],
        today: NaiveDate,
    ) -> Result<SynthesisResult, GatewayError>;

    /// Pick which of `candidates` (account folder names) `query` refers to.
    async fn classify(
        &self,
        candidates: &[String],
        query: &str,
    ) -> Result<Classification, GatewayError>;

    /// Indices of the `candidates` that actually involve the account `query`.
    ///
    /// The default keeps every candidate.
    async fn filter_items(
        &self,
        candidates: &[WorkItem],
        _query: &str,
    ) -> Result<Vec<usize>, GatewayError> {
        Ok((0..candidates.len()).collect())
    }
}

/// Typed access to account documents. No business logic lives behind this.
#[async_trait]
pub trait StoreGateway: Send + Sync {
    /// Names of existing account folders that could match `account`.
    async fn candidates(&self, account: &str) -> Result<Vec<String>, GatewayError>;

    /// Location for `account`, created on first use. Repeated calls with the
    /// same (normalized) name return the same location.
    async fn resolve_or_create(&self, account: &str) -> Result<StorageLocation, GatewayError>;

    /// Full document text; empty when the document does not exist yet.
    async fn read(&self, location: &StorageLocation) -> Result<String, GatewayError>;

    /// Append `record_text` unless a record for `record_key` is already
    /// present. Returns whether anything was written.
    async fn append_if_absent(
        &self,
        location: &StorageLocation,
        record_key: &str,
        record_text: &str,
    ) -> Result<bool, GatewayError>;

    /// Replace the section `section_key` in place, or prepend it when absent.
    async fn replace_section(
        &self,
        location: &StorageLocation,
        section_key: &str,
        new_text: &str,
    ) -> Result<(), GatewayError>;
}
