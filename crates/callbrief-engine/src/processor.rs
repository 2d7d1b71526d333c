//! Per-item processing: fetch content, summarize, append once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::SecondsFormat;
use tracing::{debug, info};

use callbrief_gateway_api::document::{contains_record, is_valid_record_key, render_record};
use callbrief_gateway_api::{
    GatewayError, ItemSummary, SearchGateway, StorageLocation, StoreGateway, SynthesisGateway,
    WorkItem,
};

use crate::retry::{RetryPolicy, with_timeout};

/// What a single successful attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Appended,
    /// A record for the item was already in the document
    AlreadyPresent,
    /// The call has no transcript
    NoContent,
}

/// Runs one attempt of check, fetch, summarize and append for a work item.
///
/// The attempt is idempotent: repeating it after any failure, or after a
/// crash, never produces a second record for the same item.
#[derive(Clone)]
pub struct ItemProcessor {
    search: Arc<dyn SearchGateway>,
    synthesis: Arc<dyn SynthesisGateway>,
    store: Arc<dyn StoreGateway>,
    call_timeout: Duration,
}

impl ItemProcessor {
    pub fn new(
        search: Arc<dyn SearchGateway>,
        synthesis: Arc<dyn SynthesisGateway>,
        store: Arc<dyn StoreGateway>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            search,
            synthesis,
            store,
            call_timeout,
        }
    }

    /// One attempt on its own.
    ///
    /// # Errors
    ///
    /// Any gateway failure. Transient ones may be retried by the caller.
    pub async fn process(
        &self,
        item: &WorkItem,
        location: &StorageLocation,
    ) -> Result<ProcessOutcome, GatewayError> {
        self.attempt(item, location, &AtomicBool::new(false)).await
    }

    /// Attempts under `retry`. A record found after an earlier attempt's
    /// append timed out was written by this item's own append, so it is
    /// reported as [`ProcessOutcome::Appended`].
    ///
    /// # Errors
    ///
    /// The last failure once retries are exhausted or the error is permanent.
    pub async fn process_with_retry(
        &self,
        item: &WorkItem,
        location: &StorageLocation,
        retry: RetryPolicy,
    ) -> Result<ProcessOutcome, GatewayError> {
        let append_sent = AtomicBool::new(false);
        retry
            .run("process_call", || self.attempt(item, location, &append_sent))
            .await
    }

    async fn attempt(
        &self,
        item: &WorkItem,
        location: &StorageLocation,
        append_sent: &AtomicBool,
    ) -> Result<ProcessOutcome, GatewayError> {
        if !is_valid_record_key(&item.id) {
            return Err(GatewayError::InvalidResponse(format!(
                "call id '{}' cannot be used as a record key",
                item.id
            )));
        }
        let timeout = self.call_timeout;

        let doc = with_timeout("read", timeout, self.store.read(location)).await?;
        if contains_record(&doc, &item.id) {
            if append_sent.load(Ordering::Acquire) {
                info!(item_id = %item.id, "Append from an earlier attempt landed");
                return Ok(ProcessOutcome::Appended);
            }
            debug!(item_id = %item.id, "Record already present");
            return Ok(ProcessOutcome::AlreadyPresent);
        }

        let content = with_timeout("get_content", timeout, self.search.get_content(&item.id)).await?;
        let Some(content) = content.filter(|text| !text.trim().is_empty()) else {
            info!(item_id = %item.id, "No transcript, skipping");
            return Ok(ProcessOutcome::NoContent);
        };

        let body = with_timeout(
            "summarize",
            timeout,
            self.synthesis.summarize(&summary_input(item, &content)),
        )
        .await?;

        let record = render_record(&ItemSummary::for_item(item, body.trim()));
        let resent = append_sent.swap(true, Ordering::AcqRel);
        let written = with_timeout(
            "append_if_absent",
            timeout,
            self.store.append_if_absent(location, &item.id, &record),
        )
        .await?;

        if written {
            info!(item_id = %item.id, "Appended summary");
            Ok(ProcessOutcome::Appended)
        } else if resent {
            info!(item_id = %item.id, "Append from an earlier attempt landed");
            Ok(ProcessOutcome::Appended)
        } else {
            // Another writer got there between the check and the append
            debug!(item_id = %item.id, "Record appeared during processing");
            Ok(ProcessOutcome::AlreadyPresent)
        }
    }
}

/// Transcript prefixed with the call's metadata, so the summary can refer
/// to who was there and when.
fn summary_input(item: &WorkItem, content: &str) -> String {
    let mut input = format!(
        "Title: {}\nDate: {}\n",
        item.title,
        item.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    if !item.participants.is_empty() {
        input.push_str(&format!("Participants: {}\n", item.participants.join(", ")));
    }
    input.push('\n');
    input.push_str(content);
    input
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ContentScript, ScriptedSearch, ScriptedSynthesis, work_item};
    use callbrief_gateway_api::document::parse_records;
    use callbrief_store::MemoryDocumentStore;
    use chrono::{TimeZone, Utc};

    struct Fixture {
        search: Arc<ScriptedSearch>,
        synthesis: Arc<ScriptedSynthesis>,
        store: Arc<MemoryDocumentStore>,
        processor: ItemProcessor,
        location: StorageLocation,
    }

    async fn fixture(search: ScriptedSearch) -> Fixture {
        let search = Arc::new(search);
        let synthesis = Arc::new(ScriptedSynthesis::new());
        let store = Arc::new(MemoryDocumentStore::new());
        let location = store.resolve_or_create("Foo Inc").await.unwrap();
        let processor = ItemProcessor::new(
            search.clone(),
            synthesis.clone(),
            store.clone(),
            Duration::from_secs(5),
        );
        Fixture {
            search,
            synthesis,
            store,
            processor,
            location,
        }
    }

    fn item(id: &str) -> WorkItem {
        work_item(id, Utc.with_ymd_and_hms(2026, 5, 4, 16, 0, 0).unwrap(), "Foo <> Us")
    }

    #[tokio::test]
    async fn test_appends_summary_with_metadata() {
        let f = fixture(ScriptedSearch::new(vec![]).with_content("c1", ContentScript::text("We talked pricing"))).await;

        let outcome = f.processor.process(&item("c1"), &f.location).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::Appended);
        let doc = f.store.document("Foo Inc").unwrap();
        let scan = parse_records(&doc);
        assert_eq!(scan.records.len(), 1);
        assert_eq!(scan.records[0].summary.item_id, "c1");
        assert!(scan.records[0].summary.body.contains("We talked pricing"));
        let prompt = &f.synthesis.summarize_inputs()[0];
        assert!(prompt.starts_with("Title: Foo <> Us\nDate: 2026-05-04T16:00:00Z\n"));
    }

    #[tokio::test]
    async fn test_second_attempt_is_a_no_op() {
        let f = fixture(ScriptedSearch::new(vec![]).with_content("c1", ContentScript::text("x"))).await;

        f.processor.process(&item("c1"), &f.location).await.unwrap();
        let again = f.processor.process(&item("c1"), &f.location).await.unwrap();

        assert_eq!(again, ProcessOutcome::AlreadyPresent);
        assert_eq!(f.store.write_count(), 1);
        assert_eq!(f.search.content_calls("c1"), 1);
    }

    #[tokio::test]
    async fn test_missing_content_is_skipped() {
        let f = fixture(
            ScriptedSearch::new(vec![])
                .with_content("none", ContentScript::Missing)
                .with_content("blank", ContentScript::text("  \n")),
        )
        .await;

        for id in ["none", "blank"] {
            let outcome = f.processor.process(&item(id), &f.location).await.unwrap();
            assert_eq!(outcome, ProcessOutcome::NoContent);
        }
        assert_eq!(f.store.write_count(), 0);
        assert!(f.synthesis.summarize_inputs().is_empty());
    }

    #[tokio::test]
    async fn test_unusable_id_is_rejected_before_any_call() {
        let f = fixture(ScriptedSearch::new(vec![])).await;

        let err = f.processor.process(&item("a|b"), &f.location).await.unwrap_err();

        assert!(matches!(err, GatewayError::InvalidResponse(_)));
        assert!(!err.is_transient());
        assert_eq!(f.search.content_calls("a|b"), 0);
    }

    #[tokio::test]
    async fn test_transient_fetch_error_is_returned() {
        let f = fixture(ScriptedSearch::new(vec![]).with_content("c1", ContentScript::FailTimes(1, "x".into()))).await;

        let err = f.processor.process(&item("c1"), &f.location).await.unwrap_err();
        assert!(err.is_transient());

        let retried = f.processor.process(&item("c1"), &f.location).await.unwrap();
        assert_eq!(retried, ProcessOutcome::Appended);
    }

    /// Writes the record, then stalls past the call timeout on its first append.
    struct StallingAppendStore {
        inner: MemoryDocumentStore,
        stalled: AtomicBool,
    }

    #[async_trait::async_trait]
    impl StoreGateway for StallingAppendStore {
        async fn candidates(&self, account: &str) -> Result<Vec<String>, GatewayError> {
            self.inner.candidates(account).await
        }

        async fn resolve_or_create(&self, account: &str) -> Result<StorageLocation, GatewayError> {
            self.inner.resolve_or_create(account).await
        }

        async fn read(&self, location: &StorageLocation) -> Result<String, GatewayError> {
            self.inner.read(location).await
        }

        async fn append_if_absent(
            &self,
            location: &StorageLocation,
            record_key: &str,
            record_text: &str,
        ) -> Result<bool, GatewayError> {
            let written = self.inner.append_if_absent(location, record_key, record_text).await?;
            if !self.stalled.swap(true, Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
            Ok(written)
        }

        async fn replace_section(
            &self,
            location: &StorageLocation,
            section_key: &str,
            new_text: &str,
        ) -> Result<(), GatewayError> {
            self.inner.replace_section(location, section_key, new_text).await
        }
    }

    #[tokio::test]
    async fn test_timed_out_append_that_landed_counts_as_appended() {
        let store = Arc::new(StallingAppendStore {
            inner: MemoryDocumentStore::new(),
            stalled: AtomicBool::new(false),
        });
        let location = store.resolve_or_create("Foo Inc").await.unwrap();
        let search = Arc::new(ScriptedSearch::new(vec![]).with_content("c1", ContentScript::text("x")));
        let processor = ItemProcessor::new(
            search.clone(),
            Arc::new(ScriptedSynthesis::new()),
            store.clone(),
            Duration::from_millis(100),
        );
        let retry = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(10),
        };

        let outcome = processor
            .process_with_retry(&item("c1"), &location, retry)
            .await
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::Appended);
        let doc = store.inner.document("Foo Inc").unwrap();
        assert_eq!(parse_records(&doc).records.len(), 1);
        assert_eq!(search.content_calls("c1"), 1);

        // A later run still sees it as already present
        let again = processor
            .process_with_retry(&item("c1"), &location, retry)
            .await
            .unwrap();
        assert_eq!(again, ProcessOutcome::AlreadyPresent);
    }
}
