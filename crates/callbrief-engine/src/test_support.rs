//! Scripted gateways for exercising the engine without network access.
//!
//! Enabled for unit tests and, through the `test-utils` feature, for the
//! integration tests of dependent crates.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use callbrief_gateway_api::document::parse_records;
use callbrief_gateway_api::{
    CallHistoryEntry, Classification, GatewayError, SearchGateway, SynthesisGateway,
    SynthesisResult, TimeWindow, WorkItem, normalize_name,
};

/// A work item with one external participant.
pub fn work_item(id: &str, timestamp: DateTime<Utc>, title: &str) -> WorkItem {
    WorkItem {
        id: id.to_string(),
        timestamp,
        title: title.to_string(),
        participants: vec!["Ann Lee <ann@customer.com>".to_string()],
    }
}

/// How `get_content` answers for one item.
#[derive(Debug, Clone)]
pub enum ContentScript {
    Text(String),
    /// The call exists but has no transcript
    Missing,
    /// Fail transiently this many times, then return the text
    FailTimes(u32, String),
    /// Fail every time with this error
    Fail(GatewayError),
}

impl ContentScript {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Search gateway over a fixed set of calls.
///
/// Items without a content script get a transcript derived from their title.
#[derive(Debug, Default)]
pub struct ScriptedSearch {
    items: Vec<WorkItem>,
    every_window: bool,
    list_failure: Option<GatewayError>,
    content_delay: Option<Duration>,
    scripts: Mutex<HashMap<String, ContentScript>>,
    content_calls: Mutex<HashMap<String, u32>>,
    list_calls: AtomicU32,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedSearch {
    pub fn new(items: Vec<WorkItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// Return every item from every window, ignoring timestamps.
    #[must_use]
    pub fn repeat_in_every_window(mut self) -> Self {
        self.every_window = true;
        self
    }

    #[must_use]
    pub fn fail_listing(mut self, err: GatewayError) -> Self {
        self.list_failure = Some(err);
        self
    }

    #[must_use]
    pub fn with_content(self, item_id: &str, script: ContentScript) -> Self {
        lock(&self.scripts).insert(item_id.to_string(), script);
        self
    }

    /// Delay every `get_content` call.
    #[must_use]
    pub fn with_content_delay(mut self, delay: Duration) -> Self {
        self.content_delay = Some(delay);
        self
    }

    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn content_calls(&self, item_id: &str) -> u32 {
        lock(&self.content_calls).get(item_id).copied().unwrap_or(0)
    }

    /// Highest number of concurrent `get_content` calls observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn next_content(&self, item_id: &str) -> Result<Option<String>, GatewayError> {
        *lock(&self.content_calls)
            .entry(item_id.to_string())
            .or_default() += 1;

        let mut scripts = lock(&self.scripts);
        match scripts.get_mut(item_id) {
            None => Ok(self
                .items
                .iter()
                .find(|i| i.id == item_id)
                .map(|i| format!("Transcript of {}", i.title))),
            Some(ContentScript::Text(text)) => Ok(Some(text.clone())),
            Some(ContentScript::Missing) => Ok(None),
            Some(ContentScript::FailTimes(remaining, text)) => {
                if *remaining == 0 {
                    Ok(Some(text.clone()))
                } else {
                    *remaining -= 1;
                    Err(GatewayError::Unavailable(format!(
                        "transcript service busy for {item_id}"
                    )))
                }
            }
            Some(ContentScript::Fail(err)) => Err(err.clone()),
        }
    }
}

#[async_trait]
impl SearchGateway for ScriptedSearch {
    async fn list_items(
        &self,
        _account: &str,
        window: TimeWindow,
        _team_filter: Option<&[String]>,
    ) -> Result<Vec<WorkItem>, GatewayError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.list_failure {
            return Err(err.clone());
        }
        Ok(self
            .items
            .iter()
            .filter(|i| self.every_window || (window.start <= i.timestamp && i.timestamp < window.end))
            .cloned()
            .collect())
    }

    async fn get_content(&self, item_id: &str) -> Result<Option<String>, GatewayError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.content_delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.next_content(item_id);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Synthesis gateway that echoes its input and records every call.
#[derive(Debug, Default)]
pub struct ScriptedSynthesis {
    classification: Option<Classification>,
    keep_titles: Option<String>,
    synthesis_failures: Mutex<Option<(u32, GatewayError)>>,
    summarize_inputs: Mutex<Vec<String>>,
    synthesize_inputs: Mutex<Vec<Vec<String>>>,
    synthesize_dates: Mutex<Vec<NaiveDate>>,
}

impl ScriptedSynthesis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every `classify` call with `classification`. Without this,
    /// an exact normalized match is chosen and anything else is no match.
    #[must_use]
    pub fn classify_as(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    /// Keep only items whose title contains `needle`.
    #[must_use]
    pub fn keep_titles_containing(mut self, needle: &str) -> Self {
        self.keep_titles = Some(needle.to_string());
        self
    }

    /// Fail the next `times` synthesize calls with `err`.
    #[must_use]
    pub fn fail_synthesis(self, times: u32, err: GatewayError) -> Self {
        *lock(&self.synthesis_failures) = Some((times, err));
        self
    }

    pub fn summarize_inputs(&self) -> Vec<String> {
        lock(&self.summarize_inputs).clone()
    }

    /// Ordered texts of every synthesize call, oldest call first.
    pub fn synthesize_inputs(&self) -> Vec<Vec<String>> {
        lock(&self.synthesize_inputs).clone()
    }

    /// The `today` passed to each synthesize call.
    pub fn synthesize_dates(&self) -> Vec<NaiveDate> {
        lock(&self.synthesize_dates).clone()
    }

    /// Item ids in the order the last synthesize call received them.
    pub fn last_synthesized_ids(&self) -> Vec<String> {
        lock(&self.synthesize_inputs)
            .last()
            .map(|texts| {
                texts
                    .iter()
                    .flat_map(|t| parse_records(t).records)
                    .map(|r| r.summary.item_id)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl SynthesisGateway for ScriptedSynthesis {
    async fn summarize(&self, text: &str) -> Result<String, GatewayError> {
        lock(&self.summarize_inputs).push(text.to_string());
        let transcript = text.split_once("\n\n").map_or(text, |(_, rest)| rest);
        Ok(format!("Summary: {transcript}"))
    }

    async fn synthesize(
        &self,
        account: &str,
        ordered_texts: &[String],
        today: NaiveDate,
    ) -> Result<SynthesisResult, GatewayError> {
        lock(&self.synthesize_inputs).push(ordered_texts.to_vec());
        lock(&self.synthesize_dates).push(today);

        if let Some((remaining, err)) = lock(&self.synthesis_failures).as_mut() {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(err.clone());
            }
        }

        let item_index = ordered_texts
            .iter()
            .flat_map(|t| parse_records(t).records)
            .map(|r| CallHistoryEntry {
                date: r.summary.timestamp.format("%Y-%m-%d").to_string(),
                kind: "Sync".to_string(),
                one_sentence: r.summary.title,
            })
            .collect();

        Ok(SynthesisResult {
            current_state: vec![format!("{account}: {} calls reviewed", ordered_texts.len())],
            blockers: Vec::new(),
            next_actions: vec!["Send follow-up".to_string()],
            risks: Vec::new(),
            item_index,
        })
    }

    async fn classify(
        &self,
        candidates: &[String],
        query: &str,
    ) -> Result<Classification, GatewayError> {
        if let Some(fixed) = &self.classification {
            return Ok(fixed.clone());
        }
        let wanted = normalize_name(query);
        Ok(candidates
            .iter()
            .position(|c| normalize_name(c) == wanted)
            .map_or(Classification::NoMatch, Classification::Chosen))
    }

    async fn filter_items(
        &self,
        candidates: &[WorkItem],
        _query: &str,
    ) -> Result<Vec<usize>, GatewayError> {
        Ok(candidates
            .iter()
            .enumerate()
            .filter(|(_, item)| {
                self.keep_titles
                    .as_deref()
                    .is_none_or(|needle| item.title.contains(needle))
            })
            .map(|(i, _)| i)
            .collect())
    }
}
