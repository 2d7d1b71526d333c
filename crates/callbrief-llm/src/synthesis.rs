//! [`SynthesisGateway`] backed by an [`LlmBackend`].

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, warn};

use callbrief_gateway_api::{
    Classification, GatewayError, SynthesisGateway, SynthesisResult, WorkItem, normalize_name,
};

use crate::prompts;
use crate::types::{LlmBackend, LlmInvocation, Message};

pub struct LlmSynthesisGateway {
    backend: Arc<dyn LlmBackend>,
    timeout: Duration,
    internal_domain: Option<String>,
}

impl LlmSynthesisGateway {
    pub fn new(backend: Arc<dyn LlmBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            internal_domain: None,
        }
    }

    /// Participants from this email domain are left out of the filter prompt.
    #[must_use]
    pub fn with_internal_domain(mut self, domain: Option<String>) -> Self {
        self.internal_domain = domain;
        self
    }

    async fn ask(
        &self,
        operation: &str,
        prompt: String,
        max_tokens: u32,
    ) -> Result<String, GatewayError> {
        let inv = LlmInvocation::new(operation, "", self.timeout, vec![Message::user(prompt)])
            .with_max_tokens(max_tokens);
        let result = self.backend.invoke(inv).await?;
        debug!(
            operation,
            tokens_input = ?result.tokens_input,
            tokens_output = ?result.tokens_output,
            "LLM call finished"
        );
        Ok(result.raw_response.trim().to_string())
    }
}

#[async_trait]
impl SynthesisGateway for LlmSynthesisGateway {
    async fn summarize(&self, text: &str) -> Result<String, GatewayError> {
        let summary = self
            .ask(
                "summarize",
                prompts::summarize(text),
                prompts::SUMMARIZE_MAX_TOKENS,
            )
            .await?;
        if summary.is_empty() {
            return Err(GatewayError::InvalidResponse(
                "model returned an empty summary".to_string(),
            ));
        }
        Ok(summary)
    }

    async fn synthesize(
        &self,
        account: &str,
        ordered_texts: &[String],
        today: NaiveDate,
    ) -> Result<SynthesisResult, GatewayError> {
        let today = today.format("%Y-%m-%d").to_string();
        let raw = self
            .ask(
                "synthesize",
                prompts::synthesize(account, ordered_texts, &today),
                prompts::SYNTHESIZE_MAX_TOKENS,
            )
            .await?;
        parse_synthesis(&raw)
    }

    async fn classify(
        &self,
        candidates: &[String],
        query: &str,
    ) -> Result<Classification, GatewayError> {
        if candidates.is_empty() {
            return Ok(Classification::NoMatch);
        }
        if let Some(index) = exact_match(candidates, query) {
            debug!(query, candidate = %candidates[index], "Exact name match, skipping model");
            return Ok(Classification::Chosen(index));
        }
        let raw = self
            .ask(
                "classify",
                prompts::classify(candidates, query),
                prompts::CLASSIFY_MAX_TOKENS,
            )
            .await?;
        parse_classification(&raw, candidates.len())
    }

    async fn filter_items(
        &self,
        candidates: &[WorkItem],
        query: &str,
    ) -> Result<Vec<usize>, GatewayError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let raw = self
            .ask(
                "filter",
                prompts::filter(candidates, query, self.internal_domain.as_deref()),
                prompts::FILTER_MAX_TOKENS,
            )
            .await?;
        Ok(parse_filter(&raw, candidates.len()))
    }
}

/// Index of the single candidate whose normalized name equals the query's.
fn exact_match(candidates: &[String], query: &str) -> Option<usize> {
    let wanted = normalize_name(query);
    let mut hits = candidates
        .iter()
        .enumerate()
        .filter(|(_, name)| normalize_name(name) == wanted)
        .map(|(i, _)| i);
    match (hits.next(), hits.next()) {
        (Some(i), None) => Some(i),
        _ => None,
    }
}

/// Cut a JSON object out of a reply that may be wrapped in Markdown fences
/// or surrounded by prose.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

pub(crate) fn parse_synthesis(raw: &str) -> Result<SynthesisResult, GatewayError> {
    let json = extract_json_object(raw).ok_or_else(|| {
        GatewayError::InvalidResponse("synthesis reply contains no JSON object".to_string())
    })?;
    let result: SynthesisResult = serde_json::from_str(json)
        .map_err(|e| GatewayError::InvalidResponse(format!("synthesis JSON rejected: {e}")))?;
    result.validate().map_err(GatewayError::InvalidResponse)?;
    Ok(result)
}

/// Parse a 1-based classifier answer into candidate indices.
pub(crate) fn parse_classification(
    raw: &str,
    candidate_count: usize,
) -> Result<Classification, GatewayError> {
    let answer = raw.trim().trim_matches('"').trim();
    if answer.eq_ignore_ascii_case("none") {
        return Ok(Classification::NoMatch);
    }

    let mut picked = BTreeSet::new();
    for token in answer.split([',', ' ', '\n']).filter(|t| !t.is_empty()) {
        let number: usize = token.trim_matches('.').parse().map_err(|_| {
            GatewayError::InvalidResponse(format!("unexpected classifier answer: {answer:?}"))
        })?;
        if (1..=candidate_count).contains(&number) {
            picked.insert(number - 1);
        }
    }

    let mut picked = picked.into_iter();
    match (picked.next(), picked.next()) {
        (None, _) => Err(GatewayError::InvalidResponse(format!(
            "classifier answer {answer:?} names no valid candidate"
        ))),
        (Some(only), None) => Ok(Classification::Chosen(only)),
        (Some(first), Some(second)) => {
            let mut all = vec![first, second];
            all.extend(picked);
            Ok(Classification::Ambiguous(all))
        }
    }
}

/// Parse a 0-based filter answer. Anything unparseable keeps every candidate.
pub(crate) fn parse_filter(raw: &str, candidate_count: usize) -> Vec<usize> {
    let answer = raw.trim().trim_matches('"').trim();
    if answer.is_empty() || answer.eq_ignore_ascii_case("none") {
        return Vec::new();
    }

    let parsed: Result<Vec<usize>, _> = answer.split(',').map(|t| t.trim().parse()).collect();
    match parsed {
        Ok(indices) => {
            let mut seen = BTreeSet::new();
            indices
                .into_iter()
                .filter(|&i| i < candidate_count && seen.insert(i))
                .collect()
        }
        Err(_) => {
            warn!(answer, "Unparseable filter answer, keeping the whole window");
            (0..candidate_count).collect()
        }
    }
}
