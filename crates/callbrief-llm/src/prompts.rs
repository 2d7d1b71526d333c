//! Prompt templates for the four synthesis operations.

use std::collections::BTreeSet;

use callbrief_gateway_api::WorkItem;

/// Word ceiling for a single call summary.
pub const TARGET_SUMMARY_WORDS: usize = 300;

pub const SUMMARIZE_MAX_TOKENS: u32 = 1_000;
pub const SYNTHESIZE_MAX_TOKENS: u32 = 4_000;
pub const CLASSIFY_MAX_TOKENS: u32 = 10;
pub const FILTER_MAX_TOKENS: u32 = 100;

pub fn summarize(text: &str) -> String {
    format!(
        "You are extracting key facts from a sales call. Be CONCISE and SPECIFIC.

OUTPUT FORMAT (omit sections that were not discussed):

**Call Type:** [Discovery | Technical | Commercial | Check-in | Enablement]

**Participants:**
- Our side: [names with roles]
- Customer: [names with roles]

**What Happened:** (2-3 sentences)
[Key discussion topics, decisions made, insights gained]

**Use Case & Business Impact:**
- What they're building
- Business pain and cost of the status quo
- Expected impact

**Technical Details:**
- Current setup, requirements, blockers

**Commercial Details:**
- Deal stage signal, pricing, timeline, competition

**Risks/Concerns:**
[Anything that could prevent progress]

**Action Items:**
- [Person]: [specific task] by [date/timeframe]

**Next Call Goal:**
[Purpose of the next interaction]

KEEP IT UNDER {TARGET_SUMMARY_WORDS} WORDS. Be specific with names, numbers and dates.

CALL:
{text}
"
    )
}

pub fn synthesize(account: &str, ordered_texts: &[String], today: &str) -> String {
    let total = ordered_texts.len();
    let summaries = ordered_texts.join("\n\n");
    format!(
        r#"Analyze ALL calls for {account} and create a scannable account brief for call prep.

CALL SUMMARIES (chronological, oldest first):
{summaries}

Return account intelligence as a JSON object with these fields:

{{
  "account": "{account}",
  "last_updated": "{today}",
  "total_calls": {total},
  "quick_context": ["Use case", "Deal stage", "Setup", "Key stakeholders", "Timeline"],
  "blocking_progress": ["Blocker with context"],
  "next_actions": ["[Who] needs to [what] by [when]"],
  "risks": ["Deal, technical or relationship risk"],
  "call_history": [
    {{"date": "YYYY-MM-DD", "type": "Discovery/Technical/Commercial/Check-in", "one_sentence": "What happened"}}
  ]
}}

RULES:
- Return ONLY valid JSON (no markdown code blocks, no extra text)
- quick_context: 4-5 bullets, 1 sentence each
- blocking_progress: 2-3 bullets, or ["None identified"]
- next_actions: 3-4 bullets with owners and timing
- risks: 2-3 bullets, or ["None identified"]
- call_history: one entry per call, NEWEST first
- If something is unknown, write "Not yet discussed" rather than speculate
"#
    )
}

pub fn classify(candidates: &[String], query: &str) -> String {
    let list = candidates
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{}. {name}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"Pick the correct folder for company: {query}

Folders:
{list}

Matching is case-insensitive and ignores dots, spaces and punctuation:
"acme corp" matches "Acme Corp" and "acmecorp" but is a different company from "Acme.io".

Return ONLY the number (1, 2, 3, ...). If several folders are equally plausible,
return all of their numbers separated by commas. Return "NONE" if no folder matches.

Your response (numbers only):"#
    )
}

pub fn filter(candidates: &[WorkItem], query: &str, internal_domain: Option<&str>) -> String {
    let list = candidates
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let domains = customer_domains(&item.participants, internal_domain);
            if domains.is_empty() {
                format!("{i}. {}", item.title)
            } else {
                let joined = domains.into_iter().collect::<Vec<_>>().join(", ");
                format!("{i}. {} | Participants from: {joined}", item.title)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"Filter calls where the CUSTOMER company is: {query}

Rules:
1. Include ONLY calls where {query} is the customer or prospect
2. Match against the call title AND participant domains
3. Title formats vary: "Customer <> Us", "Us / Customer", ...
4. Name variants like "Company.ai", "Company AI" and "companyai" are the same company

CALLS:
{list}

Return ONLY comma-separated numbers (e.g. "0,5,12") or "NONE". No other text.

Your response (numbers only):"#
    )
}

/// Email domains of participants outside `internal_domain`.
fn customer_domains(participants: &[String], internal_domain: Option<&str>) -> BTreeSet<String> {
    participants
        .iter()
        .filter_map(|p| p.rsplit_once('@').map(|(_, rest)| rest))
        .map(|rest| rest.trim_end_matches('>').trim().to_lowercase())
        .filter(|domain| !domain.is_empty())
        .filter(|domain| internal_domain.is_none_or(|internal| !domain.eq_ignore_ascii_case(internal)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn item(title: &str, participants: &[&str]) -> WorkItem {
        WorkItem {
            id: "1".into(),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            title: title.into(),
            participants: participants.iter().map(|p| (*p).to_string()).collect(),
        }
    }

    #[test]
    fn test_classify_numbers_from_one() {
        let prompt = classify(&["Acme Corp".into(), "Acme.io".into()], "Acme");
        assert!(prompt.contains("1. Acme Corp\n2. Acme.io"));
        assert!(prompt.contains("company: Acme"));
    }

    #[test]
    fn test_filter_numbers_from_zero_and_hides_internal_domain() {
        let items = vec![
            item("Acme <> Us", &["Jane <jane@acme.io>", "Sam <sam@example.com>"]),
            item("Internal sync", &["Sam <sam@example.com>"]),
        ];
        let prompt = filter(&items, "Acme", Some("example.com"));
        assert!(prompt.contains("0. Acme <> Us | Participants from: acme.io"));
        assert!(prompt.contains("1. Internal sync\n"));
        assert!(!prompt.contains("example.com"));
    }

    #[test]
    fn test_synthesize_embeds_count_and_date() {
        let prompt = synthesize("Foo Inc", &["a".into(), "b".into()], "2026-03-01");
        assert!(prompt.contains("\"total_calls\": 2"));
        assert!(prompt.contains("\"last_updated\": \"2026-03-01\""));
    }

    #[test]
    fn test_customer_domains_dedupes() {
        let domains = customer_domains(
            &["a@Acme.io".into(), "B <b@acme.io>".into(), "No Email".into()],
            None,
        );
        assert_eq!(domains.into_iter().collect::<Vec<_>>(), vec!["acme.io"]);
    }
}
