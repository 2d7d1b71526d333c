//! Gong v2 request and response bodies, and their mapping to work items.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use callbrief_gateway_api::{TimeWindow, WorkItem};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExtensiveRequest<'a> {
    pub filter: CallFilter<'a>,
    pub content_selector: ContentSelector,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<&'a str>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CallFilter<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_user_ids: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_ids: Option<Vec<&'a str>>,
}

impl<'a> CallFilter<'a> {
    pub fn window(window: TimeWindow, team: Option<&'a [String]>) -> Self {
        Self {
            from_date_time: Some(window.start.to_rfc3339()),
            to_date_time: Some(window.end.to_rfc3339()),
            primary_user_ids: team.filter(|ids| !ids.is_empty()),
            call_ids: None,
        }
    }

    pub fn call(id: &'a str) -> Self {
        Self {
            call_ids: Some(vec![id]),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ContentSelector {
    pub context: &'static str,
    pub exposed_fields: ExposedFields,
}

impl Default for ContentSelector {
    fn default() -> Self {
        Self {
            context: "Extended",
            exposed_fields: ExposedFields { parties: true },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ExposedFields {
    pub parties: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct TranscriptRequest<'a> {
    pub filter: CallFilter<'a>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtensiveResponse {
    #[serde(default)]
    pub calls: Vec<GongCall>,
    #[serde(default)]
    pub records: Option<Records>,
}

impl ExtensiveResponse {
    pub fn next_cursor(&self) -> Option<&str> {
        self.records
            .as_ref()
            .and_then(|r| r.cursor.as_deref())
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Records {
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GongCall {
    pub meta_data: MetaData,
    #[serde(default)]
    pub parties: Vec<Party>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MetaData {
    pub id: String,
    pub started: Option<String>,
    pub scheduled: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Party {
    pub speaker_id: Option<String>,
    pub name: Option<String>,
    pub email_address: Option<String>,
}

impl Party {
    /// `Name <email>` when both are known, otherwise whichever is.
    fn label(&self) -> Option<String> {
        let name = self.name.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let email = self
            .email_address
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        match (name, email) {
            (Some(name), Some(email)) => Some(format!("{name} <{email}>")),
            (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
            (None, None) => None,
        }
    }
}

impl GongCall {
    /// `None` when the call carries no usable start time.
    pub fn to_work_item(&self) -> Option<WorkItem> {
        let raw = self
            .meta_data
            .started
            .as_deref()
            .or(self.meta_data.scheduled.as_deref())?;
        let timestamp = match parse_timestamp(raw) {
            Some(ts) => ts,
            None => {
                warn!(call_id = %self.meta_data.id, raw, "Skipping call with unparseable start time");
                return None;
            }
        };
        Some(WorkItem {
            id: self.meta_data.id.clone(),
            timestamp,
            title: self
                .meta_data
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            participants: self.parties.iter().filter_map(Party::label).collect(),
        })
    }

    /// Speaker id to display name, for rendering transcripts.
    pub fn speakers(&self) -> HashMap<String, String> {
        self.parties
            .iter()
            .filter_map(|p| {
                let id = p.speaker_id.clone()?;
                let name = p.name.clone().or_else(|| p.email_address.clone())?;
                Some((id, name))
            })
            .collect()
    }
}

/// RFC 3339, or epoch seconds as a string.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TranscriptResponse {
    #[serde(default)]
    pub call_transcripts: Vec<CallTranscript>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CallTranscript {
    pub call_id: Option<String>,
    #[serde(default)]
    pub transcript: Vec<Monologue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Monologue {
    pub speaker_id: Option<String>,
    #[serde(default)]
    pub sentences: Vec<Sentence>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Sentence {
    pub text: String,
}

impl CallTranscript {
    /// One `speaker: text` line per monologue. Empty when nothing was said.
    pub fn render(&self, speakers: &HashMap<String, String>) -> String {
        self.transcript
            .iter()
            .filter_map(|m| {
                let text = m
                    .sentences
                    .iter()
                    .map(|s| s.text.trim())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                if text.is_empty() {
                    return None;
                }
                let id = m.speaker_id.as_deref().unwrap_or("unknown");
                let speaker = speakers
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| format!("Speaker {id}"));
                Some(format!("{speaker}: {text}"))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const EXTENSIVE: &str = r#"{
        "records": {"totalRecords": 3, "currentPageSize": 2, "cursor": "abc"},
        "calls": [
            {
                "metaData": {"id": "101", "started": "2026-02-10T17:00:00-08:00", "title": "Foo <> Us: Demo"},
                "parties": [
                    {"speakerId": "s1", "name": "Jane Roe", "emailAddress": "jane@foo.com"},
                    {"speakerId": "s2", "name": "Sam Poe"},
                    {"emailAddress": "bot@foo.com"}
                ]
            },
            {"metaData": {"id": "102", "started": "not a date", "title": ""}},
            {"metaData": {"id": "103", "scheduled": "1767225600"}}
        ]
    }"#;

    #[test]
    fn test_extensive_maps_calls() {
        let response: ExtensiveResponse = serde_json::from_str(EXTENSIVE).unwrap();
        assert_eq!(response.next_cursor(), Some("abc"));

        let items: Vec<_> = response.calls.iter().filter_map(GongCall::to_work_item).collect();
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].id, "101");
        assert_eq!(
            items[0].timestamp,
            Utc.with_ymd_and_hms(2026, 2, 11, 1, 0, 0).unwrap()
        );
        assert_eq!(
            items[0].participants,
            vec!["Jane Roe <jane@foo.com>", "Sam Poe", "bot@foo.com"]
        );

        assert_eq!(items[1].id, "103");
        assert_eq!(items[1].title, "Untitled");
    }

    #[test]
    fn test_empty_cursor_ends_pagination() {
        let response: ExtensiveResponse =
            serde_json::from_str(r#"{"records": {"cursor": ""}, "calls": []}"#).unwrap();
        assert_eq!(response.next_cursor(), None);
        let bare: ExtensiveResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(bare.next_cursor(), None);
    }

    #[test]
    fn test_transcript_resolves_speakers() {
        let response: ExtensiveResponse = serde_json::from_str(EXTENSIVE).unwrap();
        let speakers = response.calls[0].speakers();

        let transcript: TranscriptResponse = serde_json::from_str(
            r#"{"callTranscripts": [{"callId": "101", "transcript": [
                {"speakerId": "s1", "sentences": [{"text": "Hi all."}, {"text": "Quick agenda."}]},
                {"speakerId": "s9", "sentences": [{"text": "Hello."}]},
                {"speakerId": "s2", "sentences": []}
            ]}]}"#,
        )
        .unwrap();

        assert_eq!(
            transcript.call_transcripts[0].render(&speakers),
            "Jane Roe: Hi all. Quick agenda.\nSpeaker s9: Hello."
        );
    }

    #[test]
    fn test_window_filter_serializes_camel_case() {
        let team = vec!["u1".to_string()];
        let window = TimeWindow {
            start: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 1, 31, 0, 0, 0).unwrap(),
        };
        let body = ExtensiveRequest {
            filter: CallFilter::window(window, Some(&team)),
            content_selector: ContentSelector::default(),
            cursor: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["filter"]["fromDateTime"], "2026-01-01T00:00:00+00:00");
        assert_eq!(json["filter"]["primaryUserIds"][0], "u1");
        assert_eq!(json["contentSelector"]["exposedFields"]["parties"], true);
        assert!(json.get("cursor").is_none());
        assert!(json["filter"].get("callIds").is_none());
    }

    #[test]
    fn test_empty_team_filter_is_omitted() {
        let window = TimeWindow {
            start: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap(),
        };
        let nobody: Vec<String> = Vec::new();
        let filter = CallFilter::window(window, Some(nobody.as_slice()));
        assert!(filter.primary_user_ids.is_none());
    }
}
