//! Text format of account documents.
//!
//! An account document holds an optional header section at the top followed
//! by the call history, one delimited record per summarized call:
//!
//! ```text
//! === ACCOUNT BRIEF ===
//! ...
//! === END ACCOUNT BRIEF ===
//!
//! === CALL SUMMARY: <id> | <RFC 3339 timestamp> | <title> ===
//! Participants: Ann, Bob
//! <summary text>
//! === END CALL SUMMARY: <id> ===
//! ```
//!
//! Body lines that begin with `===` (after leading whitespace) are written
//! with one extra leading space, so text can never be mistaken for a marker.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::model::ItemSummary;

pub const RECORD_OPEN: &str = "=== CALL SUMMARY: ";
pub const RECORD_CLOSE: &str = "=== END CALL SUMMARY: ";
const MARKER_TAIL: &str = " ===";
const FIELD_SEP: &str = " | ";
const PARTICIPANTS: &str = "Participants:";

/// Key of the header section replaced on every run.
pub const BRIEF_SECTION: &str = "ACCOUNT BRIEF";

/// A record recovered from a document, with its position among all record
/// markers in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    pub ordinal: usize,
    pub summary: ItemSummary,
}

/// A record that could not be recovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    pub ordinal: usize,
    /// 1-based line of the opening marker
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordScan {
    pub records: Vec<ParsedRecord>,
    pub malformed: Vec<MalformedRecord>,
}

/// Whether `id` can be used as a record key without breaking the format.
#[must_use]
pub fn is_valid_record_key(id: &str) -> bool {
    !id.is_empty()
        && id.trim() == id
        && !id.contains('|')
        && !id.contains("===")
        && !id.contains(['\n', '\r'])
}

fn single_line(field: &str) -> String {
    field.replace(['\r', '\n'], " ")
}

fn escape_line(line: &str) -> String {
    if line.trim_start().starts_with("===") {
        format!(" {line}")
    } else {
        line.to_string()
    }
}

fn unescape_line(line: &str) -> &str {
    if line.starts_with(' ') && line.trim_start().starts_with("===") {
        &line[1..]
    } else {
        line
    }
}

/// Render one call summary as a delimited record, newline terminated.
#[must_use]
pub fn render_record(summary: &ItemSummary) -> String {
    let mut out = format!(
        "{RECORD_OPEN}{}{FIELD_SEP}{}{FIELD_SEP}{}{MARKER_TAIL}\n",
        summary.item_id,
        summary
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        single_line(&summary.title),
    );
    let participants: Vec<String> = summary
        .participants
        .iter()
        .map(|p| single_line(p))
        .collect();
    out.push_str(&format!("{PARTICIPANTS} {}\n", participants.join(", ")));
    for line in summary.body.lines() {
        out.push_str(&escape_line(line));
        out.push('\n');
    }
    out.push_str(&format!("{RECORD_CLOSE}{}{MARKER_TAIL}\n", summary.item_id));
    out
}

fn header_id(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(RECORD_OPEN)?;
    match rest.split_once(FIELD_SEP) {
        Some((id, _)) => Some(id),
        None => rest.strip_suffix(MARKER_TAIL),
    }
}

fn parse_header(line: &str) -> Result<(String, DateTime<Utc>, String), String> {
    let inner = line
        .strip_prefix(RECORD_OPEN)
        .and_then(|rest| rest.strip_suffix(MARKER_TAIL))
        .ok_or_else(|| "opening marker is not terminated with ' ==='".to_string())?;

    let mut fields = inner.splitn(3, FIELD_SEP);
    let id = fields.next().unwrap_or_default();
    if id.is_empty() {
        return Err("opening marker has no item id".to_string());
    }
    let raw_ts = fields
        .next()
        .ok_or_else(|| format!("record {id} has no timestamp"))?;
    let timestamp = DateTime::parse_from_rfc3339(raw_ts.trim())
        .map_err(|e| format!("record {id} has invalid timestamp '{raw_ts}': {e}"))?
        .with_timezone(&Utc);
    let title = fields.next().unwrap_or_default().to_string();

    Ok((id.to_string(), timestamp, title))
}

/// Whether the document already holds a record for `item_id`.
///
/// Only opening markers are inspected, so a damaged record still counts as
/// present and is never duplicated.
#[must_use]
pub fn contains_record(doc: &str, item_id: &str) -> bool {
    doc.lines()
        .filter_map(header_id)
        .any(|id| id == item_id)
}

/// Append a rendered record, separated from existing content by a blank line.
#[must_use]
pub fn append_record(doc: &str, record: &str) -> String {
    let mut out = String::with_capacity(doc.len() + record.len() + 2);
    out.push_str(doc);
    if !out.is_empty() {
        if !out.ends_with('\n') {
            out.push('\n');
        }
        if !out.ends_with("\n\n") {
            out.push('\n');
        }
    }
    out.push_str(record);
    out
}

struct OpenRecord<'a> {
    ordinal: usize,
    line: usize,
    header: Result<(String, DateTime<Utc>, String), String>,
    body: Vec<&'a str>,
}

impl OpenRecord<'_> {
    fn malformed(self, reason: impl Into<String>) -> MalformedRecord {
        MalformedRecord {
            ordinal: self.ordinal,
            line: self.line,
            reason: reason.into(),
        }
    }

    fn close(self, close_id: &str) -> Result<ParsedRecord, MalformedRecord> {
        let (item_id, timestamp, title) = match &self.header {
            Ok(header) => header.clone(),
            Err(reason) => {
                let reason = reason.clone();
                return Err(self.malformed(reason));
            }
        };
        if item_id != close_id {
            return Err(self.malformed(format!(
                "record {item_id} is closed by terminator for {close_id}"
            )));
        }

        let mut lines = self.body.iter().copied().peekable();
        let mut participants = Vec::new();
        if let Some(list) = lines
            .peek()
            .copied()
            .and_then(|first| first.strip_prefix(PARTICIPANTS))
        {
            participants = list
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            lines.next();
        }
        let body = lines.map(unescape_line).collect::<Vec<_>>().join("\n");

        Ok(ParsedRecord {
            ordinal: self.ordinal,
            summary: ItemSummary {
                item_id,
                timestamp,
                title,
                participants,
                body,
            },
        })
    }
}

/// Recover every record in document order, setting damaged ones aside.
#[must_use]
pub fn parse_records(doc: &str) -> RecordScan {
    let mut scan = RecordScan::default();
    let mut current: Option<OpenRecord<'_>> = None;
    let mut ordinal = 0;

    for (idx, line) in doc.lines().enumerate() {
        if line.starts_with(RECORD_OPEN) {
            if let Some(open) = current.take() {
                scan.malformed
                    .push(open.malformed("record is not terminated"));
            }
            current = Some(OpenRecord {
                ordinal,
                line: idx + 1,
                header: parse_header(line),
                body: Vec::new(),
            });
            ordinal += 1;
        } else if let Some(rest) = line.strip_prefix(RECORD_CLOSE) {
            let close_id = rest.strip_suffix(MARKER_TAIL).unwrap_or(rest);
            if let Some(open) = current.take() {
                match open.close(close_id) {
                    Ok(record) => scan.records.push(record),
                    Err(bad) => scan.malformed.push(bad),
                }
            }
        } else if let Some(open) = current.as_mut() {
            open.body.push(line);
        }
    }

    if let Some(open) = current.take() {
        scan.malformed
            .push(open.malformed("record is not terminated"));
    }

    scan
}

fn section_open(key: &str) -> String {
    format!("=== {key} ===")
}

fn section_close(key: &str) -> String {
    format!("=== END {key} ===")
}

/// Render a delimited section, newline terminated.
#[must_use]
pub fn render_section(key: &str, body: &str) -> String {
    let mut out = section_open(key);
    out.push('\n');
    for line in body.lines() {
        out.push_str(&escape_line(line));
        out.push('\n');
    }
    out.push_str(&section_close(key));
    out.push('\n');
    out
}

/// Byte range of the section `key`, if present.
///
/// A section whose terminator is missing ends where the call history begins.
fn section_span(doc: &str, key: &str) -> Option<(usize, usize)> {
    let open = section_open(key);
    let close = section_close(key);
    let mut offset = 0;
    let mut start = None;

    for line in doc.split_inclusive('\n') {
        let text = line.trim_end_matches(['\n', '\r']);
        match start {
            None if text == open => start = Some(offset),
            Some(s) if text == close => return Some((s, offset + line.len())),
            Some(s) if text.starts_with(RECORD_OPEN) => return Some((s, offset)),
            _ => {}
        }
        offset += line.len();
    }

    start.map(|s| (s, doc.len()))
}

/// Replace section `key` in place, or put it at the top of the document.
///
/// Everything outside the section is left byte-for-byte untouched.
#[must_use]
pub fn upsert_section(doc: &str, key: &str, body: &str) -> String {
    let block = render_section(key, body);
    match section_span(doc, key) {
        Some((start, end)) => format!("{}{}{}", &doc[..start], block, &doc[end..]),
        None if doc.is_empty() => block,
        None => format!("{block}\n{doc}"),
    }
}

/// Body of section `key`, unescaped.
#[must_use]
pub fn extract_section(doc: &str, key: &str) -> Option<String> {
    let (start, end) = section_span(doc, key)?;
    let close = section_close(key);
    let lines: Vec<&str> = doc[start..end]
        .lines()
        .skip(1)
        .filter(|line| *line != close)
        .map(unescape_line)
        .collect();
    Some(lines.join("\n"))
}

/// How many times the section `key` opens in the document.
#[must_use]
pub fn count_sections(doc: &str, key: &str) -> usize {
    let open = section_open(key);
    doc.lines().filter(|line| *line == open).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn summary(id: &str, day: u32, body: &str) -> ItemSummary {
        ItemSummary {
            item_id: id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, day, 15, 0, 0).unwrap(),
            title: format!("Call {id}"),
            participants: vec!["Ann Lee".into(), "Bob Roy".into()],
            body: body.to_string(),
        }
    }

    #[test]
    fn test_render_record_layout() {
        let text = render_record(&summary("A", 2, "Discussed pilot.\nNext: pricing."));
        assert_eq!(
            text,
            "=== CALL SUMMARY: A | 2026-03-02T15:00:00Z | Call A ===\n\
             Participants: Ann Lee, Bob Roy\n\
             Discussed pilot.\n\
             Next: pricing.\n\
             === END CALL SUMMARY: A ===\n"
        );
    }

    #[test]
    fn test_parse_recovers_records_in_document_order() {
        let doc = append_record(
            &render_record(&summary("B", 5, "second")),
            &render_record(&summary("A", 1, "first")),
        );
        let scan = parse_records(&doc);
        assert!(scan.malformed.is_empty());
        let ids: Vec<_> = scan
            .records
            .iter()
            .map(|r| (r.ordinal, r.summary.item_id.as_str()))
            .collect();
        assert_eq!(ids, vec![(0, "B"), (1, "A")]);
        assert_eq!(scan.records[1].summary, summary("A", 1, "first"));
    }

    #[test]
    fn test_marker_lookalikes_in_body_are_escaped() {
        let body = "=== END CALL SUMMARY: A ===\n  === CALL SUMMARY: Z | x | y ===";
        let doc = render_record(&summary("A", 1, body));
        assert!(!contains_record(&doc, "Z"));

        let scan = parse_records(&doc);
        assert_eq!(scan.records.len(), 1);
        assert_eq!(scan.records[0].summary.body, body);
    }

    #[test]
    fn test_malformed_records_are_set_aside() {
        let good = render_record(&summary("A", 1, "ok"));
        let doc = format!(
            "{good}\n=== CALL SUMMARY: B | not-a-date | Broken ===\nbody\n=== END CALL SUMMARY: B ===\n\
             \n=== CALL SUMMARY: C | 2026-03-03T00:00:00Z | Cut off ===\nbody\n\
             {}",
            render_record(&summary("D", 4, "ok"))
        );

        let scan = parse_records(&doc);
        let ids: Vec<_> = scan
            .records
            .iter()
            .map(|r| r.summary.item_id.as_str())
            .collect();
        assert_eq!(ids, vec!["A", "D"]);
        assert_eq!(scan.malformed.len(), 2);
        assert!(scan.malformed[0].reason.contains("invalid timestamp"));
        assert!(scan.malformed[1].reason.contains("not terminated"));
        assert_eq!(scan.records[1].ordinal, 3);
    }

    #[test]
    fn test_mismatched_terminator_is_malformed() {
        let doc = "=== CALL SUMMARY: A | 2026-03-01T00:00:00Z | t ===\nx\n=== END CALL SUMMARY: B ===\n";
        let scan = parse_records(doc);
        assert!(scan.records.is_empty());
        assert_eq!(scan.malformed.len(), 1);
    }

    #[test]
    fn test_contains_record_matches_exact_ids() {
        let doc = render_record(&summary("12", 1, "x"));
        assert!(contains_record(&doc, "12"));
        assert!(!contains_record(&doc, "1"));
        assert!(!contains_record(&doc, "123"));
    }

    #[test]
    fn test_record_key_validation() {
        assert!(is_valid_record_key("7782342274025937895"));
        assert!(!is_valid_record_key(""));
        assert!(!is_valid_record_key("a | b"));
        assert!(!is_valid_record_key("a\nb"));
        assert!(!is_valid_record_key(" padded"));
    }

    #[test]
    fn test_upsert_section_prepends_then_replaces_in_place() {
        let history = append_record(
            &render_record(&summary("A", 1, "first")),
            &render_record(&summary("B", 2, "second")),
        );

        let once = upsert_section(&history, BRIEF_SECTION, "v1");
        assert!(once.starts_with("=== ACCOUNT BRIEF ===\nv1\n=== END ACCOUNT BRIEF ===\n\n"));
        assert!(once.ends_with(&history));

        let twice = upsert_section(&once, BRIEF_SECTION, "v2\nmore");
        assert_eq!(count_sections(&twice, BRIEF_SECTION), 1);
        assert_eq!(extract_section(&twice, BRIEF_SECTION).as_deref(), Some("v2\nmore"));
        assert!(twice.ends_with(&history));
        assert_eq!(parse_records(&twice).records.len(), 2);
    }

    #[test]
    fn test_upsert_section_on_empty_document() {
        let doc = upsert_section("", BRIEF_SECTION, "only");
        assert_eq!(doc, "=== ACCOUNT BRIEF ===\nonly\n=== END ACCOUNT BRIEF ===\n");
    }

    #[test]
    fn test_unterminated_section_is_replaced_up_to_history() {
        let record = render_record(&summary("A", 1, "first"));
        let doc = format!("=== ACCOUNT BRIEF ===\nstale\n{record}");
        let fixed = upsert_section(&doc, BRIEF_SECTION, "fresh");
        assert_eq!(count_sections(&fixed, BRIEF_SECTION), 1);
        assert!(!fixed.contains("stale"));
        assert!(fixed.ends_with(&record));
    }

    proptest! {
        #[test]
        fn prop_body_text_never_creates_markers(
            lines in proptest::collection::vec("( {0,2}===)?[ -~]{0,20}", 0..8)
        ) {
            let body = lines.join("\n");
            let doc = render_record(&summary("A", 1, &body));
            let scan = parse_records(&doc);
            prop_assert_eq!(scan.records.len(), 1);
            prop_assert!(scan.malformed.is_empty());
            prop_assert_eq!(&scan.records[0].summary.body, &body.lines().collect::<Vec<_>>().join("\n"));
        }
    }
}
