//! Plain-text rendering of the account brief header.

use chrono::NaiveDate;

use callbrief_gateway_api::SynthesisResult;

const NONE_IDENTIFIED: &str = "- None identified";

fn bullets(out: &mut String, heading: &str, lines: &[String], empty: &str) {
    out.push('\n');
    out.push_str(heading);
    out.push('\n');
    let mut wrote = false;
    for line in lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        out.push_str("- ");
        out.push_str(line);
        out.push('\n');
        wrote = true;
    }
    if !wrote {
        out.push_str(empty);
        out.push('\n');
    }
}

/// Body of the brief section: a short header block followed by one block
/// per synthesis field. `total_calls` counts every record in the document.
/// Call history is listed newest first.
#[must_use]
pub fn render_brief(
    account: &str,
    synthesis: &SynthesisResult,
    total_calls: usize,
    today: NaiveDate,
) -> String {
    let mut out = format!(
        "Account: {account}\nLast Updated: {}\nTotal Calls: {total_calls}\n",
        today.format("%Y-%m-%d")
    );

    bullets(&mut out, "QUICK CONTEXT", &synthesis.current_state, "- No context yet");
    bullets(&mut out, "BLOCKING PROGRESS", &synthesis.blockers, NONE_IDENTIFIED);
    bullets(&mut out, "NEXT ACTIONS", &synthesis.next_actions, NONE_IDENTIFIED);
    bullets(&mut out, "RISKS", &synthesis.risks, NONE_IDENTIFIED);

    // Newest first; ISO dates order lexically and the sort is stable
    let mut entries: Vec<_> = synthesis.item_index.iter().collect();
    entries.sort_by(|a, b| b.date.trim().cmp(a.date.trim()));
    let history: Vec<String> = entries
        .into_iter()
        .map(|e| format!("{} | {} | {}", e.date.trim(), e.kind.trim(), e.one_sentence.trim()))
        .collect();
    bullets(&mut out, "CALL HISTORY", &history, "- No calls recorded");

    out
}
