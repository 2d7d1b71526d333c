//! Command implementations and report formatting.

use std::collections::BTreeMap;

use callbrief_config::Config;
use callbrief_engine::{CancellationToken, ItemOutcome, RunReport};
use callbrief_utils::{CallbriefError, ConfigError};

use crate::orchestrator_from_config;

/// Execute `callbrief run`.
pub(super) async fn execute_run_command(
    config: &Config,
    account: &str,
    json: bool,
    cancel: CancellationToken,
) -> Result<(), CallbriefError> {
    let account = account.trim();
    if account.is_empty() {
        return Err(CallbriefError::Config(ConfigError::InvalidValue {
            key: "account".to_string(),
            value: "account name must not be empty".to_string(),
        }));
    }

    let orchestrator = orchestrator_from_config(config)?;
    let report = orchestrator.run(account, cancel).await?;

    if json {
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| CallbriefError::Internal(format!("failed to serialize report: {e}")))?;
        println!("{out}");
    } else {
        print!("{}", format_report(&report));
    }
    Ok(())
}

/// Human-readable run summary.
pub(super) fn format_report(report: &RunReport) -> String {
    let mut out = String::new();
    if report.synthesis.is_some() {
        out.push_str(&format!("✓ Brief updated for {}\n", report.location.account));
    } else {
        out.push_str(&format!(
            "✓ No new calls for {}, brief unchanged\n",
            report.location.account
        ));
    }
    out.push_str(&format!("  Document: {}\n", report.location.reference));
    out.push_str(&format!(
        "  Calls: {} summarized, {} already present, {} skipped, {} unresolved ({} found)\n",
        report.summarized(),
        report.already_present(),
        report.skipped(),
        report.unresolved(),
        report.total_matches,
    ));
    if report.synthesis.is_some() {
        out.push_str(&format!("  Records in brief: {}\n", report.reduced));
    }
    if report.malformed > 0 {
        out.push_str(&format!(
            "  ⚠ {} damaged record(s) were left out\n",
            report.malformed
        ));
    }

    let unresolved: Vec<_> = report
        .items
        .iter()
        .filter_map(|item| match &item.outcome {
            ItemOutcome::Unresolved { error } => Some((item, error)),
            _ => None,
        })
        .collect();
    if !unresolved.is_empty() {
        out.push_str("\n  Unresolved calls (re-run to retry):\n");
        for (item, error) in unresolved {
            out.push_str(&format!("    - {} ({}): {error}\n", item.title, item.item_id));
        }
    }
    out
}

/// Execute `callbrief config`.
pub(super) fn execute_config_command(config: &Config, json: bool) -> Result<(), CallbriefError> {
    let effective = config.effective_config();

    if json {
        let entries: BTreeMap<&str, serde_json::Value> = effective
            .iter()
            .map(|(key, (value, source))| {
                (
                    key.as_str(),
                    serde_json::json!({ "value": value, "source": source }),
                )
            })
            .collect();
        let out = serde_json::json!({
            "config_path": config.config_path.as_ref().map(|p| p.display().to_string()),
            "effective_config": entries,
        });
        let text = serde_json::to_string_pretty(&out)
            .map_err(|e| CallbriefError::Internal(format!("failed to serialize config: {e}")))?;
        println!("{text}");
    } else {
        print!("{}", format_config(config, &effective));
    }
    Ok(())
}

pub(super) fn format_config(
    config: &Config,
    effective: &BTreeMap<String, (String, String)>,
) -> String {
    let mut out = String::from("Effective configuration:\n");
    match &config.config_path {
        Some(path) => out.push_str(&format!("  (from {})\n", path.display())),
        None => out.push_str("  (no config file found)\n"),
    }
    let width = effective.keys().map(String::len).max().unwrap_or(0);
    for (key, (value, source)) in effective {
        out.push_str(&format!("  {key:<width$} = {value}  [{source}]\n"));
    }
    out
}
