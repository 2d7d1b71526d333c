//! Configuration discovery through the public API.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

use callbrief::{CliArgs, Config, RunSettings};

fn repo_with_config(content: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join(".git")).unwrap();
    fs::create_dir_all(dir.path().join(".callbrief")).unwrap();
    fs::write(dir.path().join(".callbrief/config.toml"), content).unwrap();
    dir
}

#[test]
fn test_file_settings_flow_into_run_settings() {
    let dir = repo_with_config(
        r#"
[defaults]
max_items = 12
concurrency = 2
call_timeout = 45
min_summarized = 3
skip_unchanged = true

[retry]
max_attempts = 5
initial_backoff_ms = 200
max_backoff_ms = 800

[discovery]
window_days = 14
max_windows = 10
max_consecutive_empty = 2

[search]
team_user_ids = ["u-1", "u-2"]
"#,
    );

    let config = Config::discover_from(dir.path(), &CliArgs::default(), |_| None).unwrap();
    let settings = RunSettings::from_config(&config);

    assert_eq!(settings.concurrency, 2);
    assert_eq!(settings.call_timeout, Duration::from_secs(45));
    assert_eq!(settings.min_summarized, 3);
    assert!(settings.skip_unchanged);
    assert_eq!(settings.retry.max_attempts, 5);
    assert_eq!(settings.retry.initial_backoff, Duration::from_millis(200));
    assert_eq!(settings.retry.max_backoff, Duration::from_millis(800));
    assert_eq!(settings.discovery.max_items, 12);
    assert_eq!(settings.discovery.window, chrono::Duration::days(14));
    assert_eq!(settings.discovery.max_windows, 10);
    assert_eq!(settings.discovery.max_consecutive_empty, 2);
    assert_eq!(settings.discovery.team_filter, vec!["u-1", "u-2"]);
}

#[test]
fn test_cli_overrides_file() {
    let dir = repo_with_config("[defaults]\nmax_items = 12\n\n[store]\nroot = \"briefs\"\n");
    let cli = CliArgs {
        max_items: Some(4),
        store_root: Some(PathBuf::from("/srv/briefs")),
        ..Default::default()
    };

    let config = Config::discover_from(dir.path(), &cli, |_| None).unwrap();

    assert_eq!(config.max_items(), 4);
    assert_eq!(config.store_root(), PathBuf::from("/srv/briefs"));
}

#[test]
fn test_missing_search_credentials_are_a_config_error() {
    let config = Config::default();
    let err = callbrief_search::GongSearchGateway::from_config(&config, |_| None).unwrap_err();
    assert!(err.to_string().contains("GONG_API_KEY"));
}
