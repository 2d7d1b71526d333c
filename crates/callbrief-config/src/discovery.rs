use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use callbrief_utils::error::ConfigError;

use super::{
    CliArgs, Config, ConfigSource, Defaults, DiscoveryConfig, LlmConfig, RetryConfig,
    SearchConfig, StoreConfig,
};

/// Environment variable overriding `[llm] provider`
pub const ENV_LLM_PROVIDER: &str = "CALLBRIEF_LLM_PROVIDER";
/// Environment variable overriding `[store] root`
pub const ENV_STORE_ROOT: &str = "CALLBRIEF_STORE_ROOT";
/// Environment variable overriding `[search] team_user_ids` (comma separated)
pub const ENV_TEAM_USER_IDS: &str = "CALLBRIEF_TEAM_USER_IDS";

/// Keys reported by `callbrief config`, all attributed to defaults until a
/// layer overrides them.
pub(crate) const TRACKED_KEYS: &[&str] = &[
    "max_items",
    "concurrency",
    "call_timeout",
    "min_summarized",
    "skip_unchanged",
    "verbose",
    "max_attempts",
    "initial_backoff_ms",
    "max_backoff_ms",
    "window_days",
    "max_windows",
    "max_consecutive_empty",
    "time_budget",
    "search_base_url",
    "search_api_key_env",
    "search_api_secret_env",
    "team_user_ids",
    "llm_provider",
    "store_root",
];

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    defaults: Option<Defaults>,
    retry: Option<RetryConfig>,
    discovery: Option<DiscoveryConfig>,
    search: Option<SearchConfig>,
    llm: Option<LlmConfig>,
    store: Option<StoreConfig>,
}

/// Overwrite `target` when `value` is set and record where it came from.
fn layer<T>(
    target: &mut Option<T>,
    value: Option<T>,
    key: &str,
    source: ConfigSource,
    attribution: &mut HashMap<String, ConfigSource>,
) {
    if value.is_some() {
        *target = value;
        attribution.insert(key.to_string(), source);
    }
}

impl Config {
    /// Discover and load configuration with precedence: CLI > env > file > defaults
    ///
    /// Uses the current working directory for config file discovery and the
    /// process environment for `CALLBRIEF_*` overrides.
    pub fn discover(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let start_dir = std::env::current_dir().map_err(|e| ConfigError::DiscoveryFailed {
            reason: format!("Failed to get current directory: {e}"),
        })?;
        Self::discover_from(&start_dir, cli_args, |key| std::env::var(key).ok())
    }

    /// Discover configuration starting from `start_dir` with an explicit
    /// environment lookup.
    ///
    /// This is the path-driven variant used by tests to avoid process-global state.
    pub fn discover_from(
        start_dir: &Path,
        cli_args: &CliArgs,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        for key in TRACKED_KEYS {
            config
                .source_attribution
                .insert((*key).to_string(), ConfigSource::Default);
        }

        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    });
                }
                Some(explicit.clone())
            }
            None => Self::discover_config_file_from(start_dir).map_err(|e| {
                ConfigError::DiscoveryFailed {
                    reason: format!("{e:#}"),
                }
            })?,
        };

        if let Some(path) = &config_path {
            let file_config =
                Self::load_config_file(path).map_err(|e| ConfigError::InvalidFile(format!("{e:#}")))?;
            config.apply_file(file_config);
            config.config_path = Some(path.clone());
        }

        config.apply_env(env);
        config.apply_cli(cli_args);

        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: TomlConfig) {
        let src = ConfigSource::Config;
        let attr = &mut self.source_attribution;

        if let Some(d) = file.defaults {
            layer(&mut self.defaults.max_items, d.max_items, "max_items", src, attr);
            layer(&mut self.defaults.concurrency, d.concurrency, "concurrency", src, attr);
            layer(&mut self.defaults.call_timeout, d.call_timeout, "call_timeout", src, attr);
            layer(
                &mut self.defaults.min_summarized,
                d.min_summarized,
                "min_summarized",
                src,
                attr,
            );
            layer(
                &mut self.defaults.skip_unchanged,
                d.skip_unchanged,
                "skip_unchanged",
                src,
                attr,
            );
            layer(&mut self.defaults.verbose, d.verbose, "verbose", src, attr);
        }

        if let Some(r) = file.retry {
            layer(&mut self.retry.max_attempts, r.max_attempts, "max_attempts", src, attr);
            layer(
                &mut self.retry.initial_backoff_ms,
                r.initial_backoff_ms,
                "initial_backoff_ms",
                src,
                attr,
            );
            layer(
                &mut self.retry.max_backoff_ms,
                r.max_backoff_ms,
                "max_backoff_ms",
                src,
                attr,
            );
        }

        if let Some(d) = file.discovery {
            layer(&mut self.discovery.window_days, d.window_days, "window_days", src, attr);
            layer(&mut self.discovery.max_windows, d.max_windows, "max_windows", src, attr);
            layer(
                &mut self.discovery.max_consecutive_empty,
                d.max_consecutive_empty,
                "max_consecutive_empty",
                src,
                attr,
            );
            layer(&mut self.discovery.time_budget, d.time_budget, "time_budget", src, attr);
        }

        if let Some(s) = file.search {
            layer(&mut self.search.base_url, s.base_url, "search_base_url", src, attr);
            layer(
                &mut self.search.api_key_env,
                s.api_key_env,
                "search_api_key_env",
                src,
                attr,
            );
            layer(
                &mut self.search.api_secret_env,
                s.api_secret_env,
                "search_api_secret_env",
                src,
                attr,
            );
            layer(&mut self.search.team_user_ids, s.team_user_ids, "team_user_ids", src, attr);
            layer(
                &mut self.search.internal_domain,
                s.internal_domain,
                "internal_domain",
                src,
                attr,
            );
        }

        if let Some(l) = file.llm {
            layer(&mut self.llm.provider, l.provider, "llm_provider", src, attr);
            layer(&mut self.llm.anthropic, l.anthropic, "llm_anthropic", src, attr);
        }

        if let Some(s) = file.store {
            layer(&mut self.store.root, s.root, "store_root", src, attr);
        }
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        let src = ConfigSource::Env;
        let attr = &mut self.source_attribution;

        let provider = env(ENV_LLM_PROVIDER).filter(|v| !v.trim().is_empty());
        layer(&mut self.llm.provider, provider, "llm_provider", src, attr);

        let root = env(ENV_STORE_ROOT)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        layer(&mut self.store.root, root, "store_root", src, attr);

        let team = env(ENV_TEAM_USER_IDS).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });
        layer(&mut self.search.team_user_ids, team, "team_user_ids", src, attr);
    }

    fn apply_cli(&mut self, cli: &CliArgs) {
        let src = ConfigSource::Cli;
        let attr = &mut self.source_attribution;

        layer(&mut self.defaults.verbose, cli.verbose, "verbose", src, attr);
        layer(&mut self.defaults.call_timeout, cli.call_timeout, "call_timeout", src, attr);
        layer(&mut self.defaults.max_items, cli.max_items, "max_items", src, attr);
        layer(&mut self.defaults.concurrency, cli.concurrency, "concurrency", src, attr);
        layer(&mut self.store.root, cli.store_root.clone(), "store_root", src, attr);
        layer(
            &mut self.llm.provider,
            cli.llm_provider.clone(),
            "llm_provider",
            src,
            attr,
        );
    }

    /// Search upward from `start_dir` for `.callbrief/config.toml`.
    ///
    /// Stops at the filesystem root or at a repository root (`.git`, `.hg`,
    /// `.svn`) when nothing was found.
    pub fn discover_config_file_from(start_dir: &Path) -> Result<Option<PathBuf>> {
        let mut current_dir = start_dir.to_path_buf();

        loop {
            let config_path = current_dir.join(".callbrief").join("config.toml");
            if config_path.exists() {
                return Ok(Some(config_path));
            }

            if current_dir.join(".git").exists()
                || current_dir.join(".hg").exists()
                || current_dir.join(".svn").exists()
            {
                break;
            }

            match current_dir.parent() {
                Some(parent) => current_dir = parent.to_path_buf(),
                None => break,
            }
        }

        Ok(None)
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;
        Ok(config)
    }
}
