use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use callbrief_utils::types::ConfigSource;

pub const DEFAULT_MAX_ITEMS: usize = 30;
pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_MIN_SUMMARIZED: usize = 1;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1_000;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 10_000;

pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const DEFAULT_MAX_WINDOWS: u32 = 24;
pub const DEFAULT_MAX_CONSECUTIVE_EMPTY: u32 = 6;
pub const DEFAULT_TIME_BUDGET_SECS: u64 = 300;

pub const DEFAULT_SEARCH_BASE_URL: &str = "https://api.gong.io";
pub const DEFAULT_SEARCH_KEY_ENV: &str = "GONG_API_KEY";
pub const DEFAULT_SEARCH_SECRET_ENV: &str = "GONG_API_SECRET";

pub const DEFAULT_LLM_PROVIDER: &str = "anthropic";
pub const DEFAULT_ANTHROPIC_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-5";
pub const DEFAULT_ANTHROPIC_MAX_TOKENS: u32 = 4_000;

pub const DEFAULT_STORE_ROOT: &str = "accounts";

/// LLM providers this build can talk to.
pub const SUPPORTED_LLM_PROVIDERS: &[&str] = &["anthropic"];

/// Configuration for callbrief runs.
///
/// Resolved with precedence CLI > environment > config file > defaults.
/// Every section keeps `Option` fields so layers can be merged; use the
/// accessor methods to read effective values.
#[derive(Debug, Clone)]
pub struct Config {
    pub defaults: Defaults,
    pub retry: RetryConfig,
    pub discovery: DiscoveryConfig,
    pub search: SearchConfig,
    pub llm: LlmConfig,
    pub store: StoreConfig,
    /// Path of the config file that was loaded, if any
    pub config_path: Option<PathBuf>,
    pub source_attribution: HashMap<String, ConfigSource>,
}

/// `[defaults]` section
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    pub max_items: Option<usize>,
    pub concurrency: Option<usize>,
    /// Per external call, in seconds
    pub call_timeout: Option<u64>,
    /// Items that must be summarized for a run to count as successful
    pub min_summarized: Option<usize>,
    /// Skip synthesis when this run appended nothing new
    pub skip_unchanged: Option<bool>,
    pub verbose: Option<bool>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            max_items: Some(DEFAULT_MAX_ITEMS),
            concurrency: Some(DEFAULT_CONCURRENCY),
            call_timeout: Some(DEFAULT_CALL_TIMEOUT_SECS),
            min_summarized: Some(DEFAULT_MIN_SUMMARIZED),
            skip_unchanged: Some(false),
            verbose: Some(false),
        }
    }
}

/// `[retry]` section
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            initial_backoff_ms: Some(DEFAULT_INITIAL_BACKOFF_MS),
            max_backoff_ms: Some(DEFAULT_MAX_BACKOFF_MS),
        }
    }
}

/// `[discovery]` section: the sliding search window
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DiscoveryConfig {
    pub window_days: Option<u32>,
    pub max_windows: Option<u32>,
    pub max_consecutive_empty: Option<u32>,
    /// Seconds
    pub time_budget: Option<u64>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            window_days: Some(DEFAULT_WINDOW_DAYS),
            max_windows: Some(DEFAULT_MAX_WINDOWS),
            max_consecutive_empty: Some(DEFAULT_MAX_CONSECUTIVE_EMPTY),
            time_budget: Some(DEFAULT_TIME_BUDGET_SECS),
        }
    }
}

/// `[search]` section
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
    pub api_secret_env: Option<String>,
    /// Restrict discovery to calls hosted by these users
    pub team_user_ids: Option<Vec<String>>,
    /// Email domain of the home team; those participants are not customers
    pub internal_domain: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_SEARCH_BASE_URL.to_string()),
            api_key_env: Some(DEFAULT_SEARCH_KEY_ENV.to_string()),
            api_secret_env: Some(DEFAULT_SEARCH_SECRET_ENV.to_string()),
            team_user_ids: None,
            internal_domain: None,
        }
    }
}

/// `[llm]` section
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    pub provider: Option<String>,
    pub anthropic: Option<AnthropicConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Some(DEFAULT_LLM_PROVIDER.to_string()),
            anthropic: None,
        }
    }
}

/// `[llm.anthropic]` section
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// `[store]` section
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    pub root: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: Some(PathBuf::from(DEFAULT_STORE_ROOT)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            defaults: Defaults::default(),
            retry: RetryConfig::default(),
            discovery: DiscoveryConfig::default(),
            search: SearchConfig::default(),
            llm: LlmConfig::default(),
            store: StoreConfig::default(),
            config_path: None,
            source_attribution: HashMap::new(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn max_items(&self) -> usize {
        self.defaults.max_items.unwrap_or(DEFAULT_MAX_ITEMS)
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.defaults.concurrency.unwrap_or(DEFAULT_CONCURRENCY)
    }

    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(
            self.defaults
                .call_timeout
                .unwrap_or(DEFAULT_CALL_TIMEOUT_SECS),
        )
    }

    #[must_use]
    pub fn min_summarized(&self) -> usize {
        self.defaults.min_summarized.unwrap_or(DEFAULT_MIN_SUMMARIZED)
    }

    #[must_use]
    pub fn skip_unchanged(&self) -> bool {
        self.defaults.skip_unchanged.unwrap_or(false)
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.defaults.verbose.unwrap_or(false)
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.retry.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS)
    }

    #[must_use]
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(
            self.retry
                .initial_backoff_ms
                .unwrap_or(DEFAULT_INITIAL_BACKOFF_MS),
        )
    }

    #[must_use]
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.retry.max_backoff_ms.unwrap_or(DEFAULT_MAX_BACKOFF_MS))
    }

    #[must_use]
    pub fn window_days(&self) -> u32 {
        self.discovery.window_days.unwrap_or(DEFAULT_WINDOW_DAYS)
    }

    #[must_use]
    pub fn max_windows(&self) -> u32 {
        self.discovery.max_windows.unwrap_or(DEFAULT_MAX_WINDOWS)
    }

    #[must_use]
    pub fn max_consecutive_empty(&self) -> u32 {
        self.discovery
            .max_consecutive_empty
            .unwrap_or(DEFAULT_MAX_CONSECUTIVE_EMPTY)
    }

    #[must_use]
    pub fn time_budget(&self) -> Duration {
        Duration::from_secs(
            self.discovery
                .time_budget
                .unwrap_or(DEFAULT_TIME_BUDGET_SECS),
        )
    }

    #[must_use]
    pub fn search_base_url(&self) -> &str {
        self.search
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_SEARCH_BASE_URL)
    }

    #[must_use]
    pub fn search_key_env(&self) -> &str {
        self.search
            .api_key_env
            .as_deref()
            .unwrap_or(DEFAULT_SEARCH_KEY_ENV)
    }

    #[must_use]
    pub fn search_secret_env(&self) -> &str {
        self.search
            .api_secret_env
            .as_deref()
            .unwrap_or(DEFAULT_SEARCH_SECRET_ENV)
    }

    /// Team filter for discovery; empty means "everyone".
    #[must_use]
    pub fn team_user_ids(&self) -> &[String] {
        self.search.team_user_ids.as_deref().unwrap_or(&[])
    }

    #[must_use]
    pub fn llm_provider(&self) -> &str {
        self.llm.provider.as_deref().unwrap_or(DEFAULT_LLM_PROVIDER)
    }

    #[must_use]
    pub fn store_root(&self) -> PathBuf {
        self.store
            .root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_ROOT))
    }
}
