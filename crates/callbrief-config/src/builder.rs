use std::path::PathBuf;
use std::time::Duration;

use callbrief_utils::error::ConfigError;

use super::discovery::TRACKED_KEYS;
use super::{AnthropicConfig, Config, ConfigSource};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// No config file or environment variable is consulted.
    ///
    /// ```rust
    /// use callbrief_config::Config;
    /// use std::time::Duration;
    ///
    /// let config = Config::builder()
    ///     .max_items(10)
    ///     .concurrency(4)
    ///     .call_timeout(Duration::from_secs(60))
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.max_items(), 10);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for programmatic configuration.
///
/// Every value set through the builder is attributed to
/// `ConfigSource::Programmatic`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    max_items: Option<usize>,
    concurrency: Option<usize>,
    call_timeout: Option<Duration>,
    min_summarized: Option<usize>,
    skip_unchanged: Option<bool>,
    max_attempts: Option<u32>,
    initial_backoff: Option<Duration>,
    max_backoff: Option<Duration>,
    window_days: Option<u32>,
    max_windows: Option<u32>,
    time_budget: Option<Duration>,
    team_user_ids: Option<Vec<String>>,
    store_root: Option<PathBuf>,
    llm_provider: Option<String>,
    anthropic: Option<AnthropicConfig>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_items(mut self, n: usize) -> Self {
        self.max_items = Some(n);
        self
    }

    #[must_use]
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = Some(n);
        self
    }

    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn min_summarized(mut self, n: usize) -> Self {
        self.min_summarized = Some(n);
        self
    }

    #[must_use]
    pub fn skip_unchanged(mut self, skip: bool) -> Self {
        self.skip_unchanged = Some(skip);
        self
    }

    #[must_use]
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = Some(n);
        self
    }

    /// Set both ends of the retry backoff range.
    #[must_use]
    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = Some(initial);
        self.max_backoff = Some(max);
        self
    }

    #[must_use]
    pub fn window_days(mut self, days: u32) -> Self {
        self.window_days = Some(days);
        self
    }

    #[must_use]
    pub fn max_windows(mut self, n: u32) -> Self {
        self.max_windows = Some(n);
        self
    }

    #[must_use]
    pub fn time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    #[must_use]
    pub fn team_user_ids(mut self, ids: Vec<String>) -> Self {
        self.team_user_ids = Some(ids);
        self
    }

    #[must_use]
    pub fn store_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.store_root = Some(root.into());
        self
    }

    #[must_use]
    pub fn llm_provider(mut self, provider: impl Into<String>) -> Self {
        self.llm_provider = Some(provider.into());
        self
    }

    #[must_use]
    pub fn anthropic(mut self, anthropic: AnthropicConfig) -> Self {
        self.anthropic = Some(anthropic);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        for key in TRACKED_KEYS {
            config
                .source_attribution
                .insert((*key).to_string(), ConfigSource::Default);
        }

        let set = |config: &mut Config, key: &str| {
            config
                .source_attribution
                .insert(key.to_string(), ConfigSource::Programmatic);
        };

        if let Some(n) = self.max_items {
            config.defaults.max_items = Some(n);
            set(&mut config, "max_items");
        }
        if let Some(n) = self.concurrency {
            config.defaults.concurrency = Some(n);
            set(&mut config, "concurrency");
        }
        if let Some(t) = self.call_timeout {
            config.defaults.call_timeout = Some(t.as_secs());
            set(&mut config, "call_timeout");
        }
        if let Some(n) = self.min_summarized {
            config.defaults.min_summarized = Some(n);
            set(&mut config, "min_summarized");
        }
        if let Some(skip) = self.skip_unchanged {
            config.defaults.skip_unchanged = Some(skip);
            set(&mut config, "skip_unchanged");
        }
        if let Some(n) = self.max_attempts {
            config.retry.max_attempts = Some(n);
            set(&mut config, "max_attempts");
        }
        if let Some(d) = self.initial_backoff {
            config.retry.initial_backoff_ms = Some(d.as_millis() as u64);
            set(&mut config, "initial_backoff_ms");
        }
        if let Some(d) = self.max_backoff {
            config.retry.max_backoff_ms = Some(d.as_millis() as u64);
            set(&mut config, "max_backoff_ms");
        }
        if let Some(days) = self.window_days {
            config.discovery.window_days = Some(days);
            set(&mut config, "window_days");
        }
        if let Some(n) = self.max_windows {
            config.discovery.max_windows = Some(n);
            set(&mut config, "max_windows");
        }
        if let Some(t) = self.time_budget {
            config.discovery.time_budget = Some(t.as_secs());
            set(&mut config, "time_budget");
        }
        if let Some(ids) = self.team_user_ids {
            config.search.team_user_ids = Some(ids);
            set(&mut config, "team_user_ids");
        }
        if let Some(root) = self.store_root {
            config.store.root = Some(root);
            set(&mut config, "store_root");
        }
        if let Some(provider) = self.llm_provider {
            config.llm.provider = Some(provider);
            set(&mut config, "llm_provider");
        }
        if let Some(anthropic) = self.anthropic {
            config.llm.anthropic = Some(anthropic);
            set(&mut config, "llm_anthropic");
        }

        config.validate()?;
        Ok(config)
    }
}
