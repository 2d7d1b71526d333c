use std::collections::BTreeMap;

use super::{Config, ConfigSource};

impl Config {
    fn source_label(&self, key: &str) -> String {
        self.source_attribution
            .get(key)
            .copied()
            .unwrap_or(ConfigSource::Default)
            .to_string()
    }

    /// Effective configuration as `key -> (value, source)`, sorted by key.
    ///
    /// Only names of credential environment variables are reported, never
    /// their values.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut config = BTreeMap::new();
        let mut add = |key: &str, value: String| {
            config.insert(key.to_string(), (value, self.source_label(key)));
        };

        add("max_items", self.max_items().to_string());
        add("concurrency", self.concurrency().to_string());
        add("call_timeout", self.call_timeout().as_secs().to_string());
        add("min_summarized", self.min_summarized().to_string());
        add("skip_unchanged", self.skip_unchanged().to_string());
        add("verbose", self.verbose().to_string());
        add("max_attempts", self.max_attempts().to_string());
        add(
            "initial_backoff_ms",
            self.initial_backoff().as_millis().to_string(),
        );
        add("max_backoff_ms", self.max_backoff().as_millis().to_string());
        add("window_days", self.window_days().to_string());
        add("max_windows", self.max_windows().to_string());
        add(
            "max_consecutive_empty",
            self.max_consecutive_empty().to_string(),
        );
        add("time_budget", self.time_budget().as_secs().to_string());
        add("search_base_url", self.search_base_url().to_string());
        add("search_api_key_env", self.search_key_env().to_string());
        add("search_api_secret_env", self.search_secret_env().to_string());
        add("team_user_ids", self.team_user_ids().join(","));
        if let Some(domain) = &self.search.internal_domain {
            add("internal_domain", domain.clone());
        }
        add("llm_provider", self.llm_provider().to_string());
        if let Some(model) = self.llm.anthropic.as_ref().and_then(|a| a.model.clone()) {
            add("llm_anthropic", format!("model={model}"));
        }
        add("store_root", self.store_root().display().to_string());

        config
    }
}
