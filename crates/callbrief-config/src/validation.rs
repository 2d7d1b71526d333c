use callbrief_utils::error::ConfigError;

use super::{Config, SUPPORTED_LLM_PROVIDERS};

fn invalid(key: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
    }
}

impl Config {
    /// Validate configuration values
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.max_items() == 0 {
            return Err(invalid("max_items", "must be greater than 0"));
        }

        let concurrency = self.concurrency();
        if !(1..=64).contains(&concurrency) {
            return Err(invalid(
                "concurrency",
                format!("{concurrency} is outside 1..=64"),
            ));
        }

        let max_attempts = self.max_attempts();
        if !(1..=10).contains(&max_attempts) {
            return Err(invalid(
                "max_attempts",
                format!("{max_attempts} is outside 1..=10"),
            ));
        }

        if self.max_backoff() < self.initial_backoff() {
            return Err(invalid(
                "max_backoff_ms",
                "must not be smaller than initial_backoff_ms",
            ));
        }

        let call_timeout = self.call_timeout().as_secs();
        if call_timeout < 5 {
            return Err(invalid("call_timeout", "must be at least 5 seconds"));
        }
        if call_timeout > 7200 {
            return Err(invalid(
                "call_timeout",
                "exceeds maximum limit of 7200 seconds (2 hours)",
            ));
        }

        if self.window_days() == 0 {
            return Err(invalid("window_days", "must be greater than 0"));
        }
        if self.max_windows() == 0 {
            return Err(invalid("max_windows", "must be greater than 0"));
        }

        let provider = self.llm_provider();
        if !SUPPORTED_LLM_PROVIDERS.contains(&provider) {
            return Err(invalid(
                "llm_provider",
                format!(
                    "unknown provider '{provider}' (supported: {})",
                    SUPPORTED_LLM_PROVIDERS.join(", ")
                ),
            ));
        }

        if !self.search_base_url().starts_with("http://")
            && !self.search_base_url().starts_with("https://")
        {
            return Err(invalid("search_base_url", "must be an http(s) URL"));
        }

        Ok(())
    }
}
