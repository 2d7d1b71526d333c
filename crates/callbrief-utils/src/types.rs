//! Small enums shared across crates.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Source of a configuration value.
///
/// Precedence, highest first: CLI arguments, environment, config file,
/// programmatic overrides, built-in defaults.
///
/// ```rust
/// use callbrief_utils::types::ConfigSource;
///
/// let json = serde_json::to_string(&ConfigSource::Env).unwrap();
/// assert_eq!(json, r#""env""#);
/// assert_eq!(ConfigSource::Cli.to_string(), "cli");
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConfigSource {
    /// Value provided via CLI argument (highest precedence).
    Cli,
    /// Value read from a `CALLBRIEF_*` environment variable.
    Env,
    /// Value loaded from configuration file.
    Config,
    /// Value provided programmatically through the config builder.
    Programmatic,
    /// Built-in default value (lowest precedence).
    Default,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_config_source_parses_from_lowercase() {
        assert_eq!(ConfigSource::from_str("config").unwrap(), ConfigSource::Config);
        assert_eq!(ConfigSource::from_str("default").unwrap(), ConfigSource::Default);
        assert!(ConfigSource::from_str("nope").is_err());
    }
}
