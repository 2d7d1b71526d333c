//! Error taxonomy for callbrief.
//!
//! Each layer owns a `thiserror` enum. Everything that reaches the user goes
//! through [`CallbriefError`], which knows how to explain itself
//! ([`UserFriendlyError`]) and which exit code it maps to.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::exit_codes::ExitCode;

/// Top-level error surfaced by the CLI.
#[derive(Error, Debug)]
pub enum CallbriefError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM backend error: {0}")]
    Llm(#[from] LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No calls found for account '{account}'")]
    NoSuchAccount { account: String },

    #[error("Account '{account}' is ambiguous: {}", .candidates.join(", "))]
    AmbiguousAccount {
        account: String,
        candidates: Vec<String>,
    },

    #[error("Discovery failed for account '{account}': {reason}")]
    DiscoveryFailed { account: String, reason: String },

    /// A collaborator refused the configured credentials or settings.
    #[error("Discovery for account '{account}' was refused: {reason}")]
    DiscoveryRefused { account: String, reason: String },

    #[error("Only {summarized} call(s) summarized, {required} required")]
    NothingSummarized { required: usize, summarized: usize },

    #[error("{stage} failed after retries: {reason}")]
    FinalizeFailed { stage: String, reason: String },

    #[error("Run cancelled during {stage}")]
    Cancelled { stage: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Discovery,
    Processing,
    LlmIntegration,
    FileSystem,
    Cancellation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Discovery => write!(f, "Discovery"),
            Self::Processing => write!(f, "Processing"),
            Self::LlmIntegration => write!(f, "LLM Integration"),
            Self::FileSystem => write!(f, "File System"),
            Self::Cancellation => write!(f, "Cancellation"),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration discovery failed: {reason}")]
    DiscoveryFailed { reason: String },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::MissingRequired(key) => {
                format!("Required configuration '{key}' is missing")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => {
                format!("Configuration file not found: {path}")
            }
            Self::DiscoveryFailed { reason } => {
                format!("Failed to discover configuration: {reason}")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => Some(
                "Configuration files are TOML with [defaults], [retry], [discovery], [search], [llm] and [store] sections."
                    .to_string(),
            ),
            Self::MissingRequired(_) => {
                Some("Credentials are read from the environment variables named in the config.".to_string())
            }
            Self::InvalidValue { key, .. } => Some(format!(
                "The '{key}' configuration option has specific range requirements."
            )),
            Self::NotFound { .. } | Self::DiscoveryFailed { .. } => Some(
                "callbrief searches for .callbrief/config.toml from the current directory upward."
                    .to_string(),
            ),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax of .callbrief/config.toml".to_string(),
                "Run 'callbrief config' to see the effective configuration".to_string(),
            ],
            Self::MissingRequired(key) => vec![
                format!("Export the environment variable for '{key}'"),
                "Check the api_key_env settings in .callbrief/config.toml".to_string(),
            ],
            Self::InvalidValue { key, .. } => match key.as_str() {
                "concurrency" => vec!["Use a value between 1 and 64".to_string()],
                "max_attempts" => vec!["Use a value between 1 and 10".to_string()],
                "call_timeout" => vec!["Use at least 5 seconds".to_string()],
                "llm_provider" => vec!["Use 'anthropic'".to_string()],
                _ => vec![
                    "Use a positive value for this option".to_string(),
                    "Remove the option to use the default value".to_string(),
                ],
            },
            Self::NotFound { .. } => vec![
                "Create .callbrief/config.toml in your project root".to_string(),
                "Pass --config <path> to point at an existing file".to_string(),
            ],
            Self::DiscoveryFailed { .. } => vec![
                "Check read permissions on the current directory and its parents".to_string(),
                "Use --config <path> to specify configuration file explicitly".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// LLM backend errors
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    /// Transport-level failure (HTTP connectivity)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider authentication failure (401, 403, missing API key)
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// Provider quota/rate limit exceeded (429)
    #[error("Provider quota exceeded: {0}")]
    ProviderQuota(String),

    /// Provider service outage (5xx errors)
    #[error("Provider outage: {0}")]
    ProviderOutage(String),

    /// Invocation timed out
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Configuration error
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    /// Unsupported feature or provider
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl LlmError {
    /// Whether retrying the same request later could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::ProviderQuota(_) | Self::ProviderOutage(_) | Self::Timeout { .. }
        )
    }
}

impl UserFriendlyError for LlmError {
    fn user_message(&self) -> String {
        match self {
            Self::Transport(msg) => format!("LLM transport error: {msg}"),
            Self::ProviderAuth(msg) => format!("LLM provider authentication failed: {msg}"),
            Self::ProviderQuota(msg) => format!("LLM provider quota exceeded: {msg}"),
            Self::ProviderOutage(msg) => format!("LLM provider service outage: {msg}"),
            Self::Timeout { duration } => {
                format!("LLM invocation timed out after {duration:?}")
            }
            Self::Misconfiguration(msg) => format!("LLM configuration error: {msg}"),
            Self::Unsupported(msg) => format!("LLM feature not supported: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::ProviderAuth(_) => {
                Some("The provider rejected the configured API key.".to_string())
            }
            Self::ProviderQuota(_) | Self::ProviderOutage(_) => Some(
                "Provider-side failures are retried with backoff before being reported."
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::ProviderAuth(_) | Self::Misconfiguration(_) => vec![
                "Check that the API key environment variable is set".to_string(),
                "Verify [llm] settings in .callbrief/config.toml".to_string(),
            ],
            Self::ProviderQuota(_) => vec![
                "Lower --concurrency to reduce request rate".to_string(),
                "Wait and re-run; finished calls are not summarized twice".to_string(),
            ],
            Self::Timeout { .. } => vec!["Increase --call-timeout".to_string()],
            _ => vec!["Re-run later; finished calls are not summarized twice".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::LlmIntegration
    }
}

impl UserFriendlyError for CallbriefError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(e) => e.user_message(),
            Self::Llm(e) => e.user_message(),
            other => other.to_string(),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(e) => e.context(),
            Self::Llm(e) => e.context(),
            Self::NoSuchAccount { .. } => Some(
                "Discovery searched the configured time windows and found no matching calls."
                    .to_string(),
            ),
            Self::AmbiguousAccount { .. } => Some(
                "Several existing account folders plausibly match the requested name.".to_string(),
            ),
            Self::NothingSummarized { .. } => Some(
                "Calls were found but too few could be summarized to produce a brief."
                    .to_string(),
            ),
            Self::FinalizeFailed { .. } => Some(
                "Summaries already written are kept; re-running resumes from them.".to_string(),
            ),
            Self::DiscoveryRefused { .. } => Some(
                "The search service rejected the configured credentials or settings.".to_string(),
            ),
            Self::Cancelled { .. } => {
                Some("No brief was written for the cancelled run.".to_string())
            }
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(e) => e.suggestions(),
            Self::Llm(e) => e.suggestions(),
            Self::NoSuchAccount { .. } => vec![
                "Check the spelling of the account name".to_string(),
                "Increase [discovery] max_windows to search further back".to_string(),
            ],
            Self::AmbiguousAccount { candidates, .. } => candidates
                .iter()
                .map(|c| format!("Re-run with --account \"{c}\""))
                .collect(),
            Self::NothingSummarized { .. } => vec![
                "Re-run with --verbose to see why calls were skipped".to_string(),
                "Lower [defaults] min_summarized if partial briefs are acceptable".to_string(),
            ],
            Self::FinalizeFailed { .. } => vec!["Re-run the same command".to_string()],
            Self::DiscoveryRefused { .. } => vec![
                "Check GONG_ACCESS_KEY and GONG_ACCESS_SECRET".to_string(),
                "Verify [search] settings in .callbrief/config.toml".to_string(),
            ],
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Llm(_) => ErrorCategory::LlmIntegration,
            Self::Io(_) => ErrorCategory::FileSystem,
            Self::NoSuchAccount { .. }
            | Self::AmbiguousAccount { .. }
            | Self::DiscoveryFailed { .. }
            | Self::DiscoveryRefused { .. } => ErrorCategory::Discovery,
            Self::NothingSummarized { .. } | Self::FinalizeFailed { .. } | Self::Internal(_) => {
                ErrorCategory::Processing
            }
            Self::Cancelled { .. } => ErrorCategory::Cancellation,
        }
    }
}

impl CallbriefError {
    /// Render message, context and suggestions for terminal output.
    ///
    /// Secrets are scrubbed from the final text.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = format!("Error: {}\n", self.user_message());

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        crate::redaction::redact_error_message(&output)
    }

    /// Map this error to the CLI exit code.
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) => ExitCode::CLI_ARGS,
            Self::Llm(LlmError::Misconfiguration(_) | LlmError::Unsupported(_)) => {
                ExitCode::CLI_ARGS
            }
            Self::DiscoveryRefused { .. } => ExitCode::CLI_ARGS,
            Self::NoSuchAccount { .. } => ExitCode::NO_SUCH_ACCOUNT,
            Self::AmbiguousAccount { .. } => ExitCode::AMBIGUOUS_ACCOUNT,
            Self::NothingSummarized { .. } => ExitCode::NOTHING_SUMMARIZED,
            Self::FinalizeFailed { .. } => ExitCode::FINALIZE_FAILED,
            Self::Cancelled { .. } => ExitCode::CANCELLED,
            _ => ExitCode::INTERNAL,
        }
    }
}
