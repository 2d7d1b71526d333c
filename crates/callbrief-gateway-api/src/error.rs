use std::time::Duration;
use thiserror::Error;

use callbrief_utils::error::LlmError;

/// Failure of a call to an external collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    #[error("Storage I/O failed: {0}")]
    Io(String),
}

impl GatewayError {
    /// Timeouts, rate limits and temporary outages are worth retrying.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::RateLimited(_) | Self::Unavailable(_)
        )
    }

    #[must_use]
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }
}

impl From<LlmError> for GatewayError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout { duration } => Self::timeout("LLM request", duration),
            LlmError::ProviderQuota(msg) => Self::RateLimited(msg),
            LlmError::ProviderOutage(msg) | LlmError::Transport(msg) => Self::Unavailable(msg),
            LlmError::ProviderAuth(msg) => Self::Auth(msg),
            LlmError::Misconfiguration(msg) | LlmError::Unsupported(msg) => {
                Self::Misconfiguration(msg)
            }
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_split() {
        assert!(GatewayError::timeout("get_content", Duration::from_secs(1)).is_transient());
        assert!(GatewayError::RateLimited("429".into()).is_transient());
        assert!(GatewayError::Unavailable("503".into()).is_transient());
        assert!(!GatewayError::Auth("401".into()).is_transient());
        assert!(!GatewayError::InvalidResponse("junk".into()).is_transient());
        assert!(!GatewayError::Io("disk".into()).is_transient());
    }

    #[test]
    fn test_llm_error_mapping_keeps_retryability() {
        let cases = [
            (LlmError::ProviderQuota("429".into()), true),
            (LlmError::ProviderOutage("500".into()), true),
            (LlmError::Transport("reset".into()), true),
            (
                LlmError::Timeout {
                    duration: Duration::from_secs(3),
                },
                true,
            ),
            (LlmError::ProviderAuth("401".into()), false),
            (LlmError::Misconfiguration("no key".into()), false),
        ];
        for (llm, transient) in cases {
            assert_eq!(GatewayError::from(llm.clone()).is_transient(), transient, "{llm}");
        }
    }
}
