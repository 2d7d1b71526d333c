//! LLM backends and the LLM-backed synthesis gateway
//!
//! Providers implement [`LlmBackend`]; [`LlmSynthesisGateway`] turns any
//! backend into the summarize / synthesize / classify / filter operations the
//! engine needs.

mod anthropic_backend;
pub(crate) mod http_client;
pub mod prompts;
mod synthesis;
mod types;

use std::sync::Arc;

use callbrief_config::{Config, SUPPORTED_LLM_PROVIDERS};

pub use callbrief_utils::error::LlmError;
pub use synthesis::LlmSynthesisGateway;
pub use types::{LlmBackend, LlmInvocation, LlmResult, Message, Role};

pub(crate) use anthropic_backend::AnthropicBackend;

/// Create the configured LLM backend.
///
/// # Errors
///
/// Returns `LlmError::Unsupported` for an unknown provider and
/// `LlmError::Misconfiguration` when the provider's settings are incomplete
/// (missing API key, unbuildable HTTP client).
pub fn from_config(config: &Config) -> Result<Arc<dyn LlmBackend>, LlmError> {
    from_config_with_env(config, |name| std::env::var(name).ok())
}

/// [`from_config`] with an explicit environment lookup.
///
/// # Errors
///
/// Same as [`from_config`].
pub fn from_config_with_env(
    config: &Config,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn LlmBackend>, LlmError> {
    match config.llm_provider() {
        "anthropic" => Ok(Arc::new(AnthropicBackend::new_from_config(config, env)?)),
        unknown => Err(LlmError::Unsupported(format!(
            "Unknown LLM provider '{unknown}'. Supported providers: {}.",
            SUPPORTED_LLM_PROVIDERS.join(", ")
        ))),
    }
}

/// Build the synthesis gateway for `config` in one step.
///
/// # Errors
///
/// Same as [`from_config`].
pub fn synthesis_gateway(config: &Config) -> Result<LlmSynthesisGateway, LlmError> {
    let backend = from_config(config)?;
    Ok(LlmSynthesisGateway::new(backend, config.call_timeout())
        .with_internal_domain(config.search.internal_domain.clone()))
}
