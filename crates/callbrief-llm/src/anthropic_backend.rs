//! Anthropic Messages API backend

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use callbrief_config::{
    Config, DEFAULT_ANTHROPIC_KEY_ENV, DEFAULT_ANTHROPIC_MAX_TOKENS, DEFAULT_ANTHROPIC_MODEL,
};
use callbrief_utils::error::LlmError;

use crate::http_client::HttpClient;
use crate::types::{LlmBackend, LlmInvocation, LlmResult, Message, Role};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

const DEFAULT_TEMPERATURE: f32 = 0.2;

#[derive(Clone)]
pub(crate) struct AnthropicBackend {
    client: HttpClient,
    base_url: String,
    api_key: String,
    default_model: String,
    default_params: HttpParams,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HttpParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for HttpParams {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_ANTHROPIC_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl AnthropicBackend {
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the HTTP client cannot be constructed
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        default_model: String,
        default_params: HttpParams,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: HttpClient::new()?,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            default_model,
            default_params,
        })
    }

    /// Build a backend from `[llm.anthropic]`, reading the key through `env`.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the API key variable is unset
    /// or empty, or the HTTP client cannot be constructed.
    pub fn new_from_config(
        config: &Config,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, LlmError> {
        let section = config.llm.anthropic.as_ref();

        let api_key_env = section
            .and_then(|a| a.api_key_env.as_deref())
            .unwrap_or(DEFAULT_ANTHROPIC_KEY_ENV);

        let api_key = env(api_key_env)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                LlmError::Misconfiguration(format!(
                    "Anthropic API key not found in environment variable '{api_key_env}'. \
                     Set it or configure a different api_key_env in [llm.anthropic]."
                ))
            })?;

        let base_url = section.and_then(|a| a.base_url.clone());
        let default_model = section
            .and_then(|a| a.model.clone())
            .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string());

        let default_params = HttpParams {
            max_tokens: section
                .and_then(|a| a.max_tokens)
                .unwrap_or(DEFAULT_ANTHROPIC_MAX_TOKENS),
            temperature: section
                .and_then(|a| a.temperature)
                .unwrap_or(DEFAULT_TEMPERATURE),
        };

        Self::new(api_key, base_url, default_model, default_params)
    }

    /// `inv.model` and `inv.metadata` override the backend defaults.
    fn resolve_params(&self, inv: &LlmInvocation) -> (String, HttpParams) {
        let model = if inv.model.is_empty() {
            self.default_model.clone()
        } else {
            inv.model.clone()
        };

        let max_tokens = inv
            .metadata
            .get("max_tokens")
            .and_then(serde_json::Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(self.default_params.max_tokens);

        let temperature = inv
            .metadata
            .get("temperature")
            .and_then(serde_json::Value::as_f64)
            .map(|v| v as f32)
            .unwrap_or(self.default_params.temperature);

        (
            model,
            HttpParams {
                max_tokens,
                temperature,
            },
        )
    }

    /// System messages go in the top-level `system` field; the rest stay in
    /// order in `messages`.
    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<AnthropicMessage>) {
        let mut system_prompt: Option<String> = None;
        let mut anthropic_messages = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => match system_prompt.as_mut() {
                    Some(existing) => {
                        existing.push_str("\n\n");
                        existing.push_str(&msg.content);
                    }
                    None => system_prompt = Some(msg.content.clone()),
                },
                Role::User => anthropic_messages.push(AnthropicMessage {
                    role: "user",
                    content: msg.content.clone(),
                }),
                Role::Assistant => anthropic_messages.push(AnthropicMessage {
                    role: "assistant",
                    content: msg.content.clone(),
                }),
            }
        }

        (system_prompt, anthropic_messages)
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let (model, params) = self.resolve_params(&inv);

        debug!(
            provider = "anthropic",
            operation = %inv.operation,
            model = %model,
            max_tokens = params.max_tokens,
            timeout_secs = inv.timeout.as_secs(),
            "Invoking Anthropic backend"
        );

        let (system, messages) = Self::convert_messages(&inv.messages);
        let body = AnthropicRequest {
            model: model.clone(),
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            system,
        };

        let request = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        let response = self
            .client
            .execute_with_retry(request, inv.timeout, "anthropic")
            .await?;

        let response_body: AnthropicResponse = response.json().await.map_err(|e| {
            LlmError::Transport(format!("Failed to parse Anthropic response: {e}"))
        })?;

        let result = response_body.into_result(model)?;

        debug!(
            provider = "anthropic",
            operation = %inv.operation,
            tokens_input = ?result.tokens_input,
            tokens_output = ?result.tokens_output,
            "Anthropic invocation completed"
        );

        Ok(result)
    }
}

#[derive(Debug, Clone, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

impl AnthropicResponse {
    /// Concatenate the text blocks; tool-use and other block types are ignored.
    fn into_result(self, model: String) -> Result<LlmResult, LlmError> {
        let content: String = self
            .content
            .into_iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text)
            .collect();

        if content.is_empty() {
            return Err(LlmError::Transport(
                "Anthropic response missing text content".to_string(),
            ));
        }

        let result = LlmResult::new(content, "anthropic", model);
        Ok(match self.usage {
            Some(usage) => result.with_tokens(usage.input_tokens, usage.output_tokens),
            None => result,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn backend() -> AnthropicBackend {
        AnthropicBackend::new(
            "test-key".to_string(),
            None,
            "default-model".to_string(),
            HttpParams {
                max_tokens: 1024,
                temperature: 0.5,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_params_uses_defaults() {
        let inv = LlmInvocation::new("summarize", "", Duration::from_secs(60), vec![]);
        let (model, params) = backend().resolve_params(&inv);

        assert_eq!(model, "default-model");
        assert_eq!(params.max_tokens, 1024);
        assert_eq!(params.temperature, 0.5);
    }

    #[test]
    fn test_resolve_params_overrides() {
        let inv = LlmInvocation::new("classify", "custom-model", Duration::from_secs(60), vec![])
            .with_max_tokens(10)
            .with_metadata("temperature", serde_json::json!(0.0));
        let (model, params) = backend().resolve_params(&inv);

        assert_eq!(model, "custom-model");
        assert_eq!(params.max_tokens, 10);
        assert_eq!(params.temperature, 0.0);
    }

    #[test]
    fn test_convert_messages_separates_system() {
        let messages = vec![
            Message::system("You are an analyst"),
            Message::user("Hello"),
            Message::new(Role::Assistant, "Hi"),
            Message::system("Be brief"),
        ];

        let (system, converted) = AnthropicBackend::convert_messages(&messages);

        assert_eq!(system.as_deref(), Some("You are an analyst\n\nBe brief"));
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0].role, "user");
        assert_eq!(converted[1].role, "assistant");
    }

    #[test]
    fn test_request_omits_empty_system() {
        let body = AnthropicRequest {
            model: "m".into(),
            messages: vec![],
            max_tokens: 10,
            temperature: 0.2,
            system: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_response_joins_text_blocks_and_reads_usage() {
        let json = r#"{
            "content": [
                {"type": "text", "text": "Hello, "},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "world"}
            ],
            "usage": {"input_tokens": 12, "output_tokens": 3}
        }"#;
        let response: AnthropicResponse = serde_json::from_str(json).unwrap();
        let result = response.into_result("m".into()).unwrap();

        assert_eq!(result.raw_response, "Hello, world");
        assert_eq!(result.tokens_input, Some(12));
        assert_eq!(result.tokens_output, Some(3));
    }

    #[test]
    fn test_response_without_text_is_an_error() {
        let response: AnthropicResponse =
            serde_json::from_str(r#"{"content": [], "usage": null}"#).unwrap();
        assert!(matches!(
            response.into_result("m".into()),
            Err(LlmError::Transport(_))
        ));
    }

    #[test]
    fn test_new_from_config_requires_key() {
        let config = Config::default();
        let err = AnthropicBackend::new_from_config(&config, |_| None)
            .err()
            .unwrap();
        assert!(err.to_string().contains(DEFAULT_ANTHROPIC_KEY_ENV));

        let blank = AnthropicBackend::new_from_config(&config, |_| Some("  ".into()));
        assert!(blank.is_err());
    }

    #[test]
    fn test_new_from_config_uses_section_values() {
        let mut config = Config::default();
        config.llm.anthropic = Some(callbrief_config::AnthropicConfig {
            api_key_env: Some("MY_KEY".into()),
            base_url: Some("http://localhost:8080/v1/messages".into()),
            model: Some("claude-test".into()),
            max_tokens: Some(500),
            temperature: None,
        });

        let backend = AnthropicBackend::new_from_config(&config, |name| {
            (name == "MY_KEY").then(|| "secret".to_string())
        })
        .unwrap();

        assert_eq!(backend.base_url, "http://localhost:8080/v1/messages");
        assert_eq!(backend.default_model, "claude-test");
        assert_eq!(backend.default_params.max_tokens, 500);
        assert_eq!(backend.default_params.temperature, DEFAULT_TEMPERATURE);
    }
}
