//! [`SearchGateway`] over the Gong v2 REST API.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use callbrief_config::Config;
use callbrief_gateway_api::{GatewayError, SearchGateway, TimeWindow, WorkItem};
use callbrief_utils::ConfigError;
use callbrief_utils::redaction::redact_error_message;

use crate::wire::{
    CallFilter, ContentSelector, ExtensiveRequest, ExtensiveResponse, TranscriptRequest,
    TranscriptResponse,
};

const EXTENSIVE_PATH: &str = "/v2/calls/extensive";
const TRANSCRIPT_PATH: &str = "/v2/calls/transcript";

/// Upper bound on pages fetched for one window.
const MAX_PAGES_PER_WINDOW: usize = 50;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GongSearchGateway {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    timeout: Duration,
    /// Speaker ids seen in `list_items`, keyed by call id
    speakers: Mutex<HashMap<String, HashMap<String, String>>>,
}

impl std::fmt::Debug for GongSearchGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GongSearchGateway")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl GongSearchGateway {
    /// # Errors
    ///
    /// Returns `GatewayError::Misconfiguration` if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| GatewayError::Misconfiguration(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            timeout,
            speakers: Mutex::new(HashMap::new()),
        })
    }

    /// Build from `[search]`, reading credentials through `env`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when a credential variable is
    /// unset or empty.
    pub fn from_config(
        config: &Config,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let credential = |name: &str| {
            env(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| {
                    ConfigError::MissingRequired(format!(
                        "environment variable {name} (Gong API credential)"
                    ))
                })
        };
        let key = credential(config.search_key_env())?;
        let secret = credential(config.search_secret_env())?;

        Self::new(config.search_base_url(), key, secret, config.call_timeout()).map_err(|e| {
            ConfigError::InvalidValue {
                key: "search.base_url".to_string(),
                value: e.to_string(),
            }
        })
    }

    /// POST a JSON body. `Ok(None)` on 404.
    async fn post<B, R>(&self, path: &str, body: &B) -> Result<Option<R>, GatewayError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(path, &e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(path, "Gong returned 404");
            return Ok(None);
        }
        let response = check_status(response, path).await?;

        response
            .json::<R>()
            .await
            .map(Some)
            .map_err(|e| GatewayError::InvalidResponse(format!("{path}: {e}")))
    }

    fn map_transport_error(&self, path: &str, err: &reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            return GatewayError::timeout(format!("POST {path}"), self.timeout);
        }
        GatewayError::Unavailable(format!(
            "{path}: {}",
            redact_error_message(&err.to_string())
        ))
    }

    fn remember_speakers(&self, id: &str, speakers: HashMap<String, String>) {
        if speakers.is_empty() {
            return;
        }
        if let Ok(mut cache) = self.speakers.lock() {
            cache.insert(id.to_string(), speakers);
        }
    }

    fn speakers_for(&self, id: &str) -> HashMap<String, String> {
        self.speakers
            .lock()
            .ok()
            .and_then(|cache| cache.get(id).cloned())
            .unwrap_or_default()
    }
}

async fn check_status(response: Response, path: &str) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = redact_error_message(body.trim());
    warn!(path, status = status.as_u16(), "Gong request failed");
    Err(map_status(status, &format!("{path} returned {status}: {detail}")))
}

/// 429 and 5xx are transient; 401/403 are credential problems; any other
/// status means the request itself was rejected.
pub(crate) fn map_status(status: StatusCode, message: &str) -> GatewayError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => GatewayError::RateLimited(message.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Auth(message.to_string()),
        s if s.is_server_error() => GatewayError::Unavailable(message.to_string()),
        _ => GatewayError::InvalidResponse(message.to_string()),
    }
}

#[async_trait]
impl SearchGateway for GongSearchGateway {
    async fn list_items(
        &self,
        account: &str,
        window: TimeWindow,
        team_filter: Option<&[String]>,
    ) -> Result<Vec<WorkItem>, GatewayError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        for page in 1..=MAX_PAGES_PER_WINDOW {
            let body = ExtensiveRequest {
                filter: CallFilter::window(window, team_filter),
                content_selector: ContentSelector::default(),
                cursor: cursor.as_deref(),
            };
            let Some(response) = self
                .post::<_, ExtensiveResponse>(EXTENSIVE_PATH, &body)
                .await?
            else {
                // Gong answers 404 for windows without calls
                break;
            };

            for call in &response.calls {
                if let Some(item) = call.to_work_item() {
                    self.remember_speakers(&item.id, call.speakers());
                    items.push(item);
                }
            }

            debug!(
                account,
                page,
                total = items.len(),
                "Fetched call page"
            );

            match response.next_cursor() {
                Some(next) => cursor = Some(next.to_string()),
                None => break,
            }
            if page == MAX_PAGES_PER_WINDOW {
                warn!(account, "Page limit reached inside one window; results truncated");
            }
        }

        Ok(items)
    }

    async fn get_content(&self, item_id: &str) -> Result<Option<String>, GatewayError> {
        let body = TranscriptRequest {
            filter: CallFilter::call(item_id),
        };
        let Some(response) = self
            .post::<_, TranscriptResponse>(TRANSCRIPT_PATH, &body)
            .await?
        else {
            return Ok(None);
        };

        let transcript = response
            .call_transcripts
            .iter()
            .find(|t| t.call_id.as_deref().is_none_or(|id| id == item_id));
        let Some(transcript) = transcript else {
            return Ok(None);
        };

        let text = transcript.render(&self.speakers_for(item_id));
        Ok((!text.trim().is_empty()).then_some(text))
    }
}
