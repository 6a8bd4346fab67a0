// Anthropic Claude Translation Driver
//
// Implementation of TranslationDriver for Anthropic's Claude API.
// Uses the Messages API with streaming support; only text deltas are kept.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use scrivener_core::config::ProviderConfig;
use scrivener_core::driver::{
    Fragment, FragmentStream, ModelSettings, TranslationDriver, TranslationRequest,
};
use scrivener_core::error::{Result, TranslateError};

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Anthropic requires max_tokens on every request
const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Anthropic Claude Translation Driver
///
/// Implements `TranslationDriver` for Anthropic's Messages API.
///
/// # Example
///
/// ```ignore
/// use scrivener_anthropic::AnthropicTranslationDriver;
///
/// let driver = AnthropicTranslationDriver::from_env()?;
/// // or
/// let driver = AnthropicTranslationDriver::new("your-api-key");
/// // or with custom endpoint
/// let driver = AnthropicTranslationDriver::with_base_url("your-api-key", "https://api.example.com/v1/messages");
/// ```
#[derive(Clone)]
pub struct AnthropicTranslationDriver {
    client: Client,
    api_key: String,
    api_url: String,
    settings: ModelSettings,
}

impl AnthropicTranslationDriver {
    /// Create a new driver with the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_API_URL)
    }

    /// Create a new driver from the ANTHROPIC_API_KEY environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            TranslateError::config("ANTHROPIC_API_KEY environment variable not set")
        })?;
        Ok(Self::new(api_key))
    }

    /// Create a new driver with a custom API URL
    pub fn with_base_url(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: api_url.into(),
            settings: ModelSettings::new(DEFAULT_MODEL).with_max_tokens(DEFAULT_MAX_TOKENS),
        }
    }

    /// Build from run configuration; the API key is required
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                TranslateError::config("ANTHROPIC_API_KEY is required for the anthropic provider")
            })?;

        let mut settings = ModelSettings::new(config.model.as_deref().unwrap_or(DEFAULT_MODEL));
        settings.temperature = config.temperature;
        settings.max_tokens = Some(config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS));

        Ok(Self::with_base_url(
            api_key,
            config.api_url.as_deref().unwrap_or(DEFAULT_API_URL),
        )
        .with_settings(settings))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.settings.model = model.into();
        self
    }

    pub fn with_settings(mut self, settings: ModelSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }
}

#[async_trait]
impl TranslationDriver for AnthropicTranslationDriver {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn stream(&self, request: &TranslationRequest) -> Result<FragmentStream> {
        // Ensure max_tokens is set (required by Anthropic)
        let max_tokens = match self.settings.max_tokens {
            Some(0) | None => DEFAULT_MAX_TOKENS,
            Some(n) => n,
        };

        let body = AnthropicRequest {
            model: &self.settings.model,
            max_tokens,
            temperature: self.settings.temperature,
            system: Some(request.system_prompt.as_str()).filter(|s| !s.is_empty()),
            messages: vec![AnthropicMessage {
                role: "user",
                content: &request.user_prompt,
            }],
            stream: true,
        };

        debug!(unit = %request.unit, model = %self.settings.model, "Sending messages request");
        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| TranslateError::network(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(TranslateError::backend(status.as_u16(), error_text));
        }

        let fragments = response.bytes_stream().eventsource().filter_map(|result| async move {
            match result {
                Ok(event) => parse_event(&event.event, &event.data),
                Err(e) => Some(Err(TranslateError::network(format!("Stream error: {}", e)))),
            }
        });

        Ok(Box::pin(fragments))
    }
}

/// Map one SSE event to a fragment; `None` for events carrying no text
pub(crate) fn parse_event(event: &str, data: &str) -> Option<Result<Fragment>> {
    match event {
        "content_block_delta" => match serde_json::from_str::<AnthropicContentBlockDeltaEvent>(data) {
            Ok(parsed) => match parsed.delta {
                AnthropicDelta::TextDelta { text } if !text.is_empty() => {
                    Some(Ok(Fragment::Delta(text)))
                }
                _ => None,
            },
            Err(e) => Some(Ok(Fragment::Malformed {
                raw: data.to_string(),
                reason: e.to_string(),
            })),
        },
        "message_delta" => {
            if let Ok(parsed) = serde_json::from_str::<AnthropicMessageDelta>(data) {
                if let Some(stop_reason) = parsed.delta.stop_reason {
                    debug!(%stop_reason, "Message finished");
                }
            }
            None
        }
        "message_stop" => Some(Ok(Fragment::End)),
        "error" => Some(Err(TranslateError::network(format!(
            "Anthropic stream error: {}",
            data
        )))),
        // message_start, content_block_start/stop, ping and unknown events
        _ => None,
    }
}

impl std::fmt::Debug for AnthropicTranslationDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicTranslationDriver")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.settings.model)
            .finish()
    }
}

// ============================================================================
// Anthropic API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlockDeltaEvent {
    delta: AnthropicDelta,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicDelta {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    /// input_json_delta, thinking_delta, signature_delta
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicMessageDelta {
    delta: AnthropicMessageDeltaData,
}

#[derive(Debug, Deserialize)]
struct AnthropicMessageDeltaData {
    #[serde(default)]
    stop_reason: Option<String>,
}
