// OpenAI Translation Driver
//
// Streams chat completions from any OpenAI-compatible endpoint and turns each
// SSE event into a Fragment. Keep-alive and role-only chunks are dropped.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use tracing::debug;

use scrivener_core::config::ProviderConfig;
use scrivener_core::driver::{
    Fragment, FragmentStream, ModelSettings, TranslationDriver, TranslationRequest,
};
use scrivener_core::error::{Result, TranslateError};

use crate::types::{ChatMessage, ChatRequest, StreamChunk};

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// OpenAI Translation Driver
///
/// Implements `TranslationDriver` for the chat completions API with
/// `stream: true`.
///
/// # Example
///
/// ```ignore
/// use scrivener_openai::OpenAITranslationDriver;
///
/// let driver = OpenAITranslationDriver::from_env()?;
/// // or
/// let driver = OpenAITranslationDriver::new("your-api-key");
/// // or with custom endpoint
/// let driver = OpenAITranslationDriver::with_base_url("your-api-key", "http://localhost:8000/v1/chat/completions");
/// ```
#[derive(Clone)]
pub struct OpenAITranslationDriver {
    client: Client,
    api_key: String,
    api_url: String,
    settings: ModelSettings,
}

impl OpenAITranslationDriver {
    /// Create a new driver with the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_API_URL)
    }

    /// Create a new driver from the OPENAI_API_KEY environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| TranslateError::config("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key))
    }

    /// Create a new driver with a custom API URL (for OpenAI-compatible APIs)
    pub fn with_base_url(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: api_url.into(),
            settings: ModelSettings::new(DEFAULT_MODEL),
        }
    }

    /// Build from run configuration; the API key is required
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| TranslateError::config("OPENAI_API_KEY is required for the openai provider"))?;

        let mut settings = ModelSettings::new(config.model.as_deref().unwrap_or(DEFAULT_MODEL));
        settings.temperature = config.temperature;
        settings.max_tokens = config.max_tokens;

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

    /// Get the API URL
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }
}

#[async_trait]
impl TranslationDriver for OpenAITranslationDriver {
    fn name(&self) -> &str {
        "openai"
    }

    async fn stream(&self, request: &TranslationRequest) -> Result<FragmentStream> {
        let body = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            stream: true,
        };

        debug!(unit = %request.unit, model = %self.settings.model, "Sending chat completion request");
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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
                Ok(event) => parse_chunk(&event.data),
                Err(e) => Some(Err(TranslateError::network(format!("Stream error: {}", e)))),
            }
        });

        Ok(Box::pin(fragments))
    }
}

/// Map one SSE `data:` payload to a fragment; `None` for chunks carrying no text
pub(crate) fn parse_chunk(data: &str) -> Option<Result<Fragment>> {
    let data = data.trim();
    if data == "[DONE]" {
        return Some(Ok(Fragment::End));
    }
    if data.is_empty() {
        return None;
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => {
            if let Some(error) = chunk.error {
                return Some(Err(TranslateError::network(format!(
                    "OpenAI stream error: {}",
                    error
                ))));
            }
            let choice = chunk.choices.into_iter().next()?;
            match choice.delta.content {
                Some(content) if !content.is_empty() => Some(Ok(Fragment::Delta(content))),
                _ => {
                    if let Some(reason) = choice.finish_reason {
                        debug!(finish_reason = %reason, "Completion finished");
                    }
                    None
                }
            }
        }
        Err(e) => Some(Ok(Fragment::Malformed {
            raw: data.to_string(),
            reason: e.to_string(),
        })),
    }
}

impl std::fmt::Debug for OpenAITranslationDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAITranslationDriver")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.settings.model)
            .finish()
    }
}
