// Translation driver abstraction
//
// A driver turns one TranslationRequest into a stream of fragments. Provider
// crates (openai, anthropic) implement it; the invoker consumes it.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Prompt for translating one work unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationRequest {
    /// Unit label, for logs only
    pub unit: String,
    /// Translator role, glossary and instructions
    pub system_prompt: String,
    /// Source text to translate
    pub user_prompt: String,
}

/// One event from a streaming backend
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Incremental text
    Delta(String),
    /// Payload that could not be parsed; the invoker skips it
    Malformed { raw: String, reason: String },
    /// Backend-defined end of stream
    End,
}

/// Fragment stream returned by a driver
///
/// An `Err` item is a transport-level failure and ends the attempt.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment>> + Send>>;

/// Model parameters shared by the HTTP drivers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ModelSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Trait for translation backends
///
/// Implementations handle provider-specific request building and stream
/// parsing. They do not retry, time out or write files.
#[async_trait]
pub trait TranslationDriver: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Send the request and return the response as a fragment stream
    async fn stream(&self, request: &TranslationRequest) -> Result<FragmentStream>;
}

/// Shared driver handle
pub type BoxedTranslationDriver = Arc<dyn TranslationDriver>;
