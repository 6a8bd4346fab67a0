// Anthropic Driver Implementation
//
// This crate provides a translation driver for Anthropic's Messages API. It
// implements the TranslationDriver trait from scrivener-core; text arrives as
// content_block_delta events and message_stop ends the stream.

mod driver;

#[cfg(test)]
mod tests;

pub use driver::{AnthropicTranslationDriver, ANTHROPIC_VERSION, DEFAULT_API_URL, DEFAULT_MODEL};

// Re-export core types for convenience
pub use scrivener_core::driver::{Fragment, TranslationDriver, TranslationRequest};
