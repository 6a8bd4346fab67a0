// OpenAI Driver Implementation
//
// This crate provides an OpenAI-compatible translation driver. It implements
// the TranslationDriver trait from scrivener-core by streaming chat
// completions over SSE and mapping each chunk to a Fragment.

mod driver;
mod types;

#[cfg(test)]
mod tests;

pub use driver::{OpenAITranslationDriver, DEFAULT_API_URL, DEFAULT_MODEL};

// Re-export core types for convenience
pub use scrivener_core::driver::{Fragment, TranslationDriver, TranslationRequest};
