// Chapter translation core
//
// This crate turns a directory of scraped web-novel chapters into translated
// text files, one artifact per chapter, resumable across runs.
//
// Key design decisions:
// - Artifact existence is the only completion signal; runs keep no state
// - Units are filtered before submission, so the pool only sees real work
// - Backends are reached through the TranslationDriver trait; provider crates
//   (scrivener-openai, scrivener-anthropic) implement it
// - Retries and the concurrency ceiling come from scrivener-durable
// - Configuration is built once at startup and passed down explicitly

pub mod cleanup;
pub mod config;
pub mod driver;
pub mod error;
pub mod invoker;
pub mod pipeline;
pub mod prompt;
pub mod quality;
pub mod recovery;
pub mod resolver;
pub mod telemetry;
pub mod unit;

// In-memory driver for tests and offline runs
pub mod memory;

// Re-exports for convenience
pub use config::{ProviderConfig, ProviderKind, RunConfig, SeriesCatalog, SeriesConfig};
pub use driver::{
    BoxedTranslationDriver, Fragment, FragmentStream, ModelSettings, TranslationDriver,
    TranslationRequest,
};
pub use error::{Result, TranslateError};
pub use invoker::{StreamingInvoker, Translation};
pub use memory::{ScriptedDriver, ScriptedResponse};
pub use pipeline::{RunReport, SeriesReport, TranslationPipeline};
pub use prompt::PromptBuilder;
pub use recovery::{FileSink, NoopSink, Recovery, RecoverySink};
pub use resolver::{Decision, Resolution, SkipReason, UnitResolver};
pub use unit::{discover_units, parse_ordinal, ArtifactLayout, WorkUnit};
