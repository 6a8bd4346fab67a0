// Command implementations and shared startup helpers

pub mod plan;
pub mod series;
pub mod translate;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use scrivener_anthropic::AnthropicTranslationDriver;
use scrivener_core::{
    BoxedTranslationDriver, ProviderConfig, ProviderKind, RunConfig, ScriptedDriver,
    SeriesCatalog,
};
use scrivener_openai::OpenAITranslationDriver;

/// Run configuration from the environment, with the catalog path overridden
pub fn load_config(series_file: Option<PathBuf>) -> Result<RunConfig> {
    let mut config = RunConfig::from_env().context("invalid environment configuration")?;
    if let Some(path) = series_file {
        config.series_file = path;
    }
    Ok(config)
}

/// Load the catalog and narrow it to the requested series
pub async fn load_catalog(config: &RunConfig, selected: &[String]) -> Result<SeriesCatalog> {
    let catalog = SeriesCatalog::load(&config.series_file).await?;
    Ok(catalog.select(selected)?)
}

/// Construct the driver for the configured provider
pub fn build_driver(provider: &ProviderConfig) -> Result<BoxedTranslationDriver> {
    let driver: BoxedTranslationDriver = match provider.kind {
        ProviderKind::OpenAI => Arc::new(OpenAITranslationDriver::from_config(provider)?),
        ProviderKind::Anthropic => Arc::new(AnthropicTranslationDriver::from_config(provider)?),
        ProviderKind::Echo => Arc::new(ScriptedDriver::echo()),
    };
    Ok(driver)
}
