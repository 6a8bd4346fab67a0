// Run and series configuration
//
// Decision: Build one explicit RunConfig at startup and pass it down; no
// process-wide cached config.
// Decision: Environment variables are read through a lookup function so the
// parsing rules can be tested without touching the real environment.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use scrivener_durable::{Backoff, RetryPolicy};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TranslateError};

const DEFAULT_MAX_CONCURRENCY: usize = 3;
const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE_MS: u64 = 2000;
const DEFAULT_MIN_SIZE_RATIO: f64 = 0.5;
const DEFAULT_STRIP_THRESHOLD: f64 = 0.85;

/// Default suffix appended to a unit key to name its completion artifact
pub const DEFAULT_ARTIFACT_SUFFIX: &str = ".translated.txt";

// ============================================================================
// Provider
// ============================================================================

/// Translation backend kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    Anthropic,
    /// Offline driver that echoes the source text; for smoke runs
    Echo,
}

impl ProviderKind {
    /// Environment variable holding this provider's API key
    pub fn api_key_var(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAI => Some("OPENAI_API_KEY"),
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::Echo => None,
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAI),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "echo" => Ok(ProviderKind::Echo),
            _ => Err(format!("Unknown provider type: {}", s)),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::OpenAI => write!(f, "openai"),
            ProviderKind::Anthropic => write!(f, "anthropic"),
            ProviderKind::Echo => write!(f, "echo"),
        }
    }
}

/// Backend connection and model settings
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: Option<String>,
    /// Override for OpenAI-compatible or proxied endpoints
    pub api_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            model: None,
            api_url: None,
            api_key: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

// ============================================================================
// Run configuration
// ============================================================================

/// Process-level knobs for one translation run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Ceiling on concurrently running work units
    pub max_concurrency: usize,
    /// Discover and filter only; no network calls, no artifact writes
    pub dry_run: bool,
    /// Wall-clock ceiling for a single streaming invocation
    pub timeout: Duration,
    /// Attempts and backoff per work unit
    pub retry: RetryPolicy,
    /// Holds one sub-directory of chapter files per series
    pub input_dir: PathBuf,
    /// Completion artifacts land in `<output_dir>/<series>/`
    pub output_dir: PathBuf,
    /// Per-attempt partial transcripts; `None` disables them
    pub recovery_dir: Option<PathBuf>,
    /// YAML series catalog
    pub series_file: PathBuf,
    pub artifact_suffix: String,
    /// Output/input size ratio below which a warning is logged
    pub min_size_ratio: f64,
    pub provider: ProviderConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            dry_run: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::linear(Duration::from_millis(DEFAULT_RETRY_BASE_MS))
                .with_max_attempts(DEFAULT_MAX_ATTEMPTS),
            input_dir: PathBuf::from("chapters"),
            output_dir: PathBuf::from("translations"),
            recovery_dir: None,
            series_file: PathBuf::from("series.yaml"),
            artifact_suffix: DEFAULT_ARTIFACT_SUFFIX.to_string(),
            min_size_ratio: DEFAULT_MIN_SIZE_RATIO,
            provider: ProviderConfig::new(ProviderKind::OpenAI),
        }
    }
}

impl RunConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `SCRIVENER_MAX_CONCURRENCY`: positive integer (default: 3)
    /// - `SCRIVENER_DRY_RUN`: "true"/"1" to skip network calls and writes
    /// - `SCRIVENER_TIMEOUT_SECS`: per-invocation timeout (default: 300)
    /// - `SCRIVENER_MAX_ATTEMPTS`, `SCRIVENER_RETRY_BASE_MS`: retry governor
    /// - `SCRIVENER_RETRY_BACKOFF`: "linear" (default) or "exponential"
    /// - `SCRIVENER_INPUT_DIR`, `SCRIVENER_OUTPUT_DIR`, `SCRIVENER_RECOVERY_DIR`
    /// - `SCRIVENER_SERIES_FILE`: YAML series catalog
    /// - `SCRIVENER_MIN_SIZE_RATIO`: advisory quality threshold (default: 0.5)
    /// - `SCRIVENER_PROVIDER`, `SCRIVENER_MODEL`, `SCRIVENER_API_URL`,
    ///   `SCRIVENER_TEMPERATURE`, `SCRIVENER_MAX_TOKENS`
    /// - `OPENAI_API_KEY` / `ANTHROPIC_API_KEY`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_concurrency =
            parse_var(&lookup, "SCRIVENER_MAX_CONCURRENCY")?.unwrap_or(defaults.max_concurrency);
        let dry_run = lookup("SCRIVENER_DRY_RUN")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);
        let timeout = parse_var(&lookup, "SCRIVENER_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);
        let max_attempts =
            parse_var(&lookup, "SCRIVENER_MAX_ATTEMPTS")?.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        let retry_base =
            parse_var(&lookup, "SCRIVENER_RETRY_BASE_MS")?.unwrap_or(DEFAULT_RETRY_BASE_MS);
        let backoff = parse_backoff(lookup("SCRIVENER_RETRY_BACKOFF").as_deref())?;

        let kind = match lookup("SCRIVENER_PROVIDER") {
            Some(raw) => raw.parse::<ProviderKind>().map_err(TranslateError::config)?,
            None => ProviderKind::OpenAI,
        };
        let api_key = kind.api_key_var().and_then(&lookup);

        let config = Self {
            max_concurrency,
            dry_run,
            timeout,
            retry: RetryPolicy::linear(Duration::from_millis(retry_base))
                .with_max_attempts(max_attempts)
                .with_backoff(backoff),
            input_dir: lookup("SCRIVENER_INPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.input_dir),
            output_dir: lookup("SCRIVENER_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            recovery_dir: lookup("SCRIVENER_RECOVERY_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            series_file: lookup("SCRIVENER_SERIES_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.series_file),
            artifact_suffix: defaults.artifact_suffix,
            min_size_ratio: parse_var(&lookup, "SCRIVENER_MIN_SIZE_RATIO")?
                .unwrap_or(DEFAULT_MIN_SIZE_RATIO),
            provider: ProviderConfig {
                kind,
                model: lookup("SCRIVENER_MODEL"),
                api_url: lookup("SCRIVENER_API_URL"),
                api_key,
                temperature: parse_var(&lookup, "SCRIVENER_TEMPERATURE")?,
                max_tokens: parse_var(&lookup, "SCRIVENER_MAX_TOKENS")?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the run meaningless
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(TranslateError::config(
                "max concurrency must be a positive integer",
            ));
        }
        if self.timeout.is_zero() {
            return Err(TranslateError::config("timeout must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.min_size_ratio) {
            return Err(TranslateError::config(format!(
                "min size ratio must be within 0.0..=1.0, got {}",
                self.min_size_ratio
            )));
        }
        if self.artifact_suffix.is_empty() {
            return Err(TranslateError::config("artifact suffix must not be empty"));
        }
        Ok(())
    }

    /// Directory holding the chapter files for a series
    pub fn source_dir_for(&self, series: &SeriesConfig) -> PathBuf {
        series
            .source_dir
            .clone()
            .unwrap_or_else(|| self.input_dir.join(&series.id))
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| TranslateError::config(format!("{name}={raw:?}: {e}"))),
    }
}

fn parse_backoff(raw: Option<&str>) -> Result<Backoff> {
    match raw.map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("linear") => Ok(Backoff::Linear),
        Some("exponential") => Ok(Backoff::Exponential { coefficient: 2.0 }),
        Some(other) => Err(TranslateError::config(format!(
            "SCRIVENER_RETRY_BACKOFF={other:?}: expected linear or exponential"
        ))),
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ============================================================================
// Series catalog
// ============================================================================

/// Per-series settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Stable identifier; names the input and output sub-directories
    pub id: String,
    /// Human-readable title
    #[serde(default)]
    pub title: Option<String>,
    /// Skip every unit of this series
    #[serde(default)]
    pub skip: bool,
    /// Lowest chapter ordinal to process (inclusive)
    #[serde(default)]
    pub min_chapter: Option<u32>,
    /// Highest chapter ordinal to process (inclusive)
    #[serde(default)]
    pub max_chapter: Option<u32>,
    /// Term list injected into the prompt as-is
    #[serde(default)]
    pub glossary: Option<String>,
    /// Extra translator instructions injected into the prompt as-is
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default = "default_source_language")]
    pub source_language: String,
    #[serde(default = "default_target_language")]
    pub target_language: String,
    /// Known boilerplate lines (site banners, donation notes) to strip
    #[serde(default)]
    pub strip_patterns: Vec<String>,
    /// Similarity at or above which a line matches a strip pattern
    #[serde(default = "default_strip_threshold")]
    pub strip_threshold: f64,
    /// Overrides `<input_dir>/<id>`
    #[serde(default)]
    pub source_dir: Option<PathBuf>,
}

fn default_source_language() -> String {
    "Korean".to_string()
}

fn default_target_language() -> String {
    "English".to_string()
}

fn default_strip_threshold() -> f64 {
    DEFAULT_STRIP_THRESHOLD
}

impl SeriesConfig {
    /// Series with default settings
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            skip: false,
            min_chapter: None,
            max_chapter: None,
            glossary: None,
            instructions: None,
            source_language: default_source_language(),
            target_language: default_target_language(),
            strip_patterns: Vec::new(),
            strip_threshold: DEFAULT_STRIP_THRESHOLD,
            source_dir: None,
        }
    }

    pub fn with_range(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.min_chapter = min;
        self.max_chapter = max;
        self
    }

    pub fn with_glossary(mut self, glossary: impl Into<String>) -> Self {
        self.glossary = Some(glossary.into());
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = Some(dir.into());
        self
    }

    pub fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }

    /// Whether any ordinal bound is configured
    pub fn has_range(&self) -> bool {
        self.min_chapter.is_some() || self.max_chapter.is_some()
    }

    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(TranslateError::config("series id must not be empty"));
        }
        if self.id.contains(['/', '\\']) || self.id == "." || self.id == ".." {
            return Err(TranslateError::config(format!(
                "series id {:?} must be a plain directory name",
                self.id
            )));
        }
        if let (Some(min), Some(max)) = (self.min_chapter, self.max_chapter) {
            if min > max {
                return Err(TranslateError::config(format!(
                    "series {}: min_chapter {} is greater than max_chapter {}",
                    self.id, min, max
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.strip_threshold) {
            return Err(TranslateError::config(format!(
                "series {}: strip_threshold must be within 0.0..=1.0",
                self.id
            )));
        }
        Ok(())
    }
}

/// All configured series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesCatalog {
    #[serde(default)]
    pub series: Vec<SeriesConfig>,
}

impl SeriesCatalog {
    /// Parse and validate a YAML catalog
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let catalog: SeriesCatalog = serde_yaml::from_str(yaml)
            .map_err(|e| TranslateError::config(format!("invalid series catalog: {e}")))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load and validate a YAML catalog from disk
    pub async fn load(path: &Path) -> Result<Self> {
        let yaml = tokio::fs::read_to_string(path).await.map_err(|e| {
            TranslateError::config(format!(
                "cannot read series catalog {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for series in &self.series {
            series.validate()?;
            if !seen.insert(series.id.as_str()) {
                return Err(TranslateError::config(format!(
                    "duplicate series id: {}",
                    series.id
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&SeriesConfig> {
        self.series.iter().find(|s| s.id == id)
    }

    /// Restrict to the given ids, preserving catalog order
    ///
    /// An empty selection keeps every series. Unknown ids are an error.
    pub fn select(&self, ids: &[String]) -> Result<SeriesCatalog> {
        if ids.is_empty() {
            return Ok(self.clone());
        }
        if let Some(unknown) = ids.iter().find(|id| self.get(id).is_none()) {
            return Err(TranslateError::config(format!("unknown series: {unknown}")));
        }
        Ok(SeriesCatalog {
            series: self
                .series
                .iter()
                .filter(|s| ids.contains(&s.id))
                .cloned()
                .collect(),
        })
    }
}
