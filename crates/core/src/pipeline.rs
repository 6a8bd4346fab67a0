// Series translation pipeline
//
// Decision: One TaskPool per pipeline, shared by every series in a run, so the
// concurrency ceiling is global rather than per series.
// Decision: Discovery, resolution and source reading happen before submission.
// Nothing is handed to the pool for a unit that is already done or has no text.
// Decision: Artifacts are written to `<artifact>.part` and renamed, so a crash
// never leaves a file the resolver would mistake for a finished unit.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Context as _;
use scrivener_durable::{retry_if, PoolReport, RetryPolicy, TaskPool, TaskResult};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::cleanup::clean_text;
use crate::config::{RunConfig, SeriesCatalog, SeriesConfig};
use crate::driver::{BoxedTranslationDriver, TranslationRequest};
use crate::error::{Result, TranslateError};
use crate::invoker::StreamingInvoker;
use crate::prompt::PromptBuilder;
use crate::quality::check_size;
use crate::recovery::Recovery;
use crate::resolver::{Decision, Resolution, UnitResolver};
use crate::unit::{discover_units, ArtifactLayout, WorkUnit};

// ============================================================================
// Reports
// ============================================================================

/// Per-series summary
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesReport {
    pub series: String,
    /// Source files found
    pub discovered: usize,
    /// Units left out, keyed by [`SkipReason::kind`](crate::resolver::SkipReason::kind)
    pub skipped: BTreeMap<String, usize>,
    /// Units whose cleaned source text was empty
    pub empty_input: usize,
    /// Units whose source file could not be read
    pub unreadable: usize,
    /// Units handed to the pool
    pub submitted: usize,
    /// Artifacts written
    pub completed: usize,
    /// Units that failed after retries
    pub failed: usize,
    /// Units whose translation came back empty; no artifact written
    pub empty_output: usize,
    /// Artifacts written despite a low output/input size ratio
    pub low_quality: usize,
    /// Series-level failure (e.g. missing source directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SeriesReport {
    fn new(series: &str) -> Self {
        Self {
            series: series.to_string(),
            ..Default::default()
        }
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }
}

/// End-of-run summary
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub dry_run: bool,
    pub series: Vec<SeriesReport>,
    /// Pool bookkeeping, including one outcome per task
    pub pool: PoolReport,
}

impl RunReport {
    pub fn submitted(&self) -> usize {
        self.series.iter().map(|s| s.submitted).sum()
    }

    pub fn completed(&self) -> usize {
        self.series.iter().map(|s| s.completed).sum()
    }

    pub fn failed(&self) -> usize {
        self.series.iter().map(|s| s.failed).sum()
    }
}

/// Counters updated from inside pool tasks
#[derive(Debug, Default)]
struct SeriesCounters {
    completed: AtomicUsize,
    failed: AtomicUsize,
    empty_output: AtomicUsize,
    low_quality: AtomicUsize,
}

impl SeriesCounters {
    fn apply(&self, report: &mut SeriesReport) {
        report.completed = self.completed.load(Ordering::SeqCst);
        report.failed = self.failed.load(Ordering::SeqCst);
        report.empty_output = self.empty_output.load(Ordering::SeqCst);
        report.low_quality = self.low_quality.load(Ordering::SeqCst);
    }
}

/// A series whose units are in the pool
struct SubmittedSeries {
    report: SeriesReport,
    counters: Arc<SeriesCounters>,
}

impl SubmittedSeries {
    fn finish(mut self) -> SeriesReport {
        self.counters.apply(&mut self.report);
        self.report
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// State shared by every unit task
struct UnitContext {
    driver: BoxedTranslationDriver,
    invoker: StreamingInvoker,
    recovery: Recovery,
    retry: RetryPolicy,
    min_size_ratio: f64,
    dry_run: bool,
}

/// Everything one task needs, prepared before submission
struct UnitJob {
    unit: WorkUnit,
    artifact: PathBuf,
    source_text: String,
    request: TranslationRequest,
}

/// Discovers, filters and translates the units of configured series
pub struct TranslationPipeline {
    config: RunConfig,
    layout: ArtifactLayout,
    pool: TaskPool,
    context: Arc<UnitContext>,
}

impl TranslationPipeline {
    /// Build a pipeline; fails on invalid configuration
    pub fn new(config: RunConfig, driver: BoxedTranslationDriver) -> Result<Self> {
        config.validate()?;
        let pool = TaskPool::new(config.max_concurrency)?;
        let layout = ArtifactLayout::from_config(&config);
        let context = Arc::new(UnitContext {
            driver,
            invoker: StreamingInvoker::new(config.timeout),
            recovery: Recovery::from_dir(config.recovery_dir.clone()),
            retry: config.retry.clone(),
            min_size_ratio: config.min_size_ratio,
            dry_run: config.dry_run,
        });

        Ok(Self {
            config,
            layout,
            pool,
            context,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Discover a series' units and decide which still need work
    pub async fn plan_series(&self, series: &SeriesConfig) -> Result<Vec<Resolution>> {
        let dir = self.config.source_dir_for(series);
        let units = discover_units(&series.id, &dir).await?;
        Ok(UnitResolver::new(series, &self.layout).resolve(units).await)
    }

    /// Translate every series in the catalog, then wait for all of them
    pub async fn run(&self, catalog: &SeriesCatalog) -> RunReport {
        info!(
            series = catalog.series.len(),
            max_concurrency = self.pool.limit(),
            dry_run = self.config.dry_run,
            driver = self.context.driver.name(),
            "Starting translation run"
        );

        let mut submitted = Vec::with_capacity(catalog.series.len());
        for series in &catalog.series {
            submitted.push(self.submit_series(series).await);
        }

        self.pool.join().await;

        let report = RunReport {
            dry_run: self.config.dry_run,
            series: submitted.into_iter().map(SubmittedSeries::finish).collect(),
            pool: self.pool.report(),
        };
        info!(
            submitted = report.submitted(),
            completed = report.completed(),
            failed = report.failed(),
            "Translation run finished"
        );
        report
    }

    /// Translate one series and wait for it
    pub async fn run_series(&self, series: &SeriesConfig) -> SeriesReport {
        let submitted = self.submit_series(series).await;
        self.pool.join().await;
        submitted.finish()
    }

    #[instrument(skip(self, series), fields(series = %series.id))]
    async fn submit_series(&self, series: &SeriesConfig) -> SubmittedSeries {
        let mut report = SeriesReport::new(&series.id);
        let counters = Arc::new(SeriesCounters::default());

        let resolutions = match self.plan_series(series).await {
            Ok(resolutions) => resolutions,
            Err(e) => {
                warn!(
                    source_dir = %self.config.source_dir_for(series).display(),
                    error = %e,
                    "Series aborted before submission"
                );
                report.error = Some(e.to_string());
                return SubmittedSeries { report, counters };
            }
        };
        report.discovered = resolutions.len();

        let prompts = PromptBuilder::new(series);
        for Resolution { unit, decision } in resolutions {
            let artifact = match decision {
                Decision::Include { artifact } => artifact,
                Decision::Skip(reason) => {
                    *report.skipped.entry(reason.kind().to_string()).or_default() += 1;
                    continue;
                }
            };

            let raw = match tokio::fs::read_to_string(&unit.source_path).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(unit = %unit, path = %unit.source_path.display(), error = %e, "Cannot read source file; skipping");
                    report.unreadable += 1;
                    continue;
                }
            };
            let source_text = clean_text(&raw, &series.strip_patterns, series.strip_threshold);
            if source_text.trim().is_empty() {
                warn!(unit = %unit, "Source text is empty after cleanup; skipping");
                report.empty_input += 1;
                continue;
            }

            let job = UnitJob {
                request: prompts.build(&unit, &source_text),
                unit,
                artifact,
                source_text,
            };
            let label = job.unit.label();
            let context = Arc::clone(&self.context);
            let task_counters = Arc::clone(&counters);
            self.pool
                .submit(label, async move { run_unit(context, job, task_counters).await });
            report.submitted += 1;
        }

        info!(
            discovered = report.discovered,
            skipped = report.skipped_total(),
            submitted = report.submitted,
            "Series submitted"
        );
        SubmittedSeries { report, counters }
    }
}

// ============================================================================
// Unit task
// ============================================================================

enum UnitOutcome {
    Written,
    EmptyOutput,
    DryRun,
}

async fn run_unit(context: Arc<UnitContext>, job: UnitJob, counters: Arc<SeriesCounters>) -> TaskResult {
    match translate_unit(&context, &job, &counters).await {
        Ok(UnitOutcome::Written) => {
            counters.completed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        Ok(UnitOutcome::EmptyOutput) => {
            counters.empty_output.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        Ok(UnitOutcome::DryRun) => Ok(()),
        Err(e) => {
            counters.failed.fetch_add(1, Ordering::SeqCst);
            let hint = match &context.recovery {
                Recovery::Directory(dir) => format!("; partial output may be in {}", dir.display()),
                Recovery::Disabled => String::new(),
            };
            Err(e).with_context(|| format!("{} failed{hint}", job.unit))
        }
    }
}

#[instrument(skip_all, fields(unit = %job.unit))]
async fn translate_unit(
    context: &UnitContext,
    job: &UnitJob,
    counters: &SeriesCounters,
) -> Result<UnitOutcome> {
    if context.dry_run {
        info!(
            artifact = %job.artifact.display(),
            chars = job.source_text.chars().count(),
            "Dry run: would translate"
        );
        return Ok(UnitOutcome::DryRun);
    }

    let label = job.unit.label();
    let translation = retry_if(
        &context.retry,
        &label,
        |attempt| {
            let label = &label;
            async move {
                let sink = context.recovery.open(label, attempt).await;
                context
                    .invoker
                    .invoke(context.driver.as_ref(), &job.request, sink)
                    .await
            }
        },
        TranslateError::is_transient,
    )
    .await?;

    if translation.is_empty() {
        warn!("Translation is empty; no artifact written");
        return Ok(UnitOutcome::EmptyOutput);
    }

    let check = check_size(&job.source_text, &translation.text, context.min_size_ratio);
    if !check.passed {
        counters.low_quality.fetch_add(1, Ordering::SeqCst);
        warn!(
            ratio = check.ratio,
            min_ratio = context.min_size_ratio,
            input_chars = check.input_chars,
            output_chars = check.output_chars,
            "Translation is much shorter than its source; keeping it anyway"
        );
    }

    write_artifact(&job.artifact, &translation.text).await?;
    info!(
        artifact = %job.artifact.display(),
        chars = check.output_chars,
        "Translation written"
    );
    Ok(UnitOutcome::Written)
}

/// Write via a sibling `.part` file and rename into place
async fn write_artifact(artifact: &Path, text: &str) -> Result<()> {
    if let Some(parent) = artifact.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let part = part_path(artifact);
    let mut contents = String::with_capacity(text.len() + 1);
    contents.push_str(text);
    contents.push('\n');

    if let Err(e) = tokio::fs::write(&part, contents).await {
        let _ = tokio::fs::remove_file(&part).await;
        return Err(e.into());
    }
    tokio::fs::rename(&part, artifact).await?;
    Ok(())
}

fn part_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    artifact.with_file_name(name)
}
