// Translate command

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use scrivener_core::{
    BoxedTranslationDriver, ProviderKind, RunConfig, RunReport, ScriptedDriver,
    TranslationPipeline,
};

use crate::output::{print_field, print_table_header, print_table_row, OutputFormat};
use crate::TranslateArgs;

pub async fn run(args: TranslateArgs, series_file: Option<PathBuf>, output: OutputFormat) -> Result<()> {
    let mut config = super::load_config(series_file)?;
    apply_overrides(&mut config, &args, |name| std::env::var(name).ok())?;

    let report = execute(config, &args.series).await?;
    print_report(&report, output)
}

async fn execute(config: RunConfig, selected: &[String]) -> Result<RunReport> {
    let catalog = super::load_catalog(&config, selected).await?;
    let driver = driver_for(&config)?;
    let pipeline = TranslationPipeline::new(config, driver)?;
    Ok(pipeline.run(&catalog).await)
}

/// Backend driver for the run; dry runs never reach it and need no credentials
fn driver_for(config: &RunConfig) -> Result<BoxedTranslationDriver> {
    if config.dry_run {
        return Ok(Arc::new(ScriptedDriver::echo()));
    }
    super::build_driver(&config.provider)
}

/// Layer command-line flags over the environment configuration
fn apply_overrides<F>(config: &mut RunConfig, args: &TranslateArgs, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if args.dry_run {
        config.dry_run = true;
    }
    if let Some(concurrency) = args.concurrency {
        config.max_concurrency = concurrency;
    }
    if let Some(secs) = args.timeout {
        config.timeout = Duration::from_secs(secs);
    }
    if let Some(attempts) = args.max_attempts {
        config.retry = config.retry.clone().with_max_attempts(attempts);
    }
    if let Some(raw) = &args.provider {
        let kind: ProviderKind = raw.parse().map_err(anyhow::Error::msg)?;
        if kind != config.provider.kind {
            config.provider.kind = kind;
            config.provider.api_key = kind.api_key_var().and_then(&lookup);
        }
    }
    if let Some(model) = &args.model {
        config.provider.model = Some(model.clone());
    }
    if let Some(dir) = &args.input_dir {
        config.input_dir = dir.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(dir) = &args.recovery_dir {
        config.recovery_dir = Some(dir.clone());
    }

    config.validate().context("invalid command-line options")?;
    Ok(())
}

fn print_report(report: &RunReport, output: OutputFormat) -> Result<()> {
    if !output.is_text() {
        return output.print_value(report);
    }

    if report.dry_run {
        println!("Dry run: nothing was sent or written\n");
    }

    print_table_header(&[
        ("SERIES", 24),
        ("FOUND", 6),
        ("SKIPPED", 8),
        ("QUEUED", 7),
        ("DONE", 6),
        ("FAILED", 7),
        ("EMPTY", 6),
    ]);
    for series in &report.series {
        let empty = series.empty_input + series.empty_output;
        print_table_row(&[
            (&series.series, 24),
            (&series.discovered.to_string(), 6),
            (&series.skipped_total().to_string(), 8),
            (&series.submitted.to_string(), 7),
            (&series.completed.to_string(), 6),
            (&series.failed.to_string(), 7),
            (&empty.to_string(), 6),
        ]);
    }
    println!();

    print_field("Submitted", &report.submitted().to_string());
    print_field("Completed", &report.completed().to_string());
    print_field("Failed", &report.failed().to_string());

    for series in report.series.iter().filter(|s| s.error.is_some()) {
        if let Some(error) = &series.error {
            println!("Series {} not processed: {}", series.series, error);
        }
    }
    for failure in report.pool.failures() {
        println!(
            "  {}: {}",
            failure.label,
            failure.status.error().unwrap_or("unknown error")
        );
    }

    Ok(())
}
