// Scrivener CLI
//
// Design Decision: Use clap derive for ergonomic argument parsing.
// Design Decision: Support text/json/yaml output formats for scripting.
// Design Decision: Environment (and .env) supplies defaults; flags override.
// Design Decision: Exit non-zero only when the run cannot start; per-chapter
// failures are reported in the summary and the next run picks them up.

mod commands;
mod output;

use clap::{Args, Parser, Subcommand};
use scrivener_core::telemetry::{init_tracing, TelemetryConfig};

#[derive(Parser)]
#[command(name = "scrivener")]
#[command(about = "Scrivener - resumable web novel chapter translation")]
#[command(version)]
pub struct Cli {
    /// YAML series catalog
    #[arg(long, global = true, env = "SCRIVENER_SERIES_FILE")]
    pub series_file: Option<std::path::PathBuf>,

    /// Output format
    #[arg(long, short, global = true, default_value = "text", value_parser = ["text", "json", "yaml"])]
    pub output: String,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate every chapter that has no artifact yet
    Translate(TranslateArgs),

    /// Show which chapters a run would translate and why others are skipped
    Plan {
        /// Restrict to these series (repeatable)
        #[arg(long = "series", short = 's')]
        series: Vec<String>,

        /// Show skipped chapters too
        #[arg(long)]
        all: bool,
    },

    /// List configured series
    Series,
}

#[derive(Args, Debug, Default)]
pub struct TranslateArgs {
    /// Restrict to these series (repeatable)
    #[arg(long = "series", short = 's')]
    pub series: Vec<String>,

    /// Discover and filter only; no backend calls, no files written
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum chapters translated at once
    #[arg(long, short = 'j')]
    pub concurrency: Option<usize>,

    /// Per-attempt timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Attempts per chapter
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Translation backend
    #[arg(long, value_parser = ["openai", "anthropic", "echo"])]
    pub provider: Option<String>,

    /// Model name
    #[arg(long)]
    pub model: Option<String>,

    /// Directory holding one sub-directory of chapter files per series
    #[arg(long)]
    pub input_dir: Option<std::path::PathBuf>,

    /// Directory receiving translated chapters
    #[arg(long)]
    pub output_dir: Option<std::path::PathBuf>,

    /// Directory for per-attempt partial transcripts
    #[arg(long)]
    pub recovery_dir: Option<std::path::PathBuf>,
}

fn log_filter(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("scrivener=debug,scrivener_core=debug,scrivener_durable=debug"),
        _ => Some("trace"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut telemetry = TelemetryConfig::from_env();
    if let Some(filter) = log_filter(cli.verbose) {
        telemetry = telemetry.with_log_filter(filter);
    }
    init_tracing(telemetry);

    let output_format = output::OutputFormat::from_arg(&cli.output);
    let series_file = cli.series_file.clone();

    match cli.command {
        Commands::Translate(args) => {
            commands::translate::run(args, series_file, output_format).await
        }
        Commands::Plan { series, all } => {
            commands::plan::run(&series, all, series_file, output_format).await
        }
        Commands::Series => commands::series::run(series_file, output_format).await,
    }
}
