use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::instrument::WithSubscriber;
use tracing::Subscriber;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer};

use sinafeed::config::{Config, LoggingConfig, RendererKind};
use sinafeed::crawler::{HttpLauncher, Launcher};
use sinafeed::pipeline::{Pipeline, PipelineReport};

#[derive(Parser)]
#[command(
    name = "sinafeed",
    version,
    about = "Incremental Sina News listing collector",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// TOML configuration file (defaults plus SINAFEED_* variables otherwise)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand, Clone, Copy, Default)]
enum Commands {
    /// Crawl every source, save the run and merge
    #[default]
    Run,

    /// Re-merge existing per-run files only
    Merge,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate().context("Invalid configuration")?;

    let subscriber = build_subscriber(&config.logging, &cli)?;
    let command = cli.command.unwrap_or_default();

    async move {
        tracing::info!(renderer = ?config.renderer.kind, "sinafeed starting");

        match config.renderer.kind {
            RendererKind::Http => {
                let launcher = HttpLauncher::new(config.http.clone());
                execute(config, launcher, command).await
            }
            #[cfg(feature = "chrome")]
            RendererKind::Chrome => {
                let launcher = sinafeed::crawler::ChromeLauncher::new(&config.renderer);
                execute(config, launcher, command).await
            }
            #[cfg(not(feature = "chrome"))]
            RendererKind::Chrome => {
                anyhow::bail!("chrome renderer requested but this build lacks the `chrome` feature")
            }
        }
    }
    .with_subscriber(subscriber)
    .await
}

async fn execute<L: Launcher>(config: Config, launcher: L, command: Commands) -> Result<()> {
    let pipeline = Pipeline::new(config, launcher).context("Failed to build pipeline")?;

    let report = match command {
        Commands::Run => pipeline.run().await,
        Commands::Merge => pipeline.merge_only(),
    };

    summarize(&report);
    Ok(())
}

fn summarize(report: &PipelineReport) {
    for source in &report.sources {
        let stop = source
            .stop
            .as_ref()
            .map_or_else(|| String::from("not launched"), ToString::to_string);
        tracing::info!(
            source = %source.name,
            records = source.records,
            pages = source.pages,
            stop = %stop,
            "Source summary"
        );
    }

    tracing::info!(
        records = report.total_records(),
        run_file = ?report.run_file,
        merged = ?report.merged,
        "Run complete"
    );
}

/// Subscriber for one run: stderr plus an optional log file
fn build_subscriber(logging: &LoggingConfig, cli: &Cli) -> Result<impl Subscriber + Send + Sync> {
    let directives = if cli.verbose {
        String::from("sinafeed=debug,info")
    } else {
        format!("sinafeed={},warn", logging.level)
    };
    let filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("Invalid log level: {}", logging.level))?;

    let json = cli.log_format.as_deref().unwrap_or(&logging.format) == "json";

    let stderr = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let file = match &logging.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let writer = Mutex::new(file);

            Some(if json {
                fmt::layer().json().with_writer(writer).boxed()
            } else {
                fmt::layer().with_ansi(false).with_writer(writer).boxed()
            })
        }
        None => None,
    };

    Ok(tracing_subscriber::registry()
        .with(stderr)
        .with(file)
        .with(filter))
}
