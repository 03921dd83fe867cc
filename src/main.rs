//! wikistream: convert Wikimedia page dumps into JSON Lines

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use wikistream::{
    config::{Config, LogFormat, LoggingConfig, StatusStyle},
    import::ImportCoordinatorBuilder,
};

#[derive(Parser)]
#[command(name = "wikistream")]
#[command(about = "Stream a Wikimedia XML dump into a JSON Lines file")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dump to read (.xml or .xml.bz2, `-` for stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// JSON Lines file to write (`-` for stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of transform workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Namespace to import (repeatable)
    #[arg(long = "namespace")]
    namespaces: Vec<i32>,

    /// Import pages from every namespace
    #[arg(long)]
    all_namespaces: bool,

    /// Stop after this many accepted pages
    #[arg(long)]
    max_articles: Option<u64>,

    /// Queue poll timeout in milliseconds
    #[arg(long)]
    poll_timeout_ms: Option<u64>,

    /// Seconds between status reports
    #[arg(long)]
    status_interval_secs: Option<u64>,

    /// Show a progress spinner instead of status log lines
    #[arg(long)]
    progress: bool,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        let pipeline = &mut config.pipeline;
        if let Some(input) = self.input {
            pipeline.input = Some(input);
        }
        if let Some(output) = self.output {
            pipeline.output = Some(output);
        }
        if let Some(workers) = self.workers {
            pipeline.workers = workers;
        }
        if !self.namespaces.is_empty() {
            pipeline.namespaces = self.namespaces;
        }
        if self.all_namespaces {
            pipeline.all_namespaces = true;
        }
        if self.max_articles.is_some() {
            pipeline.max_articles = self.max_articles;
        }
        if let Some(ms) = self.poll_timeout_ms {
            pipeline.poll_timeout_ms = ms;
        }
        if let Some(secs) = self.status_interval_secs {
            pipeline.status_interval_secs = secs;
        }
        if self.progress {
            pipeline.status_style = StatusStyle::Bar;
        }
    }
}

fn init_logging(logging: &LoggingConfig, verbose: u8) -> Result<()> {
    let level: Level = logging.level.raised_by(verbose).into();

    // Logs go to stderr; stdout may be the output sink
    match logging.format {
        LogFormat::Text => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_target(false)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Json => {
            let subscriber = FmtSubscriber::builder()
                .json()
                .with_max_level(level)
                .with_target(false)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let verbose = cli.verbose;
    cli.apply(&mut config);

    init_logging(&config.logging, verbose).context("Failed to install log subscriber")?;
    config.validate()?;

    let coordinator = ImportCoordinatorBuilder::new()
        .with_config(config.pipeline)
        .build()
        .context("Invalid pipeline configuration")?;

    let report = coordinator.run().await.context("Failed to start import")?;
    info!("{}", report.summary_line());

    if report.abandoned_tasks > 0 {
        error!("{} task(s) did not stop in time", report.abandoned_tasks);
    }
    if let Some(e) = report.parse_error {
        anyhow::bail!("Import failed: {}", e);
    }
    if let Some(e) = report.writer_error {
        anyhow::bail!("Writing output failed: {}", e);
    }
    if report.abandoned_tasks > 0 {
        anyhow::bail!("Import did not shut down cleanly");
    }

    Ok(())
}
