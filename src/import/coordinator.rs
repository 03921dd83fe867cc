//! Import coordinator that wires and drives the pipeline
//!
//! Start order is writer, workers, monitor, then the parser on a blocking
//! thread. Once the parser returns, for any reason, the shutdown signal moves to
//! draining and the tasks are joined in pipeline order with a bounded wait each.

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::filter::NamespaceFilter;
use super::progress::{format_count, format_elapsed, ImportProgress, ImportStats, StatusMonitor};
use super::record::{JsonLinesEncoder, RecordEncoder};
use super::shutdown::ShutdownSignal;
use super::source::{ImportError, InputLocation, OutputLocation, PageUnit};
use super::wikimedia::DumpParser;
use super::worker::TransformWorker;
use super::writer::{open_sink, RecordWriter};
use crate::config::PipelineConfig;

/// Outcome of one import run
#[derive(Debug)]
pub struct ImportReport {
    /// Final counters
    pub stats: ImportStats,
    /// Wall-clock time of the run
    pub elapsed: Duration,
    /// Fatal parser error, if the input could not be read to the end
    pub parse_error: Option<ImportError>,
    /// Writer or flush error
    pub writer_error: Option<ImportError>,
    /// Workers or writer that had to be abandoned during shutdown
    pub abandoned_tasks: usize,
}

impl ImportReport {
    pub fn is_success(&self) -> bool {
        self.parse_error.is_none() && self.writer_error.is_none() && self.abandoned_tasks == 0
    }

    /// `Completed: 3 pages | 2 articles | 2 written | 0 dropped | 0:01`
    pub fn summary_line(&self) -> String {
        format!(
            "Completed: {} pages | {} articles | {} written | {} dropped | {}",
            format_count(self.stats.pages_seen),
            format_count(self.stats.articles_accepted),
            format_count(self.stats.records_written),
            format_count(self.stats.records_dropped),
            format_elapsed(self.elapsed),
        )
    }
}

/// Import coordinator for dump conversion
pub struct ImportCoordinator {
    config: PipelineConfig,
    filter: Arc<dyn NamespaceFilter>,
    encoder: Arc<dyn RecordEncoder>,
}

impl ImportCoordinator {
    fn new(
        config: PipelineConfig,
        filter: Arc<dyn NamespaceFilter>,
        encoder: Arc<dyn RecordEncoder>,
    ) -> Self {
        Self {
            config,
            filter,
            encoder,
        }
    }

    /// Open the configured input and output and run the pipeline.
    ///
    /// Only startup failures (missing locations, unopenable sink or input) are
    /// returned as `Err`; everything after that is described by the report.
    pub async fn run(&self) -> Result<ImportReport, ImportError> {
        let input = self
            .config
            .input
            .as_ref()
            .map(InputLocation::from_path)
            .ok_or_else(|| ImportError::Config("input location is required".into()))?;
        let output = self
            .config
            .output
            .as_ref()
            .map(OutputLocation::from_path)
            .ok_or_else(|| ImportError::Config("output location is required".into()))?;

        let sink = open_sink(&output).await?;
        let reader = input.open()?;

        info!(
            "Processing {} -> {} with {} workers...",
            input.display_name(),
            output.display_name(),
            self.config.workers
        );

        Ok(self.run_streams(reader, sink).await)
    }

    /// Run the pipeline over an already opened input and sink
    pub async fn run_streams<R, W>(&self, input: R, sink: W) -> ImportReport
    where
        R: BufRead + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let progress = ImportProgress::shared();
        let shutdown = ShutdownSignal::new();
        let poll_timeout = self.config.poll_timeout();
        let join_timeout = self.config.join_timeout();

        let (intake_tx, intake_rx) = async_channel::bounded::<PageUnit>(self.config.intake_capacity);
        let (outtake_tx, outtake_rx) = async_channel::bounded::<String>(self.config.outtake_capacity);

        let writer = RecordWriter::new(sink, outtake_rx.clone(), progress.clone(), poll_timeout)
            .spawn(shutdown.clone());

        let workers: Vec<JoinHandle<u64>> = (0..self.config.workers)
            .map(|id| {
                TransformWorker::new(
                    id,
                    intake_rx.clone(),
                    outtake_tx.clone(),
                    self.encoder.clone(),
                    progress.clone(),
                    poll_timeout,
                )
                .spawn(shutdown.clone())
            })
            .collect();

        // From here on only the workers hold intake receivers and outtake senders,
        // so the channels close as soon as their last user is gone.
        drop(intake_rx);
        drop(outtake_tx);

        let monitor = StatusMonitor::new(
            progress.clone(),
            self.config.status_interval(),
            self.config.status_style,
        )
        .spawn(shutdown.clone());

        let parser = DumpParser::new(input, self.filter.clone(), progress.clone())
            .with_max_articles(self.config.max_articles);
        let parse_error = match tokio::task::spawn_blocking(move || parser.run(&intake_tx)).await {
            Ok(Ok(enqueued)) => {
                debug!("Parser enqueued {} pages", enqueued);
                None
            }
            Ok(Err(e)) => {
                error!("Fatal error: {}", e);
                Some(e)
            }
            Err(e) => {
                error!("Parser task failed: {}", e);
                Some(ImportError::Task(format!("parser: {e}")))
            }
        };

        info!("Shutting down...");
        shutdown.begin_draining();

        let mut abandoned_tasks = 0;

        for (id, handle) in workers.into_iter().enumerate() {
            match tokio::time::timeout(join_timeout, handle).await {
                Ok(Ok(produced)) => debug!("Worker {} joined ({} records)", id, produced),
                Ok(Err(e)) => error!("Worker {} failed: {}", id, e),
                Err(_) => {
                    warn!("Worker {} did not stop within {:?}, abandoning it", id, join_timeout);
                    abandoned_tasks += 1;
                }
            }
        }

        // Abandoned workers would keep the writer waiting; what is queued is still written
        outtake_rx.close();

        let writer_error = match tokio::time::timeout(join_timeout, writer).await {
            Ok(Ok(Ok(_))) => None,
            Ok(Ok(Err(e))) => Some(e),
            Ok(Err(e)) => Some(ImportError::Task(format!("writer: {e}"))),
            Err(_) => {
                warn!("Writer did not stop within {:?}, abandoning it", join_timeout);
                abandoned_tasks += 1;
                Some(ImportError::Task("writer did not stop in time".to_string()))
            }
        };

        match tokio::time::timeout(join_timeout, monitor).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Status monitor failed: {}", e),
            Err(_) => warn!("Status monitor did not stop within {:?}, abandoning it", join_timeout),
        }

        ImportReport {
            stats: progress.get_stats(),
            elapsed: progress.elapsed(),
            parse_error,
            writer_error,
            abandoned_tasks,
        }
    }
}

/// Builder for ImportCoordinator with sensible defaults
pub struct ImportCoordinatorBuilder {
    config: PipelineConfig,
    filter: Option<Arc<dyn NamespaceFilter>>,
    encoder: Arc<dyn RecordEncoder>,
}

impl ImportCoordinatorBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            filter: None,
            encoder: Arc::new(JsonLinesEncoder),
        }
    }

    /// Set pipeline configuration
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set input and output locations
    pub fn with_paths(mut self, input: impl Into<std::path::PathBuf>, output: impl Into<std::path::PathBuf>) -> Self {
        self.config.input = Some(input.into());
        self.config.output = Some(output.into());
        self
    }

    /// Set the number of transform workers
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Set the poll timeout used by workers and the writer
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.config.poll_timeout_ms = timeout.as_millis().max(1) as u64;
        self
    }

    /// Set both queue capacities
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config.intake_capacity = capacity;
        self.config.outtake_capacity = capacity;
        self
    }

    /// Use a custom namespace filter instead of the configured namespaces
    pub fn with_filter(mut self, filter: Arc<dyn NamespaceFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Use a custom record encoder
    pub fn with_encoder(mut self, encoder: Arc<dyn RecordEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Build the coordinator, rejecting settings the pipeline cannot run with
    pub fn build(self) -> Result<ImportCoordinator, ImportError> {
        let mut errors = Vec::new();
        self.config.collect_runtime_errors(&mut errors);
        if !errors.is_empty() {
            return Err(ImportError::Config(errors.join("; ")));
        }

        let filter = self
            .filter
            .unwrap_or_else(|| self.config.namespace_filter());
        Ok(ImportCoordinator::new(self.config, filter, self.encoder))
    }
}

impl Default for ImportCoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
