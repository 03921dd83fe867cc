//! Import pipeline configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::import::{AnyNamespace, MainNamespace, NamespaceAllowlist, NamespaceFilter};

/// How the status monitor reports progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusStyle {
    /// An `info` log line per interval
    #[default]
    Log,
    /// A terminal spinner
    Bar,
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Dump to read (`-` for stdin)
    pub input: Option<PathBuf>,
    /// JSON Lines file to write (`-` for stdout)
    pub output: Option<PathBuf>,
    /// Number of transform workers
    pub workers: usize,
    /// Namespaces to import
    pub namespaces: Vec<i32>,
    /// Import every page regardless of namespace
    pub all_namespaces: bool,
    /// Stop after this many accepted pages
    pub max_articles: Option<u64>,
    /// Bounded wait on an empty queue before re-checking shutdown
    pub poll_timeout_ms: u64,
    /// Status report interval
    pub status_interval_secs: u64,
    pub status_style: StatusStyle,
    /// Capacity of the parser -> worker queue
    pub intake_capacity: usize,
    /// Capacity of the worker -> writer queue
    pub outtake_capacity: usize,
    /// How long shutdown waits for each task before abandoning it
    pub join_timeout_secs: u64,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: None,
            output: None,
            workers: default_workers(),
            namespaces: vec![0],
            all_namespaces: false,
            max_articles: None,
            poll_timeout_ms: 1000,
            status_interval_secs: 5,
            status_style: StatusStyle::Log,
            intake_capacity: 1000,
            outtake_capacity: 1000,
            join_timeout_secs: 5,
        }
    }
}

impl PipelineConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }

    /// Build the namespace filter described by this config
    pub fn namespace_filter(&self) -> Arc<dyn NamespaceFilter> {
        if self.all_namespaces {
            Arc::new(AnyNamespace)
        } else if self.namespaces == [0] {
            Arc::new(MainNamespace)
        } else {
            Arc::new(NamespaceAllowlist::new(self.namespaces.iter().copied()))
        }
    }

    /// Append every problem with this section to `errors`
    pub(crate) fn collect_errors(&self, errors: &mut Vec<String>) {
        if self.input.as_ref().map_or(true, |p| p.as_os_str().is_empty()) {
            errors.push("input location is required".to_string());
        }
        if self.output.as_ref().map_or(true, |p| p.as_os_str().is_empty()) {
            errors.push("output location is required".to_string());
        }
        self.collect_runtime_errors(errors);
    }

    /// Append problems that would stop the pipeline itself from starting.
    ///
    /// Input and output are not checked here since streams can be supplied directly.
    pub fn collect_runtime_errors(&self, errors: &mut Vec<String>) {
        if self.workers == 0 {
            errors.push("workers must be positive".to_string());
        }
        if !self.all_namespaces && self.namespaces.is_empty() {
            errors.push("namespaces must not be empty unless all_namespaces is set".to_string());
        }
        if self.max_articles == Some(0) {
            errors.push("max_articles must be positive when set".to_string());
        }
        if self.poll_timeout_ms == 0 {
            errors.push("poll_timeout_ms must be positive".to_string());
        }
        if self.status_interval_secs == 0 {
            errors.push("status_interval_secs must be positive".to_string());
        }
        if self.intake_capacity == 0 {
            errors.push("intake_capacity must be positive".to_string());
        }
        if self.outtake_capacity == 0 {
            errors.push("outtake_capacity must be positive".to_string());
        }
        if self.join_timeout_secs == 0 {
            errors.push("join_timeout_secs must be positive".to_string());
        }
    }
}
