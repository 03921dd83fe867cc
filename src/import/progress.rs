//! Progress counters and the periodic status monitor

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{HumanCount, ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::info;

use super::shutdown::ShutdownSignal;
use crate::config::StatusStyle;

/// Shared progress counters for one import run.
///
/// The parser is the only writer of `pages_seen` and `articles_accepted`; it
/// bumps pages before articles, and readers load articles before pages, so every
/// snapshot satisfies `articles_accepted <= pages_seen`.
#[derive(Debug)]
pub struct ImportProgress {
    start_time: Instant,
    pages_seen: AtomicU64,
    articles_accepted: AtomicU64,
    records_written: AtomicU64,
    records_dropped: AtomicU64,
}

impl ImportProgress {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            pages_seen: AtomicU64::new(0),
            articles_accepted: AtomicU64::new(0),
            records_written: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
        }
    }

    /// Create a shared tracker
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn page_seen(&self) {
        self.pages_seen.fetch_add(1, Ordering::Release);
    }

    pub fn article_accepted(&self) {
        self.articles_accepted.fetch_add(1, Ordering::Release);
    }

    pub fn record_written(&self) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pages_seen(&self) -> u64 {
        self.pages_seen.load(Ordering::Acquire)
    }

    pub fn articles_accepted(&self) -> u64 {
        self.articles_accepted.load(Ordering::Acquire)
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get current statistics
    pub fn get_stats(&self) -> ImportStats {
        let articles_accepted = self.articles_accepted();
        let pages_seen = self.pages_seen();
        let elapsed = self.elapsed().as_secs_f64();

        let mut stats = ImportStats {
            pages_seen,
            articles_accepted,
            records_written: self.records_written.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            elapsed_seconds: elapsed,
            pages_per_second: 0.0,
        };
        stats.update_rate();
        stats
    }
}

impl Default for ImportProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportStats {
    pub pages_seen: u64,
    pub articles_accepted: u64,
    pub records_written: u64,
    pub records_dropped: u64,
    pub elapsed_seconds: f64,
    pub pages_per_second: f64,
}

impl ImportStats {
    /// Calculate pages per second
    pub fn update_rate(&mut self) {
        if self.elapsed_seconds > 0.0 {
            self.pages_per_second = self.pages_seen as f64 / self.elapsed_seconds;
        }
    }

    /// `Pages: 1,234 | Articles: 1,000 | Elapsed: 1:05`
    pub fn status_line(&self) -> String {
        format!(
            "Pages: {} | Articles: {} | Elapsed: {}",
            format_count(self.pages_seen),
            format_count(self.articles_accepted),
            format_elapsed(Duration::from_secs_f64(self.elapsed_seconds)),
        )
    }
}

/// Format an integer with thousands separators
pub fn format_count(n: u64) -> String {
    HumanCount(n).to_string()
}

/// Format a duration as `M:SS`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Periodically reports progress until the pipeline starts draining.
///
/// Never touches the channels and never blocks other components.
pub struct StatusMonitor {
    progress: Arc<ImportProgress>,
    interval: Duration,
    style: StatusStyle,
}

impl StatusMonitor {
    pub fn new(progress: Arc<ImportProgress>, interval: Duration, style: StatusStyle) -> Self {
        Self {
            progress,
            interval,
            style,
        }
    }

    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, shutdown: ShutdownSignal) {
        let progress_bar = match self.style {
            StatusStyle::Bar => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} [{elapsed_precise}] {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                Some(pb)
            }
            StatusStyle::Log => None,
        };

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let stats = self.progress.get_stats();
                    match progress_bar {
                        Some(ref pb) => {
                            pb.set_message(format!("{} | {:.1} pages/s", stats.status_line(), stats.pages_per_second));
                            pb.tick();
                        }
                        None => info!("{}", stats.status_line()),
                    }
                }
                _ = shutdown.draining() => break,
            }
        }

        if let Some(pb) = progress_bar {
            pb.finish_and_clear();
        }
    }
}
