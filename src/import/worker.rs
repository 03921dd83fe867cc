//! Transform workers: intake pages in, encoded record lines out

use std::sync::Arc;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::progress::ImportProgress;
use super::record::RecordEncoder;
use super::shutdown::ShutdownSignal;
use super::source::PageUnit;

/// One member of the transform pool.
///
/// Workers are interchangeable; with more than one running, records reach the
/// writer in no particular order.
pub struct TransformWorker {
    id: usize,
    intake: Receiver<PageUnit>,
    outtake: Sender<String>,
    encoder: Arc<dyn RecordEncoder>,
    progress: Arc<ImportProgress>,
    poll_timeout: Duration,
}

impl TransformWorker {
    pub fn new(
        id: usize,
        intake: Receiver<PageUnit>,
        outtake: Sender<String>,
        encoder: Arc<dyn RecordEncoder>,
        progress: Arc<ImportProgress>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            id,
            intake,
            outtake,
            encoder,
            progress,
            poll_timeout,
        }
    }

    /// Spawn the worker; the handle resolves to the number of records it produced
    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<u64> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, shutdown: ShutdownSignal) -> u64 {
        let mut produced = 0u64;

        loop {
            match tokio::time::timeout(self.poll_timeout, self.intake.recv()).await {
                Ok(Ok(page)) => {
                    let line = match self.encoder.encode(&page) {
                        Ok(line) => line,
                        Err(e) => {
                            warn!("Dropping page '{}': {}", page.title, e);
                            self.progress.record_dropped();
                            continue;
                        }
                    };

                    if self.outtake.send(line).await.is_err() {
                        warn!("Worker {}: output queue closed, stopping", self.id);
                        // Unblock the parser instead of letting it fill intake forever
                        self.intake.close();
                        break;
                    }
                    produced += 1;
                }
                // Every producer is gone and nothing is left
                Ok(Err(_)) => break,
                Err(_) => {
                    if shutdown.is_draining() && self.intake.is_empty() {
                        break;
                    }
                    trace!("Worker {} idle", self.id);
                }
            }
        }

        debug!("Worker {} stopped after {} records", self.id, produced);
        produced
    }
}
