//! Record writer
//!
//! The single consumer of the outtake channel and the only owner of the output
//! sink. Lines are written in the order they arrive on the channel.

use std::sync::Arc;
use std::time::Duration;

use async_channel::Receiver;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use super::progress::ImportProgress;
use super::shutdown::ShutdownSignal;
use super::source::{ImportError, OutputLocation};

/// Boxed output sink
pub type Sink = Box<dyn AsyncWrite + Unpin + Send>;

/// Open the output sink. Called once, before any pipeline task starts.
pub async fn open_sink(location: &OutputLocation) -> Result<Sink, ImportError> {
    match location {
        OutputLocation::Stdout => Ok(Box::new(tokio::io::stdout())),
        OutputLocation::Path(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .map_err(|e| ImportError::Open {
                    path: path.clone(),
                    source: e,
                })?;
            Ok(Box::new(file))
        }
    }
}

/// Writes encoded records, one per line, to the sink
pub struct RecordWriter<W: AsyncWrite + Unpin> {
    sink: BufWriter<W>,
    outtake: Receiver<String>,
    progress: Arc<ImportProgress>,
    poll_timeout: Duration,
}

impl<W> RecordWriter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(
        sink: W,
        outtake: Receiver<String>,
        progress: Arc<ImportProgress>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            sink: BufWriter::new(sink),
            outtake,
            progress,
            poll_timeout,
        }
    }

    /// Spawn the writer; the handle resolves to the number of lines written
    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<Result<u64, ImportError>> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(mut self, shutdown: ShutdownSignal) -> Result<u64, ImportError> {
        let result = self.drain(&shutdown).await;

        if let Err(ref e) = result {
            error!("Write failed: {}", e);
            // Let workers (and through them the parser) unwind
            self.outtake.close();
        }

        // The sink is flushed and closed on every exit path
        let closed = async {
            self.sink.flush().await?;
            self.sink.shutdown().await
        }
        .await;

        match (result, closed) {
            (Ok(written), Ok(())) => {
                info!("Writer stopped after {} records", written);
                Ok(written)
            }
            (Err(e), _) => Err(e),
            (Ok(_), Err(e)) => {
                error!("Failed to flush output: {}", e);
                Err(ImportError::Io(e))
            }
        }
    }

    async fn drain(&mut self, shutdown: &ShutdownSignal) -> Result<u64, ImportError> {
        let mut written = 0u64;

        loop {
            match tokio::time::timeout(self.poll_timeout, self.outtake.recv()).await {
                Ok(Ok(line)) => {
                    self.sink.write_all(line.as_bytes()).await?;
                    self.sink.write_all(b"\n").await?;
                    self.progress.record_written();
                    written += 1;
                }
                // Closed and empty: every worker is gone
                Ok(Err(_)) => break,
                Err(_) => {
                    if shutdown.is_draining()
                        && self.outtake.is_empty()
                        && self.outtake.sender_count() == 0
                    {
                        break;
                    }
                    trace!("Writer idle");
                }
            }
        }

        debug!("Output queue drained");
        Ok(written)
    }
}
