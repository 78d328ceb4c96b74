//! Consumer loop: read → process → acknowledge, against any `AsyncSource`.
//!
//! This is the "calling loop" a preserver expects. It reads one batch at a
//! time, processes batches concurrently on spawned tasks (so acknowledgments
//! arrive out of order and from other tasks), and reads again after a
//! cancelled or timed-out read instead of treating it as fatal.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{Batch, ProcessingError};
use crate::error::ReadError;
use crate::ports::AsyncSource;

/// Processes one delivered batch.
#[async_trait]
pub trait BatchProcessor: Send + Sync {
    async fn process(&self, batch: &Batch) -> Result<(), ProcessingError>;
}

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Pause before reconnecting after a connection error.
    pub reconnect_delay: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(100),
        }
    }
}

/// What a consumer did over its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerReport {
    pub deliveries: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub ack_errors: u64,
    pub connection_errors: u64,
    /// Reads that came back cancelled or timed out and were issued again.
    pub reread: u64,
}

/// Handle to a running consumer.
/// - `request_shutdown` stops reading; batches already being processed still
///   get acknowledged
/// - `join` waits for the loop to end on its own (end-of-stream)
pub struct ConsumerHandle {
    shutdown: CancellationToken,
    join: JoinHandle<ConsumerReport>,
}

impl ConsumerHandle {
    /// Spawn a consumer reading from `source`.
    pub fn spawn(
        source: Arc<dyn AsyncSource>,
        processor: Arc<dyn BatchProcessor>,
        config: ConsumerConfig,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let join = tokio::spawn(consume_loop(source, processor, config, shutdown.clone()));
        Self { shutdown, join }
    }

    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    pub async fn join(self) -> Result<ConsumerReport, JoinError> {
        self.join.await
    }

    pub async fn shutdown_and_join(self) -> Result<ConsumerReport, JoinError> {
        self.request_shutdown();
        self.join().await
    }
}

async fn consume_loop(
    source: Arc<dyn AsyncSource>,
    processor: Arc<dyn BatchProcessor>,
    config: ConsumerConfig,
    shutdown: CancellationToken,
) -> ConsumerReport {
    let mut report = ConsumerReport::default();
    let mut in_progress: JoinSet<Outcome> = JoinSet::new();

    'connect: while !shutdown.is_cancelled() {
        match source.connect(&shutdown).await {
            Ok(()) => {}
            Err(ReadError::Closed) => break,
            Err(err) => {
                report.connection_errors += 1;
                warn!(error = %err, "connect failed");
                if !pause(&shutdown, config.reconnect_delay).await {
                    break;
                }
                continue;
            }
        }

        loop {
            if shutdown.is_cancelled() {
                break 'connect;
            }

            let (batch, ack) = match source.read_batch(&shutdown).await {
                Ok(delivery) => delivery,
                Err(err) if err.is_retryable_read() => {
                    // 割り込み or drain timeout: just read again.
                    report.reread += 1;
                    continue;
                }
                Err(ReadError::Closed) => {
                    info!("source closed");
                    break 'connect;
                }
                Err(err) => {
                    report.connection_errors += 1;
                    warn!(error = %err, "read failed, reconnecting");
                    if !pause(&shutdown, config.reconnect_delay).await {
                        break 'connect;
                    }
                    continue 'connect;
                }
            };

            report.deliveries += 1;
            let processor = Arc::clone(&processor);
            let parts = batch.len();
            in_progress.spawn(async move {
                // A panicking processor still has to report back, or the batch
                // would never be resent nor acknowledged.
                let processing = tokio::spawn(async move { processor.process(&batch).await });
                let result = match processing.await {
                    Ok(result) => result,
                    Err(err) => {
                        warn!(parts, error = %err, "processor panicked");
                        Err(ProcessingError::whole(err))
                    }
                };
                let processed = result.is_ok();
                if let Err(err) = &result {
                    debug!(parts, error = %err, "processing failed");
                }
                match ack.ack(result).await {
                    Ok(()) => Outcome { processed, acked: true },
                    Err(err) => {
                        warn!(error = %err, "acknowledgment failed");
                        Outcome { processed, acked: false }
                    }
                }
            });

            while let Some(done) = in_progress.try_join_next() {
                tally(&mut report, done);
            }
        }
    }

    while let Some(done) = in_progress.join_next().await {
        tally(&mut report, done);
    }

    // The shutdown token is already cancelled here; give close its own scope.
    if let Err(err) = source.close(&CancellationToken::new()).await {
        warn!(error = %err, "close failed");
    }
    info!(
        deliveries = report.deliveries,
        succeeded = report.succeeded,
        failed = report.failed,
        "consumer stopped"
    );
    report
}

struct Outcome {
    processed: bool,
    acked: bool,
}

fn tally(report: &mut ConsumerReport, done: Result<Outcome, JoinError>) {
    match done {
        Ok(outcome) => {
            if outcome.processed {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
            if !outcome.acked {
                report.ack_errors += 1;
            }
        }
        Err(err) => {
            warn!(error = %err, "processing task died");
            report.failed += 1;
        }
    }
}

/// Sleep unless shutdown comes first. Returns false on shutdown.
async fn pause(shutdown: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
