//! AsyncPreserver - resend decorator for sources without negative
//! acknowledgment.
//!
//! Every batch read through the preserver is kept until the consumer reports
//! success. A failure puts the batch (or, for a partial failure, just the
//! failed parts) in a resend queue, and the queue is drained before any new
//! data is read from the source. Retries never give up.
//!
//! # Read flow
//! 1. resend queue non-empty: pop the head, pace it with backoff after the
//!    second redelivery, deliver
//! 2. otherwise: read from the source under an interrupt scope that the next
//!    failure cancels, deliver and count it as in flight
//! 3. end-of-stream with batches in flight: wait for them (see `drain`)
//!
//! An interrupted source read comes back as `ReadError::Cancelled`; the
//! caller is expected to read again, at which point the failed batch is
//! served.

mod ack;
mod drain;


use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::PreserverConfig;
use crate::domain::Batch;
use crate::error::ReadError;
use crate::observability::PreserverStats;
use crate::ports::{AckHandle, AsyncSource};
use crate::queue::{ResendEntry, ResendQueue};

/// State shared between the reader and the acknowledgers it handed out.
pub(crate) struct Shared {
    pub(crate) resend: ResendQueue,

    /// Batches read from the source and not yet acknowledged successfully.
    /// Redeliveries do not count again.
    pub(crate) pending: AtomicI64,

    /// Set once the source reported end-of-stream while batches were pending.
    pub(crate) input_closed: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        Self {
            resend: ResendQueue::new(),
            pending: AtomicI64::new(0),
            input_closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn pending(&self) -> i64 {
        self.pending.load(Ordering::Acquire)
    }
}

/// Wraps an `AsyncSource` and resends batches until they are acknowledged.
///
/// `read_batch` is meant to be driven by one reader at a time; the
/// acknowledgers it returns may be used from any task, concurrently.
pub struct AsyncPreserver<S> {
    source: S,
    shared: Arc<Shared>,
    config: PreserverConfig,
}

impl<S: AsyncSource> AsyncPreserver<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, PreserverConfig::default())
    }

    pub fn with_config(source: S, config: PreserverConfig) -> Self {
        Self {
            source,
            shared: Arc::new(Shared::new()),
            config,
        }
    }

    /// Batches delivered and not yet acknowledged successfully.
    pub fn in_flight(&self) -> i64 {
        self.shared.pending()
    }

    /// Read-only diagnostics.
    pub async fn stats(&self) -> PreserverStats {
        let queue = self.shared.resend.snapshot().await;
        PreserverStats {
            queued: queue.queued,
            in_flight: self.shared.pending(),
            source_closed: self.shared.input_closed.load(Ordering::Acquire),
            max_attempts: queue.max_attempts,
            oldest_failure: queue.oldest_failure,
        }
    }

    /// Hand a queued entry out again, pacing it once it keeps failing.
    async fn redeliver(
        &self,
        mut entry: ResendEntry,
        cancel: &CancellationToken,
    ) -> Result<(Batch, AckHandle), ReadError> {
        let attempt = entry.attempts + 1;
        if attempt > self.config.backoff_after_attempts {
            let delay = entry.backoff.next_delay();
            if !delay.is_zero() {
                debug!(attempt, delay_ms = delay.as_secs_f64() * 1000.0, "backing off before resend");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        // Keep the entry at the head so it is not lost.
                        self.shared.resend.push_front(entry).await;
                        return Err(ReadError::Cancelled);
                    }
                }
            }
        }
        entry.attempts = attempt;
        debug!(attempt, parts = entry.batch.len(), "resending batch");
        Ok(ack::wrap(&self.shared, entry))
    }
}

#[async_trait]
impl<S: AsyncSource> AsyncSource for AsyncPreserver<S> {
    async fn connect(&self, cancel: &CancellationToken) -> Result<(), ReadError> {
        let result = self.source.connect(cancel).await;
        drain::filter_connect(&self.shared, result)
    }

    async fn read_batch(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(Batch, AckHandle), ReadError> {
        // Scope of this read. Cancelled by the caller, by a failure reported
        // while we wait on the source, or when this call returns.
        let scope = cancel.child_token();
        let _scope_guard = scope.clone().drop_guard();

        if let Some(entry) = self.shared.resend.pop_or_arm(&scope).await {
            return self.redeliver(entry, cancel).await;
        }

        let result = if self.shared.input_closed.load(Ordering::Acquire) {
            Err(ReadError::Closed)
        } else {
            self.source.read_batch(&scope).await
        };

        match result {
            Ok((batch, source_ack)) => {
                self.shared.pending.fetch_add(1, Ordering::AcqRel);
                let entry = ResendEntry::new(batch, source_ack, &self.config.backoff);
                Ok(ack::wrap(&self.shared, entry))
            }
            Err(ReadError::Closed) => Err(drain::wait_for_drain(
                &self.shared,
                &scope,
                self.config.drain_poll_interval,
            )
            .await),
            Err(ReadError::Cancelled) if !cancel.is_cancelled() => {
                debug!("source read interrupted by resend work");
                Err(ReadError::Cancelled)
            }
            Err(err) => Err(err),
        }
    }

    async fn close(&self, cancel: &CancellationToken) -> Result<(), ReadError> {
        self.source.close(cancel).await
    }
}
