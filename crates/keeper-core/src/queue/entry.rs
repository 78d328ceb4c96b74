//! Resend entry: a batch waiting for (re)delivery plus its bookkeeping.

use chrono::{DateTime, Utc};

use super::backoff::{Backoff, BackoffPolicy};
use crate::domain::Batch;
use crate::ports::AckHandle;

/// An unacknowledged batch and the acknowledger it originally came with.
///
/// Design:
/// - Created on a fresh read, before the batch is handed to the consumer.
/// - Enqueued every time its delivery is reported as failed.
/// - Dropped once a delivery succeeds and the original acknowledger ran.
pub struct ResendEntry {
    /// What will be delivered next time. Shrinks to the failed subset after a
    /// partial failure.
    pub batch: Batch,

    /// Acknowledger of the source. Only ever called with success.
    pub ack: AckHandle,

    /// Redeliveries made so far (the original delivery is not counted).
    pub attempts: u32,

    pub backoff: Backoff,

    /// Last time a delivery of this entry was reported as failed.
    pub last_failed_at: Option<DateTime<Utc>>,
}

impl ResendEntry {
    pub fn new(batch: Batch, ack: AckHandle, policy: &BackoffPolicy) -> Self {
        Self {
            batch,
            ack,
            attempts: 0,
            backoff: policy.start(),
            last_failed_at: None,
        }
    }

    /// Record a failed delivery.
    pub fn mark_failed(&mut self) {
        self.last_failed_at = Some(Utc::now());
    }
}

impl std::fmt::Debug for ResendEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResendEntry")
            .field("parts", &self.batch.len())
            .field("attempts", &self.attempts)
            .field("last_failed_at", &self.last_failed_at)
            .finish_non_exhaustive()
    }
}
