//! Acknowledgment wrapper.
//!
//! Replaces the acknowledger of every delivered batch. Failures are absorbed
//! into the resend queue; only success reaches the source's acknowledger.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::Shared;
use crate::domain::{Batch, ProcessingError, SortGroup};
use crate::error::AckError;
use crate::ports::{AckHandle, Acknowledger};
use crate::queue::ResendEntry;

/// Wrap `entry` for delivery.
///
/// Single-part batches are handed out as a plain shallow copy. Multi-part
/// batches are handed out as a tagged copy so that a partial failure can be
/// traced back to the original parts.
pub(super) fn wrap(shared: &Arc<Shared>, entry: ResendEntry) -> (Batch, AckHandle) {
    if entry.batch.len() == 1 {
        let batch = entry.batch.shallow_copy();
        let ack = PreservedAck {
            shared: Arc::clone(shared),
            entry,
            group: None,
        };
        return (batch, Box::new(ack));
    }

    let (group, tagged) = SortGroup::new(&entry.batch);
    let ack = PreservedAck {
        shared: Arc::clone(shared),
        entry,
        group: Some(group),
    };
    (tagged, Box::new(ack))
}

struct PreservedAck {
    shared: Arc<Shared>,
    entry: ResendEntry,
    /// Present for multi-part deliveries.
    group: Option<SortGroup>,
}

#[async_trait]
impl Acknowledger for PreservedAck {
    async fn ack(self: Box<Self>, result: Result<(), ProcessingError>) -> Result<(), AckError> {
        let PreservedAck {
            shared,
            mut entry,
            group,
        } = *self;

        let err = match result {
            Ok(()) => {
                shared.pending.fetch_sub(1, Ordering::AcqRel);
                debug!(
                    parts = entry.batch.len(),
                    attempts = entry.attempts,
                    "batch acknowledged"
                );
                return entry.ack.ack(Ok(())).await;
            }
            Err(err) => err,
        };

        if let Some(group) = group {
            entry.batch = retry_subset(&entry.batch, &group, &err);
        }
        debug!(
            parts = entry.batch.len(),
            attempts = entry.attempts,
            error = %err,
            "batch failed, queued for resend"
        );
        shared.resend.push(entry).await;
        Ok(())
    }
}

/// Parts of `original` that have to be delivered again after `err`.
///
/// Only a per-part error that leaves at least one part untouched narrows the
/// batch. Any failed part that cannot be traced back to `original` means the
/// whole batch goes again.
pub(crate) fn retry_subset(original: &Batch, group: &SortGroup, err: &ProcessingError) -> Batch {
    let ProcessingError::Parts(batch_err) = err else {
        return original.clone();
    };
    if batch_err.indexed_errors() >= original.len() {
        return original.clone();
    }

    let mut subset = Batch::default();
    let mut untraceable = false;
    batch_err.walk_parts(|index, part, part_err| {
        if part_err.is_none() {
            return ControlFlow::Continue(());
        }
        match group.index_of(part).and_then(|i| original.get(i)) {
            Some(orig) => {
                subset.push(orig.clone());
                ControlFlow::Continue(())
            }
            None => {
                warn!(
                    index,
                    group = %group.id(),
                    "failed part cannot be traced back, resending the whole batch"
                );
                untraceable = true;
                ControlFlow::Break(())
            }
        }
    });

    if untraceable || subset.is_empty() {
        return original.clone();
    }
    subset
}
