//! FIFO of entries waiting for redelivery, guarded together with the
//! interrupt handle of the read currently blocked on the source.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::ResendEntry;

struct ResendState {
    entries: VecDeque<ResendEntry>,

    /// Cancels the most recent fresh read. Replaced on every fresh read.
    interrupt: CancellationToken,
}

/// Point-in-time view of the queue, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueSnapshot {
    pub queued: usize,
    pub max_attempts: u32,
    pub oldest_failure: Option<DateTime<Utc>>,
}

pub struct ResendQueue {
    state: Mutex<ResendState>,
}

impl ResendQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ResendState {
                entries: VecDeque::new(),
                interrupt: CancellationToken::new(),
            }),
        }
    }

    /// Append a failed entry and wake the blocked fresh read, if any.
    pub async fn push(&self, mut entry: ResendEntry) {
        entry.mark_failed();
        let mut state = self.state.lock().await;
        state.entries.push_back(entry);
        state.interrupt.cancel();
    }

    /// Put an entry back at the head, e.g. when its redelivery was abandoned.
    pub async fn push_front(&self, entry: ResendEntry) {
        let mut state = self.state.lock().await;
        state.entries.push_front(entry);
    }

    /// Pop the head entry, or, when there is none, make `scope` the handle
    /// that the next `push` cancels. Both happen under one lock so a failure
    /// reported in between cannot be missed.
    pub async fn pop_or_arm(&self, scope: &CancellationToken) -> Option<ResendEntry> {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.entries.pop_front() {
            return Some(entry);
        }
        state.interrupt = scope.clone();
        None
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock().await;
        QueueSnapshot {
            queued: state.entries.len(),
            max_attempts: state.entries.iter().map(|e| e.attempts).max().unwrap_or(0),
            oldest_failure: state.entries.iter().filter_map(|e| e.last_failed_at).min(),
        }
    }
}

impl Default for ResendQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Batch;
    use crate::ports::noop_ack;
    use crate::queue::BackoffPolicy;

    fn entry(text: &str) -> ResendEntry {
        ResendEntry::new(
            Batch::from_contents([text]),
            noop_ack(),
            &BackoffPolicy::default(),
        )
    }

    #[tokio::test]
    async fn entries_come_out_in_fifo_order() {
        let queue = ResendQueue::new();
        queue.push(entry("a")).await;
        queue.push(entry("b")).await;

        let scope = CancellationToken::new();
        let first = queue.pop_or_arm(&scope).await.unwrap();
        let second = queue.pop_or_arm(&scope).await.unwrap();

        assert_eq!(first.batch.texts(), vec!["a"]);
        assert_eq!(second.batch.texts(), vec!["b"]);
        assert!(queue.pop_or_arm(&scope).await.is_none());
    }

    #[tokio::test]
    async fn push_cancels_the_armed_scope() {
        let queue = ResendQueue::new();
        let scope = CancellationToken::new();

        assert!(queue.pop_or_arm(&scope).await.is_none());
        assert!(!scope.is_cancelled());

        queue.push(entry("a")).await;
        assert!(scope.is_cancelled());
    }

    #[tokio::test]
    async fn push_front_jumps_the_line() {
        let queue = ResendQueue::new();
        queue.push(entry("a")).await;
        queue.push_front(entry("b")).await;

        let scope = CancellationToken::new();
        let head = queue.pop_or_arm(&scope).await.unwrap();
        assert_eq!(head.batch.texts(), vec!["b"]);
    }

    #[tokio::test]
    async fn snapshot_reports_depth_and_attempts() {
        let queue = ResendQueue::new();
        let mut retried = entry("a");
        retried.attempts = 4;
        queue.push(retried).await;
        queue.push(entry("b")).await;

        let snap = queue.snapshot().await;
        assert_eq!(snap.queued, 2);
        assert_eq!(snap.max_attempts, 4);
        assert!(snap.oldest_failure.is_some());
    }
}
