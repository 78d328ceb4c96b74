//! InMemorySource - scripted batch source for development and tests.
//!
//! Batches are pushed in by hand and handed out in order. Like most real
//! sources without negative acknowledgment, it forgets a batch once it has
//! been read: whatever the reader reports later is only recorded.
//!
//! Once `close_input` was called and every pushed batch was read, `connect`
//! and `read_batch` report end-of-stream.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use crate::domain::{Batch, BatchId};
use crate::error::ReadError;
use crate::ports::{AckHandle, AsyncSource, ack_fn};

/// What the source's own acknowledger was told about a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct AckRecord {
    pub batch_id: BatchId,
    pub texts: Vec<String>,
    pub success: bool,
}

struct MemoryState {
    batches: VecDeque<(BatchId, Batch)>,
    input_closed: bool,
    failing_connects: u32,
    connects: u32,
    reads: u32,
    shut_down: bool,
}

pub struct InMemorySource {
    state: Mutex<MemoryState>,
    notify: Notify,
    acks: Arc<Mutex<Vec<AckRecord>>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::build(VecDeque::new(), false)
    }

    /// Source preloaded with `batches` and already closed for input.
    pub fn finite(batches: impl IntoIterator<Item = Batch>) -> Self {
        let batches = batches
            .into_iter()
            .map(|batch| (BatchId::generate(), batch))
            .collect();
        Self::build(batches, true)
    }

    fn build(batches: VecDeque<(BatchId, Batch)>, input_closed: bool) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                batches,
                input_closed,
                failing_connects: 0,
                connects: 0,
                reads: 0,
                shut_down: false,
            }),
            notify: Notify::new(),
            acks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Append a batch and wake a waiting reader.
    pub async fn push(&self, batch: Batch) -> BatchId {
        let id = BatchId::generate();
        self.state.lock().await.batches.push_back((id, batch));
        self.notify.notify_one();
        id
    }

    /// No more batches will be pushed.
    pub async fn close_input(&self) {
        self.state.lock().await.input_closed = true;
        self.notify.notify_one();
    }

    /// Make the next `n` connects fail with a connection error.
    pub async fn fail_connects(&self, n: u32) {
        self.state.lock().await.failing_connects = n;
    }

    /// Batches still waiting to be read.
    pub async fn remaining(&self) -> usize {
        self.state.lock().await.batches.len()
    }

    /// Number of `read_batch` calls that reached this source.
    pub async fn reads(&self) -> u32 {
        self.state.lock().await.reads
    }

    pub async fn connects(&self) -> u32 {
        self.state.lock().await.connects
    }

    pub async fn is_shut_down(&self) -> bool {
        self.state.lock().await.shut_down
    }

    /// Every acknowledgment received so far, in arrival order.
    pub async fn acks(&self) -> Vec<AckRecord> {
        self.acks.lock().await.clone()
    }

    fn acknowledger(&self, batch_id: BatchId, batch: &Batch) -> AckHandle {
        let acks = Arc::clone(&self.acks);
        let texts = batch.texts();
        ack_fn(move |result| async move {
            acks.lock().await.push(AckRecord {
                batch_id,
                texts,
                success: result.is_ok(),
            });
            Ok(())
        })
    }
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AsyncSource for InMemorySource {
    async fn connect(&self, _cancel: &CancellationToken) -> Result<(), ReadError> {
        let mut state = self.state.lock().await;
        state.connects += 1;
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(ReadError::Connection("in-memory source unavailable".into()));
        }
        if state.shut_down || (state.input_closed && state.batches.is_empty()) {
            return Err(ReadError::Closed);
        }
        Ok(())
    }

    async fn read_batch(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(Batch, AckHandle), ReadError> {
        self.state.lock().await.reads += 1;
        loop {
            {
                let mut state = self.state.lock().await;
                if state.shut_down {
                    return Err(ReadError::Closed);
                }
                if let Some((id, batch)) = state.batches.pop_front() {
                    drop(state);
                    let ack = self.acknowledger(id, &batch);
                    return Ok((batch, ack));
                }
                if state.input_closed {
                    return Err(ReadError::Closed);
                }
            }

            tokio::select! {
                _ = self.notify.notified() => {}
                _ = cancel.cancelled() => return Err(ReadError::Cancelled),
            }
        }
    }

    async fn close(&self, _cancel: &CancellationToken) -> Result<(), ReadError> {
        self.state.lock().await.shut_down = true;
        self.notify.notify_one();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn reads_in_push_order() {
        let source = InMemorySource::new();
        source.push(Batch::from_contents(["a"])).await;
        source.push(Batch::from_contents(["b"])).await;

        let cancel = CancellationToken::new();
        let (first, _) = source.read_batch(&cancel).await.unwrap();
        let (second, _) = source.read_batch(&cancel).await.unwrap();

        assert_eq!(first.texts(), vec!["a"]);
        assert_eq!(second.texts(), vec!["b"]);
    }

    #[tokio::test]
    async fn push_wakes_a_blocked_read() {
        let source = Arc::new(InMemorySource::new());
        let reader = tokio::spawn({
            let source = Arc::clone(&source);
            async move { source.read_batch(&CancellationToken::new()).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        source.push(Batch::from_contents(["late"])).await;

        let (batch, _) = reader.await.unwrap().unwrap();
        assert_eq!(batch.texts(), vec!["late"]);
    }

    #[tokio::test]
    async fn blocked_read_returns_cancelled() {
        let source = InMemorySource::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = source.read_batch(&cancel).await.unwrap_err();
        assert!(matches!(err, ReadError::Cancelled));
    }

    #[tokio::test]
    async fn closed_and_empty_reports_end_of_stream() {
        let source = InMemorySource::finite([Batch::from_contents(["only"])]);
        let cancel = CancellationToken::new();

        source.connect(&cancel).await.unwrap();
        let (_, ack) = source.read_batch(&cancel).await.unwrap();
        ack.ack(Ok(())).await.unwrap();

        assert!(source.read_batch(&cancel).await.unwrap_err().is_closed());
        assert!(source.connect(&cancel).await.unwrap_err().is_closed());
        assert_eq!(source.acks().await.len(), 1);
        assert!(source.acks().await[0].success);
    }

    #[tokio::test]
    async fn failing_connects_are_counted_down() {
        let source = InMemorySource::new();
        source.fail_connects(1).await;
        let cancel = CancellationToken::new();

        assert!(matches!(
            source.connect(&cancel).await,
            Err(ReadError::Connection(_))
        ));
        assert!(source.connect(&cancel).await.is_ok());
        assert_eq!(source.connects().await, 2);
    }
}
