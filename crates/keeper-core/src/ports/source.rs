//! AsyncSource port - the three-operation contract of a batch source.
//!
//! Implemented by concrete sources and by the preserver itself, so a
//! preserved source can be dropped in wherever the raw one was used.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::ack::AckHandle;
use crate::domain::Batch;
use crate::error::ReadError;

/// An asynchronous source of batches.
///
/// Every operation must return promptly once `cancel` is cancelled, with
/// `ReadError::Cancelled` for reads. A read that hands out a batch transfers
/// ownership of the batch and its acknowledger to the caller.
#[async_trait]
pub trait AsyncSource: Send + Sync {
    /// Establish (or re-establish) the connection.
    ///
    /// `ReadError::Closed` means the source has nothing more to give.
    async fn connect(&self, cancel: &CancellationToken) -> Result<(), ReadError>;

    /// Read the next batch together with its acknowledger.
    async fn read_batch(&self, cancel: &CancellationToken)
    -> Result<(Batch, AckHandle), ReadError>;

    /// Shut the source down.
    async fn close(&self, cancel: &CancellationToken) -> Result<(), ReadError>;
}

#[async_trait]
impl<T: AsyncSource + ?Sized> AsyncSource for Arc<T> {
    async fn connect(&self, cancel: &CancellationToken) -> Result<(), ReadError> {
        (**self).connect(cancel).await
    }

    async fn read_batch(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(Batch, AckHandle), ReadError> {
        (**self).read_batch(cancel).await
    }

    async fn close(&self, cancel: &CancellationToken) -> Result<(), ReadError> {
        (**self).close(cancel).await
    }
}
