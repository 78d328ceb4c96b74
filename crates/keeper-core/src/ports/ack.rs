//! Acknowledger port.
//!
//! Every delivered batch comes with an acknowledger. The consumer owns it and
//! must call `ack` exactly once, with `Ok(())` on success or a
//! `ProcessingError` describing what failed.

use std::fmt;
use std::future::Future;

use async_trait::async_trait;

use crate::domain::ProcessingError;
use crate::error::AckError;

#[async_trait]
pub trait Acknowledger: Send {
    /// Report the processing result of the batch this acknowledger belongs to.
    async fn ack(self: Box<Self>, result: Result<(), ProcessingError>) -> Result<(), AckError>;
}

/// Owned acknowledger handed out with each batch.
pub type AckHandle = Box<dyn Acknowledger>;

impl fmt::Debug for dyn Acknowledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acknowledger").finish_non_exhaustive()
    }
}

/// Adapt an async closure into an acknowledger.
///
/// ```ignore
/// let ack = ack_fn(|res| async move {
///     println!("acked: {}", res.is_ok());
///     Ok(())
/// });
/// ```
pub fn ack_fn<F, Fut>(f: F) -> AckHandle
where
    F: FnOnce(Result<(), ProcessingError>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), AckError>> + Send + 'static,
{
    Box::new(FnAck(f))
}

/// Acknowledger that ignores the result.
pub fn noop_ack() -> AckHandle {
    ack_fn(|_| async { Ok(()) })
}

struct FnAck<F>(F);

#[async_trait]
impl<F, Fut> Acknowledger for FnAck<F>
where
    F: FnOnce(Result<(), ProcessingError>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), AckError>> + Send + 'static,
{
    async fn ack(self: Box<Self>, result: Result<(), ProcessingError>) -> Result<(), AckError> {
        (self.0)(result).await
    }
}
