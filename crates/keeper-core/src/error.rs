use thiserror::Error;

/// Boxed error used for causes supplied by consumers and sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced on the read path of a source.
///
/// Batch processing failures never show up here: they are absorbed by the
/// preserver and retried.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The source could not be reached. Passed through verbatim.
    #[error("connection error: {0}")]
    Connection(String),

    /// The source reached end-of-stream.
    #[error("source closed")]
    Closed,

    /// Gave up waiting for outstanding batches to be acknowledged.
    #[error("timed out waiting for pending acknowledgments")]
    Timeout,

    /// The read was cancelled, either by the caller or because retry work
    /// became available.
    #[error("read cancelled")]
    Cancelled,
}

impl ReadError {
    pub fn is_closed(&self) -> bool {
        matches!(self, ReadError::Closed)
    }

    /// Outcomes after which the caller should simply read again.
    pub fn is_retryable_read(&self) -> bool {
        matches!(self, ReadError::Cancelled | ReadError::Timeout)
    }
}

/// Failure of an acknowledger.
#[derive(Debug, Error)]
pub enum AckError {
    #[error("acknowledgment rejected: {0}")]
    Rejected(String),
}
