//! Shutdown drain: keep end-of-stream from reaching the consumer while
//! batches it was given are still unacknowledged.

use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::Shared;
use crate::error::ReadError;

/// Filter the result of the source's `connect`.
///
/// End-of-stream with batches in flight is reported as a successful connect,
/// and the source is not asked for more data afterwards.
pub(super) fn filter_connect(shared: &Shared, result: Result<(), ReadError>) -> Result<(), ReadError> {
    match result {
        Err(ReadError::Closed) if shared.pending() > 0 => {
            shared.input_closed.store(true, Ordering::Release);
            info!(
                pending = shared.pending(),
                "source closed with batches in flight, holding it open"
            );
            Ok(())
        }
        other => other,
    }
}

/// Wait until every in-flight batch is acknowledged.
///
/// Returns `Closed` once nothing is pending, or `Timeout` if `scope` ends
/// first. `scope` is the read's interrupt scope, so a batch failing during
/// the wait also ends it; the next read then picks that batch up.
pub(super) async fn wait_for_drain(
    shared: &Shared,
    scope: &CancellationToken,
    poll_interval: Duration,
) -> ReadError {
    if shared.pending() <= 0 {
        return ReadError::Closed;
    }
    shared.input_closed.store(true, Ordering::Release);

    loop {
        tokio::select! {
            _ = scope.cancelled() => return ReadError::Timeout,
            _ = tokio::time::sleep(poll_interval) => {
                if shared.pending() <= 0 {
                    info!("all in-flight batches acknowledged, source drained");
                    return ReadError::Closed;
                }
            }
        }
    }
}
