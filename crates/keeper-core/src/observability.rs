//! Diagnostics and logging setup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Read-only snapshot of a preserver.
///
/// Retries are unbounded, so queue depth and attempt counts are what tell an
/// operator that something downstream keeps failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreserverStats {
    /// Entries waiting for redelivery.
    pub queued: usize,

    /// Batches read from the source and not yet acknowledged.
    pub in_flight: i64,

    /// The source reported end-of-stream and the preserver is draining.
    pub source_closed: bool,

    /// Highest redelivery count among queued entries.
    pub max_attempts: u32,

    /// Oldest failure among queued entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest_failure: Option<DateTime<Utc>>,
}

/// Install a fmt subscriber driven by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
