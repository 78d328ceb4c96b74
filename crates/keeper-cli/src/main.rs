use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use clap::Parser;
use rand::Rng;
use tokio::time::{Duration, sleep};
use tracing::{info, warn};

use keeper_core::impls::InMemorySource;
use keeper_core::observability::init_tracing;
use keeper_core::{
    AsyncPreserver, AsyncSource, Batch, BatchError, BatchProcessor, BoxError, ConsumerConfig,
    ConsumerHandle, PreserverConfig, ProcessingError,
};

/// Feed a flaky processor through a preserver and report what happened.
#[derive(Debug, Parser)]
#[command(name = "keeper", version, about)]
struct Cli {
    /// Preserver config (JSON). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of batches to produce.
    #[arg(long, default_value_t = 20)]
    batches: usize,

    /// Parts per batch.
    #[arg(long, default_value_t = 3)]
    parts: usize,

    /// Probability that a single part fails to process.
    #[arg(long, default_value_t = 0.3)]
    failure_rate: f64,

    /// Simulated processing time per batch, in milliseconds.
    #[arg(long, default_value_t = 5)]
    work_ms: u64,
}

/// Fails each part independently with `failure_rate`.
struct FlakyProcessor {
    failure_rate: f64,
    work: Duration,
    processed_parts: AtomicU64,
}

#[async_trait]
impl BatchProcessor for FlakyProcessor {
    async fn process(&self, batch: &Batch) -> Result<(), ProcessingError> {
        sleep(self.work).await;

        let failed: Vec<usize> = {
            let mut rng = rand::thread_rng();
            (0..batch.len())
                .filter(|_| rng.gen_bool(self.failure_rate))
                .collect()
        };
        self.processed_parts
            .fetch_add((batch.len() - failed.len()) as u64, Ordering::Relaxed);

        if failed.is_empty() {
            return Ok(());
        }
        let err = failed
            .into_iter()
            .fold(BatchError::new(batch.shallow_copy(), "part rejected"), |e, i| {
                e.failed(i, format!("part {i} rejected"))
            });
        Err(err.into())
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    init_tracing();
    let cli = Cli::parse();

    if !(0.0..1.0).contains(&cli.failure_rate) {
        return Err(format!("--failure-rate must be in [0, 1), got {}", cli.failure_rate).into());
    }

    let config = match &cli.config {
        Some(path) => PreserverConfig::from_path(path)?,
        None => PreserverConfig::default(),
    };
    info!(?config, "starting");

    let source = Arc::new(InMemorySource::new());
    let preserver = Arc::new(AsyncPreserver::with_config(Arc::clone(&source), config));
    let processor = Arc::new(FlakyProcessor {
        failure_rate: cli.failure_rate,
        work: Duration::from_millis(cli.work_ms),
        processed_parts: AtomicU64::new(0),
    });

    let consumer = ConsumerHandle::spawn(
        Arc::clone(&preserver) as Arc<dyn AsyncSource>,
        Arc::clone(&processor) as Arc<dyn BatchProcessor>,
        ConsumerConfig::default(),
    );

    // producer：batch を流し込んでから input を閉じる
    for b in 0..cli.batches {
        let contents: Vec<String> = (0..cli.parts).map(|p| format!("batch{b}-part{p}")).collect();
        source.push(Batch::from_contents(contents.iter().map(String::as_str))).await;
    }
    source.close_input().await;

    let report = tokio::select! {
        joined = consumer.join() => joined?,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted; unacknowledged batches are lost with this process");
            return Ok(());
        }
    };

    let stats = preserver.stats().await;
    let acked = source.acks().await;
    let summary = serde_json::json!({
        "report": report,
        "stats": stats,
        "source_acks": acked.len(),
        "parts_processed": processor.processed_parts.load(Ordering::Relaxed),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
