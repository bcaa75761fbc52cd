// Per-subscription producer: one sampling pass per period, appended to the window.
// Aggregation and delivery run in the session's sender loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::buffer::SampleBuffer;
use crate::collector::Collector;

/// Collector, buffer and cancellation for one producer.
pub struct WorkerDeps {
    pub collector: Arc<Collector>,
    pub buffer: Arc<SampleBuffer>,
    pub cancel: CancellationToken,
    /// Incremented after every appended snapshot.
    pub samples_taken: Arc<AtomicU64>,
}

pub struct WorkerConfig {
    pub period: Duration,
}

/// Spawns the producer. It exits when `cancel` fires, abandoning any pass in
/// flight at its next await point.
pub fn spawn(deps: WorkerDeps, config: WorkerConfig) -> tokio::task::JoinHandle<()> {
    let WorkerDeps {
        collector,
        buffer,
        cancel,
        samples_taken,
    } = deps;
    let WorkerConfig { period } = config;

    let span = tracing::debug_span!("producer", period_ms = period.as_millis() as u64);
    tokio::spawn(
        async move {
            let mut tick = interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {}
                }
                let snapshot = tokio::select! {
                    _ = cancel.cancelled() => break,
                    s = collector.collect() => s,
                };
                buffer.push(snapshot);
                samples_taken.fetch_add(1, Ordering::Relaxed);
            }
            tracing::debug!("Producer shutting down");
        }
        .instrument(span),
    )
}
