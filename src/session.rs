// Subscriber lifecycle: validated request, producer + sender pair, cancellation.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use crate::aggregation::aggregate;
use crate::buffer::SampleBuffer;
use crate::collector::Collector;
use crate::config::SamplingConfig;
use crate::error::{RequestError, StreamError};
use crate::models::AveragedSnapshot;
use crate::worker::{self, WorkerConfig, WorkerDeps};

/// Longest timer handed to the runtime. Larger requests are clamped so that
/// `Instant + interval` cannot overflow; such a timer never fires in practice.
pub const MAX_INTERVAL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Validated subscription parameters, all in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    pub period_secs: u64,
    pub averaging_secs: u64,
    pub report_secs: u64,
}

impl SubscriptionRequest {
    /// Fills omitted parameters from `sampling` and validates the result.
    ///
    /// `averaging` shorter than `period` is accepted; the window then holds a
    /// single sample.
    pub fn from_params(
        period: Option<u64>,
        averaging: Option<u64>,
        report: Option<u64>,
        sampling: &SamplingConfig,
    ) -> Result<Self, RequestError> {
        let period_secs = period.unwrap_or(sampling.default_period_secs);
        let averaging_secs = averaging.unwrap_or(sampling.default_averaging_secs);
        let report_secs = report.unwrap_or(period_secs);

        if period_secs == 0 {
            return Err(RequestError::ZeroPeriod);
        }
        if averaging_secs == 0 {
            return Err(RequestError::ZeroAveraging);
        }
        if averaging_secs > sampling.max_averaging_secs {
            return Err(RequestError::AveragingTooLong {
                max: sampling.max_averaging_secs,
                got: averaging_secs,
            });
        }
        if report_secs < period_secs {
            return Err(RequestError::ReportShorterThanPeriod {
                report: report_secs,
                period: period_secs,
            });
        }
        Ok(Self {
            period_secs,
            averaging_secs,
            report_secs,
        })
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs).min(MAX_INTERVAL)
    }

    pub fn averaging(&self) -> Duration {
        Duration::from_secs(self.averaging_secs).min(MAX_INTERVAL)
    }

    pub fn report(&self) -> Duration {
        Duration::from_secs(self.report_secs).min(MAX_INTERVAL)
    }
}

/// Where averaged snapshots go. A failed send ends the subscription.
pub trait SnapshotSink: Send {
    fn send(
        &mut self,
        snapshot: &AveragedSnapshot,
    ) -> impl Future<Output = Result<(), StreamError>> + Send;
}

/// Totals for one finished subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub reports_sent: u64,
    pub samples_taken: u64,
}

/// Runs one subscription until `cancel` fires or a send fails.
///
/// A producer task samples every `period` into a window of
/// `averaging / period` snapshots; this task aggregates that window every
/// `report` and hands it to `sink`. The first report goes out one `report`
/// after subscribing. The producer is cancelled and awaited before this
/// returns, whichever way the session ends.
pub async fn run_subscription<S: SnapshotSink>(
    collector: Arc<Collector>,
    request: SubscriptionRequest,
    sink: &mut S,
    cancel: CancellationToken,
) -> Result<SessionSummary, StreamError> {
    let buffer = Arc::new(SampleBuffer::for_window(
        request.period(),
        request.averaging(),
    ));
    let samples_taken = Arc::new(AtomicU64::new(0));
    let producer = worker::spawn(
        WorkerDeps {
            collector,
            buffer: buffer.clone(),
            cancel: cancel.clone(),
            samples_taken: samples_taken.clone(),
        },
        WorkerConfig {
            period: request.period(),
        },
    );
    let stop_producer = cancel.clone().drop_guard();

    let report = request.report();
    let mut report_tick = interval_at(Instant::now() + report, report);
    report_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut reports_sent = 0u64;
    let result = loop {
        tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            _ = report_tick.tick() => {}
        }
        let window = buffer.snapshot();
        let averaged = aggregate(window.iter().map(Arc::as_ref));
        tracing::debug!(
            operation = "send_report",
            sample_count = averaged.sample_count,
            "Sending averaged snapshot"
        );
        if let Err(e) = sink.send(&averaged).await {
            break Err(e);
        }
        reports_sent += 1;
    };

    drop(stop_producer);
    if let Err(e) = producer.await {
        tracing::warn!(error = %e, operation = "join_producer", "producer task failed");
    }

    result.map(|()| SessionSummary {
        reports_sent,
        samples_taken: samples_taken.load(std::sync::atomic::Ordering::Relaxed),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricsConfig;
    use crate::net_repo::{NetRepo, WindowConfig};
    use crate::procfs_repo::ProcfsRepo;

    struct CountingSink(u64);

    impl SnapshotSink for CountingSink {
        async fn send(&mut self, _snapshot: &AveragedSnapshot) -> Result<(), StreamError> {
            self.0 += 1;
            Ok(())
        }
    }

    fn idle_collector() -> Arc<Collector> {
        let metrics = MetricsConfig {
            load_average: false,
            cpu: false,
            disk_usage: false,
            filesystem_usage: false,
            network: false,
        };
        let window = WindowConfig {
            window: Duration::from_millis(10),
            tick: Duration::from_millis(5),
        };
        Arc::new(Collector::new(
            ProcfsRepo::new("/nonexistent"),
            NetRepo::new("/nonexistent", "/nonexistent/passwd", window),
            metrics,
        ))
    }

    fn sampling() -> SamplingConfig {
        SamplingConfig {
            max_averaging_secs: 60,
            ..Default::default()
        }
    }

    #[test]
    fn defaults_fill_missing_params() {
        let r = SubscriptionRequest::from_params(None, None, None, &sampling()).unwrap();
        assert_eq!(r.period_secs, 5);
        assert_eq!(r.averaging_secs, 15);
        assert_eq!(r.report_secs, 5);
    }

    #[test]
    fn rejects_invalid_params() {
        let s = sampling();
        assert_eq!(
            SubscriptionRequest::from_params(Some(0), Some(5), None, &s),
            Err(RequestError::ZeroPeriod)
        );
        assert_eq!(
            SubscriptionRequest::from_params(Some(1), Some(0), None, &s),
            Err(RequestError::ZeroAveraging)
        );
        assert_eq!(
            SubscriptionRequest::from_params(Some(1), Some(61), None, &s),
            Err(RequestError::AveragingTooLong { max: 60, got: 61 })
        );
        assert_eq!(
            SubscriptionRequest::from_params(Some(5), Some(10), Some(2), &s),
            Err(RequestError::ReportShorterThanPeriod { report: 2, period: 5 })
        );
    }

    #[test]
    fn averaging_shorter_than_period_is_accepted() {
        let r = SubscriptionRequest::from_params(Some(10), Some(3), None, &sampling()).unwrap();
        assert_eq!(
            crate::buffer::window_capacity(r.period(), r.averaging()),
            1
        );
    }

    #[test]
    fn huge_intervals_are_clamped() {
        let r = SubscriptionRequest::from_params(Some(u64::MAX), Some(1), None, &sampling())
            .unwrap();
        assert_eq!(r.period_secs, u64::MAX);
        assert_eq!(r.period(), MAX_INTERVAL);
        assert_eq!(r.report(), MAX_INTERVAL);
        assert_eq!(crate::buffer::window_capacity(r.period(), r.averaging()), 1);
    }

    #[tokio::test]
    async fn huge_period_subscription_runs_until_cancelled() {
        let request =
            SubscriptionRequest::from_params(Some(u64::MAX), Some(1), None, &sampling()).unwrap();
        let cancel = CancellationToken::new();
        let session = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let mut sink = CountingSink(0);
                let summary = run_subscription(idle_collector(), request, &mut sink, cancel).await;
                (summary, sink.0)
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        let (summary, sent) = tokio::time::timeout(Duration::from_secs(2), session)
            .await
            .expect("session ends on cancel")
            .expect("session task does not panic");
        let summary = summary.unwrap();
        assert_eq!(summary.reports_sent, 0);
        assert_eq!(sent, 0);
        assert!(summary.samples_taken <= 1);
    }
}
