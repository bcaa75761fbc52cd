// WebSocket subscription endpoint

use axum::{
    body::Bytes,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tokio::time::{Duration, MissedTickBehavior, interval_at, timeout};
use tokio_util::sync::CancellationToken;

use super::AppState;
use crate::collector::Collector;
use crate::error::{RequestError, StreamError};
use crate::models::AveragedSnapshot;
use crate::session::{SnapshotSink, SubscriptionRequest, run_subscription};

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

type SharedWriter = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Decrements the active subscription count on drop (connect = +1, drop = -1).
struct SubscriptionGuard(Arc<AtomicUsize>);

impl SubscriptionGuard {
    fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::Relaxed);
        Self(count)
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct SubscribeQuery {
    period: Option<u64>,
    averaging: Option<u64>,
    report: Option<u64>,
}

/// Sends each averaged snapshot as one JSON text frame.
struct WsSink {
    writer: SharedWriter,
}

impl SnapshotSink for WsSink {
    async fn send(&mut self, snapshot: &AveragedSnapshot) -> Result<(), StreamError> {
        let json = serde_json::to_string(snapshot)?;
        send_with_timeout(&self.writer, Message::Text(json.into())).await
    }
}

async fn send_with_timeout(writer: &SharedWriter, message: Message) -> Result<(), StreamError> {
    let mut writer = writer.lock().await;
    match timeout(WS_SEND_TIMEOUT, writer.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(StreamError::Send(e.to_string())),
        Err(_) => Err(StreamError::Timeout),
    }
}

/// GET /ws/metrics — query is validated before the upgrade; invalid requests get a 400.
pub(super) async fn ws_metrics(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<SubscribeQuery>,
) -> Result<Response, RequestError> {
    let request = SubscriptionRequest::from_params(
        query.period,
        query.averaging,
        query.report,
        &state.config.sampling,
    )?;
    let collector = state.collector.clone();
    let active = state.active_subscriptions.clone();
    Ok(ws
        .on_upgrade(move |socket| stream_metrics(socket, collector, request, active))
        .into_response())
}

async fn stream_metrics(
    socket: WebSocket,
    collector: Arc<Collector>,
    request: SubscriptionRequest,
    active: Arc<AtomicUsize>,
) {
    let _guard = SubscriptionGuard::new(active);
    tracing::info!(
        period_secs = request.period_secs,
        averaging_secs = request.averaging_secs,
        report_secs = request.report_secs,
        "Client subscribed to metrics stream"
    );

    let (writer, reader) = socket.split();
    let writer: SharedWriter = Arc::new(Mutex::new(writer));
    let cancel = CancellationToken::new();

    let reader_task = tokio::spawn(watch_for_close(reader, cancel.clone()));
    let ping_task = tokio::spawn(keep_alive(writer.clone(), cancel.clone()));

    let mut sink = WsSink { writer };
    match run_subscription(collector, request, &mut sink, cancel.clone()).await {
        Ok(summary) => tracing::info!(
            reports_sent = summary.reports_sent,
            samples_taken = summary.samples_taken,
            "Client unsubscribed from metrics stream"
        ),
        Err(e) => tracing::info!(error = %e, "Metrics stream ended"),
    }

    cancel.cancel();
    let _ = tokio::join!(reader_task, ping_task);
}

/// Cancels the subscription when the client closes or the connection drops.
/// Anything else the client sends is ignored.
async fn watch_for_close(mut reader: SplitStream<WebSocket>, cancel: CancellationToken) {
    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => return,
            msg = reader.next() => msg,
        };
        match msg {
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(e)) => {
                tracing::debug!(error = %e, "WebSocket read failed");
                break;
            }
            Some(Ok(_)) => {}
        }
    }
    cancel.cancel();
}

async fn keep_alive(writer: SharedWriter, cancel: CancellationToken) {
    let start = tokio::time::Instant::now() + WS_PING_INTERVAL;
    let mut ping_interval = interval_at(start, WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ping_interval.tick() => {}
        }
        if let Err(e) = send_with_timeout(&writer, Message::Ping(Bytes::new())).await {
            tracing::debug!(error = %e, "WebSocket ping failed");
            cancel.cancel();
            return;
        }
    }
}
