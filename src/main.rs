use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use sysstatd::*;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Streams averaged host metrics from /proc to WebSocket subscribers.
#[derive(Parser, Debug)]
#[command(name = "sysstatd", version)]
struct Args {
    /// Config file (defaults to $CONFIG_FILE, then config.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides server.port from the config file.
    #[arg(short, long)]
    port: Option<u16>,
}

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

/// Logs the active subscription count until `shutdown` fires.
fn spawn_stats_logger(
    active_subscriptions: Arc<AtomicUsize>,
    every: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tick.tick() => {
                    tracing::info!(
                        active_subscriptions = active_subscriptions.load(Ordering::Relaxed),
                        "app stats"
                    );
                }
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let mut app_config = match &args.config {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    if let Some(port) = args.port {
        anyhow::ensure!(port > 0, "--port must be between 1 and 65535");
        app_config.server.port = port;
    }

    let m = &app_config.metrics;
    tracing::info!(
        load_average = m.load_average,
        cpu = m.cpu,
        disk_usage = m.disk_usage,
        filesystem_usage = m.filesystem_usage,
        network = m.network,
        proc_root = %app_config.procfs.root.display(),
        "Metric families"
    );

    let collector = Arc::new(collector::Collector::from_config(&app_config));
    let active_subscriptions = Arc::new(AtomicUsize::new(0));
    let shutdown = CancellationToken::new();

    let stats_handle = spawn_stats_logger(
        active_subscriptions.clone(),
        Duration::from_secs(app_config.monitoring.stats_log_interval_secs),
        shutdown.clone(),
    );

    let app = routes::app(collector, active_subscriptions, app_config.clone());
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
        }
    }

    shutdown.cancel();
    let _ = stats_handle.await;
    Ok(())
}
