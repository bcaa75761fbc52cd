// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tower_http::cors::{Any, CorsLayer};

use crate::collector::Collector;
use crate::config::AppConfig;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) collector: Arc<Collector>,
    pub(crate) active_subscriptions: Arc<AtomicUsize>,
    pub(crate) config: AppConfig,
}

pub fn app(
    collector: Arc<Collector>,
    active_subscriptions: Arc<AtomicUsize>,
    config: AppConfig,
) -> Router {
    let state = AppState {
        collector,
        active_subscriptions,
        config,
    };
    Router::new()
        .route("/", get(|| async { "sysstatd: host metrics over WebSocket" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/ws/metrics", get(ws::ws_metrics)) // WS /ws/metrics?period&averaging&report
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
