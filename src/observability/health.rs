//! Health endpoint (§4.8, §6.2): a plain HTTP surface separate from the
//! control WebSocket, for load balancers and monitoring to poll without
//! speaking the control protocol.

use crate::engine::{EngineHandle, EngineState};
use crate::frame::CaptureStats;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use log::info;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::watch;

#[derive(Clone)]
struct HealthState {
    engine: EngineHandle,
    started_at: Instant,
    capture_stats: watch::Receiver<CaptureStats>,
    /// Shared with the control server so both surfaces report the same
    /// connected-session count.
    clients: Arc<AtomicUsize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthBody {
    status: &'static str,
    engine: String,
    fps: f32,
    dropped: u64,
    total_frames: u64,
    uptime_sec: u64,
    clients: usize,
    version: &'static str,
}

/// Bind and serve `/health` and `/metrics` until the process is torn down.
/// `capture_stats` should be the on-air Capture's stats feed, used to
/// detect a stalled pipeline ("degraded": on-air but `fps == 0`). `clients`
/// is the same counter the control server increments per session.
pub async fn serve(
    addr: SocketAddr,
    engine: EngineHandle,
    capture_stats: watch::Receiver<CaptureStats>,
    clients: Arc<AtomicUsize>,
) -> std::io::Result<()> {
    let state = HealthState { engine, started_at: Instant::now(), capture_stats, clients };
    let router = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state);
    let listener = TcpListener::bind(addr).await?;
    info!("health endpoint listening on {addr}");
    axum::serve(listener, router).await
}

async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthBody>) {
    let engine_state = state.engine.snapshot().await.map(|s| s.state).unwrap_or(EngineState::Idle);
    let stats = *state.capture_stats.borrow();

    let stalled = matches!(engine_state, EngineState::OnAir | EngineState::Frozen) && stats.fps == 0.0;
    let (status_code, status) = if stalled { (StatusCode::SERVICE_UNAVAILABLE, "degraded") } else { (StatusCode::OK, "ok") };

    let body = HealthBody {
        status,
        engine: format!("{engine_state:?}"),
        fps: stats.fps,
        dropped: stats.dropped,
        total_frames: stats.total_frames,
        uptime_sec: state.started_at.elapsed().as_secs(),
        clients: state.clients.load(Ordering::SeqCst),
        version: env!("CARGO_PKG_VERSION"),
    };
    (status_code, Json(body))
}

async fn metrics(State(state): State<HealthState>) -> (HeaderMap, String) {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    let uptime = state.started_at.elapsed().as_secs();
    let engine_state = state.engine.snapshot().await.map(|s| s.state).unwrap_or(EngineState::Idle);
    let stats = *state.capture_stats.borrow();

    let mut body = String::new();
    body.push_str("# HELP playout_uptime_seconds Seconds since the process started.\n");
    body.push_str("# TYPE playout_uptime_seconds counter\n");
    body.push_str(&format!("playout_uptime_seconds {uptime}\n"));
    body.push_str("# HELP playout_engine_state Current coarse engine state (0=idle,1=pvwLoaded,2=onAir,3=frozen).\n");
    body.push_str("# TYPE playout_engine_state gauge\n");
    body.push_str(&format!("playout_engine_state {}\n", engine_state_metric_value(engine_state)));
    body.push_str("# HELP playout_capture_fps Ticked frames per second on the on-air capture feed.\n");
    body.push_str("# TYPE playout_capture_fps gauge\n");
    body.push_str(&format!("playout_capture_fps {}\n", stats.fps));
    body.push_str("# HELP playout_capture_dropped_total Paints dropped because the consumer tick was behind.\n");
    body.push_str("# TYPE playout_capture_dropped_total counter\n");
    body.push_str(&format!("playout_capture_dropped_total {}\n", stats.dropped));
    body.push_str("# HELP playout_capture_frames_total Frames ticked out to the output manager.\n");
    body.push_str("# TYPE playout_capture_frames_total counter\n");
    body.push_str(&format!("playout_capture_frames_total {}\n", stats.total_frames));
    body.push_str("# HELP playout_control_clients Currently-connected control sessions.\n");
    body.push_str("# TYPE playout_control_clients gauge\n");
    body.push_str(&format!("playout_control_clients {}\n", state.clients.load(Ordering::SeqCst)));
    (headers, body)
}

fn engine_state_metric_value(state: EngineState) -> i64 {
    match state {
        EngineState::Idle => 0,
        EngineState::PvwLoaded => 1,
        EngineState::OnAir => 2,
        EngineState::Frozen => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_values_are_stable() {
        assert_eq!(engine_state_metric_value(EngineState::Idle), 0);
        assert_eq!(engine_state_metric_value(EngineState::Frozen), 3);
    }
}
