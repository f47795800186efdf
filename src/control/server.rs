//! Persistent control-channel server (§4.7): one WebSocket connection per
//! operator client, each multiplexing command/reply traffic with an
//! unsolicited feed of Engine lifecycle events.

use crate::config::PlayoutConfig;
use crate::control::protocol::{ClientCommand, ServerMessage};
use crate::engine::{EngineEvent, EngineHandle, EngineSnapshot};
use crate::frame::CaptureStats;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use log::{info, warn};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};

#[derive(Clone)]
struct AppState {
    engine: EngineHandle,
    auth_token: Option<Arc<str>>,
    resolution: (u32, u32),
    frame_rate: u32,
    /// Count of currently-connected control sessions, broadcast to every
    /// session as `clientChange` on connect/disconnect (§4.7). Shared with
    /// the health endpoint so both surfaces report the same number.
    client_count: Arc<AtomicUsize>,
    client_changes: broadcast::Sender<ServerMessage>,
    capture_stats: watch::Receiver<CaptureStats>,
}

#[derive(Debug, Deserialize)]
struct AuthMessage {
    token: String,
}

/// Bind and serve the control channel until the process is torn down.
/// Accepts connections indefinitely; each connection is handled on its own
/// task and a misbehaving client never affects another (§7).
pub async fn serve(
    addr: SocketAddr,
    engine: EngineHandle,
    config: &PlayoutConfig,
    client_count: Arc<AtomicUsize>,
    capture_stats: watch::Receiver<CaptureStats>,
) -> std::io::Result<()> {
    let (client_changes, _first_rx) = broadcast::channel(16);
    let state = AppState {
        engine,
        auth_token: config.control_auth_token.clone().map(Arc::from),
        resolution: (config.resolution.width, config.resolution.height),
        frame_rate: config.frame_rate,
        client_count,
        client_changes,
        capture_stats,
    };
    let router = Router::new().route("/ws", get(ws_upgrade)).with_state(state);
    let listener = TcpListener::bind(addr).await?;
    info!("control server listening on {addr}");
    axum::serve(listener, router).await
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    if let Some(expected) = &state.auth_token {
        match authenticate(&mut socket, expected).await {
            Ok(()) => {}
            Err(reason) => {
                warn!("control session rejected: {reason}");
                let _ = send(&mut socket, &ServerMessage::Error { id: "auth".into(), message: reason }).await;
                return;
            }
        }
    }

    let session_id = uuid::Uuid::new_v4();
    let mut events = state.engine.subscribe_events();
    let mut client_changes = state.client_changes.subscribe();
    let mut capture_stats = state.capture_stats.clone();
    let total = state.client_count.fetch_add(1, Ordering::SeqCst) + 1;
    info!("control session {session_id} established ({total} connected)");
    let _ = state.client_changes.send(ServerMessage::ClientChange { event: "connected".into(), total_clients: total });

    match state.engine.snapshot().await {
        Ok(snap) => {
            if send(&mut socket, &snapshot_message(&snap)).await.is_err() {
                state.client_count.fetch_sub(1, Ordering::SeqCst);
                return;
            }
        }
        Err(e) => warn!("control session {session_id}: could not fetch initial snapshot: {e}"),
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let reply = dispatch(&state, &text).await;
                        if send(&mut socket, &reply).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!("control session read error: {e}");
                        break;
                    }
                    _ => {}
                }
            }
            event = events.recv() => {
                match event {
                    Ok(EngineEvent::Updated { .. }) => {
                        // A variable push doesn't carry enough in the event
                        // itself to describe the resulting template state;
                        // fetch a fresh snapshot rather than grow the event.
                        if let Ok(snap) = state.engine.snapshot().await {
                            if send(&mut socket, &snapshot_message(&snap)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(ev) => {
                        if let Some(msg) = server_message_from_event(ev) {
                            if send(&mut socket, &msg).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("control session lagged {n} engine events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            change = client_changes.recv() => {
                match change {
                    Ok(msg) => {
                        if send(&mut socket, &msg).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            changed = capture_stats.changed() => {
                if changed.is_err() {
                    continue;
                }
                let stats = *capture_stats.borrow_and_update();
                let msg = ServerMessage::FrameUpdate { fps: stats.fps, dropped: stats.dropped };
                if send(&mut socket, &msg).await.is_err() {
                    break;
                }
            }
        }
    }

    let total = state.client_count.fetch_sub(1, Ordering::SeqCst) - 1;
    let _ = state.client_changes.send(ServerMessage::ClientChange { event: "disconnected".into(), total_clients: total });
    info!("control session {session_id} closed ({total} connected)");
}

async fn authenticate(socket: &mut WebSocket, expected: &str) -> Result<(), String> {
    match socket.recv().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<AuthMessage>(&text) {
            Ok(auth) if auth.token == expected => Ok(()),
            Ok(_) => Err("invalid token".into()),
            Err(_) => Err("expected auth message".into()),
        },
        _ => Err("connection closed before auth".into()),
    }
}

async fn send(socket: &mut WebSocket, msg: &ServerMessage) -> Result<(), axum::Error> {
    let text = serde_json::to_string(msg).unwrap_or_else(|_| "{}".to_string());
    socket.send(Message::Text(text.into())).await
}

async fn dispatch(state: &AppState, text: &str) -> ServerMessage {
    let engine = &state.engine;
    let command: ClientCommand = match serde_json::from_str(text) {
        Ok(cmd) => cmd,
        Err(e) => return ServerMessage::Error { id: "unknown".into(), message: format!("invalid message: {e}") },
    };
    let id = command.id().to_string();

    let result = match &command {
        ClientCommand::Load { payload, .. } => engine.load(payload.clone()).await,
        ClientCommand::Play { .. } | ClientCommand::Stop { .. } | ClientCommand::Update { .. } => {
            engine.update_pvw(command.hook().expect("hook command")).await
        }
        ClientCommand::UpdatePgm { .. } => engine.update_pgm(command.pgm_hook().expect("hook command")).await,
        ClientCommand::Next { .. } => engine.next().await,
        ClientCommand::Clear { .. } => engine.clear().await,
        ClientCommand::Take { .. } => engine.take().await,
        ClientCommand::TakeMix { .. } => engine.take_mix(command.take_mix_duration().expect("duration")).await,
        ClientCommand::Freeze { freeze, .. } => engine.freeze(*freeze).await,
        ClientCommand::Snapshot { .. } => {
            return match engine.snapshot().await {
                Ok(snap) => snapshot_message(&snap),
                Err(e) => ServerMessage::Error { id, message: e.to_string() },
            };
        }
        ClientCommand::Info { .. } => {
            return ServerMessage::Info {
                version: env!("CARGO_PKG_VERSION").to_string(),
                resolution: state.resolution,
                frame_rate: state.frame_rate,
            };
        }
        ClientCommand::SetOutput { .. } => Ok(()),
    };

    match result {
        Ok(()) => ServerMessage::Ack { id },
        Err(e) => ServerMessage::Error { id, message: e.to_string() },
    }
}

fn snapshot_message(snap: &EngineSnapshot) -> ServerMessage {
    ServerMessage::Snapshot {
        state: format!("{:?}", snap.state),
        pvw_template: snap.pvw_template.clone(),
        pgm_template: snap.pgm_template.clone(),
        pvw_ready: snap.pvw_ready,
        pgm_ready: snap.pgm_ready,
        mixing: snap.mixing,
    }
}

/// `None` means the event carries nothing a client needs pushed on its own —
/// `Updated` is handled by the caller instead, which fetches a fresh
/// snapshot rather than growing this message with template state.
fn server_message_from_event(event: EngineEvent) -> Option<ServerMessage> {
    Some(match event {
        EngineEvent::StateChanged { state } => ServerMessage::StateChanged { state: format!("{state:?}") },
        EngineEvent::Loaded { template_id } => ServerMessage::Loaded { template_id },
        EngineEvent::TookAir => ServerMessage::TookAir,
        EngineEvent::MixStarted { duration_ms } => ServerMessage::MixStart { duration_ms },
        EngineEvent::MixCompleted => ServerMessage::TookAir,
        EngineEvent::MixCancelled => ServerMessage::MixCancel,
        EngineEvent::Cleared => ServerMessage::Cleared,
        EngineEvent::FreezeChanged { frozen } => ServerMessage::FreezeChanged { frozen },
        EngineEvent::SurfaceFailure { surface, reason } => {
            let surface = match surface {
                crate::engine::SurfaceSlot::Pvw => "pvw",
                crate::engine::SurfaceSlot::Pgm => "pgm",
            };
            ServerMessage::SurfaceFailure { surface: surface.into(), reason }
        }
        EngineEvent::EngineShutdown => ServerMessage::Error { id: "engine".into(), message: "engine shut down".into() },
        EngineEvent::Updated { .. } => return None,
    })
}
