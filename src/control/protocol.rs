//! Control-channel wire protocol (§4.7, §6.1): JSON messages exchanged over
//! a persistent WebSocket connection.

use crate::surface::{HookKind, TemplatePayload};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// A command sent from an operator client to the control server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum ClientCommand {
    Load { id: String, payload: TemplatePayload },
    Play { id: String },
    Stop { id: String },
    Next { id: String },
    /// Pushes variables into PVW's template hook.
    Update { id: String, variables: HashMap<String, String> },
    /// Pushes variables directly into PGM's template hook, bypassing PVW.
    UpdatePgm { id: String, variables: HashMap<String, String> },
    Clear { id: String },
    Take { id: String },
    TakeMix { id: String, duration_ms: u64 },
    Freeze { id: String, freeze: bool },
    Snapshot { id: String },
    Info { id: String },
    /// Opaque, informational: the server forwards and acknowledges without
    /// touching the Engine. Operators use it to tell the control server
    /// which named sink an operator console is currently watching.
    SetOutput { id: String, sink: String },
}

impl ClientCommand {
    /// The `id` every command carries, echoed back on `error`/`ack` replies
    /// so a client can correlate responses to requests.
    pub fn id(&self) -> &str {
        match self {
            ClientCommand::Load { id, .. }
            | ClientCommand::Play { id }
            | ClientCommand::Stop { id }
            | ClientCommand::Next { id }
            | ClientCommand::Update { id, .. }
            | ClientCommand::UpdatePgm { id, .. }
            | ClientCommand::Clear { id }
            | ClientCommand::Take { id }
            | ClientCommand::TakeMix { id, .. }
            | ClientCommand::Freeze { id, .. }
            | ClientCommand::Snapshot { id }
            | ClientCommand::Info { id }
            | ClientCommand::SetOutput { id, .. } => id,
        }
    }

    /// The PVW-side hook for commands that target PVW (`play`/`stop`/`update`).
    /// `updatePgm` goes straight to PGM instead — see [`ClientCommand::pgm_hook`].
    pub fn hook(&self) -> Option<HookKind> {
        match self {
            ClientCommand::Play { .. } => Some(HookKind::Play),
            ClientCommand::Stop { .. } => Some(HookKind::Stop),
            ClientCommand::Update { variables, .. } => Some(HookKind::Update(variables.clone())),
            _ => None,
        }
    }

    pub fn pgm_hook(&self) -> Option<HookKind> {
        match self {
            ClientCommand::UpdatePgm { variables, .. } => Some(HookKind::Update(variables.clone())),
            _ => None,
        }
    }

    pub fn take_mix_duration(&self) -> Option<Duration> {
        match self {
            ClientCommand::TakeMix { duration_ms, .. } => Some(Duration::from_millis(*duration_ms)),
            _ => None,
        }
    }
}

/// A message sent from the control server to a connected client: either an
/// acknowledgement/error for a specific command, or an unsolicited
/// broadcast of Engine lifecycle state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Ack { id: String },
    Error { id: String, message: String },
    StateChanged { state: String },
    Loaded { template_id: Option<String> },
    TookAir,
    MixStart { duration_ms: u64 },
    MixCancel,
    Cleared,
    FreezeChanged { frozen: bool },
    SurfaceFailure { surface: String, reason: String },
    Snapshot {
        state: String,
        pvw_template: Option<TemplatePayload>,
        pgm_template: Option<TemplatePayload>,
        pvw_ready: bool,
        pgm_ready: bool,
        mixing: bool,
    },
    Info { version: String, resolution: (u32, u32), frame_rate: u32 },
    ClientChange { event: String, total_clients: usize },
    /// Rolling capture stats (§4.2), pushed once a second from whichever
    /// surface is currently on-air.
    FrameUpdate { fps: f32, dropped: u64 },
}
