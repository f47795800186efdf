//! Commands sent to the Engine run loop and events it publishes.

use crate::engine::state::{EngineSnapshot, EngineState};
use crate::errors::PlayoutError;
use crate::surface::{HookKind, TemplatePayload};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;

type Reply<T> = oneshot::Sender<Result<T, PlayoutError>>;

/// Which current slot a surface operation targets. Slots swap roles on a
/// take; this names the slot, not a specific surface object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceSlot {
    Pvw,
    Pgm,
}

/// Commands accepted by the Engine's command loop (§4.5).
///
/// Every variant carries a `reply` channel — the loop is the only task
/// allowed to touch the two rendering surfaces, so every public
/// [`crate::engine::PlayoutEngine`]/[`crate::engine::EngineHandle`] method is
/// a command round-trip.
#[derive(Debug)]
pub enum EngineCommand {
    /// Load a document onto PVW, replacing whatever PVW held.
    Load { payload: TemplatePayload, reply: Reply<()> },
    /// Call a template hook on PVW.
    UpdatePvw { hook: HookKind, reply: Reply<()> },
    /// Call a template hook on PGM directly, without a take.
    UpdatePgm { hook: HookKind, reply: Reply<()> },
    /// Instant cut: PVW becomes PGM, previous PGM becomes PVW. `via_mix` is
    /// set when this call is the completion of a scheduled `TakeMix`, so the
    /// engine loop announces `MixCompleted` instead of `TookAir`.
    Take { via_mix: bool, reply: Reply<()> },
    /// Cross-fade PVW into PGM over `duration`, then swap roles. Cancelled
    /// by a `Clear` issued before it completes.
    TakeMix { duration: Duration, reply: Reply<()> },
    /// Blank PGM and cancel any in-flight mix.
    Clear { reply: Reply<()> },
    /// Convenience hook forwarded to PGM's `next` template hook.
    Next { reply: Reply<()> },
    /// Suspend or resume Capture's pacing tick while remaining on-air.
    Freeze { freeze: bool, reply: Reply<()> },
    /// Re-initialize whichever surface currently backs the named slot.
    /// Used by crash recovery to bring a failed surface back to a blank
    /// host state (§4.8).
    ReloadSurface { surface: SurfaceSlot, reply: Reply<()> },
    /// Force the named slot to repaint right now. Fire-and-forget: unlike
    /// every other command this carries no reply, since the force-invalidate
    /// task (§4.2) that issues it runs at 2x frame rate and must never wait
    /// on the engine loop to keep up.
    ForceInvalidate { surface: SurfaceSlot },
    /// Read current state without mutating anything.
    Snapshot { reply: oneshot::Sender<EngineSnapshot> },
    /// Stop the run loop.
    Shutdown { reply: oneshot::Sender<()> },
}

/// Events the Engine publishes on its broadcast bus. Subscribers (control
/// server, as-run log) never block the loop — `broadcast::Sender::send`
/// failures (no subscribers) are ignored.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    StateChanged { state: EngineState },
    Loaded { template_id: Option<String> },
    TookAir,
    MixStarted { duration_ms: u64 },
    MixCompleted,
    MixCancelled,
    Cleared,
    FreezeChanged { frozen: bool },
    /// A template-level variable update succeeded against the named slot
    /// (`updatePgm` on PGM directly, or `update` on PVW).
    Updated { surface: SurfaceSlot, variables: Variables },
    SurfaceFailure { surface: SurfaceSlot, reason: String },
    EngineShutdown,
}

/// Shared map type for template-hook update arguments (`HookKind::Update`).
pub type Variables = HashMap<String, String>;
