//! Cheaply-cloneable handle to a running [`crate::engine::PlayoutEngine`].

use crate::engine::events::{EngineCommand, EngineEvent, SurfaceSlot};
use crate::engine::state::EngineSnapshot;
use crate::errors::PlayoutError;
use crate::surface::{HookKind, TemplatePayload};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Every command round-trips through the engine's single-owner loop —
/// cloning a handle is cheap, issuing a command is a channel send plus a
/// oneshot await.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_tx: broadcast::Sender<EngineEvent>,
    /// `true` while the surface object constructed as "a" currently backs
    /// the pvw role. Shared with [`crate::engine::PlayoutEngine`], which
    /// flips it on every take — lets a caller that is bound to one physical
    /// surface object (e.g. a Capture task reading that object's paint tap)
    /// resolve which slot to target without round-tripping a command.
    a_in_pvw_slot: Arc<AtomicBool>,
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle").finish_non_exhaustive()
    }
}

impl EngineHandle {
    pub(crate) fn new(
        cmd_tx: mpsc::Sender<EngineCommand>,
        event_tx: broadcast::Sender<EngineEvent>,
        a_in_pvw_slot: Arc<AtomicBool>,
    ) -> Self {
        Self { cmd_tx, event_tx, a_in_pvw_slot }
    }

    /// Subscribe to the engine's event bus. Lagging subscribers silently
    /// skip ahead rather than blocking the engine.
    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    async fn roundtrip<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, PlayoutError>>) -> EngineCommand,
    ) -> Result<T, PlayoutError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| PlayoutError::NotAttached)?;
        rx.await.map_err(|_| PlayoutError::NotAttached)?
    }

    pub async fn load(&self, payload: TemplatePayload) -> Result<(), PlayoutError> {
        self.roundtrip(|reply| EngineCommand::Load { payload, reply }).await
    }

    pub async fn update_pvw(&self, hook: HookKind) -> Result<(), PlayoutError> {
        self.roundtrip(|reply| EngineCommand::UpdatePvw { hook, reply }).await
    }

    pub async fn update_pgm(&self, hook: HookKind) -> Result<(), PlayoutError> {
        self.roundtrip(|reply| EngineCommand::UpdatePgm { hook, reply }).await
    }

    pub async fn take(&self) -> Result<(), PlayoutError> {
        self.roundtrip(|reply| EngineCommand::Take { via_mix: false, reply }).await
    }

    pub async fn take_mix(&self, duration: Duration) -> Result<(), PlayoutError> {
        self.roundtrip(|reply| EngineCommand::TakeMix { duration, reply }).await
    }

    pub async fn clear(&self) -> Result<(), PlayoutError> {
        self.roundtrip(|reply| EngineCommand::Clear { reply }).await
    }

    pub async fn next(&self) -> Result<(), PlayoutError> {
        self.roundtrip(|reply| EngineCommand::Next { reply }).await
    }

    pub async fn freeze(&self, freeze: bool) -> Result<(), PlayoutError> {
        self.roundtrip(|reply| EngineCommand::Freeze { freeze, reply }).await
    }

    /// Re-initialize whichever surface currently backs `surface`. Used by
    /// crash recovery after a `SurfaceFailure` signal.
    pub async fn reload_surface(&self, surface: SurfaceSlot) -> Result<(), PlayoutError> {
        self.roundtrip(|reply| EngineCommand::ReloadSurface { surface, reply }).await
    }

    /// Ask the named slot to repaint right now. Non-blocking and best-effort:
    /// dropped silently if the engine loop's command channel is full or
    /// gone, since the force-invalidate task (§4.2) fires at 2x frame rate
    /// and can't afford to wait.
    pub fn try_force_invalidate(&self, surface: SurfaceSlot) {
        let _ = self.cmd_tx.try_send(EngineCommand::ForceInvalidate { surface });
    }

    /// Same as [`Self::try_force_invalidate`], but keyed by which physical
    /// surface object to hit rather than which slot. A Capture task reads
    /// one object's paint tap for its whole lifetime regardless of role, so
    /// it can't name a fixed slot the way a one-shot command can — this
    /// resolves the object's current slot at call time instead.
    pub fn try_force_invalidate_object_a(&self) {
        let surface = if self.a_in_pvw_slot.load(Ordering::SeqCst) { SurfaceSlot::Pvw } else { SurfaceSlot::Pgm };
        self.try_force_invalidate(surface);
    }

    pub fn try_force_invalidate_object_b(&self) {
        let surface = if self.a_in_pvw_slot.load(Ordering::SeqCst) { SurfaceSlot::Pgm } else { SurfaceSlot::Pvw };
        self.try_force_invalidate(surface);
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot, PlayoutError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(EngineCommand::Snapshot { reply: tx })
            .await
            .map_err(|_| PlayoutError::NotAttached)?;
        rx.await.map_err(|_| PlayoutError::NotAttached)
    }

    pub async fn shutdown(&self) -> Result<(), PlayoutError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(EngineCommand::Shutdown { reply: tx })
            .await
            .map_err(|_| PlayoutError::NotAttached)?;
        rx.await.map_err(|_| PlayoutError::NotAttached)
    }
}
