//! Engine run loop: the only task that touches the PVW/PGM surfaces.

use crate::engine::events::{EngineCommand, EngineEvent, SurfaceSlot, Variables};
use crate::engine::handle::EngineHandle;
use crate::engine::state::{EngineSnapshot, EngineState};
use crate::engine::DEFAULT_CHANNEL_CAPACITY;
use crate::errors::PlayoutError;
use crate::surface::{DirtyRect, HookKind, PaintCallback, RenderingSurface, TemplatePayload};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// One paint delivered by the PGM surface's paint callback, copied out of
/// the surface's own buffer so it can cross a channel (§4.2).
#[derive(Debug, Clone)]
pub struct CapturedPaint {
    pub buffer: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub dirty: DirtyRect,
    pub timestamp: Instant,
}

/// Owns the two rendering surfaces and runs the Engine's command loop.
///
/// Construct with [`PlayoutEngine::new`], call [`PlayoutEngine::run`] to get
/// the loop future, and interact with it exclusively through the returned
/// [`EngineHandle`] — mirroring the rendering engine's own
/// command-loop-plus-handle split.
pub struct PlayoutEngine {
    pvw: Box<dyn RenderingSurface>,
    pgm: Box<dyn RenderingSurface>,
    pvw_template: Option<TemplatePayload>,
    pgm_template: Option<TemplatePayload>,
    pvw_ready: bool,
    pgm_ready: bool,
    state: EngineState,
    event_tx: broadcast::Sender<EngineEvent>,
    cmd_tx: mpsc::Sender<EngineCommand>,
    cmd_rx: Option<mpsc::Receiver<EngineCommand>>,
    mix_cancel: Option<CancellationToken>,
    /// `true` while the surface object constructed as "a" currently backs
    /// the pvw field. Failure callbacks are wired once per object at
    /// construction and so can't name their current slot directly (a take
    /// swaps slots, not objects) — they read this flag instead, and
    /// [`Self::do_take`] flips it on every swap.
    a_in_pvw_slot: Arc<AtomicBool>,
}

impl PlayoutEngine {
    /// Build a new Engine over a freshly created PVW/PGM surface pair. Both
    /// surfaces must share the same size and frame rate.
    ///
    /// `pvw_tap`/`pgm_tap` are wired to each surface's paint callback right
    /// away, one per role rather than one per surface object — a take swaps
    /// which physical surface backs which role, but the tap that was
    /// registered on a given object stays with that object, so Capture and
    /// the output manager must track "on-air"/"preview" as roles that swap,
    /// not as fixed channel identities (§4.2, §4.6).
    pub fn new(
        mut pvw: Box<dyn RenderingSurface>,
        mut pgm: Box<dyn RenderingSurface>,
        pvw_tap: mpsc::Sender<CapturedPaint>,
        pgm_tap: mpsc::Sender<CapturedPaint>,
    ) -> (Self, EngineHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let (event_tx, _first_rx) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);

        pvw.on_paint(make_producer(pvw_tap));
        pgm.on_paint(make_producer(pgm_tap));
        let a_in_pvw_slot = Arc::new(AtomicBool::new(true));
        wire_failure_signals(pvw.as_mut(), true, a_in_pvw_slot.clone(), event_tx.clone());
        wire_failure_signals(pgm.as_mut(), false, a_in_pvw_slot.clone(), event_tx.clone());

        let engine = Self {
            pvw,
            pgm,
            pvw_template: None,
            pgm_template: None,
            pvw_ready: false,
            pgm_ready: false,
            state: EngineState::Idle,
            event_tx: event_tx.clone(),
            cmd_tx: cmd_tx.clone(),
            cmd_rx: Some(cmd_rx),
            mix_cancel: None,
            a_in_pvw_slot,
        };

        let handle = EngineHandle::new(cmd_tx, event_tx, engine.a_in_pvw_slot.clone());
        (engine, handle)
    }

    fn publish(&self, event: EngineEvent) {
        let _ = self.event_tx.send(event);
    }

    fn set_state(&mut self, state: EngineState) {
        if self.state != state {
            self.state = state;
            self.publish(EngineEvent::StateChanged { state });
        }
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            state: self.state,
            pvw_template: self.pvw_template.clone(),
            pgm_template: self.pgm_template.clone(),
            pvw_ready: self.pvw_ready,
            pgm_ready: self.pgm_ready,
            mixing: self.mix_cancel.is_some(),
        }
    }

    /// Run the command loop to completion. The returned future resolves
    /// once a `Shutdown` command is processed.
    pub async fn run(mut self) {
        let mut cmd_rx = match self.cmd_rx.take() {
            Some(rx) => rx,
            None => return,
        };

        info!("playout engine started");
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                EngineCommand::Load { payload, reply } => {
                    let id = payload.id.clone();
                    let stored = payload.clone();
                    let res = self.pvw.load_document(payload).await;
                    if res.is_ok() {
                        self.pvw_template = Some(stored);
                        self.pvw_ready = true;
                        self.set_state(match self.state {
                            EngineState::Idle => EngineState::PvwLoaded,
                            other => other,
                        });
                        self.publish(EngineEvent::Loaded { template_id: id });
                        // Autoplay on load is best-effort (§7): a surface
                        // that rejects or has no `play` hook must not fail
                        // the load itself.
                        if let Err(e) = self.pvw.call_template_hook(HookKind::Play).await {
                            warn!("autoplay on load swallowed: {e}");
                        }
                    }
                    let _ = reply.send(res);
                }
                EngineCommand::UpdatePvw { hook, reply } => {
                    let variables = matches!(&hook, HookKind::Update(_)).then(|| variables_of(&hook));
                    let res = self.pvw.call_template_hook(hook).await;
                    if res.is_ok() {
                        if let Some(variables) = variables {
                            self.publish(EngineEvent::Updated { surface: SurfaceSlot::Pvw, variables });
                        }
                    }
                    let _ = reply.send(res);
                }
                EngineCommand::UpdatePgm { hook, reply } => {
                    let variables = matches!(&hook, HookKind::Update(_)).then(|| variables_of(&hook));
                    let res = self.pgm.call_template_hook(hook).await;
                    if res.is_ok() {
                        if let Some(variables) = variables {
                            self.publish(EngineEvent::Updated { surface: SurfaceSlot::Pgm, variables });
                        }
                    }
                    let _ = reply.send(res);
                }
                EngineCommand::Take { via_mix, reply } => {
                    let res = self.do_take(via_mix);
                    let _ = reply.send(res);
                }
                EngineCommand::TakeMix { duration, reply } => {
                    let res = self.do_take_mix(duration).await;
                    let _ = reply.send(res);
                }
                EngineCommand::Clear { reply } => {
                    if let Some(token) = self.mix_cancel.take() {
                        token.cancel();
                        self.publish(EngineEvent::MixCancelled);
                    }
                    let res = self.pgm.reload().await;
                    if res.is_ok() {
                        self.pgm_template = None;
                        self.pgm_ready = false;
                        self.set_state(EngineState::Idle);
                        self.publish(EngineEvent::Cleared);
                    }
                    let _ = reply.send(res);
                }
                EngineCommand::Next { reply } => {
                    let res = if matches!(self.state, EngineState::OnAir | EngineState::Frozen) {
                        self.pgm.call_template_hook(HookKind::Next).await
                    } else {
                        Ok(())
                    };
                    let _ = reply.send(res);
                }
                EngineCommand::Freeze { freeze, reply } => {
                    self.pgm.set_freeze_output(freeze);
                    match (freeze, self.state) {
                        (true, EngineState::OnAir) => self.set_state(EngineState::Frozen),
                        (false, EngineState::Frozen) => self.set_state(EngineState::OnAir),
                        _ => {}
                    }
                    self.publish(EngineEvent::FreezeChanged { frozen: freeze });
                    let _ = reply.send(Ok(()));
                }
                EngineCommand::ReloadSurface { surface, reply } => {
                    let res = match surface {
                        SurfaceSlot::Pvw => self.pvw.reload().await,
                        SurfaceSlot::Pgm => self.pgm.reload().await,
                    };
                    let _ = reply.send(res);
                }
                EngineCommand::ForceInvalidate { surface } => match surface {
                    SurfaceSlot::Pvw => self.pvw.force_invalidate(),
                    SurfaceSlot::Pgm => self.pgm.force_invalidate(),
                },
                EngineCommand::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot());
                }
                EngineCommand::Shutdown { reply } => {
                    debug!("playout engine received shutdown");
                    self.publish(EngineEvent::EngineShutdown);
                    let _ = reply.send(());
                    break;
                }
            }
        }
        info!("playout engine loop exited");
    }

    fn do_take(&mut self, via_mix: bool) -> Result<(), PlayoutError> {
        if !self.pvw_ready {
            return Err(PlayoutError::PreviewNotReady);
        }
        if !via_mix {
            if let Some(token) = self.mix_cancel.take() {
                token.cancel();
            }
        } else {
            self.mix_cancel = None;
        }
        std::mem::swap(&mut self.pvw, &mut self.pgm);
        std::mem::swap(&mut self.pvw_template, &mut self.pgm_template);
        self.a_in_pvw_slot.fetch_xor(true, Ordering::SeqCst);
        self.pgm_ready = true;
        self.pvw_ready = false;
        self.set_state(EngineState::OnAir);
        self.publish(if via_mix { EngineEvent::MixCompleted } else { EngineEvent::TookAir });
        Ok(())
    }

    /// Schedule a cross-fade of PVW into PGM over `duration` (§4.6) and
    /// return once it is scheduled, not once it completes — the command
    /// loop must stay free to accept a `Clear` that cancels the mix
    /// mid-flight. Completion (or cancellation) is announced on the event
    /// bus via `MixCompleted`/`MixCancelled`.
    ///
    /// The actual blend runs in the output manager against the captured
    /// outgoing/incoming frames; this timer only owns the schedule and the
    /// cancellation point, then drives the same role swap an instant take
    /// performs.
    async fn do_take_mix(&mut self, duration: std::time::Duration) -> Result<(), PlayoutError> {
        if !self.pvw_ready {
            return Err(PlayoutError::PreviewNotReady);
        }
        let token = CancellationToken::new();
        self.mix_cancel = Some(token.clone());
        self.publish(EngineEvent::MixStarted { duration_ms: duration.as_millis() as u64 });

        let cmd_tx = self.cmd_tx.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {
                    let (reply_tx, _reply_rx) = tokio::sync::oneshot::channel();
                    if cmd_tx.send(EngineCommand::Take { via_mix: true, reply: reply_tx }).await.is_err() {
                        warn!("take-mix completion dropped: engine loop gone");
                    }
                }
                _ = token.cancelled() => {
                    let _ = event_tx.send(EngineEvent::MixCancelled);
                }
            }
        });
        Ok(())
    }
}

/// Wire the failure callbacks for one surface object. `is_object_a` fixes
/// which object this is (the one constructed first, originally in the pvw
/// slot); `a_in_pvw_slot` is shared with the other object and flipped by
/// [`PlayoutEngine::do_take`], so both closures always report the slot the
/// object currently backs rather than the slot it started in.
fn wire_failure_signals(
    surface: &mut dyn RenderingSurface,
    is_object_a: bool,
    a_in_pvw_slot: Arc<AtomicBool>,
    event_tx: broadcast::Sender<EngineEvent>,
) {
    let current_slot = move || {
        let a_is_pvw = a_in_pvw_slot.load(Ordering::SeqCst);
        match (is_object_a, a_is_pvw) {
            (true, true) | (false, false) => SurfaceSlot::Pvw,
            (true, false) | (false, true) => SurfaceSlot::Pgm,
        }
    };
    let gone_slot = current_slot.clone();
    let gone_tx = event_tx.clone();
    surface.on_renderer_gone(Box::new(move |reason: &str| {
        let _ = gone_tx.send(EngineEvent::SurfaceFailure { surface: gone_slot(), reason: reason.to_string() });
    }));
    surface.on_unresponsive(Box::new(move |reason: &str| {
        let _ = event_tx.send(EngineEvent::SurfaceFailure { surface: current_slot(), reason: reason.to_string() });
    }));
}

/// Pull the variable map out of a hook already known to be `Update`, for
/// publishing `EngineEvent::Updated` after the call succeeds.
fn variables_of(hook: &HookKind) -> Variables {
    match hook {
        HookKind::Update(vars) => vars.clone(),
        _ => Default::default(),
    }
}

fn make_producer(tx: mpsc::Sender<CapturedPaint>) -> PaintCallback {
    Box::new(move |dirty: DirtyRect, bitmap: &[u8], size: crate::frame::Size| {
        let paint = CapturedPaint {
            buffer: bitmap.to_vec(),
            width: size.width,
            height: size.height,
            dirty,
            timestamp: Instant::now(),
        };
        let _ = tx.try_send(paint);
    })
}
