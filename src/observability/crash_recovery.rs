//! Crash recovery (§4.8): the Engine's reaction to a surface reporting
//! itself gone or unresponsive. On a `SurfaceFailure`:
//! 1. log the failure to the as-run trail,
//! 2. reload the failed surface back to a blank host state,
//! 3. if the failed surface is PGM and the engine is currently on-air,
//!    clear to avoid leaving a dead picture on-air,
//! 4. the resulting state change reaches the control server on its own,
//!    over the same event bus this reacts to.

use crate::engine::{EngineEvent, EngineHandle, EngineState, SurfaceSlot};
use crate::observability::asrun::{AsRunEntry, AsRunWriter};
use log::{error, info, warn};
use tokio::sync::broadcast;

pub struct CrashRecovery {
    engine: EngineHandle,
    events: broadcast::Receiver<EngineEvent>,
    asrun: AsRunWriter,
}

impl CrashRecovery {
    pub fn new(engine: EngineHandle, events: broadcast::Receiver<EngineEvent>, asrun: AsRunWriter) -> Self {
        Self { engine, events, asrun }
    }

    pub async fn run(mut self) {
        loop {
            let event = match self.events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("crash recovery lagged {n} events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            if let EngineEvent::SurfaceFailure { surface, reason } = event {
                self.recover(surface, &reason).await;
            }
        }
    }

    async fn recover(&self, surface: SurfaceSlot, reason: &str) {
        self.asrun.write(AsRunEntry::new("crash-recovery").details(format!("{surface:?}: {reason}"))).await;
        error!("surface {surface:?} failed ({reason}), recovering");

        if let Err(e) = self.engine.reload_surface(surface).await {
            error!("could not reload failed surface {surface:?}: {e}");
        }

        let on_air = matches!(
            self.engine.snapshot().await.map(|s| s.state),
            Ok(EngineState::OnAir) | Ok(EngineState::Frozen)
        );
        if surface == SurfaceSlot::Pgm && on_air {
            if let Err(e) = self.engine.clear().await {
                info!("recovery clear was a no-op: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineCommand;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    async fn drive_reload_and_snapshot(
        cmd_rx: &mut mpsc::Receiver<EngineCommand>,
        snapshot_state: EngineState,
    ) {
        match cmd_rx.recv().await.expect("reload command sent") {
            EngineCommand::ReloadSurface { surface, reply } => {
                assert_eq!(surface, SurfaceSlot::Pgm);
                let _ = reply.send(Ok(()));
            }
            other => panic!("expected ReloadSurface, got {other:?}"),
        }
        match cmd_rx.recv().await.expect("snapshot command sent") {
            EngineCommand::Snapshot { reply } => {
                let _ = reply.send(crate::engine::EngineSnapshot { state: snapshot_state, ..Default::default() });
            }
            other => panic!("expected Snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pgm_failure_while_on_air_clears() {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(8);
        let (event_tx, event_rx) = broadcast::channel(8);
        let handle = EngineHandle::new(cmd_tx, event_tx.clone(), Arc::new(AtomicBool::new(true)));
        let dir = tempdir().unwrap();
        let recovery = CrashRecovery::new(handle, event_rx, AsRunWriter::new(dir.path()));
        let recovery_task = tokio::spawn(recovery.run());

        event_tx
            .send(EngineEvent::SurfaceFailure { surface: SurfaceSlot::Pgm, reason: "renderer gone".into() })
            .unwrap();

        drive_reload_and_snapshot(&mut cmd_rx, EngineState::OnAir).await;

        match cmd_rx.recv().await.expect("clear command sent") {
            EngineCommand::Clear { reply } => {
                let _ = reply.send(Ok(()));
            }
            other => panic!("expected Clear, got {other:?}"),
        }

        drop(event_tx);
        let _ = recovery_task.await;
    }

    #[tokio::test]
    async fn pvw_failure_never_clears() {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(8);
        let (event_tx, event_rx) = broadcast::channel(8);
        let handle = EngineHandle::new(cmd_tx, event_tx.clone(), Arc::new(AtomicBool::new(true)));
        let dir = tempdir().unwrap();
        let recovery = CrashRecovery::new(handle, event_rx, AsRunWriter::new(dir.path()));
        let recovery_task = tokio::spawn(recovery.run());

        event_tx
            .send(EngineEvent::SurfaceFailure { surface: SurfaceSlot::Pvw, reason: "unresponsive".into() })
            .unwrap();

        match cmd_rx.recv().await.expect("reload command sent") {
            EngineCommand::ReloadSurface { surface, reply } => {
                assert_eq!(surface, SurfaceSlot::Pvw);
                let _ = reply.send(Ok(()));
            }
            other => panic!("expected ReloadSurface, got {other:?}"),
        }
        match cmd_rx.recv().await.expect("snapshot command sent") {
            EngineCommand::Snapshot { reply } => {
                let _ = reply.send(crate::engine::EngineSnapshot { state: EngineState::OnAir, ..Default::default() });
            }
            other => panic!("expected Snapshot, got {other:?}"),
        }

        drop(event_tx);
        let _ = recovery_task.await;
        assert!(cmd_rx.try_recv().is_err(), "no clear should have been issued for a pvw failure");
    }
}
