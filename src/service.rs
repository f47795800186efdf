//! Top-level service assembly: wires the Engine, both Capture pipelines, the
//! Output Manager, the control channel, the health endpoint and the
//! operational substrate (as-run log, crash recovery) into one running
//! pipeline, and owns the tasks that drive them.
//!
//! An embedder supplies the two rendering-surface adapters (§1: binding a
//! concrete web-engine is the integrator's job) and gets back a
//! [`PlayoutService`] whose [`EngineHandle`] is the only thing it needs to
//! drive the pipeline from there.

use crate::capture::{FrameCapture, PAINT_CHANNEL_CAPACITY};
use crate::config::PlayoutConfig;
use crate::control;
use crate::engine::{EngineHandle, PlayoutEngine};
use crate::errors::PlayoutError;
use crate::frame::Size;
use crate::observability::health;
use crate::observability::{AsRunLog, AsRunWriter, CrashRecovery};
use crate::output::sinks::ndi::NdiSink;
use crate::output::sinks::sdi::SdiSink;
use crate::output::sinks::window::{WindowRole, WindowSink};
use crate::output::{OutputManager, SinkKind};
use crate::surface::RenderingSurface;
use log::{info, warn};
use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A running playout pipeline. Dropping this does not stop the background
/// tasks it spawned — call [`PlayoutService::shutdown`] first.
pub struct PlayoutService {
    handle: EngineHandle,
    tasks: Vec<JoinHandle<()>>,
}

impl PlayoutService {
    /// Build and spawn the whole pipeline from `config`, driving `pvw`/`pgm`
    /// as the two rendering surfaces. Both must already match
    /// `config.resolution`/`config.frame_rate` — construction does not
    /// resize or reclock them.
    ///
    /// The control channel always starts; the health endpoint starts unless
    /// `config.health_port == 0`.
    pub async fn start(
        config: PlayoutConfig,
        pvw: Box<dyn RenderingSurface>,
        pgm: Box<dyn RenderingSurface>,
    ) -> Result<Self, PlayoutError> {
        let size = Size::new(config.resolution.width, config.resolution.height);
        let (pvw_tap_tx, pvw_tap_rx) = mpsc::channel(PAINT_CHANNEL_CAPACITY);
        let (pgm_tap_tx, pgm_tap_rx) = mpsc::channel(PAINT_CHANNEL_CAPACITY);

        let (engine, handle) = PlayoutEngine::new(pvw, pgm, pvw_tap_tx, pgm_tap_tx);
        let mut tasks = vec![tokio::spawn(engine.run())];

        // Object "a" starts in the pvw slot (`PlayoutEngine::new`), so its
        // paint tap is `pvw_tap_rx`; its force-invalidate call must resolve
        // whichever slot it currently backs rather than assume pvw forever,
        // since a take swaps slots, not objects (§4.2, §4.6).
        let invalidate_a = handle.clone();
        let capture_a = FrameCapture::new(pvw_tap_rx, config.frame_rate, Box::new(move || invalidate_a.try_force_invalidate_object_a()));
        let invalidate_b = handle.clone();
        let capture_b = FrameCapture::new(pgm_tap_rx, config.frame_rate, Box::new(move || invalidate_b.try_force_invalidate_object_b()));

        let frames_a = capture_a.subscribe_frames();
        let frames_b = capture_b.subscribe_frames();
        let capture_stats = capture_a.subscribe_stats();
        tasks.push(tokio::spawn(capture_a.run()));
        tasks.push(tokio::spawn(capture_b.run()));

        // `OutputManager::new` treats its first feed as on-air from
        // construction, and object "a" starts in the pvw (preview) slot —
        // so the PGM-side stream (object "b", conceptually on-air even
        // while blank) has to be `feed_a` and the PVW-side stream `feed_b`
        // for the manager's initial role to point at the right object.
        let mut manager = OutputManager::new(config.frame_rate, size, frames_b, frames_a, handle.subscribe_events());
        register_sinks(&mut manager, &config)?;
        tasks.push(tokio::spawn(manager.run()));

        let asrun_log = AsRunLog::new(config.as_run_dir.clone(), handle.subscribe_events());
        tasks.push(tokio::spawn(asrun_log.run()));

        let asrun_writer = AsRunWriter::new(config.as_run_dir.clone());
        let crash_recovery = CrashRecovery::new(handle.clone(), handle.subscribe_events(), asrun_writer);
        tasks.push(tokio::spawn(crash_recovery.run()));

        let client_count = Arc::new(AtomicUsize::new(0));

        let control_addr = SocketAddr::from(([0, 0, 0, 0], config.control_port));
        let control_engine = handle.clone();
        let control_clients = client_count.clone();
        let control_stats = capture_stats.clone();
        let control_config = config.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = control::serve(control_addr, control_engine, &control_config, control_clients, control_stats).await {
                warn!("control server exited: {e}");
            }
        }));

        if config.health_port != 0 {
            let health_addr = SocketAddr::from(([0, 0, 0, 0], config.health_port));
            let health_engine = handle.clone();
            let health_clients = client_count.clone();
            let health_stats = capture_stats.clone();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = health::serve(health_addr, health_engine, health_stats, health_clients).await {
                    warn!("health endpoint exited: {e}");
                }
            }));
        }

        info!("playout service started");
        Ok(Self { handle, tasks })
    }

    /// A cheaply-cloneable handle to drive the Engine this service owns.
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Stop the Engine loop. Everything downstream of it (Capture, the
    /// Output Manager, the as-run log, crash recovery) winds down as its
    /// channels close behind it; the control and health listeners keep
    /// running until the process exits, since they own sockets rather than
    /// a feed from the Engine.
    pub async fn shutdown(&self) -> Result<(), PlayoutError> {
        self.handle.shutdown().await
    }

    /// Await every spawned task. Intended for tests and clean-shutdown
    /// paths; a long-running process normally just awaits the process
    /// signal instead.
    pub async fn join(self) {
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

fn register_sinks(manager: &mut OutputManager, config: &PlayoutConfig) -> Result<(), PlayoutError> {
    if config.sdi.enabled {
        let sink = SdiSink::open("sdi", &config.sdi)?;
        manager.register_sink("sdi", Box::new(sink), SinkKind::Normal)?;
    }
    if config.ndi.enabled {
        let sink = NdiSink::open("ndi", &config.ndi, config.frame_rate)?;
        manager.register_sink("ndi", Box::new(sink), SinkKind::Normal)?;
    }
    if config.rgb_monitor >= 0 {
        let sink = WindowSink::open("rgb-monitor", config.rgb_monitor, WindowRole::Fill)?;
        manager.register_sink("rgb-monitor", Box::new(sink), SinkKind::Normal)?;
    }
    if config.alpha_monitor >= 0 {
        let sink = WindowSink::open("alpha-monitor", config.alpha_monitor, WindowRole::AlphaMonitor)?;
        manager.register_sink("alpha-monitor", Box::new(sink), SinkKind::AlphaPreview)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::TestSurface;

    #[tokio::test]
    async fn starts_and_loads_with_no_sinks_configured() {
        let config = PlayoutConfig::builder().control_port(0).health_port(0).build().unwrap();
        let size = Size::new(config.resolution.width, config.resolution.height);
        let pvw = Box::new(TestSurface::new(size, config.frame_rate));
        let pgm = Box::new(TestSurface::new(size, config.frame_rate));

        let service = PlayoutService::start(config, pvw, pgm).await.unwrap();
        service.handle().load(Default::default()).await.unwrap();
        service.shutdown().await.unwrap();
    }
}
