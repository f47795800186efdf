//! Output Manager (§4.3): holds a named set of Output Drivers, distributes
//! each frame, computes the alpha-key companion only when requested, and
//! isolates per-sink failures.

pub mod blend;
pub mod driver;
pub mod sinks;

use crate::engine::EngineEvent;
use crate::errors::PlayoutError;
use crate::frame::{OwnedFrame, Size};
use crate::output::driver::OutputDriver;
use crate::output::sinks::blackburst::black_frame;
use log::warn;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;

/// Consecutive send failures before a sink is removed (§4.4, §7).
pub const MAX_CONSECUTIVE_FAILURES: u32 = 10;

/// Whether a registered sink displays the program fill or previews the
/// alpha-key signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Normal,
    AlphaPreview,
}

struct SinkEntry {
    driver: Box<dyn OutputDriver>,
    kind: SinkKind,
    consecutive_failures: u32,
}

/// Which physical Capture feed is currently the on-air stream. Swapped on
/// every `TookAir`/`MixCompleted`, mirroring the Engine's own surface swap
/// (§4.2, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    A,
    B,
}

struct MixState {
    started: Instant,
    duration: Duration,
}

/// Distributes one paced pixel stream to every registered sink, blending
/// during a MIX and repeating the last frame for sinks that need a frame
/// every tick regardless of upstream freshness (genlock/frame-hold, §9
/// Glossary).
pub struct OutputManager {
    frame_rate: u32,
    size: Size,
    sinks: HashMap<String, SinkEntry>,
    feed_a: watch::Receiver<Option<OwnedFrame>>,
    feed_b: watch::Receiver<Option<OwnedFrame>>,
    on_air: Role,
    events: broadcast::Receiver<EngineEvent>,
    held: OwnedFrame,
    mixing: Option<MixState>,
}

impl OutputManager {
    /// `feed_a`/`feed_b` are the two Capture frame streams (§4.2); `feed_a`
    /// is treated as on-air to start. `events` drives role swaps and mix
    /// timing.
    pub fn new(
        frame_rate: u32,
        size: Size,
        feed_a: watch::Receiver<Option<OwnedFrame>>,
        feed_b: watch::Receiver<Option<OwnedFrame>>,
        events: broadcast::Receiver<EngineEvent>,
    ) -> Self {
        Self {
            frame_rate,
            size,
            sinks: HashMap::new(),
            feed_a,
            feed_b,
            on_air: Role::A,
            events,
            held: black_frame(size),
            mixing: None,
        }
    }

    pub fn register_sink(
        &mut self,
        name: impl Into<String>,
        driver: Box<dyn OutputDriver>,
        kind: SinkKind,
    ) -> Result<(), PlayoutError> {
        let name = name.into();
        if self.sinks.contains_key(&name) {
            return Err(PlayoutError::DuplicateSink(name));
        }
        self.sinks.insert(name, SinkEntry { driver, kind, consecutive_failures: 0 });
        Ok(())
    }

    pub fn remove_sink(&mut self, name: &str) -> Result<(), PlayoutError> {
        let mut entry = self.sinks.remove(name).ok_or_else(|| PlayoutError::UnknownSink(name.to_string()))?;
        entry.driver.destroy();
        Ok(())
    }

    pub fn sink_names(&self) -> Vec<String> {
        self.sinks.keys().cloned().collect()
    }

    fn on_air_frame(&self) -> &watch::Receiver<Option<OwnedFrame>> {
        match self.on_air {
            Role::A => &self.feed_a,
            Role::B => &self.feed_b,
        }
    }

    fn preview_frame(&self) -> &watch::Receiver<Option<OwnedFrame>> {
        match self.on_air {
            Role::A => &self.feed_b,
            Role::B => &self.feed_a,
        }
    }

    fn drain_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(EngineEvent::TookAir) => {
                    self.on_air = match self.on_air {
                        Role::A => Role::B,
                        Role::B => Role::A,
                    };
                    self.mixing = None;
                }
                Ok(EngineEvent::MixStarted { duration_ms }) => {
                    self.mixing = Some(MixState {
                        started: Instant::now(),
                        duration: Duration::from_millis(duration_ms),
                    });
                }
                Ok(EngineEvent::MixCompleted) => {
                    self.on_air = match self.on_air {
                        Role::A => Role::B,
                        Role::B => Role::A,
                    };
                    self.mixing = None;
                }
                Ok(EngineEvent::MixCancelled) => {
                    self.mixing = None;
                }
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => break,
                Err(broadcast::error::TryRecvError::Closed) => break,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("output manager lagged {n} engine events");
                }
            }
        }
    }

    /// Compute this tick's fill frame: the blended crossfade while a mix is
    /// in flight, otherwise the on-air stream's latest frame, falling back
    /// to repeating the last held frame (frame-hold) when nothing fresher
    /// has arrived, and to black when nothing has ever arrived.
    fn compute_fill(&mut self) -> Vec<u8> {
        if let Some(mix) = &self.mixing {
            let elapsed = mix.started.elapsed().as_secs_f32();
            let total = mix.duration.as_secs_f32().max(f32::EPSILON);
            let factor = (elapsed / total).clamp(0.0, 1.0);

            let outgoing = self.on_air_frame().borrow().clone().unwrap_or_else(|| self.held.clone());
            let incoming = self.preview_frame().borrow().clone().unwrap_or_else(|| black_frame(self.size));
            let mut blended = Vec::new();
            if blend::blend_bgra(&outgoing.buffer, &incoming.buffer, factor, &mut blended).is_err() {
                warn!("mix blend skipped: mismatched frame sizes");
                return self.held.buffer.clone();
            }
            return blended;
        }

        let current = self.on_air_frame().borrow().clone();
        match current {
            Some(frame) => {
                self.held = frame.clone();
                frame.buffer
            }
            None => self.held.buffer.clone(),
        }
    }

    /// Run the distribution loop until the frame stream shuts down. Intended
    /// to be spawned as its own task.
    pub async fn run(mut self) {
        if self.frame_rate == 0 {
            warn!("output manager started with frame_rate=0, exiting immediately");
            return;
        }
        let mut tick = tokio::time::interval(Duration::from_secs_f64(1.0 / self.frame_rate as f64));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick.tick().await;
            self.drain_events();

            let fill = self.compute_fill();
            let needs_key = self.sinks.values().any(|s| s.kind == SinkKind::AlphaPreview || s.driver.needs_key());
            let key = if needs_key {
                let mut k = Vec::new();
                match blend::extract_alpha_as_luma(&fill, &mut k) {
                    Ok(()) => Some(k),
                    Err(e) => {
                        warn!("alpha-key extraction skipped: {e}");
                        None
                    }
                }
            } else {
                None
            };

            let mut to_remove = Vec::new();
            for (name, entry) in self.sinks.iter_mut() {
                let (send_fill, send_key): (&[u8], Option<&[u8]>) = match entry.kind {
                    SinkKind::Normal => (&fill, key.as_deref().filter(|_| entry.driver.needs_key())),
                    SinkKind::AlphaPreview => (key.as_deref().unwrap_or(&fill), None),
                };

                match entry.driver.send_frame(send_fill, send_key, self.size) {
                    Ok(()) => entry.consecutive_failures = 0,
                    Err(e) => {
                        entry.consecutive_failures += 1;
                        if entry.consecutive_failures <= 3 {
                            warn!(
                                "sink '{name}' send failed ({}/{MAX_CONSECUTIVE_FAILURES}): {e}",
                                entry.consecutive_failures
                            );
                        }
                        if entry.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                            warn!("sink '{name}' disabled after {MAX_CONSECUTIVE_FAILURES} consecutive failures");
                            to_remove.push(name.clone());
                        }
                    }
                }
            }
            for name in to_remove {
                if let Some(mut entry) = self.sinks.remove(&name) {
                    entry.driver.destroy();
                }
            }
        }
    }
}

impl std::fmt::Debug for OutputManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputManager")
            .field("sinks", &self.sink_names())
            .field("on_air", &self.on_air)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Size;

    struct FlakySink {
        name: String,
        fail_after: u32,
        calls: u32,
    }

    impl OutputDriver for FlakySink {
        fn name(&self) -> &str {
            &self.name
        }
        fn needs_key(&self) -> bool {
            false
        }
        fn send_frame(&mut self, _fill: &[u8], _key: Option<&[u8]>, _size: Size) -> Result<(), PlayoutError> {
            self.calls += 1;
            if self.calls > self.fail_after {
                Err(PlayoutError::SurfaceRejected("simulated failure".into()))
            } else {
                Ok(())
            }
        }
        fn destroy(&mut self) {}
    }

    fn manager() -> (OutputManager, watch::Sender<Option<OwnedFrame>>, watch::Sender<Option<OwnedFrame>>, broadcast::Sender<EngineEvent>) {
        let (fa_tx, fa_rx) = watch::channel(None);
        let (fb_tx, fb_rx) = watch::channel(None);
        let (ev_tx, ev_rx) = broadcast::channel(8);
        let mgr = OutputManager::new(60, Size::new(2, 2), fa_rx, fb_rx, ev_rx);
        (mgr, fa_tx, fb_tx, ev_tx)
    }

    #[test]
    fn duplicate_sink_rejected() {
        let (mut mgr, ..) = manager();
        let sink = Box::new(FlakySink { name: "a".into(), fail_after: u32::MAX, calls: 0 });
        mgr.register_sink("a", sink, SinkKind::Normal).unwrap();
        let sink2 = Box::new(FlakySink { name: "a".into(), fail_after: u32::MAX, calls: 0 });
        assert!(mgr.register_sink("a", sink2, SinkKind::Normal).is_err());
    }

    #[test]
    fn unknown_sink_removal_rejected() {
        let (mut mgr, ..) = manager();
        assert!(mgr.remove_sink("nope").is_err());
    }

    #[test]
    fn no_frame_yet_falls_back_to_black() {
        let (mut mgr, ..) = manager();
        let fill = mgr.compute_fill();
        assert!(fill.chunks_exact(4).all(|px| px == [0, 0, 0, 255]));
    }
}
